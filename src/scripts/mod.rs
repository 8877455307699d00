use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// One command invocation extracted from an npm script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCommand {
    pub binary: String,
    pub args: Vec<String>,
}

impl ScriptCommand {
    /// Arguments that look like source files the command executes.
    pub fn referenced_files(&self) -> Vec<&str> {
        self.args
            .iter()
            .map(|a| a.as_str())
            .filter(|a| !a.starts_with('-') && SOURCE_FILE_RE.is_match(a))
            .collect()
    }
}

static SOURCE_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.(?:[mc]?[jt]sx?)$").unwrap());

/// Binaries the OS or the package manager itself provides; never reported
/// as unlisted.
pub static OS_BINARIES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "bash", "sh", "zsh", "cd", "cp", "mv", "rm", "mkdir", "rmdir", "touch", "cat", "echo",
        "test", "true", "false", "exit", "export", "set", "env", "sleep", "kill", "ls", "find",
        "grep", "sed", "awk", "xargs", "tar", "curl", "wget", "git", "node", "npm", "npx", "yarn",
        "pnpm", "bun", "deno", "corepack", "make", "open", "which", "chmod",
    ]
    .into_iter()
    .collect()
});

/// Wrappers whose real command follows after their own flags and
/// environment assignments.
const RUNNERS: &[&str] = &["npx", "cross-env", "dotenv", "env"];

/// Split a shell command line into its command invocations: `&&`, `||`,
/// `;` and `|` separate commands, quotes are respected, environment
/// assignments and known runner prefixes are peeled off.
pub fn extract_commands(line: &str) -> Vec<ScriptCommand> {
    split_on_operators(line)
        .iter()
        .filter_map(|segment| parse_segment(segment))
        .collect()
}

fn parse_segment(segment: &str) -> Option<ScriptCommand> {
    let mut tokens = tokenize(segment);

    loop {
        if tokens.is_empty() {
            return None;
        }

        // VAR=value prefixes.
        while !tokens.is_empty() && is_env_assignment(&tokens[0]) {
            tokens.remove(0);
        }
        if tokens.is_empty() {
            return None;
        }

        let head = tokens[0].clone();

        if RUNNERS.contains(&head.as_str()) {
            tokens.remove(0);
            // Runner flags (`npx -y`, `dotenv -e .env --`) precede the
            // wrapped command.
            while !tokens.is_empty()
                && (tokens[0].starts_with('-') || is_env_assignment(&tokens[0]))
            {
                let flag = tokens.remove(0);
                if flag == "--" {
                    break;
                }
                // `dotenv -e .env`: the flag value is not the command.
                if flag == "-e" && !tokens.is_empty() && !tokens[0].starts_with('-') {
                    tokens.remove(0);
                }
            }
            continue;
        }

        // `pnpm exec tsc`, `yarn dlx foo`, `npm exec -- foo`.
        if matches!(head.as_str(), "pnpm" | "yarn" | "npm" | "bun") {
            if tokens.len() >= 2 && matches!(tokens[1].as_str(), "exec" | "dlx" | "x") {
                tokens.drain(0..2);
                while !tokens.is_empty() && tokens[0].starts_with('-') {
                    tokens.remove(0);
                }
                continue;
            }
            // `npm run build` invokes another script, not a binary.
            if tokens.len() >= 2 && tokens[1] == "run" {
                return None;
            }
        }

        let binary = strip_path_prefix(&head);
        let args = tokens[1..].to_vec();
        return Some(ScriptCommand {
            binary: binary.to_string(),
            args,
        });
    }
}

fn is_env_assignment(token: &str) -> bool {
    let Some(eq) = token.find('=') else {
        return false;
    };
    let name = &token[..eq];
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `./node_modules/.bin/foo` and `bin/foo` invoke the binary `foo`.
fn strip_path_prefix(token: &str) -> &str {
    token.rsplit('/').next().unwrap_or(token)
}

fn split_on_operators(line: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '&' | '|' => {
                if chars.peek() == Some(&c) {
                    chars.next();
                }
                segments.push(std::mem::take(&mut current));
            }
            ';' => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);

    segments
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn tokenize(segment: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in segment.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => quote = Some(c),
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                _ => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binaries(line: &str) -> Vec<String> {
        extract_commands(line)
            .into_iter()
            .map(|c| c.binary)
            .collect()
    }

    #[test]
    fn test_simple_command() {
        assert_eq!(binaries("tsc -p tsconfig.json"), vec!["tsc"]);
    }

    #[test]
    fn test_chained_commands() {
        assert_eq!(
            binaries("rimraf dist && tsc && node scripts/post.js"),
            vec!["rimraf", "tsc", "node"]
        );
    }

    #[test]
    fn test_env_prefix_and_cross_env() {
        assert_eq!(binaries("NODE_ENV=production webpack"), vec!["webpack"]);
        assert_eq!(
            binaries("cross-env NODE_ENV=test jest --ci"),
            vec!["jest"]
        );
    }

    #[test]
    fn test_npx_unwrapped() {
        assert_eq!(binaries("npx -y playwright install"), vec!["playwright"]);
    }

    #[test]
    fn test_npm_run_is_not_a_binary() {
        assert!(binaries("npm run build").is_empty());
        assert_eq!(binaries("pnpm exec vitest run"), vec!["vitest"]);
    }

    #[test]
    fn test_pipe_and_semicolon() {
        assert_eq!(
            binaries("eslint . | tee log.txt; prettier --check ."),
            vec!["eslint", "tee", "prettier"]
        );
    }

    #[test]
    fn test_quoted_operator_is_literal() {
        assert_eq!(binaries(r#"echo "a && b""#), vec!["echo"]);
    }

    #[test]
    fn test_referenced_files() {
        let commands = extract_commands("node scripts/build.mjs --flag src/extra.ts");
        assert_eq!(
            commands[0].referenced_files(),
            vec!["scripts/build.mjs", "src/extra.ts"]
        );
    }

    #[test]
    fn test_path_prefixed_binary() {
        assert_eq!(binaries("./node_modules/.bin/tsup src/index.ts"), vec!["tsup"]);
    }

    #[test]
    fn test_os_allowlist_contains_shell_basics() {
        assert!(OS_BINARIES.contains("rm"));
        assert!(OS_BINARIES.contains("node"));
        assert!(!OS_BINARIES.contains("tsc"));
    }
}
