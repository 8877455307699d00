use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "cull")]
#[command(author, version, about = "Find unused files, dependencies and exports in JS/TS monorepos")]
#[command(after_help = "Examples:
  cull                           Analyze current directory
  cull ./path/to/repo            Analyze specific path
  cull --production              Production surfaces only
  cull --workspace @scope/pkg    Analyze one workspace
  cull --format json             Output as JSON")]
pub struct Cli {
    #[arg(default_value = ".")]
    pub path: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long)]
    pub production: bool,

    #[arg(long)]
    pub strict: bool,

    #[arg(long, value_delimiter = ',')]
    pub include: Option<Vec<IssueType>>,

    #[arg(long, value_delimiter = ',')]
    pub exclude: Option<Vec<IssueType>>,

    #[arg(long, short, default_value = "pretty")]
    pub format: OutputFormat,

    #[arg(long)]
    pub workspace: Option<String>,

    /// List the workspaces and exit.
    #[arg(long)]
    pub workspaces: bool,

    #[arg(long)]
    pub cache: bool,

    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    #[arg(long)]
    pub debug: bool,

    #[arg(long)]
    pub stats: bool,

    #[arg(long, short)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub no_exit_code: bool,

    #[arg(long)]
    pub max_issues: Option<usize>,

    #[arg(long, short)]
    pub watch: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Write a starter config file.
    Init {
        #[arg(long, default_value = "json")]
        format: ConfigFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IssueType {
    Files,
    Dependencies,
    DevDependencies,
    Unlisted,
    Binaries,
    Exports,
    Types,
    EnumMembers,
    ClassMembers,
    Unresolved,
}

impl IssueType {
    /// The camelCase name the config file uses for this kind.
    pub fn config_key(&self) -> &'static str {
        match self {
            IssueType::Files => "files",
            IssueType::Dependencies => "dependencies",
            IssueType::DevDependencies => "devDependencies",
            IssueType::Unlisted => "unlisted",
            IssueType::Binaries => "binaries",
            IssueType::Exports => "exports",
            IssueType::Types => "types",
            IssueType::EnumMembers => "enumMembers",
            IssueType::ClassMembers => "classMembers",
            IssueType::Unresolved => "unresolved",
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
    Compact,
    Github,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ConfigFormat {
    #[default]
    Json,
    Jsonc,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_include_list() {
        let cli = Cli::parse_from(["cull", "--include", "files,exports"]);
        let include = cli.include.unwrap();
        assert_eq!(include, vec![IssueType::Files, IssueType::Exports]);
    }

    #[test]
    fn test_config_keys_are_camel_case() {
        assert_eq!(IssueType::DevDependencies.config_key(), "devDependencies");
        assert_eq!(IssueType::EnumMembers.config_key(), "enumMembers");
    }
}
