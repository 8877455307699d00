use std::path::Path;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use cull::cli::{Cli, Commands, ConfigFormat, OutputFormat};
use cull::watch::{watch, WatchConfig};
use cull::workspace::WorkspaceTree;
use cull::{AnalyzeOptions, Report};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(cli: Cli) -> Result<()> {
    if let Some(command) = &cli.command {
        return handle_command(command);
    }

    if cli.debug {
        eprintln!("{} analyzing path: {:?}", "debug:".cyan(), cli.path);
    }

    let path = cli.path.canonicalize().unwrap_or_else(|_| cli.path.clone());

    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    if cli.workspaces {
        return list_workspaces(&path);
    }

    if let Some(ref workspace_name) = cli.workspace {
        return run_workspace_analysis(&cli, &path, workspace_name);
    }

    if cli.watch {
        return run_watch_mode(&cli, &path);
    }

    run_analysis(&cli, &path)
}

fn run_watch_mode(cli: &Cli, path: &Path) -> Result<()> {
    println!(
        "{} {} - watch mode\n",
        "cull".green().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );

    let cli_clone = cli.clone();
    let path_clone = path.to_path_buf();

    watch(path, WatchConfig::default(), move |changed| {
        if !changed.is_empty() {
            println!("\n{} files changed:", "watch:".yellow());
            for file in changed.iter().take(5) {
                println!("   {}", file.display().dimmed());
            }
            if changed.len() > 5 {
                println!("   ... and {} more", changed.len() - 5);
            }
            println!();
        }

        if let Err(e) = run_analysis(&cli_clone, &path_clone) {
            eprintln!("{} {:#}", "error:".red().bold(), e);
        }

        println!("\n{} watching for changes...", "watch:".cyan());
        Ok(())
    })
}

fn list_workspaces(path: &Path) -> Result<()> {
    let tree = WorkspaceTree::load(path)?;

    if !tree.is_monorepo() {
        println!("{}", "Not a monorepo (no workspaces found)".yellow());
        return Ok(());
    }

    println!("Found {} workspaces:\n", tree.workspaces.len().to_string().cyan());

    for ws in &tree.workspaces {
        let relative = ws.dir.strip_prefix(&tree.root).unwrap_or(&ws.dir);
        let location = if relative.as_os_str().is_empty() {
            ".".to_string()
        } else {
            relative.display().to_string()
        };
        println!("  {} {}", ws.name.green(), format!("({})", location).dimmed());
    }

    Ok(())
}

fn run_workspace_analysis(cli: &Cli, root: &Path, workspace_name: &str) -> Result<()> {
    let tree = WorkspaceTree::load(root)?;

    if !tree.is_monorepo() {
        anyhow::bail!("Not a monorepo (no workspaces found)");
    }

    let id = tree
        .by_name(workspace_name)
        .or_else(|| tree.by_dir(&root.join(workspace_name)))
        .ok_or_else(|| {
            let available: Vec<&str> =
                tree.workspaces.iter().map(|w| w.name.as_str()).collect();
            anyhow::anyhow!(
                "Workspace '{}' not found. Available workspaces: {}",
                workspace_name,
                available.join(", ")
            )
        })?;

    println!(
        "{} {} - analyzing workspace {}\n",
        "cull".green().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed(),
        tree.get(id).name.cyan()
    );

    run_analysis(cli, &tree.get(id).dir.clone())
}

fn run_analysis(cli: &Cli, path: &Path) -> Result<()> {
    let start = Instant::now();

    let spinner = if matches!(cli.format, OutputFormat::Pretty) && !cli.watch {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
        bar.set_message("analyzing...");
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    let options = AnalyzeOptions {
        cache: cli.cache,
        cache_dir: cli.cache_dir.clone(),
        production: cli.production,
        strict: cli.strict,
        include: cli
            .include
            .iter()
            .flatten()
            .map(|t| t.config_key().to_string())
            .collect(),
        exclude: cli
            .exclude
            .iter()
            .flatten()
            .map(|t| t.config_key().to_string())
            .collect(),
    };

    let result = cull::analyze_with_options(path, cli.config.as_deref(), options);

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }
    let report = result?;

    let duration = start.elapsed();

    match cli.format {
        OutputFormat::Pretty => print_pretty(&report, path, duration, cli),
        OutputFormat::Json => print_json(&report, duration)?,
        OutputFormat::Compact => print_compact(&report),
        OutputFormat::Github => print_github(&report),
    }

    if cli.no_exit_code || cli.watch {
        return Ok(());
    }

    let total = report.counters.total();
    if let Some(max) = cli.max_issues {
        if total > max {
            anyhow::bail!("Found {} issues (max: {})", total, max);
        }
    } else if total > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn handle_command(command: &Commands) -> Result<()> {
    match command {
        Commands::Init { format } => {
            let filename = match format {
                ConfigFormat::Json => "cull.json",
                ConfigFormat::Jsonc => "cull.jsonc",
            };

            let path = Path::new(filename);
            if path.exists() {
                anyhow::bail!("Config file already exists: {}", filename);
            }

            let config = cull::config::generate_default_config();
            let content = serde_json::to_string_pretty(&config)?;

            std::fs::write(path, content)?;
            println!("{} Created {}", "✓".green(), filename.green());
            Ok(())
        }
    }
}

fn display_path(path: &Path, root: &Path) -> String {
    pathdiff::diff_paths(path, root)
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

fn print_pretty(report: &Report, root: &Path, duration: Duration, cli: &Cli) {
    let issues = &report.issues;

    println!(
        "{} {} - {} workspaces, {} files\n",
        "cull".green().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed(),
        report.stats.workspaces,
        report.stats.files_analyzed
    );

    if !issues.files.is_empty() {
        println!("Unused files ({})", issues.files.len().to_string().yellow());
        for file in &issues.files {
            println!("   {}", display_path(&file.path, root).dimmed());
        }
        println!();
    }

    if !issues.dependencies.is_empty() {
        println!(
            "Unused dependencies ({})",
            issues.dependencies.len().to_string().yellow()
        );
        for dep in &issues.dependencies {
            println!("   {} {}", dep.name.red(), format!("({})", dep.workspace).dimmed());
        }
        println!();
    }

    if !issues.dev_dependencies.is_empty() {
        println!(
            "Unused devDependencies ({})",
            issues.dev_dependencies.len().to_string().yellow()
        );
        for dep in &issues.dev_dependencies {
            println!("   {} {}", dep.name.red(), format!("({})", dep.workspace).dimmed());
        }
        println!();
    }

    if !issues.unlisted.is_empty() {
        println!(
            "Unlisted dependencies ({})",
            issues.unlisted.len().to_string().yellow()
        );
        for dep in &issues.unlisted {
            let first = dep
                .used_in
                .first()
                .map(|p| display_path(p, root))
                .unwrap_or_default();
            println!(
                "   {} {} {}",
                dep.name.yellow(),
                format!("({})", dep.workspace).dimmed(),
                first.dimmed()
            );
        }
        println!();
    }

    if !issues.binaries.is_empty() {
        println!(
            "Unlisted binaries ({})",
            issues.binaries.len().to_string().yellow()
        );
        for binary in &issues.binaries {
            println!(
                "   {} {} {}",
                binary.name.yellow(),
                format!("({})", binary.workspace).dimmed(),
                format!("scripts: {}", binary.scripts.join(", ")).dimmed()
            );
        }
        println!();
    }

    if !issues.exports.is_empty() {
        println!("Unused exports ({})", issues.exports.len().to_string().yellow());
        for export in &issues.exports {
            println!(
                "   {}:{}:{} - {} ({:?})",
                display_path(&export.path, root).dimmed(),
                export.line,
                export.col,
                export.name.cyan(),
                export.kind
            );
        }
        println!();
    }

    if !issues.types.is_empty() {
        println!("Unused types ({})", issues.types.len().to_string().yellow());
        for export in &issues.types {
            println!(
                "   {}:{}:{} - {} ({:?})",
                display_path(&export.path, root).dimmed(),
                export.line,
                export.col,
                export.name.cyan(),
                export.kind
            );
        }
        println!();
    }

    if !issues.enum_members.is_empty() {
        println!(
            "Unused enum members ({})",
            issues.enum_members.len().to_string().yellow()
        );
        for member in &issues.enum_members {
            println!(
                "   {}:{}:{} - {}.{}",
                display_path(&member.path, root).dimmed(),
                member.line,
                member.col,
                member.parent,
                member.name.cyan()
            );
        }
        println!();
    }

    if !issues.class_members.is_empty() {
        println!(
            "Unused class members ({})",
            issues.class_members.len().to_string().yellow()
        );
        for member in &issues.class_members {
            println!(
                "   {}:{}:{} - {}.{}",
                display_path(&member.path, root).dimmed(),
                member.line,
                member.col,
                member.parent,
                member.name.cyan()
            );
        }
        println!();
    }

    if !issues.unresolved.is_empty() {
        println!(
            "Unresolved imports ({})",
            issues.unresolved.len().to_string().yellow()
        );
        for import in &issues.unresolved {
            println!(
                "   {}:{}:{} - cannot resolve '{}'",
                display_path(&import.path, root).dimmed(),
                import.line,
                import.col,
                import.specifier.red()
            );
        }
        println!();
    }

    if !report.diagnostics.is_empty() {
        println!(
            "Diagnostics ({})",
            report.diagnostics.len().to_string().yellow()
        );
        for diagnostic in &report.diagnostics {
            match &diagnostic.path {
                Some(path) => println!(
                    "   {} {}",
                    display_path(path, root).dimmed(),
                    diagnostic.message
                ),
                None => println!("   {}", diagnostic.message),
            }
        }
        println!();
    }

    let total = report.counters.total();
    if total == 0 {
        println!("{}", "No issues found!".green().bold());
    } else {
        println!("{}", "Summary".bold());
        let c = &report.counters;
        if c.files > 0 {
            println!("   Files:        {} unused", c.files.to_string().yellow());
        }
        if c.dependencies + c.dev_dependencies + c.unlisted > 0 {
            println!(
                "   Dependencies: {} unused, {} unlisted",
                (c.dependencies + c.dev_dependencies).to_string().yellow(),
                c.unlisted.to_string().yellow()
            );
        }
        if c.binaries > 0 {
            println!("   Binaries:     {} unlisted", c.binaries.to_string().yellow());
        }
        if c.exports + c.types > 0 {
            println!(
                "   Exports:      {} unused",
                (c.exports + c.types).to_string().yellow()
            );
        }
        if c.enum_members + c.class_members > 0 {
            println!(
                "   Members:      {} unused",
                (c.enum_members + c.class_members).to_string().yellow()
            );
        }
        if c.unresolved > 0 {
            println!("   Unresolved:   {}", c.unresolved.to_string().yellow());
        }
        println!("   Total:        {} issues", total.to_string().red().bold());
    }

    println!();

    if cli.stats {
        println!("{}", "Statistics".bold());
        println!("   Files analyzed: {}", report.stats.files_analyzed);
        println!("   Parse time:     {} ms", report.stats.parse_time_ms);
        println!("   Analysis time:  {} ms", report.stats.analysis_time_ms);
        println!();
    }

    println!(
        "Completed in {}",
        format!("{}ms", duration.as_millis()).green()
    );
}

fn print_json(report: &Report, duration: Duration) -> Result<()> {
    use serde_json::json;

    let issues = &report.issues;
    let output = json!({
        "version": env!("CARGO_PKG_VERSION"),
        "issues": {
            "files": issues.files.iter().map(|f| json!({
                "path": f.path.display().to_string(),
                "workspace": f.workspace,
                "severity": f.severity.as_str()
            })).collect::<Vec<_>>(),
            "dependencies": issues.dependencies.iter().map(|d| json!({
                "name": d.name,
                "workspace": d.workspace,
                "manifest": d.manifest_path.display().to_string(),
                "severity": d.severity.as_str()
            })).collect::<Vec<_>>(),
            "devDependencies": issues.dev_dependencies.iter().map(|d| json!({
                "name": d.name,
                "workspace": d.workspace,
                "manifest": d.manifest_path.display().to_string(),
                "severity": d.severity.as_str()
            })).collect::<Vec<_>>(),
            "unlisted": issues.unlisted.iter().map(|u| json!({
                "name": u.name,
                "workspace": u.workspace,
                "usedIn": u.used_in.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                "severity": u.severity.as_str()
            })).collect::<Vec<_>>(),
            "binaries": issues.binaries.iter().map(|b| json!({
                "name": b.name,
                "workspace": b.workspace,
                "scripts": b.scripts,
                "severity": b.severity.as_str()
            })).collect::<Vec<_>>(),
            "exports": issues.exports.iter().map(|e| json!({
                "path": e.path.display().to_string(),
                "workspace": e.workspace,
                "name": e.name,
                "line": e.line,
                "col": e.col,
                "kind": format!("{:?}", e.kind).to_lowercase(),
                "severity": e.severity.as_str()
            })).collect::<Vec<_>>(),
            "types": issues.types.iter().map(|e| json!({
                "path": e.path.display().to_string(),
                "workspace": e.workspace,
                "name": e.name,
                "line": e.line,
                "col": e.col,
                "kind": format!("{:?}", e.kind).to_lowercase(),
                "severity": e.severity.as_str()
            })).collect::<Vec<_>>(),
            "enumMembers": issues.enum_members.iter().map(|m| json!({
                "path": m.path.display().to_string(),
                "workspace": m.workspace,
                "parent": m.parent,
                "name": m.name,
                "line": m.line,
                "col": m.col,
                "severity": m.severity.as_str()
            })).collect::<Vec<_>>(),
            "classMembers": issues.class_members.iter().map(|m| json!({
                "path": m.path.display().to_string(),
                "workspace": m.workspace,
                "parent": m.parent,
                "name": m.name,
                "line": m.line,
                "col": m.col,
                "severity": m.severity.as_str()
            })).collect::<Vec<_>>(),
            "unresolved": issues.unresolved.iter().map(|u| json!({
                "path": u.path.display().to_string(),
                "workspace": u.workspace,
                "specifier": u.specifier,
                "line": u.line,
                "col": u.col,
                "severity": u.severity.as_str()
            })).collect::<Vec<_>>(),
        },
        "diagnostics": report.diagnostics.iter().map(|d| json!({
            "path": d.path.as_ref().map(|p| p.display().to_string()),
            "message": d.message
        })).collect::<Vec<_>>(),
        "counters": {
            "files": report.counters.files,
            "dependencies": report.counters.dependencies,
            "devDependencies": report.counters.dev_dependencies,
            "unlisted": report.counters.unlisted,
            "binaries": report.counters.binaries,
            "exports": report.counters.exports,
            "types": report.counters.types,
            "enumMembers": report.counters.enum_members,
            "classMembers": report.counters.class_members,
            "unresolved": report.counters.unresolved,
            "total": report.counters.total()
        },
        "stats": {
            "filesAnalyzed": report.stats.files_analyzed,
            "workspaces": report.stats.workspaces,
            "durationMs": duration.as_millis() as u64
        }
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_compact(report: &Report) {
    for file in &report.issues.files {
        println!("{}: unused file", file.path.display());
    }
    for dep in &report.issues.dependencies {
        println!("{} ({}): unused dependency", dep.name, dep.workspace);
    }
    for dep in &report.issues.dev_dependencies {
        println!("{} ({}): unused devDependency", dep.name, dep.workspace);
    }
    for dep in &report.issues.unlisted {
        println!("{} ({}): unlisted dependency", dep.name, dep.workspace);
    }
    for binary in &report.issues.binaries {
        println!("{} ({}): unlisted binary", binary.name, binary.workspace);
    }
    for export in &report.issues.exports {
        println!(
            "{}:{}:{}: unused export '{}'",
            export.path.display(),
            export.line,
            export.col,
            export.name
        );
    }
    for export in &report.issues.types {
        println!(
            "{}:{}:{}: unused type '{}'",
            export.path.display(),
            export.line,
            export.col,
            export.name
        );
    }
    for member in &report.issues.enum_members {
        println!(
            "{}:{}:{}: unused enum member '{}.{}'",
            member.path.display(),
            member.line,
            member.col,
            member.parent,
            member.name
        );
    }
    for member in &report.issues.class_members {
        println!(
            "{}:{}:{}: unused class member '{}.{}'",
            member.path.display(),
            member.line,
            member.col,
            member.parent,
            member.name
        );
    }
    for import in &report.issues.unresolved {
        println!(
            "{}:{}:{}: unresolved import '{}'",
            import.path.display(),
            import.line,
            import.col,
            import.specifier
        );
    }
}

fn print_github(report: &Report) {
    for file in &report.issues.files {
        println!("::warning file={}::Unused file", file.path.display());
    }
    for dep in &report.issues.dependencies {
        println!(
            "::error file={}::Unused dependency '{}'",
            dep.manifest_path.display(),
            dep.name
        );
    }
    for dep in &report.issues.dev_dependencies {
        println!(
            "::warning file={}::Unused devDependency '{}'",
            dep.manifest_path.display(),
            dep.name
        );
    }
    for dep in &report.issues.unlisted {
        println!("::error::Unlisted dependency '{}' in {}", dep.name, dep.workspace);
    }
    for binary in &report.issues.binaries {
        println!("::warning::Unlisted binary '{}' in {}", binary.name, binary.workspace);
    }
    for export in &report.issues.exports {
        println!(
            "::warning file={},line={},col={}::Unused export '{}'",
            export.path.display(),
            export.line,
            export.col,
            export.name
        );
    }
    for export in &report.issues.types {
        println!(
            "::warning file={},line={},col={}::Unused type '{}'",
            export.path.display(),
            export.line,
            export.col,
            export.name
        );
    }
    for import in &report.issues.unresolved {
        println!(
            "::error file={},line={},col={}::Unresolved import '{}'",
            import.path.display(),
            import.line,
            import.col,
            import.specifier
        );
    }
}
