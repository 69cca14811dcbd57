//! html-migrate: turn hand-authored HTML pages into a component project.
//!
//! - `html-migrate analyze site/` prints blocks, components and assets
//! - `html-migrate plan site/*.html -f powershell` prints the extraction script
//! - `html-migrate migrate site/ -p out/` executes and validates
//! - `html-migrate validate site/ -p out/` re-validates an existing project

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use html_migrate::config::MigrationConfig;
use html_migrate::model::{HtmlAnalysis, SourceDocument};
use html_migrate::pipeline::{Migration, MigrationOutcome};
use html_migrate::render::{self, Renderer};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "html-migrate",
    version,
    about = "Split hand-authored HTML pages into a component-based project"
)]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace); logs go to stderr
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze documents: style/script blocks, components, assets
    Analyze(InputArgs),
    /// Build the migration plan without touching the filesystem
    Plan {
        #[command(flatten)]
        input: InputArgs,
        /// Write the plan to this file instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Execute the plan into a project directory and validate the result
    Migrate {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        project: ProjectArgs,
    },
    /// Validate an existing project directory against a fresh plan
    Validate {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        project: ProjectArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Input files, directories or glob patterns (.html / .htm)
    #[arg(required = true)]
    files: Vec<String>,

    /// Directory that source file names are relative to.
    /// Defaults to the common parent directory of the inputs.
    #[arg(long)]
    source_root: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Output format: markdown (default), json, powershell
    #[arg(short = 'f', long, default_value = "markdown")]
    format: String,
}

#[derive(Args)]
struct ProjectArgs {
    /// Root of the generated project
    #[arg(short = 'p', long)]
    project: Option<PathBuf>,

    /// Directory local asset references resolve against
    #[arg(long)]
    asset_root: Option<PathBuf>,

    /// Build command run in the project root during validation
    #[arg(long)]
    build_command: Option<String>,

    /// Build timeout in seconds
    #[arg(long)]
    build_timeout: Option<u64>,

    /// Write the report to this file instead of stdout
    #[arg(short = 'o', long)]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Analyze(input) => analyze(input),
        Commands::Plan { input, output } => plan(input, output.as_deref()),
        Commands::Migrate { input, project } => migrate(input, project),
        Commands::Validate { input, project } => validate(input, project),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn analyze(input: &InputArgs) -> Result<()> {
    let renderer = render::create_renderer(&input.format)?;
    let config = load_config(input, None)?;
    let sources = read_sources(&input.files, &config.source_root)?;
    let mut migration = Migration::new(config);
    let docs = migration.analyze(sources)?;
    let analyses: Vec<HtmlAnalysis> = docs.into_iter().map(|d| d.analysis).collect();
    print!("{}", renderer.render_analysis(&analyses));
    Ok(())
}

fn plan(input: &InputArgs, output: Option<&Path>) -> Result<()> {
    let renderer = render::create_renderer(&input.format)?;
    let config = load_config(input, None)?;
    let sources = read_sources(&input.files, &config.source_root)?;
    let mut migration = Migration::new(config);
    let mut docs = migration.analyze(sources)?;
    let plan = migration.plan(&mut docs)?;
    let name = format!("plan.{}", renderer.file_extension());
    emit(&renderer.render_plan(&plan), output, &name)
}

fn migrate(input: &InputArgs, project: &ProjectArgs) -> Result<()> {
    let renderer = render::create_renderer(&input.format)?;
    let config = load_config(input, Some(project))?;
    let sources = read_sources(&input.files, &config.source_root)?;
    info!(project = %config.project_root.display(), "migrating {} document(s)", sources.len());
    let mut migration = Migration::new(config);
    let outcome = migration.run(sources)?;
    finish(renderer.as_ref(), &outcome, project.report.as_deref())
}

fn validate(input: &InputArgs, project: &ProjectArgs) -> Result<()> {
    let renderer = render::create_renderer(&input.format)?;
    let config = load_config(input, Some(project))?;
    if !config.project_root.is_dir() {
        bail!("project directory not found: {}", config.project_root.display());
    }
    let sources = read_sources(&input.files, &config.source_root)?;
    let mut migration = Migration::new(config);
    let mut docs = migration.analyze(sources)?;
    let plan = migration.plan(&mut docs)?;
    let validation = migration.validate(&plan, None)?;
    let outcome = MigrationOutcome {
        plan,
        execution: None,
        validation,
        state: migration.state().clone(),
    };
    finish(renderer.as_ref(), &outcome, project.report.as_deref())
}

/// Print or write the report; blocking findings make the run fail.
fn finish(renderer: &dyn Renderer, outcome: &MigrationOutcome, report: Option<&Path>) -> Result<()> {
    let name = format!("report.{}", renderer.file_extension());
    emit(&renderer.render_outcome(outcome), report, &name)?;
    let blocking = outcome
        .validation
        .report
        .by_severity(html_migrate::model::Severity::Blocking)
        .len();
    if blocking > 0 {
        bail!("{blocking} blocking issue(s) remain");
    }
    Ok(())
}

/// Write `text` to `path`, or to `default_name` inside it when `path` is a
/// directory; stdout when no path was given.
fn emit(text: &str, path: Option<&Path>, default_name: &str) -> Result<()> {
    match path {
        Some(path) => {
            let joined;
            let path = if path.is_dir() {
                joined = path.join(default_name);
                joined.as_path()
            } else {
                path
            };
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory: {}", parent.display()))?;
            }
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            info!("wrote {}", path.display());
            Ok(())
        }
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

/// Defaults, then the config file, then flags.
fn load_config(input: &InputArgs, project: Option<&ProjectArgs>) -> Result<MigrationConfig> {
    let mut config = match &input.config {
        Some(path) => MigrationConfig::from_file(path)?,
        None => MigrationConfig::default(),
    };
    if let Some(root) = &input.source_root {
        config.source_root = root.clone();
    } else if input.config.is_none() {
        let files = expand_globs(&input.files)?;
        config.source_root = common_parent(&files)?;
    }
    if let Some(p) = project {
        if let Some(dir) = &p.project {
            config.project_root = dir.clone();
        }
        if let Some(dir) = &p.asset_root {
            config.asset_root = Some(dir.clone());
        }
        if let Some(cmd) = &p.build_command {
            config.build_command = Some(cmd.clone());
        }
        if let Some(secs) = p.build_timeout {
            config.build_timeout_secs = secs;
        }
    }
    Ok(config)
}

/// Read every input, named relative to `source_root`.
fn read_sources(patterns: &[String], source_root: &Path) -> Result<Vec<SourceDocument>> {
    let files = expand_globs(patterns)?;
    if files.is_empty() {
        bail!("no input files");
    }
    let root = fs::canonicalize(source_root)
        .with_context(|| format!("source root not found: {}", source_root.display()))?;
    let mut sources = Vec::with_capacity(files.len());
    for path in &files {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let rel = path
            .strip_prefix(&root)
            .with_context(|| format!("{} is outside the source root {}", path.display(), root.display()))?;
        sources.push(SourceDocument::new(rel.to_string_lossy(), content));
    }
    Ok(sources)
}

/// File extensions recognized as source documents.
const SUPPORTED_EXTENSIONS: &[&str] = &["html", "htm"];

/// Expand glob patterns into canonical file paths.
/// Bare directories are scanned recursively for supported file types.
fn expand_globs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
                let p = entry.path();
                let supported = p
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext));
                if entry.file_type().is_file() && supported {
                    files.push(p.to_path_buf());
                }
            }
            continue;
        }
        let mut matches: Vec<_> = glob::glob(pattern)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            warn!("no files matched: {}", pattern);
        }
        matches.sort();
        files.extend(matches);
    }
    // Argument order is route and cascade order; repeats keep their first position
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(files.len());
    for p in files {
        let resolved = fs::canonicalize(&p).with_context(|| format!("failed to resolve {}", p.display()))?;
        if seen.insert(resolved.clone()) {
            unique.push(resolved);
        }
    }
    Ok(unique)
}

/// Deepest directory containing every file.
fn common_parent(files: &[PathBuf]) -> Result<PathBuf> {
    let mut parents = files.iter().filter_map(|f| f.parent());
    let Some(first) = parents.next() else {
        bail!("no input files");
    };
    let mut common = first.to_path_buf();
    for parent in parents {
        while !parent.starts_with(&common) {
            if !common.pop() {
                break;
            }
        }
    }
    Ok(common)
}
