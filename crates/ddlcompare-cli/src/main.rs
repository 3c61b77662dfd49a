use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ddlcompare_catalog::{CatalogConnector, EnvSecretResolver, ObjectLister, PostgresCatalog, TextCatalog};
use ddlcompare_core::{Config, Dialect, Report, ReportSink, RowStatus, RunMode};
use ddlcompare_engine::{Orchestrator, Worklist};

mod sinks;

use sinks::{JsonFileSink, MarkdownFileSink};

const DEFAULT_CONFIG: &str = "ddlcompare.toml";

/// ddlcompare - compare and extract table/view DDL across SQL dialects
#[derive(Parser)]
#[command(name = "ddlcompare")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ddlcompare.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare source definitions against one or more targets
    Compare(CompareArgs),

    /// Extract source definitions together with their dependencies
    Extract(ExtractArgs),
}

#[derive(Args)]
struct CompareArgs {
    /// SQL file(s) holding the source definitions
    #[arg(short, long, num_args = 1..)]
    source: Vec<PathBuf>,

    /// Label of the source in the report
    #[arg(long, default_value = "source")]
    source_label: String,

    /// Dialect of the source files
    #[arg(long, default_value = "ansi")]
    source_dialect: Dialect,

    /// Read the source from a live PostgreSQL catalog instead
    #[arg(long, conflicts_with = "source")]
    source_secret: Option<String>,

    /// Target SQL file, optionally labelled: [LABEL=]FILE (repeatable)
    #[arg(short, long)]
    target: Vec<String>,

    /// Target dialect; a single value applies to every target
    #[arg(long)]
    target_dialect: Vec<Dialect>,

    /// Live PostgreSQL target: [LABEL=]SECRET_ID (repeatable)
    #[arg(long)]
    target_secret: Vec<String>,

    #[command(flatten)]
    work: WorkArgs,

    /// Number of concurrent workers (overrides config)
    #[arg(short, long)]
    workers: Option<usize>,
}

#[derive(Args)]
struct ExtractArgs {
    /// SQL file(s) holding the source definitions
    #[arg(short, long, num_args = 1..)]
    source: Vec<PathBuf>,

    /// Label of the source in the report
    #[arg(long, default_value = "source")]
    source_label: String,

    /// Dialect of the source files
    #[arg(short, long, default_value = "ansi")]
    dialect: Dialect,

    /// Read the source from a live PostgreSQL catalog instead
    #[arg(long, conflicts_with = "source")]
    source_secret: Option<String>,

    /// Maximum dependency depth (overrides config)
    #[arg(long)]
    depth: Option<usize>,

    #[command(flatten)]
    work: WorkArgs,
}

/// Worklist and output flags shared by both commands
#[derive(Args)]
struct WorkArgs {
    /// Object to process: NAME or SOURCE_NAME=TARGET_NAME (repeatable)
    #[arg(long)]
    object: Vec<String>,

    /// Schema to discover in the source (repeatable)
    #[arg(long)]
    schema: Vec<String>,

    /// Output file for report.json
    #[arg(short, long, default_value = "report.json")]
    output: PathBuf,

    /// Also output markdown report
    #[arg(short, long)]
    markdown: Option<PathBuf>,
}

impl WorkArgs {
    fn worklist(&self) -> Worklist {
        self.schema
            .iter()
            .fold(Worklist::new().objects(&self.object), |list, schema| list.discover(schema.as_str()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let config = load_config(cli.config.as_deref(), cli.verbose)?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, finishing running objects...".yellow());
            let _ = cancel_tx.send(true);
        }
    });

    let (report, work) = match &cli.command {
        Commands::Compare(args) => (compare_command(config, args, cancel_rx).await?, &args.work),
        Commands::Extract(args) => (extract_command(config, args, cancel_rx).await?, &args.work),
    };

    JsonFileSink::new(&work.output)
        .write(&report)
        .with_context(|| format!("writing {}", work.output.display()))?;
    if let Some(markdown) = &work.markdown {
        MarkdownFileSink::new(markdown)
            .write(&report)
            .with_context(|| format!("writing {}", markdown.display()))?;
    }

    print_report_summary(&report);
    println!("{} {}", "Report written to:".cyan(), work.output.display());

    if report.has_problems() {
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            Config::from_file(Path::new(DEFAULT_CONFIG)).with_context(|| format!("loading {}", DEFAULT_CONFIG))?
        }
        None => {
            if verbose {
                eprintln!("{}", "No config file found, using defaults".yellow());
            }
            Config::default()
        }
    };
    Ok(config)
}

/// Compare command - one source against every target
async fn compare_command(mut config: Config, args: &CompareArgs, cancel: watch::Receiver<bool>) -> Result<Report> {
    if let Some(workers) = args.workers {
        config.run.workers = workers;
    }

    let (source, lister) = open_source(&args.source_label, args.source_dialect, &args.source, args.source_secret.as_deref())?;
    let targets = open_targets(args)?;
    if targets.is_empty() {
        bail!("at least one --target or --target-secret is required");
    }

    tracing::info!(
        source = source.label(),
        targets = targets.len(),
        "starting comparison"
    );
    let orchestrator = Orchestrator::compare(config, source, targets).with_lister(lister);
    Ok(orchestrator.run(&args.work.worklist(), Some(cancel)).await?)
}

/// Extract command - source definitions plus their dependencies
async fn extract_command(mut config: Config, args: &ExtractArgs, cancel: watch::Receiver<bool>) -> Result<Report> {
    if let Some(depth) = args.depth {
        config.run.dependency_depth = depth;
    }

    let (source, lister) = open_source(&args.source_label, args.dialect, &args.source, args.source_secret.as_deref())?;
    tracing::info!(source = source.label(), "starting extraction");
    let orchestrator = Orchestrator::extract(config, source).with_lister(lister);
    Ok(orchestrator.run(&args.work.worklist(), Some(cancel)).await?)
}

type Opened = (Arc<dyn CatalogConnector>, Arc<dyn ObjectLister>);

fn shared<C: CatalogConnector + ObjectLister + 'static>(catalog: C) -> Opened {
    let catalog = Arc::new(catalog);
    let connector: Arc<dyn CatalogConnector> = catalog.clone();
    let lister: Arc<dyn ObjectLister> = catalog;
    (connector, lister)
}

fn open_source(label: &str, dialect: Dialect, files: &[PathBuf], secret: Option<&str>) -> Result<Opened> {
    match secret {
        Some(secret) => postgres_catalog(label, secret).map(shared),
        None if files.is_empty() => bail!("either --source or --source-secret is required"),
        None => {
            let catalog = TextCatalog::from_files(label, dialect, files)
                .with_context(|| format!("reading source files for '{}'", label))?;
            tracing::debug!(label, statements = catalog.len(), "loaded source");
            Ok(shared(catalog))
        }
    }
}

fn postgres_catalog(label: &str, secret: &str) -> Result<PostgresCatalog> {
    if !cfg!(feature = "postgres") {
        bail!("live catalogs need a build with `--features postgres`");
    }
    Ok(PostgresCatalog::new(label, secret, Arc::new(EnvSecretResolver::new())))
}

/// Split `LABEL=VALUE`; bare values get `default_label`
fn split_label(spec: &str, default_label: impl FnOnce() -> String) -> (String, String) {
    match spec.split_once('=') {
        Some((label, value)) if !label.trim().is_empty() => (label.trim().to_string(), value.trim().to_string()),
        _ => (default_label(), spec.trim().to_string()),
    }
}

/// Group `--target` values by label, keeping first-seen order
fn group_targets(specs: &[String]) -> Vec<(String, Vec<PathBuf>)> {
    let mut groups: Vec<(String, Vec<PathBuf>)> = Vec::new();
    for spec in specs {
        let (label, file) = split_label(spec, || "target".to_string());
        match groups.iter_mut().find(|(l, _)| *l == label) {
            Some((_, files)) => files.push(PathBuf::from(file)),
            None => groups.push((label, vec![PathBuf::from(file)])),
        }
    }
    groups
}

/// Dialect for the `index`-th file target
fn target_dialect(dialects: &[Dialect], index: usize) -> Result<Dialect> {
    match dialects {
        [] => Ok(Dialect::default()),
        [single] => Ok(*single),
        many => many
            .get(index)
            .copied()
            .with_context(|| format!("{} --target-dialect values for more targets", many.len())),
    }
}

fn open_targets(args: &CompareArgs) -> Result<Vec<Arc<dyn CatalogConnector>>> {
    let mut targets: Vec<Arc<dyn CatalogConnector>> = Vec::new();

    for (index, (label, files)) in group_targets(&args.target).into_iter().enumerate() {
        let dialect = target_dialect(&args.target_dialect, index)?;
        let catalog = TextCatalog::from_files(label.as_str(), dialect, &files)
            .with_context(|| format!("reading target files for '{}'", label))?;
        tracing::debug!(label = %label, statements = catalog.len(), "loaded target");
        targets.push(Arc::new(catalog));
    }

    for (index, spec) in args.target_secret.iter().enumerate() {
        let (label, secret) = split_label(spec, || format!("postgres{}", index + 1));
        targets.push(Arc::new(postgres_catalog(&label, &secret)?));
    }

    let mut labels: Vec<&str> = targets.iter().map(|t| t.label()).collect();
    labels.sort_unstable();
    if let Some(pair) = labels.windows(2).find(|pair| pair[0] == pair[1]) {
        bail!("duplicate target label '{}'", pair[0]);
    }

    Ok(targets)
}

fn print_report_summary(report: &Report) {
    let title = match report.mode {
        RunMode::Compare => "DDL Comparison Report",
        RunMode::Extract => "DDL Extraction Report",
    };
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", title.bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Run: {}", report.run_id);
    println!("Timestamp: {}", report.timestamp);
    println!("Source: {}", report.source);
    if !report.targets.is_empty() {
        println!("Targets: {}", report.targets.join(", "));
    }
    println!();

    let summary = &report.summary;
    let count = |n: usize| {
        if n > 0 {
            format!("{}", n).red().bold()
        } else {
            format!("{}", n).green()
        }
    };

    println!("{}", "Summary:".bold());
    println!("  Objects:         {}", summary.total);
    match report.mode {
        RunMode::Compare => {
            println!("  Matched:         {}", format!("{}", summary.matched).green());
            println!("  Not matched:     {}", count(summary.not_matched));
            println!("  Missing source:  {}", count(summary.not_available_in_source));
            println!("  Missing target:  {}", count(summary.not_available_in_target));
        }
        RunMode::Extract => {
            println!("  Extracted:       {}", format!("{}", summary.extracted).green());
            println!("  Missing source:  {}", count(summary.not_available_in_source));
        }
    }
    println!("  Failed:          {}", count(summary.failed));
    println!();

    if !report.has_problems() {
        println!("{}", "✓ No issues found!".green().bold());
        return;
    }

    println!("{}", "Problems:".bold());
    for row in report.rows() {
        let status = match row.status {
            RowStatus::Matched | RowStatus::Extracted => continue,
            RowStatus::NotMatched => row.status.to_string().yellow().bold(),
            RowStatus::NotAvailableInSource | RowStatus::NotAvailableInTarget => row.status.to_string().yellow(),
            RowStatus::Failed => row.status.to_string().red().bold(),
        };
        let name = if row.schema.is_empty() {
            row.object_name.clone()
        } else {
            format!("{}.{}", row.schema, row.object_name)
        };
        println!("  [{}] {}: {}", status, name, row.comment);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_split_label() {
        assert_eq!(split_label("prod=prod.sql", || "t".into()), ("prod".to_string(), "prod.sql".to_string()));
        assert_eq!(split_label("prod.sql", || "t".into()), ("t".to_string(), "prod.sql".to_string()));
    }

    #[test]
    fn test_group_targets() {
        let specs = vec!["prod=a.sql".to_string(), "qa=b.sql".to_string(), "prod=c.sql".to_string()];
        assert_eq!(
            group_targets(&specs),
            vec![
                ("prod".to_string(), vec![PathBuf::from("a.sql"), PathBuf::from("c.sql")]),
                ("qa".to_string(), vec![PathBuf::from("b.sql")]),
            ]
        );
    }

    #[test]
    fn test_target_dialects() {
        assert_eq!(target_dialect(&[], 3).unwrap(), Dialect::default());
        assert_eq!(target_dialect(&[Dialect::Snowflake], 2).unwrap(), Dialect::Snowflake);
        let many = [Dialect::Postgres, Dialect::MySql];
        assert_eq!(target_dialect(&many, 1).unwrap(), Dialect::MySql);
        assert!(target_dialect(&many, 2).is_err());
    }

    #[test]
    fn test_parse_compare_flags() {
        let cli = Cli::try_parse_from([
            "ddlcompare",
            "compare",
            "--source",
            "dev.sql",
            "--source-dialect",
            "teradata",
            "--target",
            "prod=prod.sql",
            "--target-dialect",
            "snowflake",
            "--object",
            "sales.orders=sales.orders_v2",
            "--schema",
            "hr",
        ])
        .unwrap();

        let Commands::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(args.source_dialect, Dialect::Teradata);
        assert_eq!(args.target_dialect, vec![Dialect::Snowflake]);
        assert_eq!(args.work.output, PathBuf::from("report.json"));

        let worklist = args.work.worklist();
        assert_eq!(worklist.items.len(), 1);
        assert_eq!(worklist.discover, vec!["hr".to_string()]);
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ddlcompare.toml");
        std::fs::write(&path, "[run]\nworkers = 3\n").unwrap();

        let config = load_config(Some(&path), false).unwrap();
        assert_eq!(config.run.workers, 3);
        assert!(load_config(Some(&dir.path().join("missing.toml")), false).is_err());
    }

    #[tokio::test]
    async fn test_compare_command_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let dev = dir.path().join("dev.sql");
        let prod = dir.path().join("prod.sql");
        std::fs::write(&dev, "CREATE TABLE s.t (id INT NOT NULL, name VARCHAR(50));").unwrap();
        std::fs::write(&prod, "CREATE TABLE s.t (id INT NOT NULL, name VARCHAR(40));").unwrap();

        let cli = Cli::try_parse_from([
            "ddlcompare".to_string(),
            "compare".to_string(),
            "--source".to_string(),
            dev.display().to_string(),
            "--target".to_string(),
            format!("prod={}", prod.display()),
            "--object".to_string(),
            "s.t".to_string(),
        ])
        .unwrap();
        let Commands::Compare(args) = cli.command else {
            panic!("expected compare");
        };

        let (_tx, rx) = watch::channel(false);
        let report = compare_command(Config::default(), &args, rx).await.unwrap();
        assert_eq!(report.targets, vec!["prod".to_string()]);
        assert_eq!(report.summary.not_matched, 1);
        assert!(report.has_problems());
    }

    #[test]
    fn test_secret_sources_need_feature() {
        let result = postgres_catalog("prod", "PROD");
        assert_eq!(result.is_ok(), cfg!(feature = "postgres"));
    }
}
