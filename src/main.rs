use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use rlatool::clusterinfo::{ClusterInfo, ParseOptions};
use rlatool::config::{Config, OutputFormat};
use rlatool::export::{CsvDirWriter, Serializer};

/// Converts `rladmin status` output into JSON or CSV.
#[derive(Parser)]
#[command(name = "rlatool", about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Report key stamped on every record (default: input file stem).
    #[arg(short, long, global = true)]
    key: Option<String>,

    /// Output rendering.
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Omit CSV header rows.
    #[arg(long)]
    skip_headers: bool,

    /// Write CSV tables into this directory instead of stdout.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// rladmin status output to parse; `-` reads stdin.
    input: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show the shards of one database, or its shard tally on one node.
    Shards {
        /// rladmin status output to parse; `-` reads stdin.
        input: PathBuf,

        /// Database id, e.g. db:10567021.
        #[arg(long)]
        db: String,

        /// Restrict to one node and print its master/replica tally.
        #[arg(long)]
        node: Option<String>,
    },
    /// Print version information and exit.
    Version,
}

/// Build-time version info.
mod version {
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = &cli.command {
        println!("rlatool {}", version::full());
        return Ok(());
    }

    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    apply_overrides(&mut cfg, &cli);
    cfg.validate()?;

    let filter = EnvFilter::try_new(&cfg.log_level)
        .with_context(|| format!("invalid log level: {}", cfg.log_level))?;
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    tracing::debug!(version = version::RELEASE, "starting rlatool");

    match cli.command {
        Some(Command::Shards { input, db, node }) => {
            let info = load(&cfg, &input)?;
            show_shards(&info, &db, node.as_deref())
        }
        Some(Command::Version) => Ok(()),
        None => {
            let input = cli
                .input
                .context("an input file is required (use --help for usage)")?;
            let info = load(&cfg, &input)?;
            render(&cfg, &info)
        }
    }
}

fn apply_overrides(cfg: &mut Config, cli: &Cli) {
    if let Some(level) = &cli.log_level {
        cfg.log_level = level.clone();
    }
    if let Some(key) = &cli.key {
        cfg.key = key.clone();
    }
    if let Some(format) = cli.format {
        cfg.output.format = format;
    }
    if cli.skip_headers {
        cfg.output.skip_headers = true;
    }
    if let Some(dir) = &cli.output_dir {
        cfg.output.directory = dir.display().to_string();
    }
}

fn load(cfg: &Config, input: &Path) -> Result<ClusterInfo> {
    let opts = ParseOptions {
        key: cfg.key_for(input),
        strict_timestamp: cfg.strict_timestamp,
    };

    if input == Path::new("-") {
        let stdin = io::stdin();
        return ClusterInfo::parse_with(&opts, stdin.lock()).context("parsing stdin");
    }

    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    ClusterInfo::parse_with(&opts, BufReader::new(file))
        .with_context(|| format!("parsing {}", input.display()))
}

fn render(cfg: &Config, info: &ClusterInfo) -> Result<()> {
    let skip_headers = cfg.output.skip_headers;

    let text = match cfg.output.format {
        OutputFormat::Json => info.json()?,
        OutputFormat::Databases => info.databases_with_nodes().json()?,
        OutputFormat::Csv if !cfg.output.directory.is_empty() => {
            let writer = CsvDirWriter::new(&cfg.output.directory, skip_headers);
            let written = writer.write(info)?;
            tracing::info!(
                dir = %writer.dir().display(),
                files = written.len(),
                "wrote CSV tables",
            );
            return Ok(());
        }
        OutputFormat::Csv => info.csv(skip_headers)?,
    };

    write_stdout(&text)
}

fn show_shards(info: &ClusterInfo, db: &str, node: Option<&str>) -> Result<()> {
    if info.database(db).is_none() {
        bail!("database {db} not found in {}", info.key());
    }

    let text = match node {
        Some(node) => serde_json::to_string(&info.on_node(db, node))?,
        None => serde_json::to_string(&info.shards_for_db(db))?,
    };

    write_stdout(&text)
}

fn write_stdout(text: &str) -> Result<()> {
    let mut out = io::stdout().lock();
    out.write_all(text.as_bytes()).context("writing output")?;
    if !text.ends_with('\n') {
        out.write_all(b"\n").context("writing output")?;
    }
    Ok(())
}
