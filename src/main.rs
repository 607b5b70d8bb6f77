//! koreografeye command line
//!
//! `orch` reasons over input documents, `pol` executes the policies found
//! in reasoning results, `config` manages the configuration file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use koreografeye::config::{KoreoConfig, LogLevel, ReasonerBackend};
use koreografeye::pipeline::{
    self, batch_exit_code, execute_document, guard_document, judge_outcomes, list_inputs, load_store, read_rules,
    reason_document, report_document_error,
};
use koreografeye::policy::executor::{failures, successes};
use koreografeye::serializer::{default_prefixes, serialize};
use koreografeye::{reasoner, Format, KoreoError, KoreoResult, PluginRegistry};

const LONG_VERSION: &str = concat!(env!("KOREO_VERSION"), " (", env!("KOREO_TARGET"), ")");

#[derive(Parser)]
#[command(name = "koreografeye")]
#[command(version = env!("KOREO_VERSION"), long_version = LONG_VERSION)]
#[command(about = "Policy-driven orchestration of RDF reasoning results", long_about = None)]
struct Cli {
    /// Configuration file (default: search path)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reason over input documents with N3 rules
    Orch {
        /// Rule files
        #[arg(required = true, value_name = "RULES")]
        rules: Vec<PathBuf>,

        #[command(flatten)]
        batch: BatchArgs,

        /// Reasoner backend
        #[arg(long, value_enum)]
        reasoner: Option<BackendArg>,

        /// Syntax of the written results
        #[arg(short, long)]
        format: Option<Format>,
    },

    /// Execute the policies in reasoning results
    Pol {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Manage the configuration file
    Config {
        /// Write a commented template to ./koreografeye.toml
        #[arg(long)]
        init: bool,

        /// Print the effective configuration
        #[arg(long)]
        show: bool,

        /// Print the search path
        #[arg(long)]
        paths: bool,
    },
}

#[derive(Args)]
struct BatchArgs {
    /// Input directory
    #[arg(short, long = "in", value_name = "DIR")]
    input: Option<PathBuf>,

    /// Output directory (default: stdout for orch, nowhere for pol)
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Directory receiving copies of failed inputs
    #[arg(short, long, value_name = "DIR")]
    err: Option<PathBuf>,

    /// Process a single file instead of a directory
    #[arg(short, long, value_name = "FILE")]
    single: Option<PathBuf>,

    /// Keep input files
    #[arg(short, long)]
    keep: bool,

    /// Documents processed in parallel (0 = one per CPU)
    #[arg(short, long)]
    workers: Option<usize>,
}

#[derive(Copy, Clone, ValueEnum)]
enum BackendArg {
    Process,
    Embedded,
}

/// Where a document's files go once it has been handled
struct Routing {
    out: Option<PathBuf>,
    err: Option<PathBuf>,
    keep: bool,
}

impl Routing {
    fn copy_to(dir: &Path, input: &Path) {
        let Some(name) = input.file_name() else {
            return;
        };
        let target = dir.join(name);
        tracing::info!(to = %target.display(), "copying input");
        if let Err(e) = fs::copy(input, &target) {
            tracing::error!(to = %target.display(), error = %e, "copy failed");
        }
    }

    fn failed(&self, input: &Path) {
        match &self.err {
            Some(dir) => Self::copy_to(dir, input),
            None => tracing::info!("no --err directory set"),
        }
    }

    fn release(&self, input: &Path) {
        if self.keep {
            tracing::debug!(path = %input.display(), "keeping input");
            return;
        }
        tracing::debug!(path = %input.display(), "removing input");
        if let Err(e) = fs::remove_file(input) {
            tracing::error!(path = %input.display(), error = %e, "cannot remove input");
        }
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<KoreoError>().map_or(1, KoreoError::exit_code)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let mut config = KoreoConfig::load_from_file(path).map_err(KoreoError::from)?;
            config.apply_env_overrides();
            config
        }
        None => KoreoConfig::load().map_err(KoreoError::from)?,
    };

    let level = LogLevel::from_verbosity(cli.verbose).unwrap_or(config.general.log_level);
    init_tracing(level);

    match cli.command {
        Command::Orch {
            rules,
            batch,
            reasoner,
            format,
        } => orch(config, &rules, batch, reasoner, format),
        Command::Pol { batch } => pol(config, batch),
        Command::Config { init, show, paths } => {
            config_command(&config, init, show, paths)?;
            Ok(0)
        }
    }
}

fn init_tracing(level: LogLevel) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive())))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Input files and routing after command line overrides
fn resolve_batch(config: &mut KoreoConfig, batch: BatchArgs) -> Result<(Vec<PathBuf>, Routing)> {
    if let Some(workers) = batch.workers {
        config.batch.workers = workers;
    }
    let routing = Routing {
        out: batch.out.or_else(|| config.batch.output_dir.clone()),
        err: batch.err.or_else(|| config.batch.error_dir.clone()),
        keep: batch.keep || config.batch.keep,
    };
    for dir in [&routing.out, &routing.err].into_iter().flatten() {
        fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    }

    let files = match batch.single {
        Some(file) => vec![file],
        None => {
            let dir = batch.input.unwrap_or_else(|| config.batch.input_dir.clone());
            list_inputs(&dir)?
        }
    };
    Ok((files, routing))
}

fn orch(
    mut config: KoreoConfig,
    rule_paths: &[PathBuf],
    batch: BatchArgs,
    backend: Option<BackendArg>,
    format: Option<Format>,
) -> Result<i32> {
    if let Some(backend) = backend {
        config.reasoner.backend = match backend {
            BackendArg::Process => ReasonerBackend::Process,
            BackendArg::Embedded => ReasonerBackend::Embedded,
        };
    }
    let format = format.unwrap_or(config.general.format);
    let rules = read_rules(rule_paths)?;
    let (files, routing) = resolve_batch(&mut config, batch)?;
    tracing::info!(
        documents = files.len(),
        rules = rules.len(),
        backend = config.reasoner.backend.as_str(),
        "orchestrating"
    );

    let results = pipeline::run_batch(&files, config.batch.workers, |input| {
        let result = guard_document(input, || {
            let mut reasoner = reasoner::from_config(&config.reasoner);
            let store = reason_document(reasoner.as_mut(), input, &rules)?;
            let text = serialize(&store, format, &default_prefixes())?;
            write_result(&routing, input, format, &text)
        });
        if let Err(e) = &result {
            report_document_error(input, e);
            routing.failed(input);
        }
        routing.release(input);
        result
    });

    Ok(batch_exit_code(results.iter().map(|(_, result)| result)))
}

fn write_result(routing: &Routing, input: &Path, format: Format, text: &str) -> KoreoResult<()> {
    match &routing.out {
        Some(dir) => {
            let stem = input.file_stem().unwrap_or(input.as_os_str());
            let target = dir.join(stem).with_extension(format.extension());
            tracing::info!(to = %target.display(), "writing result");
            fs::write(&target, text)
                .map_err(|e| KoreoError::from(e).with_context("path", target.display().to_string()))
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.write_all(b"\n")?;
            Ok(())
        }
    }
}

fn pol(mut config: KoreoConfig, batch: BatchArgs) -> Result<i32> {
    let registry = PluginRegistry::from_config(&config.plugins).context("invalid [plugins] configuration")?;
    if registry.is_empty() {
        tracing::warn!("no plugins configured; every policy will fail");
    }
    let (files, routing) = resolve_batch(&mut config, batch)?;
    tracing::info!(documents = files.len(), plugins = registry.len(), "executing policies");

    let results = pipeline::run_batch(&files, config.batch.workers, |input| {
        let result = guard_document(input, || {
            let store = load_store(input)?;
            let outcomes = execute_document(&store, &registry, input)?;
            tracing::info!(
                path = %input.display(),
                succeeded = successes(&outcomes),
                failed = failures(&outcomes),
                "policies executed"
            );
            judge_outcomes(&outcomes, input)
        });

        match &result {
            Ok(()) => {
                if let Some(dir) = &routing.out {
                    Routing::copy_to(dir, input);
                }
            }
            Err(e) => {
                report_document_error(input, e);
                routing.failed(input);
            }
        }
        routing.release(input);
        result
    });

    Ok(batch_exit_code(results.iter().map(|(_, result)| result)))
}

fn config_command(config: &KoreoConfig, init: bool, show: bool, paths: bool) -> Result<()> {
    if init {
        let path = PathBuf::from("koreografeye.toml");
        KoreoConfig::write_default(&path)?;
        println!("wrote {}", path.display());
    }
    if show {
        print!("{}", config.to_toml()?);
    }
    if paths || (!init && !show) {
        for path in KoreoConfig::config_paths() {
            let marker = if path.exists() { "*" } else { " " };
            println!("{} {}", marker, path.display());
        }
    }
    Ok(())
}
