use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, bail};
use backfill::{
    CommitEmitter, Config, Decision, Git, LogProgress, MessageProvider, RunReport, Schedule,
};
use chrono::Datelike;
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "backfill")]
#[command(about = "Fill a git repository with backdated commits")]
struct Cli {
    /// Log every commit, not just every day
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print an annotated example configuration
    ExampleConfig,

    /// Show what a run would do, without touching any repository
    Plan {
        /// Path to the configuration TOML file
        config: PathBuf,

        /// Seed for a reproducible plan
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Create the commits
    Run {
        /// Path to the configuration TOML file
        config: PathBuf,

        /// Repository to commit into (default: current directory)
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Create the repository if it does not exist
        #[arg(long)]
        init: bool,

        /// Seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,

        /// Push to the configured remote after a complete run
        #[arg(long)]
        push: bool,

        /// Use generated messages if the message file is missing
        #[arg(long)]
        fallback_synthetic: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Command::ExampleConfig => {
            print!("{}", backfill::example_config());
        }
        Command::Plan { config, seed } => {
            let config = Config::load(&config)?;
            let mut rngs = Rngs::new(seed);
            let schedule = Schedule::plan(&config, &mut rngs.schedule);
            print_plan(&schedule);
        }
        Command::Run {
            config,
            repo,
            init,
            seed,
            push,
            fallback_synthetic,
        } => {
            let config = Config::load(&config)?;
            let git = if init {
                Git::init(&repo)?
            } else {
                Git::discover(&repo)?
            };
            info!(repo = %git.root().display(), "using repository");

            let report = execute(config.clone(), git, seed, fallback_synthetic).await?;
            println!("{}", report.stats);

            if report.interrupted {
                println!("\nInterrupted before the end of the range; not pushing.");
            } else if push {
                let git = Git::discover(&repo)?;
                git.push(&config.remote, config.branch.as_deref())
                    .context("push failed")?;
                println!("\nPushed to {}.", config.remote);
            }
        }
    }

    Ok(())
}

/// Independent random streams derived from one seed.
struct Rngs {
    schedule: StdRng,
    messages: StdRng,
    scratch: StdRng,
}

impl Rngs {
    fn new(seed: Option<u64>) -> Self {
        let mut master = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            schedule: StdRng::from_rng(&mut master),
            messages: StdRng::from_rng(&mut master),
            scratch: StdRng::from_rng(&mut master),
        }
    }
}

async fn execute(
    config: Config,
    git: Git,
    seed: Option<u64>,
    fallback_synthetic: bool,
) -> anyhow::Result<RunReport> {
    let mut rngs = Rngs::new(seed);

    let mut messages = match MessageProvider::from_source(
        config.message_source.as_deref(),
        config.uniqueness,
        rngs.messages.clone(),
    ) {
        Ok(messages) => messages,
        Err(e) if e.is_missing() && fallback_synthetic => {
            warn!("{e}; using generated messages");
            MessageProvider::synthetic(rngs.messages)
        }
        Err(e) if e.is_missing() => {
            bail!("{e} (pass --fallback-synthetic to use generated messages)")
        }
        Err(e) => return Err(e.into()),
    };

    let schedule = Schedule::plan(&config, &mut rngs.schedule);
    info!(
        days = schedule.len(),
        commits = schedule.predicted_statistics().total_commits,
        "planned"
    );

    let interrupt = Arc::new(AtomicBool::new(false));
    tokio::spawn({
        let interrupt = interrupt.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing the current day");
                interrupt.store(true, Ordering::SeqCst);
            }
        }
    });

    let mut emitter = CommitEmitter::new(git, config.scratch_file.clone(), rngs.scratch);
    let result = tokio::task::spawn_blocking(move || {
        backfill::run(
            &schedule,
            &mut emitter,
            &mut messages,
            &mut LogProgress,
            &interrupt,
        )
    })
    .await?;

    match result {
        Ok(report) => Ok(report),
        Err(e) => {
            println!("{}", e.stats);
            Err(e.into())
        }
    }
}

fn print_plan(schedule: &Schedule) {
    for day in schedule {
        let what = match day.decision {
            Decision::Produce(1) => "1 commit".to_string(),
            Decision::Produce(n) => format!("{n} commits"),
            Decision::Skip(reason) => format!("skip ({reason})"),
        };
        println!("{}  {}  {what}", day.date, day.date.weekday());
    }
    println!("\n{}", schedule.predicted_statistics());
}
