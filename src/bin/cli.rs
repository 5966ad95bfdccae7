//! Result Analyser CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use result_analyser::{
    error::{AppError, Result},
    models::{Config, EntryType, RegistrationRange},
    pipeline,
    storage::{LocalStorage, ResultKey, WriteOptions},
};
use tokio_util::sync::CancellationToken;

/// Result Analyser - semester result fetcher and class ranker
#[derive(Parser, Debug)]
#[command(
    name = "result-analyser",
    version,
    about = "Fetch semester results for a registration range and rank the class"
)]
struct Cli {
    /// Path to storage directory containing config.toml and stored results
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Range fields; anything omitted falls back to `[range]` in config.toml.
#[derive(Args, Debug, Default)]
struct RangeArgs {
    /// First serial (three-digit suffix of the registration number)
    #[arg(long)]
    start: Option<u32>,

    /// Last serial, inclusive
    #[arg(long)]
    end: Option<u32>,

    /// Semester, 1-8
    #[arg(long)]
    semester: Option<u8>,

    /// Last two digits of the admission year
    #[arg(long)]
    batch: Option<u8>,

    /// Three-digit branch code
    #[arg(long)]
    branch: Option<String>,

    /// Three-digit college code
    #[arg(long)]
    college: Option<String>,

    /// Also fetch lateral entrants (semester 3 onwards)
    #[arg(long)]
    lateral: bool,
}

impl RangeArgs {
    fn is_empty(&self) -> bool {
        self.start.is_none()
            && self.end.is_none()
            && self.semester.is_none()
            && self.batch.is_none()
            && self.branch.is_none()
            && self.college.is_none()
            && !self.lateral
    }

    /// Merge the flags over the configured range.
    fn resolve(self, config: &Config) -> Result<RegistrationRange> {
        let base = config.range.clone();
        let missing = |field: &str| {
            AppError::invalid_range(format!(
                "--{field} is required when config.toml has no [range]"
            ))
        };

        let mut range = match base {
            Some(range) => range,
            None => RegistrationRange::new(
                self.start.ok_or_else(|| missing("start"))?,
                self.end.ok_or_else(|| missing("end"))?,
                self.semester.ok_or_else(|| missing("semester"))?,
                self.batch.ok_or_else(|| missing("batch"))?,
                self.branch.clone().ok_or_else(|| missing("branch"))?,
                self.college.clone().ok_or_else(|| missing("college"))?,
            ),
        };

        if let Some(start) = self.start {
            range.start = start;
        }
        if let Some(end) = self.end {
            range.end = end;
        }
        if let Some(semester) = self.semester {
            range.semester = semester;
        }
        if let Some(batch) = self.batch {
            range.batch = batch;
        }
        if let Some(branch) = self.branch {
            range.branch = branch;
        }
        if let Some(college) = self.college {
            range.college = college;
        }
        if self.lateral {
            range.lateral_entry = true;
        }

        range.validate()?;
        Ok(range)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every result in a registration range, store and rank it
    Fetch {
        #[command(flatten)]
        range: RangeArgs,

        /// Replace a complete stored run even if this run is cancelled
        #[arg(long)]
        force: bool,

        /// Number of top performers to print
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Fetch a single registration number
    Lookup {
        /// Full eleven-digit registration number
        reg_no: u64,

        /// Semester, 1-8
        #[arg(long)]
        semester: u8,

        /// The number belongs to a lateral entrant
        #[arg(long)]
        lateral: bool,
    },

    /// Recompute rankings from a stored run
    Rank {
        /// Class as {batch}-{branch}-{college}, e.g. 24-105-107
        class: String,

        /// Semester, 1-8
        #[arg(long)]
        semester: u8,

        /// Number of top performers to print
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Print topper-gap analysis for this registration number
        #[arg(long)]
        gap: Option<u64>,
    },

    /// Classify SGPA trends across every stored semester of a class
    Trend {
        /// Class as {batch}-{branch}-{college}, e.g. 24-105-107
        class: String,

        /// Only this registration number
        #[arg(long)]
        reg_no: Option<u64>,
    },

    /// Validate configuration (and range flags, if given)
    Validate {
        #[command(flatten)]
        range: RangeArgs,
    },
}

/// Initialize logging; `RUST_LOG` overrides `level`.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, finishing with the records fetched so far...");
            token.cancel();
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.storage_dir.join("config.toml");
    let loaded = Config::load_or_default(&config_path);
    let level = if cli.verbose {
        "debug"
    } else {
        loaded.as_ref().map_or("info", |c| c.logging.level.as_str())
    };
    init_logging(level);

    log::info!("Result Analyser starting...");

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return Err(e);
        }
    };
    if config_path.exists() {
        log::info!("Loaded configuration from {}", config_path.display());
    } else {
        log::info!("No {} found, using defaults", config_path.display());
    }

    let storage = LocalStorage::new(&cli.storage_dir);

    match cli.command {
        Command::Fetch { range, force, top } => {
            config.validate()?;
            let range = range.resolve(&config)?;

            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());

            let result = pipeline::run_acquisition(
                &config,
                &range,
                &storage,
                cancel,
                &WriteOptions { force },
                top,
            )
            .await?;

            if result.cancelled {
                log::warn!(
                    "Run cancelled: {} of {} numbers finished",
                    result.records.len(),
                    result.records.len() + result.unfinished.len()
                );
            } else {
                log::info!("Fetch complete!");
            }
        }

        Command::Lookup {
            reg_no,
            semester,
            lateral,
        } => {
            config.validate()?;
            let entry = if lateral {
                EntryType::Lateral
            } else {
                EntryType::Regular
            };
            let range = RegistrationRange::for_registration_no(reg_no, semester, entry)?;
            pipeline::run_lookup(&config, &range, reg_no).await?;
        }

        Command::Rank {
            class,
            semester,
            top,
            gap,
        } => {
            let key = ResultKey::new(class, semester);
            pipeline::run_ranking(&storage, &key, top, gap).await?;
        }

        Command::Trend { class, reg_no } => {
            pipeline::run_trend(&storage, &class, reg_no).await?;
        }

        Command::Validate { range } => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} URL templates)", config.source.url_templates.len());

            if !range.is_empty() || config.range.is_some() {
                let range = range.resolve(&config)?;
                result_analyser::utils::validate_templates(&config.source.url_templates, &range)?;
                log::info!(
                    "✓ Range OK: {} numbers for {} semester {}",
                    range.task_count(),
                    range.class_key(),
                    range.semester
                );
            }

            log::info!("All validations passed!");
        }
    }

    log::info!("Done!");

    Ok(())
}
