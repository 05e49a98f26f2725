use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, RecvTimeoutError};
use log::{error, info};
use serde::Serialize;

use lexicard::config::{load_config, Config};
use lexicard::job::{enqueue_bounded, JobKind, JobQueue, LogNotifier, TranslationJob, TranslationWorker};
use lexicard::logging::{init_logging, LogFormat};
use lexicard::model::NewActivity;
use lexicard::{report, Database, HttpGateway, LexicardError, TextIngestor};

#[derive(Parser)]
#[command(name = "lexicard", about = "Vocabulary activity translation worker and admin tool", version)]
struct Cli {
    /// Configuration file (default: ~/.config/lexicard/lexicard.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the translation worker until interrupted
    Worker {
        /// Seconds between checks for texts submitted by other processes
        #[arg(long, default_value = "60")]
        poll_secs: u64,
    },

    /// Execute a single translation run in the foreground
    RunOnce,

    /// Create an activity, optionally with initial texts
    Create {
        #[arg(long)]
        name: String,
        /// Language of the texts
        #[arg(long)]
        source: String,
        /// Language to translate words into
        #[arg(long)]
        target: String,
        #[arg(long)]
        creator: i64,
        /// Files holding the initial texts
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },

    /// Submit a text to an activity
    Submit {
        #[arg(long)]
        activity: i64,
        /// File holding the text (HTML or plain)
        #[arg(long)]
        file: PathBuf,
    },

    /// Show the translation status of an activity
    Status {
        #[arg(long)]
        activity: i64,
    },

    /// Show which words users selected in each translated text
    Report {
        #[arg(long)]
        activity: i64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    if let Err(e) = init_logging(format) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lexicard").join("lexicard.json"))
}

fn resolve_config(path: Option<PathBuf>) -> Result<Config, LexicardError> {
    match path.or_else(|| default_config_path().filter(|p| p.exists())) {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Ok(load_config(&path)?)
        }
        None => Ok(Config::default()),
    }
}

fn read_text(path: &Path) -> Result<String, LexicardError> {
    Ok(std::fs::read_to_string(path)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), LexicardError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn translation_job(db: &Database, config: &Config, queue: &Arc<JobQueue>) -> Result<TranslationJob, LexicardError> {
    let gateway = HttpGateway::new(&config.gateway)?;
    Ok(TranslationJob::new(
        db.clone(),
        Arc::new(gateway),
        queue.clone(),
        Arc::new(LogNotifier),
        config.job.clone(),
    ))
}

fn run(cli: Cli) -> Result<(), LexicardError> {
    let config = resolve_config(cli.config)?;
    let db = Database::open(&config.database_path())?;
    let queue = Arc::new(JobQueue::new());

    match cli.command {
        Command::Worker { poll_secs } => run_worker(&db, &config, queue, Duration::from_secs(poll_secs)),
        Command::RunOnce => {
            let job = translation_job(&db, &config, &queue)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let report = runtime.block_on(job.run());
            print_json(&report)
        }
        Command::Create {
            name,
            source,
            target,
            creator,
            files,
        } => {
            let texts = files
                .iter()
                .map(|path| read_text(path))
                .collect::<Result<Vec<_>, _>>()?;
            let ingestor = TextIngestor::new(db, queue, config.job.clone());
            let activity = ingestor.create_activity(
                &NewActivity {
                    name,
                    source_lang: source,
                    target_lang: target,
                    creator_id: creator,
                },
                &texts,
            )?;
            print_json(&activity)
        }
        Command::Submit { activity, file } => {
            let body = read_text(&file)?;
            let ingestor = TextIngestor::new(db, queue, config.job.clone());
            let id = ingestor.submit_text(activity, &body)?;
            println!("Text #{} stored, pending translation", id);
            Ok(())
        }
        Command::Status { activity } => {
            let ingestor = TextIngestor::new(db, queue, config.job.clone());
            print_json(&ingestor.translation_status(activity)?)?;
            print_json(&ingestor.list_texts(activity)?)
        }
        Command::Report { activity } => match report::usage_report(&db, activity)? {
            Some(report) => print_json(&report),
            None => {
                println!("No translated text in activity {}", activity);
                Ok(())
            }
        },
    }
}

fn run_worker(
    db: &Database,
    config: &Config,
    queue: Arc<JobQueue>,
    poll: Duration,
) -> Result<(), LexicardError> {
    let job = translation_job(db, config, &queue)?;
    let worker = TranslationWorker::start(job, Arc::clone(&queue))?;

    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .map_err(|e| std::io::Error::other(e.to_string()))?;

    let max_queued = config.job.max_queued_runs as usize;
    info!("Worker running, press Ctrl-C to stop");

    // Texts may be submitted by other processes, so look for work
    // regularly in addition to the runs the job queues itself.
    loop {
        if let Err(e) = enqueue_bounded(queue.as_ref(), JobKind::TranslateTexts, None, max_queued) {
            error!("Failed to queue a translation run: {}", e);
        }
        match stop_rx.recv_timeout(poll) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => continue,
        }
    }

    worker.shutdown();
    worker.wait();
    Ok(())
}
