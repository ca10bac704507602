use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use engine_logging::{engine_error, engine_info, LogDestination};
use ingest_core::JobStatus;
use ingest_engine::{
    load_upload_file, FileStore, JobTracker, ReqwestSubmitter, SnapshotRepository,
    StaticCredential, TrackerEvent,
};
use log::LevelFilter;
use tokio::sync::broadcast::error::RecvError;

use ingest_app::config::AppConfig;
use ingest_app::render;

/// Upload documents and follow their processing on the backend.
#[derive(Parser, Debug)]
#[command(name = "ingest", version, long_about = None)]
struct Cli {
    /// RON config file (default: ./ingest.ron when present)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Where log output goes
    #[arg(long = "log", value_enum, default_value_t = LogTarget::File)]
    log: LogTarget,

    /// Log debug output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// WebSocket endpoint of the processing backend
    #[arg(long = "server", env = "INGEST_SERVER")]
    server: Option<String>,

    /// Base URL of the upload API
    #[arg(long = "api", env = "INGEST_API")]
    api: Option<String>,

    /// Session token sent with uploads
    #[arg(long = "token", env = "INGEST_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a document and follow it until processing ends
    Upload { file: PathBuf },
    /// Continue following the job recorded by a previous run
    Resume,
    /// Print the recorded job
    Status,
    /// Forget the recorded job
    Reset,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            engine_error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if let Some(api) = cli.api {
        config.api_base = api;
    }

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    engine_logging::initialize(cli.log.into(), level, &config.log_file);
    if let Some(path) = &config.source {
        engine_info!("Loaded config from {:?}", path);
    }

    let store = Arc::new(
        FileStore::open(&config.state_dir)
            .with_context(|| format!("opening state directory {}", config.state_dir.display()))?,
    );

    match cli.command {
        Command::Status => {
            let snapshot = SnapshotRepository::new(store).load();
            for line in render::snapshot_lines(&snapshot) {
                println!("{line}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Reset => {
            SnapshotRepository::new(store).clear()?;
            println!("Recorded job cleared.");
            Ok(ExitCode::SUCCESS)
        }
        Command::Upload { file } => {
            let upload = load_upload_file(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let tracker = build_tracker(&config, store, cli.token)?;
            tracker.start();
            match tracker.submit(Some(upload)).await {
                Ok(job_id) => println!("Created job {job_id}"),
                Err(err) => {
                    tracker.shutdown();
                    return Err(err).context("upload rejected");
                }
            }
            Ok(follow(&tracker).await)
        }
        Command::Resume => {
            let tracker = build_tracker(&config, store, cli.token)?;
            tracker.start();
            if !tracker.view().status.is_observing() {
                tracker.shutdown();
                println!("No job to resume.");
                return Ok(ExitCode::SUCCESS);
            }
            Ok(follow(&tracker).await)
        }
    }
}

fn build_tracker(
    config: &AppConfig,
    store: Arc<FileStore>,
    token: Option<String>,
) -> Result<JobTracker> {
    let submitter = ReqwestSubmitter::new(config.submit_settings())
        .context("building upload client")?;
    Ok(JobTracker::new(
        config.tracker_settings(),
        store,
        Arc::new(submitter),
        Arc::new(StaticCredential::new(token)),
    ))
}

/// Prints progress until the job's results are ready, the job fails or the
/// user interrupts. An interrupted job stays recorded for `resume`.
async fn follow(tracker: &JobTracker) -> ExitCode {
    let mut views = tracker.watch();
    let mut events = tracker.events();
    let mut last_line = String::new();

    let code = loop {
        let line = render::progress_line(&views.borrow_and_update());
        if line != last_line {
            println!("{line}");
            last_line = line;
        }
        if tracker.view().status == JobStatus::Failed {
            while let Ok(TrackerEvent::Notice(notice)) = events.try_recv() {
                println!("{}", render::notice_line(&notice));
            }
            break ExitCode::FAILURE;
        }

        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break ExitCode::FAILURE;
                }
            }
            event = events.recv() => match event {
                Ok(TrackerEvent::Notice(notice)) => println!("{}", render::notice_line(&notice)),
                Ok(TrackerEvent::ViewerReady { job_id }) => {
                    println!("Results for job {job_id} are ready.");
                    break ExitCode::SUCCESS;
                }
                Err(RecvError::Lagged(skipped)) => {
                    engine_info!("Skipped {} tracker events", skipped);
                }
                Err(RecvError::Closed) => break ExitCode::FAILURE,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted; run `ingest resume` to continue following the job.");
                break ExitCode::from(130);
            }
        }
    };

    tracker.shutdown();
    code
}
