use std::env;
use std::error::Error;
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use meeting_scheduler::{
    AvailabilitySource, BookingLedger, BookingSink, CachedAvailability, HttpCalendarClient,
    MeetingRequest, Scheduler, SchedulerConfig,
};

const USAGE: &str = "usage: meeting-scheduler <request.json> [--commit]";

type Collaborators = (Arc<dyn AvailabilitySource>, Arc<dyn BookingSink>);

fn build_collaborators() -> Result<Collaborators, Box<dyn Error>> {
    let cache_ttl = env::var("SCHEDULER_CACHE_TTL_SECS")
        .ok()
        .map(|value| value.parse::<u64>())
        .transpose()?
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    if env::var("CALENDAR_API_ENDPOINT").is_ok() {
        info!("Using HTTP calendar provider");
        let client = Arc::new(HttpCalendarClient::from_env()?);
        let availability: Arc<dyn AvailabilitySource> = match cache_ttl {
            Some(ttl) => Arc::new(CachedAvailability::new(client.clone(), ttl)),
            None => client.clone(),
        };
        let booking: Arc<dyn BookingSink> = client;
        return Ok((availability, booking));
    }

    let path = env::var("SCHEDULER_LEDGER_PATH").unwrap_or_else(|_| "bookings.csv".to_string());
    info!("Using CSV booking ledger at {}", path);
    let ledger = Arc::new(BookingLedger::new(&path)?);
    let availability: Arc<dyn AvailabilitySource> = match cache_ttl {
        Some(ttl) => Arc::new(CachedAvailability::new(ledger.clone(), ttl)),
        None => ledger.clone(),
    };
    let booking: Arc<dyn BookingSink> = ledger;
    Ok((availability, booking))
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received interrupt signal, cancelling scheduling request");
            },
            _ = terminate => {
                info!("Received terminate signal, cancelling scheduling request");
            },
        }
        cancel.cancel();
    });
}

async fn run(path: &str, commit: bool) -> Result<(), Box<dyn Error>> {
    let config = SchedulerConfig::from_env()?;
    let (availability, booking) = build_collaborators()?;
    let scheduler = Scheduler::new(config, availability, booking)?;

    let request: MeetingRequest = serde_json::from_str(&fs::read_to_string(path)?)?;

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let decision = scheduler
        .schedule_with_cancellation(&request, commit, &cancel)
        .await?;

    println!("{}", serde_json::to_string_pretty(&decision)?);
    println!();
    println!("{}", decision.summary());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let commit = args.iter().any(|arg| arg == "--commit");
    let Some(path) = args.iter().find(|arg| !arg.starts_with("--")) else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    match run(path, commit).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Scheduling failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
