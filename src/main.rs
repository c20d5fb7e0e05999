//! fuze - a single-shot, time-based job scheduler.
//!
//! Usage:
//!   fuze send --email <ADDR> --subject <S> --body <B> --at <LOCAL_TIME> --time-zone <TZ>
//!   fuze send --email <ADDR> --subject <S> --body <B> --in-seconds <N>

use clap::{Parser, Subcommand, ValueEnum};
use fuze::{
    Event, EventBus, EventHandler, HandlerError, InMemoryStore, JobHandler, JobId, JobSpec,
    MisfirePolicy, Scheduler, Trigger,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// fuze - a single-shot, time-based job scheduler
#[derive(Parser)]
#[command(name = "fuze")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule an email for a future time and wait for it to fire
    Send {
        /// Recipient address
        #[arg(long)]
        email: String,

        /// Subject line
        #[arg(long)]
        subject: String,

        /// Message body
        #[arg(long)]
        body: String,

        /// Local fire time, e.g. 2026-09-01T09:00:00 (requires --time-zone)
        #[arg(long, conflicts_with = "in_seconds")]
        at: Option<String>,

        /// IANA time zone for --at, e.g. America/New_York
        #[arg(long, requires = "at")]
        time_zone: Option<String>,

        /// Fire after this many seconds instead of at an absolute time
        #[arg(long)]
        in_seconds: Option<u64>,

        /// What to do if the fire time is missed beyond the threshold
        #[arg(long, value_enum, default_value = "fire-now")]
        misfire: MisfireArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MisfireArg {
    /// Fire immediately once noticed
    FireNow,
    /// Drop the entry without running the handler
    Skip,
    /// Mark the entry failed without running the handler
    Error,
}

impl From<MisfireArg> for MisfirePolicy {
    fn from(arg: MisfireArg) -> Self {
        match arg {
            MisfireArg::FireNow => MisfirePolicy::FireNowIfMissed,
            MisfireArg::Skip => MisfirePolicy::SkipIfMissed,
            MisfireArg::Error => MisfirePolicy::ErrorIfMissed,
        }
    }
}

/// Handler that "sends" an email by writing it to the console.
struct ConsoleMailHandler;

#[async_trait::async_trait]
impl JobHandler for ConsoleMailHandler {
    async fn execute(
        &self,
        job_id: &JobId,
        payload: &HashMap<String, String>,
    ) -> Result<(), HandlerError> {
        let email = payload
            .get("email")
            .ok_or_else(|| HandlerError::ExecutionFailed("payload missing 'email'".into()))?;
        let subject = payload
            .get("subject")
            .ok_or_else(|| HandlerError::ExecutionFailed("payload missing 'subject'".into()))?;
        let body = payload
            .get("body")
            .ok_or_else(|| HandlerError::ExecutionFailed("payload missing 'body'".into()))?;

        info!("Sending email (job: {})", job_id);
        println!("To: {}", email);
        println!("Subject: {}", subject);
        println!();
        println!("{}", body);

        Ok(())
    }

    fn required_keys(&self) -> &[&str] {
        &["email", "subject", "body"]
    }
}

/// Simple logging event handler that prints lifecycle events.
struct LoggingHandler;

#[async_trait::async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &Event) {
        match event {
            Event::EntryScheduled { job_id, fire_at } => {
                info!("Job '{}' scheduled to fire at {}", job_id, fire_at);
            }
            Event::EntryFired { job_id, lag } => {
                info!("Job '{}' fired ({:?} after its fire time)", job_id, lag);
            }
            Event::EntryCompleted { job_id, duration } => {
                info!("Job '{}' completed in {:?}", job_id, duration);
            }
            Event::EntryFailed { job_id, error } => {
                error!("Job '{}' failed: {}", job_id, error);
            }
            Event::EntryMisfired { job_id, lag, .. } => {
                warn!("Job '{}' misfired, {:?} past its fire time", job_id, lag);
            }
            Event::EntryCancelled { job_id } => {
                info!("Job '{}' cancelled", job_id);
            }
        }
    }
}

/// Event handler that signals when a specific job reaches a terminal state.
struct CompletionWatcher {
    target_job_id: JobId,
    done: Arc<tokio::sync::Notify>,
}

#[async_trait::async_trait]
impl EventHandler for CompletionWatcher {
    async fn handle(&self, event: &Event) {
        let terminal = matches!(
            event,
            Event::EntryCompleted { .. } | Event::EntryFailed { .. } | Event::EntryMisfired { .. }
        );
        if terminal && event.job_id() == &self.target_job_id {
            self.done.notify_one();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Send {
            email,
            subject,
            body,
            at,
            time_zone,
            in_seconds,
            misfire,
        } => {
            send_email(email, subject, body, at, time_zone, in_seconds, misfire.into()).await?;
        }
    }

    Ok(())
}

/// Build the trigger from either an absolute local time or a relative delay.
fn build_trigger(
    job_id: &JobId,
    at: Option<String>,
    time_zone: Option<String>,
    in_seconds: Option<u64>,
    misfire: MisfirePolicy,
) -> Result<Trigger, Box<dyn std::error::Error>> {
    let trigger = match (at, in_seconds) {
        (Some(at), _) => {
            let local = chrono::NaiveDateTime::parse_from_str(&at, "%Y-%m-%dT%H:%M:%S")
                .map_err(|e| format!("invalid --at value '{}': {}", at, e))?;
            let tz: chrono_tz::Tz = match time_zone {
                Some(name) => name
                    .parse()
                    .map_err(|e| format!("invalid --time-zone: {}", e))?,
                None => chrono_tz::UTC,
            };
            Trigger::at_local(job_id.clone(), local, tz)?
        }
        (None, Some(secs)) => Trigger::at(
            job_id.clone(),
            chrono::Utc::now() + chrono::Duration::seconds(secs as i64),
        ),
        (None, None) => {
            return Err("either --at or --in-seconds is required".into());
        }
    };
    Ok(trigger.with_misfire_policy(misfire))
}

/// Schedule an email and wait for its outcome.
async fn send_email(
    email: String,
    subject: String,
    body: String,
    at: Option<String>,
    time_zone: Option<String>,
    in_seconds: Option<u64>,
    misfire: MisfirePolicy,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = JobSpec::builder("email")
        .payload_entry("email", email)
        .payload_entry("subject", subject)
        .payload_entry("body", body)
        .description("scheduled email")
        .build();
    let trigger = build_trigger(spec.job_id(), at, time_zone, in_seconds, misfire)?;

    // Create event bus with logging and completion watching handlers
    let event_bus = EventBus::new();
    event_bus.register(Arc::new(LoggingHandler)).await;

    let done = Arc::new(tokio::sync::Notify::new());
    let watcher = CompletionWatcher {
        target_job_id: spec.job_id().clone(),
        done: done.clone(),
    };
    event_bus.register(Arc::new(watcher)).await;

    // Create store and scheduler
    let scheduler = Scheduler::new(InMemoryStore::new())
        .with_event_bus(event_bus)
        .register_handler("email", ConsoleMailHandler);

    let (handle, scheduler_task) = scheduler.start();

    let job_id = match handle.schedule(spec, trigger).await {
        Ok(job_id) => job_id,
        Err(e) => {
            error!("Failed to schedule: {}", e);
            handle.shutdown().await?;
            return Err(e.into());
        }
    };
    info!("Scheduled (job: {}); waiting...", job_id);
    info!("Press Ctrl+C to cancel");

    tokio::select! {
        _ = done.notified() => {
            // Terminal event observed
        }
        _ = tokio::signal::ctrl_c() => {
            info!("\nCancelling...");
            match handle.cancel(job_id.clone()).await {
                Ok(()) => info!("Job '{}' cancelled", job_id),
                Err(e) => warn!("Could not cancel job '{}': {}", job_id, e),
            }
        }
        _ = tokio::time::sleep(Duration::from_secs(24 * 60 * 60)) => {
            warn!("Gave up waiting after 24 hours");
        }
    }

    handle.shutdown().await?;
    info!("Goodbye!");
    Ok(())
}
