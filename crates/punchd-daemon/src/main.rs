use std::sync::Arc;

use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use punchd_core::action::TimesheetActions;
use punchd_core::config::PunchdConfig;
use punchd_core::notify::Notifier;
use punchd_core::types::{EventKind, RetryPolicy, TimeWindow};
use punchd_portal::PortalClient;
use punchd_scheduler::jitter::{self, WaitOutcome};
use punchd_scheduler::retry::{run_with_retry, RetryOutcome};
use punchd_scheduler::{calendar, DayOutcome, Orchestrator};

#[derive(Parser)]
#[command(name = "punchd", version, about = "Automated daily timesheet sign-in/sign-out")]
struct Cli {
    /// Path to punchd.toml. Falls back to $PUNCHD_CONFIG, then
    /// ~/.punchd/punchd.toml.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daily scheduling loop (default).
    Run,
    /// Perform a single sign-in now, with retries.
    SignIn {
        /// Skip the active-window policy check.
        #[arg(long)]
        force: bool,
    },
    /// Perform a single sign-out now, with retries.
    SignOut {
        /// Skip the active-window policy check.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "punchd=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // config: explicit flag > PUNCHD_CONFIG env > ~/.punchd/punchd.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("PUNCHD_CONFIG").ok());
    let config = PunchdConfig::load(config_path.as_deref())?;
    config.validate()?;

    let window = config.policy.window()?;
    let retry = config.retry.policy()?;
    let actions: Arc<dyn TimesheetActions> = Arc::new(PortalClient::new(config.portal.clone())?);
    let notifier = punchd_notify::from_config(&config.notify);

    // Single shutdown entry point: ctrl-c flips the watch channel and every
    // pending wait resolves into a cancelled outcome.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            run_daemon(
                &config,
                window,
                retry,
                actions,
                notifier,
                shutdown_rx,
            )
            .await
        }
        Command::SignIn { force } => {
            run_once(EventKind::SignIn, force, &window, &retry, actions, notifier, shutdown_rx)
                .await
        }
        Command::SignOut { force } => {
            run_once(EventKind::SignOut, force, &window, &retry, actions, notifier, shutdown_rx)
                .await
        }
    }
}

/// The daily loop: run today's cycle immediately (it skips itself when the
/// window is closed), then sleep until the next eligible window start.
async fn run_daemon(
    config: &PunchdConfig,
    window: TimeWindow,
    retry: RetryPolicy,
    actions: Arc<dyn TimesheetActions>,
    notifier: Arc<dyn Notifier>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let mut orchestrator = Orchestrator::new(
        window.clone(),
        config.policy.jitter_minutes,
        config.policy.min_work_duration(),
        retry,
        actions,
        notifier,
    );

    info!("punchd daemon started");
    loop {
        let outcome = orchestrator.run_day(&mut shutdown_rx).await;
        info!(outcome = ?outcome, "day cycle finished");
        if outcome == DayOutcome::Aborted {
            break;
        }

        let now = Local::now().naive_local();
        let Some(next) = calendar::next_occurrence(now, &window.weekdays, window.start) else {
            anyhow::bail!("no eligible day in the policy weekday set");
        };
        info!(next = %next, "sleeping until the next window start");

        let delay = jitter::delay_until(next, now);
        if jitter::wait_until_cancellable(delay, &mut shutdown_rx).await == WaitOutcome::Cancelled {
            break;
        }
    }

    info!("punchd daemon stopped");
    Ok(())
}

/// One-shot action outside the daily loop, policy-gated unless forced.
async fn run_once(
    kind: EventKind,
    force: bool,
    window: &TimeWindow,
    retry: &RetryPolicy,
    actions: Arc<dyn TimesheetActions>,
    notifier: Arc<dyn Notifier>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let now = Local::now().naive_local();
    if !force && !calendar::is_within_active_window(now, window) {
        anyhow::bail!(
            "{kind} refused: outside the active window ({} {}); pass --force to override",
            now.weekday(),
            now.time()
        );
    }

    let outcome = match kind {
        EventKind::SignIn => {
            run_with_retry(
                || {
                    let actions = Arc::clone(&actions);
                    async move { actions.sign_in().await }
                },
                retry,
                &mut shutdown_rx,
            )
            .await
        }
        EventKind::SignOut => {
            run_with_retry(
                || {
                    let actions = Arc::clone(&actions);
                    async move { actions.sign_out().await }
                },
                retry,
                &mut shutdown_rx,
            )
            .await
        }
    };

    match outcome {
        RetryOutcome::Finished(result) if result.is_success() => {
            info!(kind = %kind, detail = result.detail.as_deref().unwrap_or(""), "done");
            Ok(())
        }
        RetryOutcome::Finished(result) => {
            let detail = result.detail.unwrap_or_else(|| "no detail".into());
            notifier
                .notify(
                    &format!("punchd: {kind} failed"),
                    &format!("All {} attempts failed: {detail}", retry.max_attempts),
                )
                .await;
            anyhow::bail!("{kind} failed after {} attempts: {detail}", retry.max_attempts)
        }
        RetryOutcome::Cancelled => {
            info!("cancelled by shutdown signal");
            Ok(())
        }
    }
}
