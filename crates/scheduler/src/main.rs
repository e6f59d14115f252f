use std::time::Duration;

use pulse_common::config::AppConfig;
use pulse_common::{db, redis_pool};
use pulse_scheduler::SchedulerContext;
use pulse_scheduler::processors::daily_digest::DailyDigestProcessor;
use pulse_scheduler::processors::deferred::DeferredRedeliveryProcessor;
use pulse_scheduler::processors::game_reminders::GameReminderProcessor;
use pulse_scheduler::processors::inactivity::InactivityProcessor;
use pulse_scheduler::processors::leaderboard::LeaderboardProximityProcessor;
use pulse_scheduler::processors::receipts::ReceiptProcessor;
use pulse_scheduler::processors::slip_expiring::SlipExpiringProcessor;
use pulse_scheduler::processors::weekly_recap::WeeklyRecapProcessor;
use pulse_transport::PushGatewayClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_scheduler=info,pulse_gatekeeper=info".into()),
        )
        .json()
        .init();

    tracing::info!("PickPulse Scheduler starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    // Connect to Redis
    let redis = redis_pool::create_redis_pool(&config.redis_url).await?;

    let gateway = PushGatewayClient::new(
        &config.push_gateway_url,
        &config.push_receipt_url,
        config.push_timeout_secs,
    )?;

    let mut ctx = SchedulerContext::new(pool, redis, gateway, config);

    tracing::info!(
        scheduler_tick_secs = ctx.config.scheduler_tick_secs,
        receipt_tick_secs = ctx.config.receipt_tick_secs,
        "Starting scheduler loop"
    );

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        result = run_loop(&mut ctx) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Scheduler loop exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("PickPulse Scheduler stopped.");
    Ok(())
}

async fn run_loop(ctx: &mut SchedulerContext) -> anyhow::Result<()> {
    let mut scheduler_tick =
        tokio::time::interval(Duration::from_secs(ctx.config.scheduler_tick_secs));
    let mut receipt_tick = tokio::time::interval(Duration::from_secs(ctx.config.receipt_tick_secs));

    loop {
        tokio::select! {
            _ = scheduler_tick.tick() => {
                run_scheduled_processors(ctx).await;
            }
            _ = receipt_tick.tick() => {
                let report = ReceiptProcessor::run(ctx).await;
                log_report("receipts", &report);
            }
        }
    }
}

// A failing processor never blocks the others; each reports its own outcome.
async fn run_scheduled_processors(ctx: &mut SchedulerContext) {
    tracing::info!("Scheduler tick started");

    let report = GameReminderProcessor::run(ctx).await;
    log_report("game_reminders", &report);

    let report = SlipExpiringProcessor::run(ctx).await;
    log_report("slip_expiring", &report);

    let report = DailyDigestProcessor::run(ctx).await;
    log_report("daily_digest", &report);

    let report = WeeklyRecapProcessor::run(ctx).await;
    log_report("weekly_recap", &report);

    let report = InactivityProcessor::run(ctx).await;
    log_report("inactivity", &report);

    let report = LeaderboardProximityProcessor::run(ctx).await;
    log_report("leaderboard_proximity", &report);

    let report = DeferredRedeliveryProcessor::run(ctx).await;
    log_report("deferred_redelivery", &report);

    tracing::info!("Scheduler tick complete");
}

fn log_report(processor: &str, report: &pulse_common::types::ProcessorReport) {
    if report.success {
        tracing::info!(
            processor,
            processed = report.processed,
            skipped = report.skipped,
            message = %report.message,
            "Processor run complete"
        );
    } else {
        tracing::error!(
            processor,
            processed = report.processed,
            skipped = report.skipped,
            message = %report.message,
            "Processor run failed"
        );
    }
}
