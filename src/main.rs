use clap::Parser;
use court_booker::core::executor::AttemptExecutor;
use court_booker::core::retry::RetryController;
use court_booker::core::scheduler::next_trigger_after;
use court_booker::domain::ports::{Clock, OutcomeReporter};
use court_booker::utils::error::ErrorSeverity;
use court_booker::utils::{logger, validation::Validate};
use court_booker::{
    BookerError, BookingEngine, CliArgs, HttpPortalGateway, LocalDiagnosticSink, LogReporter,
    Result, RunStatus, Scheduler, Settings, ShutdownSignal, SystemClock, TelegramReporter,
};
use std::sync::Arc;

type Engine = BookingEngine<AttemptExecutor<HttpPortalGateway, LocalDiagnosticSink, SystemClock>, SystemClock>;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting court-booker");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let exit_code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(
                "❌ court-booker failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            exit_code_for(&e)
        }
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

async fn run(args: CliArgs) -> Result<i32> {
    let settings = Settings::from_file(&args.config)?;
    settings.validate()?;
    tracing::info!("📄 Loaded configuration from {}", args.config.display());

    let engine = Arc::new(build_engine(&settings)?);

    if args.dry_run {
        print_summary(&settings, &engine);
        return Ok(0);
    }

    if args.once {
        return run_once(&engine, args.date).await;
    }

    let handle = Scheduler::new(Arc::clone(&engine), SystemClock, settings.trigger_settings()?).start();

    let next = next_trigger_after(
        SystemClock.now(),
        settings.scheduler.trigger_time,
        engine.timezone(),
    );
    let announcement = format!(
        "Court booker started. Next trigger: {}. Booking {} days ahead.",
        next.with_timezone(&engine.timezone()).format("%Y-%m-%d %H:%M:%S %Z"),
        settings.booking.advance_booking_days
    );
    if let Err(e) = engine.reporter().announce(&announcement).await {
        tracing::warn!("⚠️ Startup announcement failed: {}", e);
    }

    wait_for_shutdown().await;
    handle.shutdown().await?;
    tracing::info!("👋 court-booker stopped");
    Ok(0)
}

fn build_engine(settings: &Settings) -> Result<Engine> {
    let gateway = HttpPortalGateway::new(settings.portal_options())?;
    let diagnostics = settings
        .diagnostics
        .enabled
        .then(|| LocalDiagnosticSink::new(&settings.diagnostics.directory));
    let reporter: Arc<dyn OutcomeReporter> = match TelegramReporter::from_settings(&settings.notifications, settings.step_timeout())? {
        Some(telegram) => Arc::new(telegram),
        None => Arc::new(LogReporter),
    };

    let executor = AttemptExecutor::new(gateway, diagnostics, SystemClock, settings.step_timeout());
    let controller = RetryController::new(executor, SystemClock, settings.retry_policy());
    Ok(BookingEngine::new(
        controller,
        settings.booking_preference()?,
        reporter,
        SystemClock,
        settings.timezone()?,
    ))
}

async fn run_once(engine: &Engine, date: Option<chrono::NaiveDate>) -> Result<i32> {
    let (shutdown_tx, mut shutdown) = ShutdownSignal::channel();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Interrupt received, stopping after the current attempt");
            let _ = shutdown_tx.send(true);
        }
    });

    let status = engine.run_manual(date, &mut shutdown).await;
    interrupt.abort();
    engine.drain_reports().await;

    let status = status?;
    println!("🎾 Run finished: {}", status);
    Ok(match status {
        RunStatus::Booked => 0,
        RunStatus::FatalError => 1,
        RunStatus::ExhaustedRetries => 2,
        RunStatus::Cancelled => 130,
    })
}

fn print_summary(settings: &Settings, engine: &Engine) {
    let tz = engine.timezone();
    let next = next_trigger_after(SystemClock.now(), settings.scheduler.trigger_time, tz);
    let target = engine.target_date();
    let preference = engine.preference();
    let policy = settings.retry_policy();

    println!("Portal:          {}", settings.portal.base_url);
    println!("User:            {}", settings.credentials.username);
    println!(
        "Preferred days:  {}",
        preference
            .preferred_days
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "Time window:     {} - {}",
        preference.time_window.start().format("%H:%M"),
        preference.time_window.end().format("%H:%M")
    );
    println!("Courts:          {}", preference.court_priority.join(", "));
    println!("Retries:         {} ({:?})", policy.retry_count, policy.backoff);
    println!("Next trigger:    {}", next.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z"));
    println!(
        "Target date:     {} ({}){}",
        target,
        target.format("%A"),
        if engine.is_preferred_target(target) { "" } else { " - not a preferred day" }
    );
    println!(
        "Notifications:   {}",
        if settings.notifications.enabled { "telegram" } else { "log only" }
    );
    println!(
        "Diagnostics:     {}",
        if settings.diagnostics.enabled {
            settings.diagnostics.directory.as_str()
        } else {
            "disabled"
        }
    );
}

fn exit_code_for(error: &BookerError) -> i32 {
    match error.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("⚠️ Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("🛑 Shutdown signal received");
}
