//! Network Speed Tester - command-line entry point
//!
//! Detects the caller's location, picks the best nearby server, and measures
//! latency, download and upload throughput against it.

use clap::Parser;
use network_speed_tester::{
    cli::Cli,
    config::{display_config_summary, EnvManager, load_config, validate_config, ValidationLevel},
    error::{AppError, Result},
    executor::TestOrchestrator,
    logging::LoggerFactory,
    models::Config,
    output::{OutputFormatter, OutputFormatterFactory, PlainFormatter, FormattingOptions, JsonFormatter},
    PKG_NAME, VERSION,
};
use std::process;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        eprintln!("Please report this issue with the output of `nst --version`");
        process::exit(1);
    }));

    let cli = Cli::parse();

    if cli.env_template {
        print!("{}", EnvManager::create_example_env_content());
        return;
    }

    if let Err(e) = run_application(&cli).await {
        let formatter: Box<dyn OutputFormatter> = if cli.json {
            Box::new(JsonFormatter::new())
        } else {
            OutputFormatterFactory::create_formatter(cli.use_colors(), cli.verbose, Default::default())
        };
        let rendered = formatter
            .format_error(&e)
            .unwrap_or_else(|_| format!("Error: {}", e));

        // JSON errors go to stdout so scripts can parse a single stream
        if cli.json {
            println!("{}", rendered);
        } else {
            eprintln!("{}", rendered);
            print_error_suggestions(&e);
        }

        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run_application(cli: &Cli) -> Result<()> {
    let config = load_config(cli.clone())?;

    if config.debug && !config.json {
        eprintln!("Configuration:\n{}\n", display_config_summary(&config));
    }

    let factory = LoggerFactory::new(config.clone());
    let logger = factory.create_logger("NST").await;

    logger.debug(&format!("{} v{}", PKG_NAME, VERSION))
        .field("session_id", factory.session_id())
        .log()
        .await;

    if !config.json {
        report_warnings(&config)?;
    }

    let orchestrator = TestOrchestrator::from_config(config.clone(), logger.clone())?;
    let formatter = OutputFormatterFactory::for_config(&config);

    // Ctrl-C cancels the run; phases unwind within the grace period
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let (progress, reporter) = match OutputFormatterFactory::progress_for_config(&config) {
        Some(reporter) => {
            let (sender, handle) = reporter.start();
            (Some(sender), Some(handle))
        }
        None => (None, None),
    };

    let outcome = orchestrator.run_full_test(&cancel, progress).await;

    // All senders are gone once the run returns, so the reporter drains and exits
    if let Some(handle) = reporter {
        let _ = handle.await;
    }

    let result = outcome?;
    println!("{}", formatter.format_result(&result)?);

    Ok(())
}

/// Print advisory configuration warnings on stderr
fn report_warnings(config: &Config) -> Result<()> {
    let warnings = validate_config(config)?;
    let formatter = PlainFormatter::new(FormattingOptions::default());

    for warning in warnings {
        if warning.level == ValidationLevel::Info && !config.verbose {
            continue;
        }
        if config.enable_color {
            eprintln!("{}", warning.format(true));
        } else {
            eprintln!("{}", formatter.format_warning(&warning.message)?);
        }
    }

    Ok(())
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error.root_cause() {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file format");
            eprintln!("  - Verify URL formats (must start with http:// or https://)");
            eprintln!("  - Run `nst --help` for the accepted ranges");
        }
        AppError::LocationUnavailable(_) | AppError::DirectoryUnavailable(_) | AppError::Network(_) => {
            eprintln!();
            eprintln!("Network troubleshooting:");
            eprintln!("  - Check your internet connection");
            eprintln!("  - Verify firewall or proxy settings");
            eprintln!("  - Override the endpoints with SPEEDTEST_LOCATION_URL or SPEEDTEST_DIRECTORY_URL");
        }
        AppError::ServerNotFound(_) => {
            eprintln!();
            eprintln!("Server selection help:");
            eprintln!("  - The id must appear in the server directory response");
            eprintln!("  - Omit --server to pick the best nearby server automatically");
        }
        AppError::Timeout(_) => {
            eprintln!();
            eprintln!("Timeout help:");
            eprintln!("  - Increase the overall deadline with --timeout");
            eprintln!("  - Shorten the phases with --download-duration and --upload-duration");
        }
        _ => {}
    }

    if error.is_recoverable() {
        eprintln!();
        eprintln!("This failure may be temporary; running nst again can succeed.");
    }
}
