//! Process startup: configuration, logging, signal handling, demo run

use crate::app::cli::Args;
use crate::app::config::AppConfig;
use crate::app::demo;
use crate::core::error_handling::{exit_code_for, log_error_with_context};
use crate::core::logging::{flush_logging, init_logging};
use crate::core::shutdown::ShutdownCoordinator;
use clap::Parser;

/// Run the binary and return its exit code
pub async fn startup() -> i32 {
    let args = Args::parse();

    // Logging is not up yet, so configuration problems go to stderr
    let (config_path, config) = match AppConfig::discover(args.config_file.as_deref()).await {
        Ok(found) => found,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_code_for(&e);
        }
    };
    let log_settings = match config.log_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_code_for(&e);
        }
    };
    if let Err(e) = init_logging(
        log_settings.level.as_deref(),
        log_settings.format,
        log_settings.file.as_deref(),
        log_settings.color,
    ) {
        eprintln!("Error: failed to initialise logging: {}", e);
        return 1;
    }

    match &config_path {
        Some(path) => log::debug!("Loaded configuration from {}", path.display()),
        None => log::debug!("No configuration file found, using defaults"),
    }

    let settings = match config.demo_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            log_error_with_context(&e, "Resolving consumer configuration");
            flush_logging();
            return exit_code_for(&e);
        }
    };
    log::debug!("Consumer configuration: {:?}", settings.consumer);

    let shutdown = ShutdownCoordinator::new();
    shutdown.listen_for_signals();

    let code = match demo::run(settings, shutdown).await {
        Ok(summary) => {
            summary.print(log_settings.color);
            if summary.interrupted {
                130
            } else {
                0
            }
        }
        Err(e) => {
            log_error_with_context(&e, "Running consumer");
            exit_code_for(&e)
        }
    };

    flush_logging();
    code
}
