use kyb_classifier::{ClassificationEngine, ClassificationRequest, ClassifyError, Settings};
use std::io::Read;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Read the request JSON from the path in the first argument, or stdin
fn read_request() -> Result<ClassificationRequest, String> {
    let raw = match std::env::args().nth(1) {
        Some(path) if path != "-" => {
            std::fs::read_to_string(&path).map_err(|e| format!("Failed to read {}: {}", path, e))?
        }
        _ => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| format!("Failed to read stdin: {}", e))?;
            buffer
        }
    };

    serde_json::from_str(&raw).map_err(|e| format!("Invalid request JSON: {}", e))
}

fn init_logging(settings: &Settings) {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    // Logs go to stderr so stdout carries only the result
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    init_logging(&settings);
    info!("Starting KYB classifier...");

    let request = match read_request() {
        Ok(request) => request,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    let engine = match ClassificationEngine::builder().settings(settings).build().await {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to build classification engine: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match engine.classify(&request).await {
        Ok(classification) => match serde_json::to_string_pretty(&classification) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to serialize result: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(ClassifyError::InvalidInput(reason)) => {
            error!("Rejected request: {}", reason);
            ExitCode::from(2)
        }
    }
}
