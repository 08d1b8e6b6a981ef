use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ocrgate::api::{create_router, AppState};
use ocrgate::cli::{self, SubmitOptions};
use ocrgate::config::{Config, LogFormat};
use ocrgate::ocr::{Language, OcrProvider};
use ocrgate::services::RecognitionService;

#[derive(Parser)]
#[command(name = "ocrgate")]
#[command(about = "Self-hostable HTTP gateway for text recognition", version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Recognise images typed on stdin, one URL or base64 string per line
    Recognize {
        /// Recognition language code
        #[arg(long)]
        lang: Option<String>,
    },
    /// Download an image and submit it to a running server
    Submit {
        /// URL of the image to recognise
        image_url: String,
        #[arg(long, default_value = "http://localhost:25098")]
        server: String,
        /// Shared secret; defaults to the first key in SECRET_KEY
        #[arg(long)]
        secret: Option<String>,
        #[arg(long)]
        lang: Option<String>,
        /// Request timeout in seconds
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_tracing(config.logging.format);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Recognize { lang } => {
            tracing::info!("Initializing OCR provider: {}...", config.ocr.model);
            let ocr = OcrProvider::new(&config.ocr)?;
            if !ocr.is_available() {
                anyhow::bail!("No OCR engine could be initialized");
            }
            let language = match lang {
                Some(code) => code.parse::<Language>()?,
                None => ocr.default_language(),
            };
            let service = RecognitionService::from_config(&config, ocr)?;

            let cancel_token = CancellationToken::new();
            tokio::spawn(shutdown_signal(cancel_token.clone()));
            cli::run_repl(service, language, cancel_token).await
        }
        Command::Submit {
            image_url,
            server,
            secret,
            lang,
            timeout,
        } => {
            let secret = secret.or_else(|| config.auth.secret_keys.first().cloned());
            let response = cli::submit(&SubmitOptions {
                image_url,
                server,
                secret,
                lang,
                timeout: Duration::from_secs(timeout),
            })
            .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ocrgate=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    if !config.auth.is_enabled() {
        tracing::warn!("SECRET_KEY is not set, /ocr accepts unauthenticated requests");
    }

    tracing::info!("Initializing OCR provider: {}...", config.ocr.model);
    let ocr = OcrProvider::new(&config.ocr)?;
    if ocr.is_available() {
        tracing::info!(languages = ?ocr.languages(), "OCR ready");
    } else {
        tracing::warn!("OCR unavailable - /ocr will answer 503");
    }

    let state = AppState::new(config.clone(), ocr)?;
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("ocrgate starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/health", addr);
    tracing::info!("  API docs:     http://{}/docs", addr);
    tracing::info!("  OpenAPI spec: http://{}/openapi.json", addr);

    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel_token.cancelled().await })
        .await?;

    tracing::info!("ocrgate stopped");
    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, finishing in-flight work...");
    cancel_token.cancel();
}
