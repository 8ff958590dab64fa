//! Jasper Server
//!
//! Renders JasperReports templates to PDF over HTTP. JasperReports runs in an
//! embedded JVM started at boot from the jars in the library directory and
//! the drivers listed in the settings file.
//!
//! ## Endpoints
//!
//! - `POST /generate_pdf`: compile, fill and export a report
//! - `GET /reports`: registered report and connection names
//! - `GET /health`: liveness

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use jasper_engine::drivers::DriverReport;
use jasper_engine::{
    bootstrap, BootstrapConfig, GeneratorOptions, ReportEngine, ReportGenerator,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;

use api::{handle_generate_pdf, handle_health, handle_list_reports};

/// Command-line arguments for the Jasper server
#[derive(Parser, Debug)]
#[command(name = "jasper-server")]
#[command(about = "HTTP front end that renders JasperReports templates to PDF")]
struct Args {
    /// Settings document with reports, drivers and connections
    #[arg(long, env = "JASPER_SETTINGS", default_value = "settings.json")]
    settings: PathBuf,

    /// Directory of jars to put on the JVM classpath
    #[arg(long, env = "JASPER_LIB_DIR", default_value = "libs")]
    lib_dir: PathBuf,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Report generation timeout in milliseconds
    #[arg(long, default_value = "60000")]
    timeout_ms: u64,

    /// Reject unregistered connection names instead of rendering without data
    #[arg(long)]
    strict_connections: bool,

    /// Extra JVM option, repeatable (e.g. --jvm-option=-Xmx512m)
    #[arg(long = "jvm-option", allow_hyphen_values = true)]
    jvm_options: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Shared application state
pub struct AppState<E> {
    pub generator: Arc<ReportGenerator<E>>,
    /// Driver registration outcome from startup
    pub drivers: Arc<DriverReport>,
    /// Report generation timeout in milliseconds
    pub timeout_ms: u64,
}

impl<E> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            generator: self.generator.clone(),
            drivers: self.drivers.clone(),
            timeout_ms: self.timeout_ms,
        }
    }
}

/// Build the router with every endpoint and middleware
pub fn build_router<E: ReportEngine>(state: AppState<E>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health::<E>))
        .route("/reports", get(handle_list_reports::<E>))
        .route("/generate_pdf", post(handle_generate_pdf::<E>))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BootstrapConfig {
        settings_path: args.settings.clone(),
        lib_dir: args.lib_dir.clone(),
        jvm_options: args.jvm_options.clone(),
    };
    // JavaVM::new attaches the calling thread for good; keep it on main.
    let runtime = bootstrap(&config).context("bootstrap failed")?;

    let generator = ReportGenerator::new(
        runtime.engine,
        runtime.settings,
        GeneratorOptions {
            strict_connections: args.strict_connections,
        },
    );
    let state = AppState {
        generator: Arc::new(generator),
        drivers: Arc::new(runtime.drivers),
        timeout_ms: args.timeout_ms,
    };

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", args.host, args.port))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Listening at http://{}", addr);
    info!("Report timeout: {}ms", args.timeout_ms);

    axum::serve(listener, app).await?;

    Ok(())
}
