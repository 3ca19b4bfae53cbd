//! Court Form Filler - Entry point
//!
//! Web service that fills a Request for Order PDF from a form submission.

use court_form_filler::{run_server, AppConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "court_form_filler=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    tracing::info!("Starting Court Form Filler v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(template = %config.form.template_path.display(), "Using template");

    run_server(config).await
}
