use anyhow::Result;
use dashboard_service::{
    calendar::HolidayLookup,
    config::AppConfig,
    metrics_server,
    observability,
    web::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let holidays = HolidayLookup::load_or_default(&cfg.sources.holidays_path);
    let bind_addr = cfg.server.bind_addr.clone();

    web::serve(AppState::new(cfg, holidays), &bind_addr).await
}
