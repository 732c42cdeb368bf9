use anyhow::Result;
use api::{GlobalMainThread, MainContext, NoMainContext};
use log::{debug, info, warn};
use portbridge::{demo, load_config, BridgeConfig};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let config_path = Path::new("config.json");
    let loaded = load_config(config_path);
    let log_level = loaded
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", &log_level);
        }
    }
    env_logger::init();

    let config = loaded.unwrap_or_else(|e| {
        warn!("Failed to load config: {:#}. Using defaults.", e);
        BridgeConfig::default()
    });
    debug!("Config: {:?}", config);

    let main_context: Arc<dyn MainContext> = if config.mark_main_thread {
        api::mark_main_thread()?;
        Arc::new(GlobalMainThread)
    } else {
        Arc::new(NoMainContext)
    };

    let report = demo::run(&config, main_context)?;
    for greeting in &report.greetings {
        info!("{}", greeting);
    }
    info!("Journal received {} line(s)", report.journal.len());
    info!(
        "{} equals itself: {}; channels left open: {}",
        report.proxy, report.equals_self, report.open_channels_after_drop
    );
    Ok(())
}
