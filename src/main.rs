use log::*;
use service::{config::Config, logging::Logger, AppState};
use sse::Broker;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();

    Logger::init_logger(&config);

    info!(
        "Starting event relay in {} mode on http://{}",
        config.stream_mode,
        config.listen_addr()
    );

    let broker = Arc::new(Broker::new());
    let app_state = AppState::new(config, &broker);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }

    // Close every live stream so in-flight SSE responses end cleanly.
    broker.shutdown();
    info!("Event relay stopped");
}
