use spanlog::bridge;
use spanlog::init::{self, LogConfig};
use spanlog::record::LogLevel;
use tracing::{error, info, warn};

fn main() {
    let registry = init::init(LogConfig {
        dir: "logs".into(),
        level: LogLevel::Debug,
        console: true,
    })
    .expect("logging init");

    bridge::install(registry);

    info!("starting service");
    warn!(queue_depth = 17, "queue backlog growing");
    error!(
        user_id = 42,
        reason = "invalid password",
        "authentication failed"
    );

    registry.flush();
}
