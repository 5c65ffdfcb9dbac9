#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::time::Duration;

use orbit_server::{build_router, init_tracing, AppConfig};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let defaults = AppConfig::default();
    let request_timeout = std::env::var("ORBIT_REQUEST_TIMEOUT_SECS").map_or_else(
        |_| Ok(defaults.request_timeout),
        |value| {
            value
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| {
                    anyhow::anyhow!("invalid ORBIT_REQUEST_TIMEOUT_SECS value {value:?}: {e}")
                })
        },
    )?;
    let notification_buffer = std::env::var("ORBIT_NOTIFICATION_BUFFER").map_or_else(
        |_| Ok(defaults.notification_buffer),
        |value| {
            value
                .parse::<usize>()
                .map_err(|e| {
                    anyhow::anyhow!("invalid ORBIT_NOTIFICATION_BUFFER value {value:?}: {e}")
                })
        },
    )?;
    let app_config = AppConfig {
        request_timeout,
        notification_buffer,
        ..defaults
    };
    let app = build_router(&app_config)?;
    let addr = std::env::var("ORBIT_BIND_ADDR")
        .unwrap_or_else(|_| String::from("0.0.0.0:3000"))
        .parse::<SocketAddr>()
        .map_err(|e| anyhow::anyhow!("invalid ORBIT_BIND_ADDR: {e}"))?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "orbit-server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
