#![forbid(unsafe_code)]

mod server;

pub use server::{
    build_router, build_router_with_state, init_tracing, AppConfig, AppState,
    DEFAULT_JSON_BODY_LIMIT_BYTES, DEFAULT_NOTIFICATION_BUFFER, DEFAULT_REQUEST_TIMEOUT_SECS,
};
