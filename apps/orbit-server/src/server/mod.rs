pub(crate) mod cache;
pub(crate) mod core;
pub(crate) mod errors;
pub(crate) mod handlers;
pub(crate) mod invalidation;
pub(crate) mod metrics;
pub(crate) mod router;
pub(crate) mod service;
pub(crate) mod store;
pub(crate) mod types;

pub use core::{
    AppConfig, AppState, DEFAULT_JSON_BODY_LIMIT_BYTES, DEFAULT_NOTIFICATION_BUFFER,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use errors::init_tracing;
pub use router::{build_router, build_router_with_state};
