use anyhow::anyhow;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, StatusCode},
    routing::{delete, get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::{
    core::{AppConfig, AppState},
    handlers::{
        add_member, add_member_role, apply_notification, channel_access, check_permission,
        create_channel, create_planet, create_role, delete_channel, delete_role,
        flattened_permissions,
        planet_permissions, remove_member, remove_member_role, remove_permission_node,
        set_permission_node, update_channel, update_role,
    },
    types::{health, metrics},
};

/// Build the axum router with a fresh in-memory state.
///
/// # Errors
/// Returns an error if the configured limits are invalid.
pub fn build_router(config: &AppConfig) -> anyhow::Result<Router> {
    build_router_with_state(config, AppState::new(config))
}

/// Build the axum router around an existing state, e.g. one whose
/// notification channel is already subscribed to.
///
/// # Errors
/// Returns an error if the configured limits are invalid.
pub fn build_router_with_state(config: &AppConfig, app_state: AppState) -> anyhow::Result<Router> {
    if config.max_body_bytes == 0 {
        return Err(anyhow!("max body bytes must be at least 1 byte"));
    }
    if config.notification_buffer == 0 {
        return Err(anyhow!(
            "notification buffer must hold at least 1 notification"
        ));
    }
    if config.request_timeout.is_zero() {
        return Err(anyhow!("request timeout must be greater than zero"));
    }

    let request_id_header = HeaderName::from_static("x-request-id");
    let routes = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/planets", post(create_planet))
        .route("/planets/{planet_id}/channels", post(create_channel))
        .route(
            "/planets/{planet_id}/channels/{channel_id}",
            patch(update_channel).delete(delete_channel),
        )
        .route("/planets/{planet_id}/members", post(add_member))
        .route(
            "/planets/{planet_id}/members/{member_id}",
            delete(remove_member),
        )
        .route("/planets/{planet_id}/roles", post(create_role))
        .route(
            "/planets/{planet_id}/roles/{role_id}",
            patch(update_role).delete(delete_role),
        )
        .route(
            "/planets/{planet_id}/members/{member_id}/roles/{role_id}",
            put(add_member_role).delete(remove_member_role),
        )
        .route(
            "/planets/{planet_id}/roles/{role_id}/nodes/{channel_id}/{target_kind}",
            put(set_permission_node).delete(remove_permission_node),
        )
        .route(
            "/planets/{planet_id}/members/{member_id}/channels",
            get(channel_access),
        )
        .route(
            "/planets/{planet_id}/members/{member_id}/channels/{channel_id}/permissions",
            get(flattened_permissions),
        )
        .route(
            "/planets/{planet_id}/members/{member_id}/channels/{channel_id}/permissions/{permission}",
            get(check_permission),
        )
        .route(
            "/planets/{planet_id}/members/{member_id}/permissions",
            get(planet_permissions),
        )
        .route(
            "/planets/{planet_id}/notifications",
            post(apply_notification),
        );

    Ok(routes
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
                .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.request_timeout,
                )),
        ))
}
