use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use orbit_core::PlanetId;
use orbit_protocol::parse_notification;

use super::parse_id;
use crate::server::{
    core::AppState,
    errors::ApiFailure,
    types::{NotificationResponse, PlanetPath},
};

/// Applies a change notification produced by another node. The body is a
/// raw envelope, exactly as published on the notification channel.
pub(crate) async fn apply_notification(
    State(state): State<AppState>,
    Path(path): Path<PlanetPath>,
    body: Bytes,
) -> Result<Json<NotificationResponse>, ApiFailure> {
    let planet_id: PlanetId = parse_id(&path.planet_id)?;
    let notification = parse_notification(&body).inspect_err(|error| {
        tracing::warn!(
            event = "notification.apply",
            outcome = "rejected",
            planet_id = %planet_id,
            error = %error,
        );
    })?;
    let evicted = state.apply_notification(planet_id, &notification).await?;
    Ok(Json(NotificationResponse { evicted }))
}
