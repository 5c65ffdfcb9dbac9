use axum::{
    extract::{Path, State},
    Json,
};
use orbit_core::{Authority, Permission, PermissionCategory, PermissionSet};

use super::parse_id;
use crate::server::{
    core::AppState,
    errors::ApiFailure,
    types::{
        ChannelAccessResponse, FlattenedPermissionsResponse, MemberChannelPath, MemberPath,
        MemberPermissionPath, PermissionCheckResponse, PlanetPermissionsResponse,
    },
};

pub(crate) async fn flattened_permissions(
    State(state): State<AppState>,
    Path(path): Path<MemberChannelPath>,
) -> Result<Json<FlattenedPermissionsResponse>, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let member_id = parse_id(&path.member_id)?;
    let channel_id = parse_id(&path.channel_id)?;
    let view = state
        .flattened_permissions(planet_id, member_id, channel_id)
        .await?;

    Ok(Json(FlattenedPermissionsResponse {
        channel_id: path.channel_id,
        target_channel_id: view.target_channel_id.to_string(),
        kind: view.kind,
        code: view.node.code(),
        mask: view.node.mask(),
        granted: PermissionSet::from_bits(view.node.code())
            .names(view.kind.permission_category()),
        cache_hit: view.cache_hit,
    }))
}

pub(crate) async fn check_permission(
    State(state): State<AppState>,
    Path(path): Path<MemberPermissionPath>,
) -> Result<Json<PermissionCheckResponse>, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let member_id = parse_id(&path.member_id)?;
    let channel_id = parse_id(&path.channel_id)?;
    let permission: Permission = parse_id(&path.permission)?;
    let granted = state
        .has_permission(planet_id, member_id, channel_id, permission)
        .await?;

    Ok(Json(PermissionCheckResponse {
        permission: permission.to_string(),
        granted,
    }))
}

pub(crate) async fn channel_access(
    State(state): State<AppState>,
    Path(path): Path<MemberPath>,
) -> Result<Json<ChannelAccessResponse>, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let member_id = parse_id(&path.member_id)?;
    let channels = state.channel_access(planet_id, member_id).await?;

    Ok(Json(ChannelAccessResponse {
        channel_ids: channels.iter().map(ToString::to_string).collect(),
    }))
}

pub(crate) async fn planet_permissions(
    State(state): State<AppState>,
    Path(path): Path<MemberPath>,
) -> Result<Json<PlanetPermissionsResponse>, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let member_id = parse_id(&path.member_id)?;
    let view = state.planet_permissions(planet_id, member_id).await?;

    let authority_position = match view.authority {
        Authority::Owner => None,
        Authority::Position(position) => Some(position),
    };
    Ok(Json(PlanetPermissionsResponse {
        bits: view.permissions.bits(),
        granted: view.permissions.names(PermissionCategory::General),
        is_owner: view.authority == Authority::Owner,
        authority_position,
    }))
}
