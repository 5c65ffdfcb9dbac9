use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use orbit_core::{
    ChannelKind, NodeKey, Permission, PermissionCategory, PermissionError, PermissionNode,
    PermissionSet, PermissionState, RoleName,
};

use super::parse_id;
use crate::server::{
    core::AppState,
    errors::ApiFailure,
    store::RoleUpdate,
    types::{
        CreateRoleRequest, MemberRolePath, NodePath, PermissionNodeRequest, PlanetPath,
        RolePath, RoleResponse, UpdateRoleRequest,
    },
};

pub(crate) async fn create_role(
    State(state): State<AppState>,
    Path(path): Path<PlanetPath>,
    Json(payload): Json<CreateRoleRequest>,
) -> Result<Json<RoleResponse>, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let name = RoleName::try_from(payload.name).map_err(|_| ApiFailure::InvalidRequest)?;
    let update = role_update(
        None,
        None,
        payload.is_admin,
        [
            payload.permissions,
            payload.chat_permissions,
            payload.category_permissions,
            payload.voice_permissions,
        ],
    )?;

    let role = state
        .create_role(planet_id, name.as_str().to_owned(), payload.position, update)
        .await?;
    Ok(Json(role.into()))
}

pub(crate) async fn update_role(
    State(state): State<AppState>,
    Path(path): Path<RolePath>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<RoleResponse>, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let role_id = parse_id(&path.role_id)?;
    let name = payload
        .name
        .map(|name| {
            RoleName::try_from(name)
                .map(|name| name.as_str().to_owned())
                .map_err(|_| ApiFailure::InvalidRequest)
        })
        .transpose()?;
    let update = role_update(
        name,
        payload.position,
        payload.is_admin,
        [
            payload.permissions,
            payload.chat_permissions,
            payload.category_permissions,
            payload.voice_permissions,
        ],
    )?;

    let role = state.update_role(planet_id, role_id, update).await?;
    Ok(Json(role.into()))
}

pub(crate) async fn delete_role(
    State(state): State<AppState>,
    Path(path): Path<RolePath>,
) -> Result<StatusCode, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let role_id = parse_id(&path.role_id)?;
    state.delete_role(planet_id, role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn add_member_role(
    State(state): State<AppState>,
    Path(path): Path<MemberRolePath>,
) -> Result<StatusCode, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let member_id = parse_id(&path.member_id)?;
    let role_id = parse_id(&path.role_id)?;
    state
        .add_role_to_member(planet_id, member_id, role_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn remove_member_role(
    State(state): State<AppState>,
    Path(path): Path<MemberRolePath>,
) -> Result<StatusCode, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let member_id = parse_id(&path.member_id)?;
    let role_id = parse_id(&path.role_id)?;
    state
        .remove_role_from_member(planet_id, member_id, role_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn set_permission_node(
    State(state): State<AppState>,
    Path(path): Path<NodePath>,
    Json(payload): Json<PermissionNodeRequest>,
) -> Result<StatusCode, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let key = node_key(&path)?;
    let node = permission_node(key.target_kind, &payload)?;
    state.set_permission_node(planet_id, key, node).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn remove_permission_node(
    State(state): State<AppState>,
    Path(path): Path<NodePath>,
) -> Result<StatusCode, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let key = node_key(&path)?;
    state.remove_permission_node(planet_id, key).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn node_key(path: &NodePath) -> Result<NodeKey, ApiFailure> {
    Ok(NodeKey {
        role_id: parse_id(&path.role_id)?,
        channel_id: parse_id(&path.channel_id)?,
        target_kind: ChannelKind::try_from(path.target_kind.clone())?,
    })
}

fn permission_node(
    target_kind: ChannelKind,
    payload: &PermissionNodeRequest,
) -> Result<PermissionNode, ApiFailure> {
    let category = target_kind.permission_category();
    let granted = permission_set(category, &payload.granted)?;
    let denied = permission_set(category, &payload.denied)?;
    if granted.bits() & denied.bits() != 0 {
        return Err(ApiFailure::InvalidRequest);
    }

    let mut node = PermissionNode::empty();
    for permission in &payload.granted {
        node.set_state(*permission, PermissionState::Granted);
    }
    for permission in &payload.denied {
        node.set_state(*permission, PermissionState::Denied);
    }
    Ok(node)
}

const ROLE_CATEGORIES: [PermissionCategory; 4] = [
    PermissionCategory::General,
    PermissionCategory::Chat,
    PermissionCategory::Category,
    PermissionCategory::Voice,
];

fn role_update(
    name: Option<String>,
    position: Option<u32>,
    is_admin: Option<bool>,
    lists: [Option<Vec<Permission>>; 4],
) -> Result<RoleUpdate, ApiFailure> {
    let mut sets = [None; 4];
    for ((slot, category), list) in sets.iter_mut().zip(ROLE_CATEGORIES).zip(lists) {
        *slot = list
            .map(|permissions| permission_set(category, &permissions))
            .transpose()?;
    }
    let [permissions, chat_permissions, category_permissions, voice_permissions] = sets;

    Ok(RoleUpdate {
        name,
        position,
        is_admin,
        permissions,
        chat_permissions,
        category_permissions,
        voice_permissions,
    })
}

fn permission_set(
    category: PermissionCategory,
    permissions: &[Permission],
) -> Result<PermissionSet, ApiFailure> {
    let mut set = PermissionSet::empty();
    for permission in permissions {
        if permission.category() != category {
            return Err(PermissionError::CategoryMismatch {
                permission: *permission,
                expected: category,
            }
            .into());
        }
        set.insert(*permission);
    }
    Ok(set)
}
