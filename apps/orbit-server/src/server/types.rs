use axum::{
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Json,
};
use orbit_core::{
    ChannelKind, Permission, PermissionCategory, PlanetChannel, PlanetRole, RoleSlot,
};
use serde::{Deserialize, Serialize};

use super::{core::METRICS_TEXT_CONTENT_TYPE, metrics::render_metrics};

#[derive(Debug, Serialize)]
pub(crate) struct ApiError {
    pub(crate) error: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub(crate) async fn metrics() -> Response {
    (
        [(CONTENT_TYPE, METRICS_TEXT_CONTENT_TYPE)],
        render_metrics(),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreatePlanetRequest {
    pub(crate) name: String,
    pub(crate) owner_user_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PlanetResponse {
    pub(crate) planet_id: String,
    pub(crate) name: String,
    pub(crate) owner_user_id: String,
    pub(crate) default_role_id: String,
    pub(crate) owner_member_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateChannelRequest {
    pub(crate) name: String,
    pub(crate) kind: ChannelKind,
    pub(crate) parent_id: Option<String>,
    pub(crate) inherits_perms: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct UpdateChannelRequest {
    pub(crate) name: Option<String>,
    pub(crate) parent_id: Option<String>,
    /// Moves the channel to the top level. Conflicts with `parent_id`.
    #[serde(default)]
    pub(crate) detach_parent: bool,
    pub(crate) inherits_perms: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChannelResponse {
    pub(crate) channel_id: String,
    pub(crate) name: String,
    pub(crate) kind: ChannelKind,
    pub(crate) parent_id: Option<String>,
    pub(crate) inherits_perms: bool,
}

impl From<PlanetChannel> for ChannelResponse {
    fn from(channel: PlanetChannel) -> Self {
        Self {
            channel_id: channel.id.to_string(),
            name: channel.name,
            kind: channel.kind,
            parent_id: channel.parent_id.map(|id| id.to_string()),
            inherits_perms: channel.inherits_perms,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct AddMemberRequest {
    pub(crate) user_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct MemberResponse {
    pub(crate) member_id: String,
    pub(crate) user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateRoleRequest {
    pub(crate) name: String,
    pub(crate) position: u32,
    pub(crate) is_admin: Option<bool>,
    pub(crate) permissions: Option<Vec<Permission>>,
    pub(crate) chat_permissions: Option<Vec<Permission>>,
    pub(crate) category_permissions: Option<Vec<Permission>>,
    pub(crate) voice_permissions: Option<Vec<Permission>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct UpdateRoleRequest {
    pub(crate) name: Option<String>,
    pub(crate) position: Option<u32>,
    pub(crate) is_admin: Option<bool>,
    pub(crate) permissions: Option<Vec<Permission>>,
    pub(crate) chat_permissions: Option<Vec<Permission>>,
    pub(crate) category_permissions: Option<Vec<Permission>>,
    pub(crate) voice_permissions: Option<Vec<Permission>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RoleResponse {
    pub(crate) role_id: String,
    pub(crate) name: String,
    pub(crate) position: u32,
    pub(crate) slot: RoleSlot,
    pub(crate) is_admin: bool,
    pub(crate) is_default: bool,
    pub(crate) permissions: Vec<String>,
    pub(crate) chat_permissions: Vec<String>,
    pub(crate) category_permissions: Vec<String>,
    pub(crate) voice_permissions: Vec<String>,
}

impl From<PlanetRole> for RoleResponse {
    fn from(role: PlanetRole) -> Self {
        Self {
            role_id: role.id.to_string(),
            slot: role.slot,
            position: role.position,
            is_admin: role.is_admin,
            is_default: role.is_default,
            permissions: role.permissions.names(PermissionCategory::General),
            chat_permissions: role.chat_permissions.names(PermissionCategory::Chat),
            category_permissions: role.category_permissions.names(PermissionCategory::Category),
            voice_permissions: role.voice_permissions.names(PermissionCategory::Voice),
            name: role.name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PermissionNodeRequest {
    #[serde(default)]
    pub(crate) granted: Vec<Permission>,
    #[serde(default)]
    pub(crate) denied: Vec<Permission>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FlattenedPermissionsResponse {
    pub(crate) channel_id: String,
    /// Channel whose overrides applied after following inheritance.
    pub(crate) target_channel_id: String,
    pub(crate) kind: ChannelKind,
    pub(crate) code: u64,
    pub(crate) mask: u64,
    pub(crate) granted: Vec<String>,
    pub(crate) cache_hit: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct PermissionCheckResponse {
    pub(crate) permission: String,
    pub(crate) granted: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChannelAccessResponse {
    pub(crate) channel_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PlanetPermissionsResponse {
    pub(crate) bits: u64,
    pub(crate) granted: Vec<String>,
    pub(crate) is_owner: bool,
    /// Position of the strongest held role; absent for the owner.
    pub(crate) authority_position: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NotificationResponse {
    pub(crate) evicted: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlanetPath {
    pub(crate) planet_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelPath {
    pub(crate) planet_id: String,
    pub(crate) channel_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberPath {
    pub(crate) planet_id: String,
    pub(crate) member_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RolePath {
    pub(crate) planet_id: String,
    pub(crate) role_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberRolePath {
    pub(crate) planet_id: String,
    pub(crate) member_id: String,
    pub(crate) role_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NodePath {
    pub(crate) planet_id: String,
    pub(crate) role_id: String,
    pub(crate) channel_id: String,
    pub(crate) target_kind: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberChannelPath {
    pub(crate) planet_id: String,
    pub(crate) member_id: String,
    pub(crate) channel_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberPermissionPath {
    pub(crate) planet_id: String,
    pub(crate) member_id: String,
    pub(crate) channel_id: String,
    pub(crate) permission: String,
}
