use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use orbit_core::{ChannelId, ChannelName, PlanetName};

use super::parse_id;
use crate::server::{
    core::AppState,
    errors::ApiFailure,
    store::ChannelUpdate,
    types::{
        AddMemberRequest, ChannelPath, ChannelResponse, CreateChannelRequest,
        CreatePlanetRequest, MemberPath, MemberResponse, PlanetPath, PlanetResponse,
        UpdateChannelRequest,
    },
};

pub(crate) async fn create_planet(
    State(state): State<AppState>,
    Json(payload): Json<CreatePlanetRequest>,
) -> Result<Json<PlanetResponse>, ApiFailure> {
    let name = PlanetName::try_from(payload.name).map_err(|_| ApiFailure::InvalidRequest)?;
    let owner_user_id = parse_id(&payload.owner_user_id)?;
    let (planet, owner) = state
        .create_planet(name.as_str().to_owned(), owner_user_id)
        .await?;

    Ok(Json(PlanetResponse {
        planet_id: planet.id.to_string(),
        name: planet.name,
        owner_user_id: planet.owner_user_id.to_string(),
        default_role_id: planet.default_role_id.to_string(),
        owner_member_id: owner.id.to_string(),
    }))
}

pub(crate) async fn create_channel(
    State(state): State<AppState>,
    Path(path): Path<PlanetPath>,
    Json(payload): Json<CreateChannelRequest>,
) -> Result<Json<ChannelResponse>, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let name = ChannelName::try_from(payload.name).map_err(|_| ApiFailure::InvalidRequest)?;
    let parent_id = payload
        .parent_id
        .as_deref()
        .map(parse_id::<ChannelId>)
        .transpose()?;

    let channel = state
        .create_channel(
            planet_id,
            name.as_str().to_owned(),
            payload.kind,
            parent_id,
            payload.inherits_perms.unwrap_or(parent_id.is_some()),
        )
        .await?;
    Ok(Json(channel.into()))
}

pub(crate) async fn update_channel(
    State(state): State<AppState>,
    Path(path): Path<ChannelPath>,
    Json(payload): Json<UpdateChannelRequest>,
) -> Result<Json<ChannelResponse>, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let channel_id = parse_id(&path.channel_id)?;
    let name = payload
        .name
        .map(|name| {
            ChannelName::try_from(name)
                .map(|name| name.as_str().to_owned())
                .map_err(|_| ApiFailure::InvalidRequest)
        })
        .transpose()?;
    let parent_id = match (payload.parent_id.as_deref(), payload.detach_parent) {
        (Some(_), true) => return Err(ApiFailure::InvalidRequest),
        (Some(raw), false) => Some(Some(parse_id::<ChannelId>(raw)?)),
        (None, true) => Some(None),
        (None, false) => None,
    };

    let channel = state
        .update_channel(
            planet_id,
            channel_id,
            ChannelUpdate {
                name,
                parent_id,
                inherits_perms: payload.inherits_perms,
            },
        )
        .await?;
    Ok(Json(channel.into()))
}

pub(crate) async fn delete_channel(
    State(state): State<AppState>,
    Path(path): Path<ChannelPath>,
) -> Result<StatusCode, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let channel_id = parse_id(&path.channel_id)?;
    state.delete_channel(planet_id, channel_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn add_member(
    State(state): State<AppState>,
    Path(path): Path<PlanetPath>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<Json<MemberResponse>, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let user_id = parse_id(&payload.user_id)?;
    let member = state.add_member(planet_id, user_id).await?;

    Ok(Json(MemberResponse {
        member_id: member.id.to_string(),
        user_id: member.user_id.to_string(),
    }))
}

pub(crate) async fn remove_member(
    State(state): State<AppState>,
    Path(path): Path<MemberPath>,
) -> Result<StatusCode, ApiFailure> {
    let planet_id = parse_id(&path.planet_id)?;
    let member_id = parse_id(&path.member_id)?;
    state.remove_member(planet_id, member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
