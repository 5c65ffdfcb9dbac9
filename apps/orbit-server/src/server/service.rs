//! Planet operations behind the HTTP surface.
//!
//! Every mutation runs under the planet's write lock and applies its
//! invalidation events before the lock is released, so a reader never sees
//! new data next to an old flattened entry. The matching notifications are
//! then published for the fan-out layer.

use std::sync::Arc;

use orbit_core::{
    effective_membership, member_authority, resolve_target, Authority, ChannelId, ChannelKind,
    Flattener, MemberId, NodeKey, Permission, PermissionError, PermissionNode,
    PermissionResolver, PermissionSet, PermissionSource, Planet, PlanetChannel, PlanetId,
    PlanetMember, PlanetRole, RoleId, UserId,
};
use orbit_protocol::{ChangeNotification, ProtocolError};

use super::{
    cache::FlattenKey,
    core::{AppState, PlanetHandle},
    errors::ApiFailure,
    invalidation::Invalidation,
    metrics::{
        record_flatten_cache_hit, record_flatten_computation, record_notification,
        record_permission_check, CHECK_OUTCOME_DENIED, CHECK_OUTCOME_ERROR,
        CHECK_OUTCOME_GRANTED,
    },
    store::{ChannelUpdate, PlanetData, RoleUpdate},
};

#[derive(Debug, Clone)]
pub(crate) struct FlattenedView {
    pub(crate) node: PermissionNode,
    pub(crate) kind: ChannelKind,
    pub(crate) target_channel_id: ChannelId,
    pub(crate) cache_hit: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct PlanetPermissionsView {
    pub(crate) permissions: PermissionSet,
    pub(crate) authority: Authority,
}

impl AppState {
    pub(crate) async fn planet_handle(
        &self,
        planet_id: PlanetId,
    ) -> Result<Arc<PlanetHandle>, ApiFailure> {
        self.planets
            .read()
            .await
            .get(&planet_id)
            .cloned()
            .ok_or(ApiFailure::NotFound)
    }

    /// Creates a planet with its default role and the owner's membership.
    pub(crate) async fn create_planet(
        &self,
        name: String,
        owner_user_id: UserId,
    ) -> Result<(Planet, PlanetMember), ApiFailure> {
        let mut data = PlanetData::new(name, owner_user_id)?;
        let owner = data.add_member(owner_user_id)?;
        let planet = data.planet_record().clone();

        self.planets
            .write()
            .await
            .insert(planet.id, Arc::new(PlanetHandle::new(data)));
        tracing::info!(
            event = "planet.create",
            outcome = "created",
            planet_id = %planet.id,
            owner_user_id = %owner_user_id,
        );
        Ok((planet, owner))
    }

    pub(crate) async fn create_channel(
        &self,
        planet_id: PlanetId,
        name: String,
        kind: ChannelKind,
        parent_id: Option<ChannelId>,
        inherits_perms: bool,
    ) -> Result<PlanetChannel, ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let mut data = handle.data.write().await;
        let channel = data
            .create_channel(name, kind, parent_id, inherits_perms)
            .inspect_err(|error| {
                tracing::warn!(
                    event = "channel.create",
                    outcome = "rejected",
                    planet_id = %planet_id,
                    error = %error,
                );
            })?;
        self.settle(&handle, &data, &[Invalidation::ChannelChanged(channel.id)])?;
        Ok(channel)
    }

    pub(crate) async fn update_channel(
        &self,
        planet_id: PlanetId,
        channel_id: ChannelId,
        update: ChannelUpdate,
    ) -> Result<PlanetChannel, ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let mut data = handle.data.write().await;
        let (channel, topology_changed) = data.update_channel(channel_id, update)?;
        if topology_changed {
            self.settle(&handle, &data, &[Invalidation::ChannelChanged(channel_id)])?;
        }
        Ok(channel)
    }

    /// Deleting a channel drops its nodes and is a topology change.
    pub(crate) async fn delete_channel(
        &self,
        planet_id: PlanetId,
        channel_id: ChannelId,
    ) -> Result<(), ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let mut data = handle.data.write().await;
        let deletion = data.delete_channel(channel_id).inspect_err(|error| {
            tracing::warn!(
                event = "channel.delete",
                outcome = "rejected",
                planet_id = %planet_id,
                channel_id = %channel_id,
                error = %error,
            );
        })?;
        self.settle(&handle, &data, &[Invalidation::ChannelChanged(channel_id)])?;
        tracing::info!(
            event = "channel.delete",
            outcome = "deleted",
            planet_id = %planet_id,
            channel_id = %deletion.channel.id,
            removed_nodes = deletion.removed_nodes,
        );
        Ok(())
    }

    pub(crate) async fn add_member(
        &self,
        planet_id: PlanetId,
        user_id: UserId,
    ) -> Result<PlanetMember, ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let mut data = handle.data.write().await;
        let member = data.add_member(user_id)?;
        self.settle(&handle, &data, &[Invalidation::MembershipChanged(member.id)])?;
        Ok(member)
    }

    pub(crate) async fn remove_member(
        &self,
        planet_id: PlanetId,
        member_id: MemberId,
    ) -> Result<(), ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let mut data = handle.data.write().await;
        data.remove_member(member_id)?;
        self.settle(&handle, &data, &[Invalidation::MembershipChanged(member_id)])
    }

    pub(crate) async fn create_role(
        &self,
        planet_id: PlanetId,
        name: String,
        position: u32,
        update: RoleUpdate,
    ) -> Result<PlanetRole, ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let mut data = handle.data.write().await;
        let role = match data.create_role(name, position) {
            Ok(role) => role,
            Err(error) => {
                tracing::warn!(
                    event = "role.create",
                    outcome = "rejected",
                    planet_id = %planet_id,
                    slots_in_use = data.slots_in_use(),
                    error = %error,
                );
                return Err(error.into());
            }
        };
        let role = data.update_role(role.id, update)?.role;
        self.settle(&handle, &data, &[Invalidation::RoleChanged(role.id)])?;
        tracing::info!(
            event = "role.create",
            outcome = "created",
            planet_id = %planet_id,
            role_id = %role.id,
            slot = %role.slot,
        );
        Ok(role)
    }

    pub(crate) async fn update_role(
        &self,
        planet_id: PlanetId,
        role_id: RoleId,
        update: RoleUpdate,
    ) -> Result<PlanetRole, ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let mut data = handle.data.write().await;
        let edit = data.update_role(role_id, update)?;
        let mut events = Vec::with_capacity(2);
        if edit.bits_changed {
            events.push(Invalidation::RoleChanged(role_id));
        }
        if edit.position_changed {
            events.push(Invalidation::RoleOrderChanged);
        }
        self.settle(&handle, &data, &events)?;
        Ok(edit.role)
    }

    /// Members lose the role's bit before its slot is released; each of them
    /// gets a membership event, then the role itself does.
    pub(crate) async fn delete_role(
        &self,
        planet_id: PlanetId,
        role_id: RoleId,
    ) -> Result<(), ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let mut data = handle.data.write().await;
        let deletion = data.delete_role(role_id)?;

        let mut events: Vec<_> = deletion
            .affected_members
            .iter()
            .map(|member_id| Invalidation::MembershipChanged(*member_id))
            .collect();
        events.push(Invalidation::RoleChanged(role_id));
        self.settle(&handle, &data, &events)?;
        tracing::info!(
            event = "role.delete",
            outcome = "deleted",
            planet_id = %planet_id,
            role_id = %role_id,
            slot = %deletion.role.slot,
            affected_members = deletion.affected_members.len(),
            removed_nodes = deletion.removed_nodes,
        );
        Ok(())
    }

    pub(crate) async fn add_role_to_member(
        &self,
        planet_id: PlanetId,
        member_id: MemberId,
        role_id: RoleId,
    ) -> Result<(), ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let mut data = handle.data.write().await;
        if data.grant_role(member_id, role_id)? {
            self.settle(&handle, &data, &[Invalidation::MembershipChanged(member_id)])?;
        }
        Ok(())
    }

    pub(crate) async fn remove_role_from_member(
        &self,
        planet_id: PlanetId,
        member_id: MemberId,
        role_id: RoleId,
    ) -> Result<(), ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let mut data = handle.data.write().await;
        if data.revoke_role(member_id, role_id)? {
            self.settle(&handle, &data, &[Invalidation::MembershipChanged(member_id)])?;
        }
        Ok(())
    }

    pub(crate) async fn set_permission_node(
        &self,
        planet_id: PlanetId,
        key: NodeKey,
        node: PermissionNode,
    ) -> Result<(), ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let mut data = handle.data.write().await;
        data.set_node(key, node)?;
        self.settle(&handle, &data, &[node_changed(key)])
    }

    pub(crate) async fn remove_permission_node(
        &self,
        planet_id: PlanetId,
        key: NodeKey,
    ) -> Result<(), ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let mut data = handle.data.write().await;
        if data.remove_node(key)? {
            self.settle(&handle, &data, &[node_changed(key)])?;
        }
        Ok(())
    }

    pub(crate) async fn has_permission(
        &self,
        planet_id: PlanetId,
        member_id: MemberId,
        channel_id: ChannelId,
        permission: Permission,
    ) -> Result<bool, ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let data = handle.data.read().await;
        let outcome = check(&data, member_id, channel_id, permission);
        match &outcome {
            Ok(true) => record_permission_check(CHECK_OUTCOME_GRANTED),
            Ok(false) => record_permission_check(CHECK_OUTCOME_DENIED),
            Err(error) => {
                record_permission_check(CHECK_OUTCOME_ERROR);
                tracing::warn!(
                    event = "permission.check",
                    outcome = "error",
                    planet_id = %planet_id,
                    member_id = %member_id,
                    channel_id = %channel_id,
                    permission = %permission,
                    error = %error,
                );
            }
        }
        Ok(outcome?)
    }

    pub(crate) async fn flattened_permissions(
        &self,
        planet_id: PlanetId,
        member_id: MemberId,
        channel_id: ChannelId,
    ) -> Result<FlattenedView, ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let guard = handle.data.read().await;
        let data = &*guard;
        let planet = data.planet_record();
        let member = data
            .member(member_id)
            .ok_or(PermissionError::UnknownMember)?;
        let channel = data
            .channel(channel_id)
            .ok_or(PermissionError::UnknownChannel)?;
        let target_channel_id = resolve_target(data, channel).target.id;

        if member.user_id == planet.owner_user_id {
            return Ok(FlattenedView {
                node: PermissionNode::all_granted(),
                kind: channel.kind,
                target_channel_id,
                cache_hit: false,
            });
        }

        let key = FlattenKey {
            channel_id: target_channel_id,
            roles: effective_membership(data, planet, member.roles),
            target_kind: channel.kind,
        };
        if let Some(node) = handle.cache.get(&key) {
            record_flatten_cache_hit();
            return Ok(FlattenedView {
                node,
                kind: channel.kind,
                target_channel_id,
                cache_hit: true,
            });
        }

        let generation = handle.cache.generation();
        let node = Flattener::new(data, planet).flatten_roles(member.roles, channel)?;
        handle.cache.record_computation();
        record_flatten_computation();
        Ok(FlattenedView {
            node: handle.cache.insert_if_current(key, node, generation),
            kind: channel.kind,
            target_channel_id,
            cache_hit: false,
        })
    }

    /// Channels the member can see, ordered by creation.
    pub(crate) async fn channel_access(
        &self,
        planet_id: PlanetId,
        member_id: MemberId,
    ) -> Result<Vec<ChannelId>, ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let guard = handle.data.read().await;
        let data = &*guard;
        let planet = data.planet_record();
        let member = data
            .member(member_id)
            .ok_or(PermissionError::UnknownMember)?;
        if member.user_id == planet.owner_user_id {
            return Ok(data
                .channels_sorted()
                .into_iter()
                .map(|channel| channel.id)
                .collect());
        }

        let roles = effective_membership(data, planet, member.roles);
        if let Some(channels) = handle.cache.access_list(&roles) {
            return Ok(channels);
        }

        let generation = handle.cache.generation();
        let resolver = PermissionResolver::new(data, planet);
        let mut visible = Vec::new();
        for channel in data.channels_sorted() {
            if resolver.can_view(member, channel)? {
                visible.push(channel.id);
            }
        }
        Ok(handle
            .cache
            .insert_access_if_current(roles, visible, generation))
    }

    pub(crate) async fn planet_permissions(
        &self,
        planet_id: PlanetId,
        member_id: MemberId,
    ) -> Result<PlanetPermissionsView, ApiFailure> {
        let handle = self.planet_handle(planet_id).await?;
        let guard = handle.data.read().await;
        let data = &*guard;
        let planet = data.planet_record();
        let member = data
            .member(member_id)
            .ok_or(PermissionError::UnknownMember)?;
        Ok(PlanetPermissionsView {
            permissions: PermissionResolver::new(data, planet).planet_permissions(member)?,
            authority: member_authority(data, planet, member),
        })
    }

    /// Applies a notification produced elsewhere. Returns the number of
    /// evicted flattened nodes.
    pub(crate) async fn apply_notification(
        &self,
        planet_id: PlanetId,
        notification: &ChangeNotification,
    ) -> Result<usize, ApiFailure> {
        let event = Invalidation::from_notification(planet_id, notification)?;
        let handle = self.planet_handle(planet_id).await?;
        let data = handle.data.read().await;
        let evicted = handle
            .tracker
            .lock()
            .map_err(|_| ApiFailure::Internal)?
            .apply(&data, &handle.cache, event);
        record_notification(notification.event_type().as_str());
        Ok(evicted)
    }

    fn settle(
        &self,
        handle: &PlanetHandle,
        data: &PlanetData,
        events: &[Invalidation],
    ) -> Result<(), ApiFailure> {
        let mut tracker = handle.tracker.lock().map_err(|_| ApiFailure::Internal)?;
        for event in events {
            tracker.apply(data, &handle.cache, *event);
        }
        drop(tracker);

        let planet_id = data.planet_record().id;
        for event in events {
            self.publish(&event.to_notification(planet_id));
        }
        Ok(())
    }

    fn publish(&self, notification: &ChangeNotification) {
        let encoded = notification
            .to_envelope()
            .and_then(|envelope| serde_json::to_string(&envelope).map_err(ProtocolError::from));
        match encoded {
            Ok(payload) => {
                record_notification(notification.event_type().as_str());
                // no subscribers is fine; fan-out is optional
                let _ = self.notifications.send(payload);
            }
            Err(error) => tracing::warn!(
                event = "notification.publish",
                outcome = "encode_failed",
                event_type = %notification.event_type(),
                error = %error,
            ),
        }
    }
}

fn node_changed(key: NodeKey) -> Invalidation {
    Invalidation::NodeChanged {
        role_id: key.role_id,
        channel_id: key.channel_id,
        target_kind: key.target_kind,
    }
}

fn check(
    data: &PlanetData,
    member_id: MemberId,
    channel_id: ChannelId,
    permission: Permission,
) -> Result<bool, PermissionError> {
    let member = data
        .member(member_id)
        .ok_or(PermissionError::UnknownMember)?;
    let channel = data
        .channel(channel_id)
        .ok_or(PermissionError::UnknownChannel)?;
    PermissionResolver::new(data, data.planet_record()).has_permission(member, channel, permission)
}

#[cfg(test)]
mod tests {
    use orbit_core::{
        permission::chat, ChannelKind, NodeKey, PermissionNode, PermissionState, UserId,
    };
    use orbit_protocol::{parse_notification, ChangeNotification};

    use crate::server::{
        core::{AppConfig, AppState},
        errors::ApiFailure,
        store::RoleUpdate,
    };

    async fn planet_with_channel(
        state: &AppState,
    ) -> (orbit_core::Planet, orbit_core::PlanetChannel) {
        let (planet, _) = state
            .create_planet(String::from("orbit"), UserId::new())
            .await
            .unwrap();
        let channel = state
            .create_channel(planet.id, String::from("general"), ChannelKind::Chat, None, false)
            .await
            .unwrap();
        (planet, channel)
    }

    #[tokio::test]
    async fn members_with_identical_roles_share_one_computation() {
        let state = AppState::new(&AppConfig::default());
        let (planet, channel) = planet_with_channel(&state).await;
        let role = state
            .create_role(planet.id, String::from("regular"), 10, RoleUpdate::default())
            .await
            .unwrap();
        let first = state.add_member(planet.id, UserId::new()).await.unwrap();
        let second = state.add_member(planet.id, UserId::new()).await.unwrap();
        for member in [&first, &second] {
            state
                .add_role_to_member(planet.id, member.id, role.id)
                .await
                .unwrap();
        }

        let a = state
            .flattened_permissions(planet.id, first.id, channel.id)
            .await
            .unwrap();
        let b = state
            .flattened_permissions(planet.id, second.id, channel.id)
            .await
            .unwrap();
        assert_eq!(a.node, b.node);
        assert!(!a.cache_hit);
        assert!(b.cache_hit);

        let handle = state.planet_handle(planet.id).await.unwrap();
        assert_eq!(handle.cache.computations(), 1);
    }

    #[tokio::test]
    async fn node_change_is_visible_to_the_next_flatten() {
        let state = AppState::new(&AppConfig::default());
        let (planet, channel) = planet_with_channel(&state).await;
        let muted = state
            .create_role(planet.id, String::from("Muted"), 5, RoleUpdate::default())
            .await
            .unwrap();
        let member = state.add_member(planet.id, UserId::new()).await.unwrap();
        state
            .add_role_to_member(planet.id, member.id, muted.id)
            .await
            .unwrap();

        let before = state
            .flattened_permissions(planet.id, member.id, channel.id)
            .await
            .unwrap();
        assert!(before.node.state(chat::POST).is_granted());

        let key = NodeKey {
            role_id: muted.id,
            channel_id: channel.id,
            target_kind: ChannelKind::Chat,
        };
        state
            .set_permission_node(
                planet.id,
                key,
                PermissionNode::empty().with_state(chat::POST, PermissionState::Denied),
            )
            .await
            .unwrap();

        let after = state
            .flattened_permissions(planet.id, member.id, channel.id)
            .await
            .unwrap();
        assert!(!after.cache_hit);
        assert!(!after.node.state(chat::POST).is_granted());
        assert!(after.node.state(chat::VIEW).is_granted());
        assert!(!state
            .has_permission(planet.id, member.id, channel.id, chat::POST)
            .await
            .unwrap());
        assert!(state
            .has_permission(planet.id, member.id, channel.id, chat::VIEW)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn deleting_a_role_revokes_it_before_the_slot_is_reused() {
        let state = AppState::new(&AppConfig::default());
        let (planet, channel) = planet_with_channel(&state).await;
        let moderator = state
            .create_role(planet.id, String::from("moderator"), 1, RoleUpdate::default())
            .await
            .unwrap();
        let member = state.add_member(planet.id, UserId::new()).await.unwrap();
        state
            .add_role_to_member(planet.id, member.id, moderator.id)
            .await
            .unwrap();
        state
            .set_permission_node(
                planet.id,
                NodeKey {
                    role_id: moderator.id,
                    channel_id: channel.id,
                    target_kind: ChannelKind::Chat,
                },
                PermissionNode::empty()
                    .with_state(chat::MANAGE_MESSAGES, PermissionState::Granted),
            )
            .await
            .unwrap();
        assert!(state
            .has_permission(planet.id, member.id, channel.id, chat::MANAGE_MESSAGES)
            .await
            .unwrap());

        let mut notifications = state.subscribe();
        state.delete_role(planet.id, moderator.id).await.unwrap();
        let first = parse_notification(notifications.recv().await.unwrap().as_bytes()).unwrap();
        let second = parse_notification(notifications.recv().await.unwrap().as_bytes()).unwrap();
        assert_eq!(
            first,
            ChangeNotification::MembershipChanged {
                member_id: member.id.to_string()
            }
        );
        assert_eq!(
            second,
            ChangeNotification::RoleChanged {
                role_id: moderator.id.to_string()
            }
        );

        let replacement = state
            .create_role(planet.id, String::from("guest"), 1, RoleUpdate::default())
            .await
            .unwrap();
        assert_eq!(replacement.slot, moderator.slot);
        assert!(!state
            .has_permission(planet.id, member.id, channel.id, chat::MANAGE_MESSAGES)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn redelivered_notifications_are_harmless() {
        let state = AppState::new(&AppConfig::default());
        let (planet, channel) = planet_with_channel(&state).await;
        let member = state.add_member(planet.id, UserId::new()).await.unwrap();
        state
            .flattened_permissions(planet.id, member.id, channel.id)
            .await
            .unwrap();

        let notification = ChangeNotification::MembershipChanged {
            member_id: member.id.to_string(),
        };
        assert_eq!(
            state.apply_notification(planet.id, &notification).await.unwrap(),
            0
        );
        assert!(
            state
                .flattened_permissions(planet.id, member.id, channel.id)
                .await
                .unwrap()
                .cache_hit
        );

        let node_changed = ChangeNotification::NodeChanged {
            role_id: planet.default_role_id.to_string(),
            channel_id: channel.id.to_string(),
            target_kind: String::from("chat"),
        };
        assert_eq!(
            state.apply_notification(planet.id, &node_changed).await.unwrap(),
            1
        );
        assert_eq!(
            state.apply_notification(planet.id, &node_changed).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn access_list_follows_view_overrides() {
        let state = AppState::new(&AppConfig::default());
        let (planet, general) = planet_with_channel(&state).await;
        let staff = state
            .create_channel(planet.id, String::from("staff"), ChannelKind::Chat, None, false)
            .await
            .unwrap();
        let member = state.add_member(planet.id, UserId::new()).await.unwrap();
        let mut visible = state.channel_access(planet.id, member.id).await.unwrap();
        visible.sort();
        let mut expected = vec![general.id, staff.id];
        expected.sort();
        assert_eq!(visible, expected);

        state
            .set_permission_node(
                planet.id,
                NodeKey {
                    role_id: planet.default_role_id,
                    channel_id: staff.id,
                    target_kind: ChannelKind::Chat,
                },
                PermissionNode::empty().with_state(chat::VIEW, PermissionState::Denied),
            )
            .await
            .unwrap();
        assert_eq!(
            state.channel_access(planet.id, member.id).await.unwrap(),
            vec![general.id]
        );
    }

    #[tokio::test]
    async fn unknown_planet_is_not_found() {
        let state = AppState::new(&AppConfig::default());
        let error = state
            .add_member(orbit_core::PlanetId::new(), UserId::new())
            .await
            .unwrap_err();
        assert!(matches!(error, ApiFailure::NotFound));
    }
}
