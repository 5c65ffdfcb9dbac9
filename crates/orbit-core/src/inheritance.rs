use std::collections::HashSet;

use crate::{ChannelId, PermissionError, PermissionSource, PlanetChannel, PlanetId};

/// Upper bound on parent hops followed by a single walk. Writes that would
/// give a channel more ancestors than this are rejected.
pub const MAX_INHERITANCE_DEPTH: usize = 64;

/// Outcome of an inheritance walk. `issue` records broken data the walk
/// worked around; the target is always usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget<'a> {
    pub target: &'a PlanetChannel,
    pub issue: Option<PermissionError>,
}

impl<'a> ResolvedTarget<'a> {
    const fn clean(target: &'a PlanetChannel) -> Self {
        Self {
            target,
            issue: None,
        }
    }
}

/// Follows `parent_id` while `inherits_perms` is set and returns the channel
/// whose override nodes apply to `channel`.
///
/// A missing or foreign parent stops the walk at the last reachable channel.
/// A cycle, or a chain longer than [`MAX_INHERITANCE_DEPTH`], falls back to
/// `channel` itself.
pub fn resolve_target<'a, S: PermissionSource + ?Sized>(
    source: &'a S,
    channel: &'a PlanetChannel,
) -> ResolvedTarget<'a> {
    let resolved = walk(source, channel);
    if let Some(issue) = &resolved.issue {
        tracing::warn!(
            event = "inheritance.resolve",
            outcome = "data_integrity",
            channel_id = %channel.id,
            target_id = %resolved.target.id,
            error = %issue,
        );
    }
    resolved
}

fn walk<'a, S: PermissionSource + ?Sized>(
    source: &'a S,
    channel: &'a PlanetChannel,
) -> ResolvedTarget<'a> {
    let mut visited = HashSet::from([channel.id]);
    let mut current = channel;

    for _ in 0..MAX_INHERITANCE_DEPTH {
        if !current.inherits_perms {
            return ResolvedTarget::clean(current);
        }
        let Some(parent_id) = current.parent_id else {
            return ResolvedTarget::clean(current);
        };
        let parent = match source.channel(parent_id) {
            Some(parent) if parent.planet_id == channel.planet_id => parent,
            _ => {
                return ResolvedTarget {
                    target: current,
                    issue: Some(PermissionError::DanglingParent {
                        channel_id: current.id,
                        parent_id,
                    }),
                }
            }
        };
        if !visited.insert(parent.id) {
            break;
        }
        current = parent;
    }

    if !current.inherits_perms || current.parent_id.is_none() {
        return ResolvedTarget::clean(current);
    }
    ResolvedTarget {
        target: channel,
        issue: Some(PermissionError::InheritanceCycle {
            channel_id: channel.id,
        }),
    }
}

/// Checks that giving `channel_id` the parent `new_parent` keeps the
/// channel tree acyclic.
///
/// # Errors
/// [`PermissionError::UnknownChannel`] if the parent is not a channel of
/// `planet_id`; [`PermissionError::InheritanceCycle`] if `channel_id` is the
/// parent itself or one of its ancestors.
pub fn validate_parent<S: PermissionSource + ?Sized>(
    source: &S,
    planet_id: PlanetId,
    channel_id: ChannelId,
    new_parent: Option<ChannelId>,
) -> Result<(), PermissionError> {
    let Some(parent_id) = new_parent else {
        return Ok(());
    };
    let mut next = match source.channel(parent_id) {
        Some(parent) if parent.planet_id == planet_id => Some(parent),
        _ => return Err(PermissionError::UnknownChannel),
    };

    let mut visited = HashSet::new();
    while let Some(ancestor) = next {
        if ancestor.id == channel_id || !visited.insert(ancestor.id) {
            return Err(PermissionError::InheritanceCycle { channel_id });
        }
        if visited.len() > MAX_INHERITANCE_DEPTH {
            return Err(PermissionError::InheritanceCycle { channel_id });
        }
        next = ancestor
            .parent_id
            .and_then(|id| source.channel(id))
            .filter(|parent| parent.planet_id == planet_id);
    }
    Ok(())
}
