//! Participant identities and the fixed per-session registry.
//!
//! Every connection endpoint maps to exactly one [`Participant`]. The set is
//! fixed for a session's lifetime; there is no dynamic join/leave.

use std::collections::BTreeMap;

use crate::{HandleVec, NetplayError, PlayerHandle};

/// Where a participant's inputs are produced.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Locality {
    /// This participant plays on the local device; its inputs arrive through
    /// `advance_frame` and are always confirmed.
    Local,
    /// This participant plays on a remote device; its inputs arrive over the
    /// transport and are predicted until confirmed.
    Remote,
}

/// Whether a participant's state is treated as ground truth for resync.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// This participant's simulation is the authoritative timeline; it
    /// periodically broadcasts state snapshots.
    Authoritative,
    /// This participant accepts periodic authoritative snapshots to bound
    /// drift.
    NonAuthoritative,
}

/// Immutable identity of one session participant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Participant {
    /// The participant's unique handle.
    pub handle: PlayerHandle,
    /// Local or remote.
    pub locality: Locality,
    /// Authoritative or not.
    pub role: Role,
}

impl Participant {
    /// Creates a new participant identity.
    #[must_use]
    pub const fn new(handle: PlayerHandle, locality: Locality, role: Role) -> Self {
        Self {
            handle,
            locality,
            role,
        }
    }

    /// Returns `true` if this participant plays on the local device.
    #[inline]
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self.locality, Locality::Local)
    }

    /// Returns `true` if this participant plays on a remote device.
    #[inline]
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self.locality, Locality::Remote)
    }

    /// Returns `true` if this participant's state is the session's ground
    /// truth.
    #[inline]
    #[must_use]
    pub const fn is_authoritative(&self) -> bool {
        matches!(self.role, Role::Authoritative)
    }
}

/// Registry tracking all participants of a session.
///
/// Backed by a `BTreeMap` so iteration order is deterministic across peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRegistry {
    participants: BTreeMap<PlayerHandle, Participant>,
}

impl ParticipantRegistry {
    /// Builds a registry from a fixed participant set.
    ///
    /// # Errors
    ///
    /// Returns [`NetplayError::InvalidRequest`] unless the set has at least
    /// two participants with unique handles, exactly one of them local and
    /// exactly one of them authoritative.
    pub fn new(
        participants: impl IntoIterator<Item = Participant>,
    ) -> Result<Self, NetplayError> {
        let mut map = BTreeMap::new();
        for participant in participants {
            if map.insert(participant.handle, participant).is_some() {
                return Err(NetplayError::InvalidRequest {
                    info: format!("duplicate participant handle {}", participant.handle),
                });
            }
        }
        if map.len() < 2 {
            return Err(NetplayError::InvalidRequest {
                info: format!(
                    "a session needs at least two participants, got {}",
                    map.len()
                ),
            });
        }
        let locals = map.values().filter(|p| p.is_local()).count();
        if locals != 1 {
            return Err(NetplayError::InvalidRequest {
                info: format!("expected exactly one local participant, got {locals}"),
            });
        }
        let authorities = map.values().filter(|p| p.is_authoritative()).count();
        if authorities != 1 {
            return Err(NetplayError::InvalidRequest {
                info: format!("expected exactly one authoritative participant, got {authorities}"),
            });
        }
        Ok(Self { participants: map })
    }

    /// Returns the participant registered under `handle`, if any.
    #[must_use]
    pub fn get(&self, handle: PlayerHandle) -> Option<&Participant> {
        self.participants.get(&handle)
    }

    /// Number of participants in the session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Returns `true` if the registry holds no participants. Registries built
    /// through [`ParticipantRegistry::new`] are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Iterates all participants in handle order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// The single local participant's handle.
    #[must_use]
    pub fn local_handle(&self) -> PlayerHandle {
        // Construction guarantees exactly one local participant.
        self.participants
            .values()
            .find(|p| p.is_local())
            .map_or_else(PlayerHandle::default, |p| p.handle)
    }

    /// Returns an iterator over remote participant handles.
    ///
    /// This is a zero-allocation alternative to
    /// [`remote_handles`](Self::remote_handles).
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn remote_handles_iter(&self) -> impl Iterator<Item = PlayerHandle> + '_ {
        self.participants
            .values()
            .filter_map(|p| p.is_remote().then_some(p.handle))
    }

    /// Returns handles for all remote participants.
    #[must_use]
    pub fn remote_handles(&self) -> HandleVec {
        self.remote_handles_iter().collect()
    }

    /// Returns `true` if `handle` names a remote participant.
    #[must_use]
    pub fn is_remote(&self, handle: PlayerHandle) -> bool {
        self.get(handle).is_some_and(Participant::is_remote)
    }

    /// Returns `true` if the *local* participant is the authoritative one.
    #[must_use]
    pub fn local_is_authoritative(&self) -> bool {
        self.get(self.local_handle())
            .is_some_and(Participant::is_authoritative)
    }
}

// #########
// # TESTS #
// #########
