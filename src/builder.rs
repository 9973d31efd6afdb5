//! Session construction.
//!
//! [`EngineBuilder`] collects the fixed participant set, tuning knobs and the
//! outbound message sink, validates the whole configuration in
//! [`start`](EngineBuilder::start), and seeds the engine with a
//! fully-confirmed frame-0 baseline.

use std::collections::BTreeMap;

use tracing::info;

use crate::engine::{MessageSender, RollbackEngine};
use crate::history::{InputRecord, PlayerInputs};
use crate::latency::{LatencyConfig, LatencyEstimator};
use crate::participant::{Participant, ParticipantRegistry};
use crate::{Config, NetplayError, PlayerHandle, Simulation};

/// How many speculative frames a session tolerates before stalling, unless
/// overridden.
pub const DEFAULT_MAX_PREDICTED_FRAMES: usize = 10;

/// How often (in frames) the authoritative peer broadcasts a state snapshot,
/// unless overridden.
pub const DEFAULT_STATE_SYNC_INTERVAL: i32 = 30;

/// How often (in frames) each peer emits a latency probe, unless overridden.
pub const DEFAULT_PING_INTERVAL: i32 = 60;

/// Builder for a [`RollbackEngine`].
///
/// ```no_run
/// # use netplay_rollback::{
/// #     Config, EngineBuilder, Locality, Participant, PlayerHandle, PlayerInputs, Role,
/// #     Simulation,
/// # };
/// # use serde::{Deserialize, Serialize};
/// # #[derive(Clone, Serialize, Deserialize)]
/// # struct S;
/// # impl Simulation<u8> for S {
/// #     fn initial() -> Self { S }
/// #     fn timestep() -> web_time::Duration { web_time::Duration::from_millis(16) }
/// #     fn step(&self, _: &PlayerInputs<u8>, _: web_time::Duration) -> Self { S }
/// # }
/// # struct C;
/// # impl Config for C { type Input = u8; type State = S; }
/// let engine = EngineBuilder::<C>::new()
///     .add_participant(Participant::new(
///         PlayerHandle::new(0),
///         Locality::Local,
///         Role::Authoritative,
///     ))
///     .add_participant(Participant::new(
///         PlayerHandle::new(1),
///         Locality::Remote,
///         Role::NonAuthoritative,
///     ))
///     .with_max_predicted_frames(8)
///     .with_sender(|message| {
///         // hand the message to the transport
///         let _ = message;
///     })
///     .start()?;
/// # Ok::<(), netplay_rollback::NetplayError>(())
/// ```
pub struct EngineBuilder<T>
where
    T: Config,
{
    participants: Vec<Participant>,
    max_predicted_frames: usize,
    state_sync_interval: i32,
    ping_interval: i32,
    latency_config: LatencyConfig,
    initial_state: Option<T::State>,
    initial_inputs: BTreeMap<PlayerHandle, T::Input>,
    sender: Option<Box<dyn MessageSender<T>>>,
}

impl<T: Config> Default for EngineBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Config> std::fmt::Debug for EngineBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("participants", &self.participants)
            .field("max_predicted_frames", &self.max_predicted_frames)
            .field("state_sync_interval", &self.state_sync_interval)
            .field("ping_interval", &self.ping_interval)
            .finish_non_exhaustive()
    }
}

impl<T: Config> EngineBuilder<T> {
    /// Creates a builder with default tuning and no participants.
    #[must_use]
    pub fn new() -> Self {
        Self {
            participants: Vec::new(),
            max_predicted_frames: DEFAULT_MAX_PREDICTED_FRAMES,
            state_sync_interval: DEFAULT_STATE_SYNC_INTERVAL,
            ping_interval: DEFAULT_PING_INTERVAL,
            latency_config: LatencyConfig::default(),
            initial_state: None,
            initial_inputs: BTreeMap::new(),
            sender: None,
        }
    }

    /// Registers one participant. Call once per session member; the set is
    /// validated as a whole by [`start`](Self::start).
    #[must_use]
    pub fn add_participant(mut self, participant: Participant) -> Self {
        self.participants.push(participant);
        self
    }

    /// Sets the speculation bound: the maximum number of trailing frames
    /// allowed to rest on predicted inputs before ticks stall.
    #[must_use]
    pub fn with_max_predicted_frames(mut self, max_predicted_frames: usize) -> Self {
        self.max_predicted_frames = max_predicted_frames;
        self
    }

    /// Sets the authoritative state broadcast cadence, in frames.
    #[must_use]
    pub fn with_state_sync_interval(mut self, interval: i32) -> Self {
        self.state_sync_interval = interval;
        self
    }

    /// Sets the latency probe cadence, in frames.
    #[must_use]
    pub fn with_ping_interval(mut self, interval: i32) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets the round-trip estimator's smoothing configuration.
    #[must_use]
    pub fn with_latency_config(mut self, config: LatencyConfig) -> Self {
        self.latency_config = config;
        self
    }

    /// Overrides the frame-0 state. Defaults to [`Simulation::initial`].
    ///
    /// Every peer must seed the identical state or the session starts
    /// diverged.
    #[must_use]
    pub fn with_initial_state(mut self, state: T::State) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Overrides the input seeded for one participant at frame 0.
    /// Participants without an override start with `T::Input::default()`.
    ///
    /// Frame-0 records seed prediction: until a remote participant's first
    /// real input arrives, its predicted input repeats this value.
    #[must_use]
    pub fn with_initial_input(mut self, handle: PlayerHandle, input: T::Input) -> Self {
        self.initial_inputs.insert(handle, input);
        self
    }

    /// Sets the outbound message sink. Required.
    #[must_use]
    pub fn with_sender(mut self, sender: impl MessageSender<T> + 'static) -> Self {
        self.sender = Some(Box::new(sender));
        self
    }

    /// Validates the configuration and builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`NetplayError::InvalidRequest`] when the participant set is
    /// invalid (see [`ParticipantRegistry::new`]), no sender was supplied,
    /// `max_predicted_frames` is zero, or either cadence interval is not
    /// positive.
    pub fn start(self) -> Result<RollbackEngine<T>, NetplayError> {
        if self.max_predicted_frames == 0 {
            return Err(NetplayError::InvalidRequest {
                info: "max_predicted_frames must be at least 1".to_owned(),
            });
        }
        if self.state_sync_interval <= 0 {
            return Err(NetplayError::InvalidRequest {
                info: format!(
                    "state_sync_interval must be positive, got {}",
                    self.state_sync_interval
                ),
            });
        }
        if self.ping_interval <= 0 {
            return Err(NetplayError::InvalidRequest {
                info: format!("ping_interval must be positive, got {}", self.ping_interval),
            });
        }
        let Some(sender) = self.sender else {
            return Err(NetplayError::InvalidRequest {
                info: "a message sender is required".to_owned(),
            });
        };
        let registry = ParticipantRegistry::new(self.participants)?;
        if let Some(unknown) = self
            .initial_inputs
            .keys()
            .find(|handle| registry.get(**handle).is_none())
        {
            return Err(NetplayError::InvalidRequest {
                info: format!("initial input for unknown participant {unknown}"),
            });
        }

        // Every participant starts with a confirmed frame-0 input, so frame 0
        // is never a rollback target.
        let mut initial_inputs = PlayerInputs::new();
        for participant in registry.iter() {
            let input = self
                .initial_inputs
                .get(&participant.handle)
                .copied()
                .unwrap_or_default();
            initial_inputs.insert(participant.handle, InputRecord::confirmed(input));
        }
        let initial_state = match self.initial_state {
            Some(state) => state,
            None => T::State::initial(),
        };

        info!(
            participants = registry.len(),
            local = registry.local_handle().as_usize(),
            authoritative = registry.local_is_authoritative(),
            max_predicted_frames = self.max_predicted_frames,
            "starting rollback session"
        );
        RollbackEngine::new(
            registry,
            initial_state,
            initial_inputs,
            self.max_predicted_frames,
            self.state_sync_interval,
            self.ping_interval,
            LatencyEstimator::with_config(self.latency_config),
            sender,
        )
    }
}

// #########
// # TESTS #
// #########
