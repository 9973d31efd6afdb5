//! # netplay-rollback
//!
//! A predictive rollback netplay engine. Two (generalizable to N) peers run a
//! shared deterministic simulation over a reliable, ordered message channel.
//! Each peer predicts the inputs of remote participants, advances its local
//! simulation optimistically, and rewinds and resimulates when the true remote
//! input later disagrees with the guess.
//!
//! The crate deliberately owns only the synchronization core: the bounded
//! input/state history, the prediction and correction algorithm, the
//! frame-pacing/stall policy, and the round-trip-time estimator that feeds it.
//! Transport, rendering, input capture and the concrete game rules are
//! collaborators that plug in at the seams:
//!
//! - the game implements [`Simulation`] (a pure, deterministic step function
//!   plus serde-encodable state) and bundles its types via [`Config`],
//! - the transport delivers [`Message`]s into
//!   [`RollbackEngine::handle_message`] and receives outbound messages through
//!   an injected [`MessageSender`],
//! - the driver calls [`RollbackEngine::advance_frame`] once per timestep and
//!   renders [`RollbackEngine::current_state`].
//!
//! ## Example
//!
//! ```
//! use netplay_rollback::{
//!     Config, EngineBuilder, Locality, Participant, PlayerHandle, PlayerInputs, Role,
//!     Simulation,
//! };
//! use serde::{Deserialize, Serialize};
//! use web_time::Duration;
//!
//! #[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
//! struct Paddle(i32);
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Pong {
//!     paddles: [i32; 2],
//! }
//!
//! impl Simulation<Paddle> for Pong {
//!     fn initial() -> Self {
//!         Pong { paddles: [0, 0] }
//!     }
//!     fn timestep() -> Duration {
//!         Duration::from_micros(16_667)
//!     }
//!     fn step(&self, inputs: &PlayerInputs<Paddle>, _dt: Duration) -> Self {
//!         let mut next = self.clone();
//!         for (handle, record) in inputs.iter() {
//!             next.paddles[handle.as_usize()] += record.input.0;
//!         }
//!         next
//!     }
//! }
//!
//! struct PongConfig;
//! impl Config for PongConfig {
//!     type Input = Paddle;
//!     type State = Pong;
//! }
//!
//! let mut outbound = Vec::new();
//! let mut engine = EngineBuilder::<PongConfig>::new()
//!     .add_participant(Participant::new(
//!         PlayerHandle::new(0),
//!         Locality::Local,
//!         Role::Authoritative,
//!     ))
//!     .add_participant(Participant::new(
//!         PlayerHandle::new(1),
//!         Locality::Remote,
//!         Role::NonAuthoritative,
//!     ))
//!     .with_sender(move |message| outbound.push(message))
//!     .start()
//!     .unwrap();
//!
//! engine.advance_frame(Paddle(1)).unwrap();
//! assert_eq!(engine.current_state().paddles[0], 1);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};
use smallvec::SmallVec;
use web_time::Duration;

pub use builder::EngineBuilder;
pub use engine::{
    EngineStats, EventDrain, MessageSender, NetplayEvent, RollbackEngine, SharedEngine,
};
pub use error::NetplayError;
pub use history::{InputRecord, PlayerInputs};
pub use latency::{LatencyConfig, LatencyEstimator};
pub use messages::Message;
pub use participant::{Locality, Participant, ParticipantRegistry, Role};

#[doc(hidden)]
pub mod builder;
/// Binary codec for wire message serialization.
pub mod codec;
#[doc(hidden)]
pub mod engine;
#[doc(hidden)]
pub mod error;
#[doc(hidden)]
pub mod history;
#[doc(hidden)]
pub mod latency;
#[doc(hidden)]
pub mod messages;
#[doc(hidden)]
pub mod participant;

// #############
// # CONSTANTS #
// #############

/// Internally, -1 represents no frame / invalid frame.
pub const NULL_FRAME: i32 = -1;

/// A frame is a single step of simulation execution.
///
/// Frames are the fundamental unit of time in rollback netplay: peers never
/// synchronize wall-clock time, only frame indices. Frame numbers start at 0
/// and increment sequentially; the special value [`NULL_FRAME`] (-1)
/// represents "no frame".
///
/// `Frame` is a newtype wrapper around `i32` so frame indices cannot be
/// accidentally mixed with other integers.
///
/// # Examples
///
/// ```
/// use netplay_rollback::Frame;
///
/// let frame = Frame::new(0);
/// assert!(frame.is_valid());
/// assert!(Frame::NULL.is_null());
///
/// let next = frame + 1;
/// assert_eq!(next.as_i32(), 1);
/// assert!(next > frame);
/// ```
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Frame(i32);

impl Frame {
    /// The null frame constant, representing "no frame" or "uninitialized".
    pub const NULL: Frame = Frame(NULL_FRAME);

    /// Creates a new `Frame` from an `i32` value.
    ///
    /// This does not validate the frame number; use [`Frame::is_valid`] to
    /// check for a non-negative frame.
    #[inline]
    #[must_use]
    pub const fn new(frame: i32) -> Self {
        Frame(frame)
    }

    /// Returns the underlying `i32` value.
    #[inline]
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Returns `true` if this frame is the null frame.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == NULL_FRAME
    }

    /// Returns `true` if this frame is valid (non-negative).
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "NULL_FRAME")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl std::ops::Add<i32> for Frame {
    type Output = Frame;

    #[inline]
    fn add(self, rhs: i32) -> Self::Output {
        Frame(self.0 + rhs)
    }
}

impl std::ops::AddAssign<i32> for Frame {
    #[inline]
    fn add_assign(&mut self, rhs: i32) {
        self.0 += rhs;
    }
}

impl std::ops::Sub<i32> for Frame {
    type Output = Frame;

    #[inline]
    fn sub(self, rhs: i32) -> Self::Output {
        Frame(self.0 - rhs)
    }
}

impl std::ops::Sub<Frame> for Frame {
    type Output = i32;

    #[inline]
    fn sub(self, rhs: Frame) -> Self::Output {
        self.0 - rhs.0
    }
}

impl From<i32> for Frame {
    #[inline]
    fn from(value: i32) -> Self {
        Frame(value)
    }
}

impl From<Frame> for i32 {
    #[inline]
    fn from(frame: Frame) -> Self {
        frame.0
    }
}

impl PartialEq<i32> for Frame {
    #[inline]
    fn eq(&self, other: &i32) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<i32> for Frame {
    #[inline]
    fn partial_cmp(&self, other: &i32) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(other)
    }
}

/// A unique identifier for a participant in a session.
///
/// `PlayerHandle` is a newtype wrapper around `usize` so participant
/// identifiers cannot be accidentally mixed with other integers. The set of
/// handles is fixed for a session; there is no dynamic join/leave.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct PlayerHandle(usize);

impl PlayerHandle {
    /// Creates a new `PlayerHandle` from a `usize` value.
    #[inline]
    #[must_use]
    pub const fn new(handle: usize) -> Self {
        PlayerHandle(handle)
    }

    /// Returns the underlying `usize` value.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for PlayerHandle {
    #[inline]
    fn from(value: usize) -> Self {
        PlayerHandle(value)
    }
}

impl From<PlayerHandle> for usize {
    #[inline]
    fn from(handle: PlayerHandle) -> Self {
        handle.0
    }
}

/// A stack-allocated list of player handles.
///
/// Sessions typically have 2-4 participants, so handle lists stay off the
/// heap.
pub type HandleVec = SmallVec<[PlayerHandle; 4]>;

// #############
// #   ENUMS   #
// #############

/// Whether an input stored in the history is real or guessed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum InputStatus {
    /// The input was received from (or produced by) its participant.
    Confirmed,
    /// The input was predicted by repeating the participant's last known
    /// input; it may later be corrected.
    Predicted,
}

impl InputStatus {
    /// Returns `true` for [`InputStatus::Predicted`].
    #[inline]
    #[must_use]
    pub const fn is_prediction(self) -> bool {
        matches!(self, InputStatus::Predicted)
    }
}

// #############
// #  TRAITS   #
// #############

/// Compile time parameterization for engines.
///
/// This trait bundles the generic types needed for a session. Implement it on
/// a marker struct to configure your engine types.
///
/// The implementation of [`Default`] on `Input` is used as the neutral "no
/// input" value, both before any real input is known and as the seed for
/// prediction.
///
/// # Example
///
/// ```
/// use netplay_rollback::{Config, PlayerInputs, Simulation};
/// use serde::{Deserialize, Serialize};
/// use web_time::Duration;
///
/// #[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
/// struct GameInput {
///     buttons: u8,
/// }
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct GameState {
///     score: u32,
/// }
///
/// impl Simulation<GameInput> for GameState {
///     fn initial() -> Self {
///         GameState { score: 0 }
///     }
///     fn timestep() -> Duration {
///         Duration::from_micros(16_667)
///     }
///     fn step(&self, inputs: &PlayerInputs<GameInput>, _dt: Duration) -> Self {
///         let pressed = inputs.iter().filter(|(_, r)| r.input.buttons != 0).count();
///         GameState {
///             score: self.score + pressed as u32,
///         }
///     }
/// }
///
/// struct GameConfig;
/// impl Config for GameConfig {
///     type Input = GameInput;
///     type State = GameState;
/// }
/// ```
pub trait Config: 'static {
    /// The input type for a session. This is the only game-related data
    /// transmitted over the network every frame.
    type Input: Copy + Clone + PartialEq + Default + Debug + Serialize + DeserializeOwned;

    /// The simulation state type for the session.
    type State: Simulation<Self::Input>;
}

/// The capability set a pluggable simulation state must implement.
///
/// The engine depends only on this abstraction, never on a concrete game.
///
/// # Determinism
///
/// [`step`](Simulation::step) must be pure and deterministic: the same prior
/// state and the same inputs must yield bit-identical results on every peer.
/// The engine cannot verify this at runtime; a non-deterministic step function
/// produces silent desyncs.
///
/// Serde encodings double as the wire format for state resync, with the
/// round-trip law `decode(encode(x)) == x`.
pub trait Simulation<I>: Clone + Serialize + DeserializeOwned {
    /// The state every session starts from.
    fn initial() -> Self;

    /// The fixed duration of one simulation step.
    fn timestep() -> Duration;

    /// Advances the simulation by one step.
    ///
    /// `inputs` contains exactly one record per participant for this frame.
    fn step(&self, inputs: &PlayerInputs<I>, dt: Duration) -> Self;
}

// #########
// # TESTS #
// #########

#[cfg(test)]
mod frame_tests {
    use super::*;

    #[test]
    fn null_frame_is_null() {
        assert!(Frame::NULL.is_null());
        assert!(!Frame::NULL.is_valid());
        assert_eq!(Frame::NULL.as_i32(), NULL_FRAME);
    }

    #[test]
    fn new_frame_is_valid() {
        assert!(Frame::new(0).is_valid());
        assert!(Frame::new(100).is_valid());
        assert!(!Frame::new(-5).is_valid());
    }

    #[test]
    fn frame_arithmetic() {
        let frame = Frame::new(10);
        assert_eq!(frame + 1, Frame::new(11));
        assert_eq!(frame - 1, Frame::new(9));
        assert_eq!(frame - Frame::new(4), 6);

        let mut frame = Frame::new(0);
        frame += 3;
        assert_eq!(frame, Frame::new(3));
    }

    #[test]
    fn frame_ordering() {
        assert!(Frame::new(2) > Frame::new(1));
        assert!(Frame::NULL < Frame::new(0));
        assert!(Frame::new(5) > 4);
        assert_eq!(Frame::new(7), 7);
    }

    #[test]
    fn frame_display() {
        assert_eq!(Frame::new(42).to_string(), "42");
        assert_eq!(Frame::NULL.to_string(), "NULL_FRAME");
    }

    #[test]
    fn player_handle_roundtrip() {
        let handle = PlayerHandle::new(3);
        assert_eq!(handle.as_usize(), 3);
        assert_eq!(usize::from(handle), 3);
        assert_eq!(PlayerHandle::from(3usize), handle);
        assert_eq!(handle.to_string(), "3");
    }

    #[test]
    fn input_status_prediction() {
        assert!(InputStatus::Predicted.is_prediction());
        assert!(!InputStatus::Confirmed.is_prediction());
    }
}
