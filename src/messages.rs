//! Wire message shapes exchanged between peers.
//!
//! The transport collaborator is a reliable, ordered, bidirectional channel
//! delivering discrete structured messages; loss, duplication and reordering
//! are explicitly its problem, not ours. Messages are serde types; the
//! canonical binary encoding lives in [`codec`](crate::codec).

use serde::{Deserialize, Serialize};

use crate::{Config, Frame};

/// A message exchanged between two session endpoints.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub enum Message<T>
where
    T: Config,
{
    /// One participant's input for a frame. Sent by every peer on every tick.
    Input {
        /// The frame the input belongs to.
        frame: Frame,
        /// The input value.
        input: T::Input,
    },
    /// Periodic anti-drift resync, authoritative peer to non-authoritative
    /// peers only.
    State {
        /// The frame the snapshot belongs to.
        frame: Frame,
        /// The authoritative simulation state at `frame`.
        state: T::State,
    },
    /// Latency probe. The receiver echoes `sent_time` back unchanged.
    PingRequest {
        /// Sender wall-clock time, in milliseconds since UNIX_EPOCH.
        sent_time: u128,
    },
    /// Latency probe reply; the receiver computes `now - sent_time` and feeds
    /// the estimator.
    PingReply {
        /// The echoed request timestamp.
        sent_time: u128,
    },
}

impl<T: Config> Clone for Message<T> {
    fn clone(&self) -> Self {
        match self {
            Message::Input { frame, input } => Message::Input {
                frame: *frame,
                input: *input,
            },
            Message::State { frame, state } => Message::State {
                frame: *frame,
                state: state.clone(),
            },
            Message::PingRequest { sent_time } => Message::PingRequest {
                sent_time: *sent_time,
            },
            Message::PingReply { sent_time } => Message::PingReply {
                sent_time: *sent_time,
            },
        }
    }
}

impl<T: Config> std::fmt::Debug for Message<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Input { frame, input } => f
                .debug_struct("Input")
                .field("frame", frame)
                .field("input", input)
                .finish(),
            Message::State { frame, .. } => {
                f.debug_struct("State").field("frame", frame).finish_non_exhaustive()
            }
            Message::PingRequest { sent_time } => f
                .debug_struct("PingRequest")
                .field("sent_time", sent_time)
                .finish(),
            Message::PingReply { sent_time } => f
                .debug_struct("PingReply")
                .field("sent_time", sent_time)
                .finish(),
        }
    }
}

/// Returns the current wall-clock time as milliseconds since UNIX_EPOCH.
///
/// Returns `None` if the system clock is set before the epoch. Wall-clock
/// time is only used for cross-peer ping timestamps; local elapsed-time
/// measurements should prefer the monotonic `web_time::Instant`.
#[must_use]
pub fn millis_since_epoch() -> Option<u128> {
    web_time::SystemTime::now()
        .duration_since(web_time::SystemTime::UNIX_EPOCH)
        .ok()
        .map(|duration| duration.as_millis())
}

// #########
// # TESTS #
// #########
