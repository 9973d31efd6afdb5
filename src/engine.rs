//! The rollback engine: ticking, prediction, correction, resync and stall
//! decisions.
//!
//! ## How a session runs
//!
//! An external driver calls [`RollbackEngine::advance_frame`] once per
//! timestep with the local input. The engine builds the full input set for
//! the next frame, guessing the input of every remote participant whose true
//! input has not arrived (repeat-last-confirmed), steps the simulation, and
//! emits the local input through the injected [`MessageSender`].
//!
//! Asynchronously, the transport delivers remote messages into
//! [`RollbackEngine::handle_message`]. When a remote input contradicts an
//! earlier guess, the engine truncates history from the mispredicted frame
//! and resimulates forward with the corrected input. When a correction
//! targets a frame older than the retained window, the divergence is
//! unrecoverable locally and is surfaced as a desync, never as a crash.
//!
//! All three entry points mutate the same history and must never run
//! concurrently; [`SharedEngine`] funnels them through one lock for callers
//! with real threads.

use std::collections::vec_deque::Drain;
use std::collections::{BTreeMap, VecDeque};
use std::iter::FusedIterator;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use web_time::Duration;

use crate::codec;
use crate::history::{HistoryBuffer, HistoryEntry, InputRecord, PlayerInputs};
use crate::latency::LatencyEstimator;
use crate::messages::{millis_since_epoch, Message};
use crate::participant::ParticipantRegistry;
use crate::{Config, Frame, NetplayError, PlayerHandle, Simulation};

/// Fire-and-forget outbound message capability, injected at construction.
///
/// Implementations must not block; the engine calls `send` from inside its
/// tick. Any `FnMut(Message<T>) + Send` closure qualifies:
///
/// ```
/// # use netplay_rollback::{Config, Message, MessageSender, PlayerInputs, Simulation};
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
/// let (tx, _rx) = std::sync::mpsc::channel::<Message<C>>();
/// let sender = move |message| {
///     let _ = tx.send(message);
/// };
/// fn assert_sender<T: Config, S: MessageSender<T>>(_: S) {}
/// assert_sender::<C, _>(sender);
/// ```
pub trait MessageSender<T: Config>: Send {
    /// Hands one outbound message to the transport.
    fn send(&mut self, message: Message<T>);
}

impl<T: Config, F> MessageSender<T> for F
where
    F: FnMut(Message<T>) + Send,
{
    fn send(&mut self, message: Message<T>) {
        self(message);
    }
}

/// Notifications the engine queues for the driver. Handling them is up to the
/// user; drain them via [`RollbackEngine::events`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NetplayEvent {
    /// A misprediction was corrected: history was truncated at
    /// `first_incorrect` and `resimulated` frames were recomputed.
    RolledBack {
        /// The first frame whose inputs were wrong.
        first_incorrect: Frame,
        /// Number of frames recomputed.
        resimulated: usize,
    },
    /// A correction arrived for a frame older than the retained history; the
    /// local simulation has provably diverged and cannot self-heal.
    DesyncDetected {
        /// The frame the correction targeted.
        frame: Frame,
        /// The oldest frame still retained.
        oldest_retained: Frame,
    },
    /// An authoritative snapshot rebaselined the given frame.
    StateResync {
        /// The rebaselined frame.
        frame: Frame,
    },
    /// A remote input beyond the pending-input cap was dropped.
    PendingInputDropped {
        /// The frame of the dropped input.
        frame: Frame,
        /// The participant the input belonged to.
        handle: PlayerHandle,
    },
}

/// A zero-allocation opaque iterator that drains queued [`NetplayEvent`]s.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct EventDrain<'a> {
    inner: Drain<'a, NetplayEvent>,
}

impl Iterator for EventDrain<'_> {
    type Item = NetplayEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for EventDrain<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl ExactSizeIterator for EventDrain<'_> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl FusedIterator for EventDrain<'_> {}

/// Counters describing the engine's behavior so far, plus the current
/// round-trip estimate.
///
/// Mispredictions and rollbacks are normal operation, not errors; stale
/// corrections are the diagnosable desync signal.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[must_use = "EngineStats should be inspected or used after being queried"]
pub struct EngineStats {
    /// Rollback/resimulation passes performed.
    pub rollbacks: u64,
    /// Total frames recomputed across all rollbacks and resyncs.
    pub resimulated_frames: u64,
    /// Predicted inputs that turned out wrong.
    pub mispredictions: u64,
    /// Predicted inputs confirmed (right or wrong).
    pub confirmations: u64,
    /// Authoritative snapshots applied.
    pub state_resyncs: u64,
    /// Corrections that arrived too late to apply (desync signal).
    pub stale_corrections: u64,
    /// Far-future remote inputs dropped by the pending-input cap.
    pub dropped_pending_inputs: u64,
    /// Messages dropped because they could not be decoded or referenced
    /// impossible frames.
    pub malformed_messages: u64,
    /// Round-trip mean estimate in milliseconds.
    pub rtt_mean_ms: f64,
    /// Round-trip standard deviation estimate in milliseconds.
    pub rtt_stddev_ms: f64,
}

/// The rollback synchronization core.
///
/// Owns the bounded input/state [`HistoryBuffer`], the pending-remote-input
/// store, and the [`LatencyEstimator`]. Created through
/// [`EngineBuilder`](crate::EngineBuilder); lives for the session's duration.
///
/// # Concurrency
///
/// `advance_frame`, `on_remote_input` and `on_state_sync` take `&mut self`
/// and must be serialized by the caller (or use [`SharedEngine`]); each runs
/// to completion before the next begins. No entry point blocks on I/O:
/// outbound sends are fire-and-forget, inbound messages arrive as discrete
/// already-decoded events. `advance_frame` is O(`max_predicted_frames`) in
/// the worst case (full resimulation).
pub struct RollbackEngine<T>
where
    T: Config,
{
    registry: ParticipantRegistry,
    local_handle: PlayerHandle,
    authoritative: bool,
    current_frame: Frame,
    history: HistoryBuffer<T>,
    /// Remote inputs for frames we have not simulated yet, reconciled into
    /// the history entry once created.
    pending: BTreeMap<Frame, BTreeMap<PlayerHandle, T::Input>>,
    latency: LatencyEstimator,
    stats: EngineStats,
    events: VecDeque<NetplayEvent>,
    sender: Box<dyn MessageSender<T>>,
    max_predicted_frames: usize,
    timestep: Duration,
    state_sync_interval: i32,
    ping_interval: i32,
}

impl<T: Config> std::fmt::Debug for RollbackEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackEngine")
            .field("local_handle", &self.local_handle)
            .field("authoritative", &self.authoritative)
            .field("current_frame", &self.current_frame)
            .field("history_len", &self.history.len())
            .field("pending_frames", &self.pending.len())
            .field("max_predicted_frames", &self.max_predicted_frames)
            .finish_non_exhaustive()
    }
}

impl<T: Config> RollbackEngine<T> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        registry: ParticipantRegistry,
        initial_state: T::State,
        initial_inputs: PlayerInputs<T::Input>,
        max_predicted_frames: usize,
        state_sync_interval: i32,
        ping_interval: i32,
        latency: LatencyEstimator,
        sender: Box<dyn MessageSender<T>>,
    ) -> Result<Self, NetplayError> {
        let local_handle = registry.local_handle();
        let authoritative = registry.local_is_authoritative();
        let mut history = HistoryBuffer::new();
        history.append(HistoryEntry {
            frame: Frame::new(0),
            state: initial_state,
            inputs: initial_inputs,
        })?;
        Ok(Self {
            registry,
            local_handle,
            authoritative,
            current_frame: Frame::new(0),
            history,
            pending: BTreeMap::new(),
            latency,
            stats: EngineStats::default(),
            events: VecDeque::new(),
            sender,
            max_predicted_frames,
            timestep: T::State::timestep(),
            state_sync_interval,
            ping_interval,
        })
    }

    /// Advances the simulation by one frame with the local participant's
    /// input.
    ///
    /// Builds the full input set for the next frame (confirmed local input,
    /// pending remote inputs where they already arrived, repeat-last
    /// predictions otherwise), steps the simulation, appends the resulting
    /// entry, evicts history beyond the retention bound, and emits the local
    /// input. The authoritative peer additionally broadcasts a state snapshot
    /// on its configured cadence, and every peer emits a latency probe on
    /// its.
    ///
    /// # Errors
    ///
    /// Returns [`NetplayError::PredictionThreshold`] when
    /// [`should_stall`](Self::should_stall) is true; skip the tick and retry
    /// on the next pacing interval.
    pub fn advance_frame(&mut self, local_input: T::Input) -> Result<(), NetplayError> {
        if self.should_stall() {
            return Err(NetplayError::PredictionThreshold);
        }

        let next = self.current_frame + 1;
        let arrived = self.pending.remove(&next).unwrap_or_default();

        let mut inputs = PlayerInputs::new();
        inputs.insert(self.local_handle, InputRecord::confirmed(local_input));
        for handle in self.registry.remote_handles_iter() {
            match arrived.get(&handle) {
                Some(input) => inputs.insert(handle, InputRecord::confirmed(*input)),
                None => inputs.insert(handle, InputRecord::predicted(self.last_input_for(handle))),
            }
        }

        let state = match self.history.latest() {
            Some(tail) => tail.state.step(&inputs, self.timestep),
            None => {
                return Err(NetplayError::Internal {
                    context: "history empty during advance_frame".to_owned(),
                })
            }
        };
        self.history.append(HistoryEntry {
            frame: next,
            state,
            inputs,
        })?;
        self.current_frame = next;
        self.history
            .evict_oldest(self.max_predicted_frames.saturating_add(1));

        self.sender.send(Message::Input {
            frame: next,
            input: local_input,
        });
        if self.authoritative && next.as_i32() % self.state_sync_interval == 0 {
            if let Some(tail) = self.history.latest() {
                let state = tail.state.clone();
                self.sender.send(Message::State { frame: next, state });
            }
        }
        if next.as_i32() % self.ping_interval == 0 {
            match millis_since_epoch() {
                Some(sent_time) => self.sender.send(Message::PingRequest { sent_time }),
                None => trace!("skipping latency probe due to invalid system clock"),
            }
        }

        trace!(frame = next.as_i32(), "advanced frame");
        Ok(())
    }

    /// Ingests one remote participant's input for a frame.
    ///
    /// Future frames are buffered (bounded); frames already simulated either
    /// confirm the prediction in place or trigger a rollback when the guess
    /// was wrong.
    ///
    /// # Errors
    ///
    /// - [`NetplayError::InvalidPlayerHandle`] if `handle` is not a remote
    ///   participant of this session.
    /// - [`NetplayError::StaleCorrection`] if `frame` precedes the retained
    ///   history window; the desync is also counted and queued as an event,
    ///   and the driver loop may keep running.
    pub fn on_remote_input(
        &mut self,
        handle: PlayerHandle,
        frame: Frame,
        input: T::Input,
    ) -> Result<(), NetplayError> {
        if !self.registry.is_remote(handle) {
            return Err(NetplayError::InvalidPlayerHandle { handle });
        }
        if !frame.is_valid() {
            warn!(%frame, %handle, "dropping remote input with invalid frame");
            self.stats.malformed_messages += 1;
            return Ok(());
        }

        if frame > self.current_frame {
            // Not simulated yet; hold it until the tick reaches this frame.
            let cap = self.pending_cap();
            if frame > cap {
                warn!(
                    %frame,
                    %handle,
                    cap = cap.as_i32(),
                    "dropping remote input beyond the pending-input cap"
                );
                self.stats.dropped_pending_inputs += 1;
                self.events
                    .push_back(NetplayEvent::PendingInputDropped { frame, handle });
                return Ok(());
            }
            self.pending.entry(frame).or_default().insert(handle, input);
            return Ok(());
        }

        if frame < self.history.first_frame() {
            return self.report_stale(frame);
        }

        let mispredicted = {
            let Some(record) = self
                .history
                .entry_at_mut(frame)
                .and_then(|entry| entry.inputs.get_mut(handle))
            else {
                return Err(NetplayError::Internal {
                    context: format!("no input record for participant {handle} at frame {frame}"),
                });
            };
            if !record.is_prediction() {
                if record.input != input {
                    // A reliable ordered transport should never re-deliver a
                    // frame with different contents.
                    warn!(%frame, %handle, "conflicting duplicate for confirmed input; dropped");
                    self.stats.malformed_messages += 1;
                } else {
                    trace!(%frame, %handle, "duplicate confirmation");
                }
                return Ok(());
            }
            let mispredicted = record.input != input;
            record.input = input;
            record.status = crate::InputStatus::Confirmed;
            mispredicted
        };

        self.stats.confirmations += 1;
        if mispredicted {
            self.stats.mispredictions += 1;
            self.rollback_from(frame)?;
        }
        Ok(())
    }

    /// Applies an authoritative state snapshot (non-authoritative peers
    /// only).
    ///
    /// Replaces the history entry at `frame` with the authoritative state,
    /// treats that frame as a fully-confirmed baseline, and resimulates
    /// everything after it the same way a rollback does. This bounds drift
    /// accumulation; it is authoritative correction, not a substitute for
    /// input-based rollback.
    ///
    /// # Errors
    ///
    /// - [`NetplayError::InvalidRequest`] if this peer is authoritative.
    /// - [`NetplayError::StaleCorrection`] if `frame` precedes the retained
    ///   window (same desync path as stale inputs).
    pub fn on_state_sync(&mut self, frame: Frame, state: T::State) -> Result<(), NetplayError> {
        if self.authoritative {
            return Err(NetplayError::InvalidRequest {
                info: "authoritative peer received a state sync".to_owned(),
            });
        }
        if !frame.is_valid() {
            warn!(%frame, "dropping state sync with invalid frame");
            self.stats.malformed_messages += 1;
            return Ok(());
        }
        if frame > self.current_frame {
            // No entry to replace yet; the next periodic broadcast covers it.
            warn!(
                %frame,
                current = self.current_frame.as_i32(),
                "ignoring state sync ahead of local simulation"
            );
            return Ok(());
        }
        if frame < self.history.first_frame() {
            return self.report_stale(frame);
        }

        let removed = self.history.truncate_from(frame)?;
        let mut tail = removed.into_iter();
        let Some(mut baseline) = tail.next() else {
            return Err(NetplayError::Internal {
                context: format!("state sync found no entry at frame {frame}"),
            });
        };
        baseline.state = state;
        baseline.inputs.confirm_all();
        self.history.append(baseline)?;
        let resimulated = self.resimulate(tail)?;

        self.stats.state_resyncs += 1;
        self.stats.resimulated_frames += resimulated as u64;
        self.events.push_back(NetplayEvent::StateResync { frame });
        debug!(
            %frame,
            resimulated,
            "applied authoritative state sync"
        );
        Ok(())
    }

    /// Dispatches one decoded wire message from the transport.
    ///
    /// `from` identifies the connection the message arrived on. Ping probes
    /// are answered (or folded into the latency estimate) here; input and
    /// state messages forward to [`on_remote_input`](Self::on_remote_input)
    /// and [`on_state_sync`](Self::on_state_sync).
    pub fn handle_message(
        &mut self,
        from: PlayerHandle,
        message: Message<T>,
    ) -> Result<(), NetplayError> {
        match message {
            Message::Input { frame, input } => self.on_remote_input(from, frame, input),
            Message::State { frame, state } => self.on_state_sync(frame, state),
            Message::PingRequest { sent_time } => {
                self.sender.send(Message::PingReply { sent_time });
                Ok(())
            }
            Message::PingReply { sent_time } => {
                if let Some(now) = millis_since_epoch() {
                    let round_trip = now.saturating_sub(sent_time);
                    self.latency.update(round_trip as f64);
                }
                Ok(())
            }
        }
    }

    /// Decodes and dispatches one raw wire message.
    ///
    /// Malformed bytes are logged, counted and dropped; they are a network
    /// anomaly, not an error the driver loop needs to handle.
    pub fn handle_encoded_message(
        &mut self,
        from: PlayerHandle,
        bytes: &[u8],
    ) -> Result<(), NetplayError> {
        match codec::decode::<Message<T>>(bytes) {
            Ok(message) => self.handle_message(from, message),
            Err(err) => {
                warn!(%from, %err, "dropping malformed message");
                self.stats.malformed_messages += 1;
                Ok(())
            }
        }
    }

    /// Returns `true` when advancing one more tick would push the number of
    /// trailing still-unconfirmed frames beyond `max_predicted_frames`.
    ///
    /// When true, the external driver must skip `advance_frame` until remote
    /// confirmations catch up. This is the engine's sole flow-control
    /// mechanism: it reacts to actual unconfirmed depth, not to instantaneous
    /// ping.
    #[must_use]
    pub fn should_stall(&self) -> bool {
        let depth = self.history.predicted_frames();
        let after_tick = if depth > 0 {
            // Any new frame extends the speculative run, confirmed inputs or
            // not: its state builds on a provisional predecessor.
            depth + 1
        } else {
            let next = self.current_frame + 1;
            let next_confirmed = self.pending.get(&next).is_some_and(|bucket| {
                self.registry
                    .remote_handles_iter()
                    .all(|handle| bucket.contains_key(&handle))
            });
            usize::from(!next_confirmed)
        };
        after_tick > self.max_predicted_frames
    }

    /// Speculative depth: the number of history entries from the oldest
    /// still-predicted frame to the tail.
    ///
    /// Note this is not the count of frames whose own inputs are unconfirmed:
    /// a frame whose inputs all arrived still counts while any earlier frame
    /// is guessed, because its state builds on a provisional one. The stall
    /// policy bounds this depth.
    #[must_use]
    pub fn predicted_frames(&self) -> usize {
        self.history.predicted_frames()
    }

    /// Size of the largest per-frame bucket of pending remote inputs.
    ///
    /// Diagnostic: how far ahead remote messages are arriving.
    #[must_use]
    pub fn largest_future_size(&self) -> usize {
        self.pending.values().map(BTreeMap::len).max().unwrap_or(0)
    }

    /// The most recently simulated frame.
    #[must_use]
    pub fn current_frame(&self) -> Frame {
        self.current_frame
    }

    /// The current (speculative-so-far) simulation state, for rendering.
    #[must_use]
    pub fn current_state(&self) -> &T::State {
        match self.history.latest() {
            Some(entry) => &entry.state,
            // The constructor seeds frame 0 and eviction never removes the tail.
            None => unreachable!("history is never empty after construction"),
        }
    }

    /// Whether this peer broadcasts authoritative state.
    #[must_use]
    pub fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    /// The local participant's handle.
    #[must_use]
    pub fn local_handle(&self) -> PlayerHandle {
        self.local_handle
    }

    /// The session's participant registry.
    #[must_use]
    pub fn participants(&self) -> &ParticipantRegistry {
        &self.registry
    }

    /// The round-trip-time estimator fed by ping replies.
    #[must_use]
    pub fn latency(&self) -> &LatencyEstimator {
        &self.latency
    }

    /// Behavior counters plus the current round-trip estimate.
    pub fn stats(&self) -> EngineStats {
        let mut stats = self.stats;
        stats.rtt_mean_ms = self.latency.mean();
        stats.rtt_stddev_ms = self.latency.stddev();
        stats
    }

    /// Drains all queued [`NetplayEvent`]s.
    pub fn events(&mut self) -> EventDrain<'_> {
        EventDrain {
            inner: self.events.drain(..),
        }
    }

    /// Number of retained history entries (diagnostic).
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    // Newest future frame accepted into the pending store: twice the
    // speculative window ahead, saturating so an oversized window cannot
    // wrap the cap negative.
    fn pending_cap(&self) -> Frame {
        let span = i32::try_from(self.max_predicted_frames.saturating_mul(2)).unwrap_or(i32::MAX);
        Frame::new(self.current_frame.as_i32().saturating_add(span))
    }

    // The value used for `handle` at the current frame; predictions repeat
    // it forward.
    fn last_input_for(&self, handle: PlayerHandle) -> T::Input {
        self.history
            .latest()
            .and_then(|entry| entry.inputs.get(handle))
            .map_or_else(T::Input::default, |record| record.input)
    }

    /// Truncates history at `first_incorrect` (whose corrected input has
    /// already been written in place) and resimulates forward to the current
    /// frame.
    fn rollback_from(&mut self, first_incorrect: Frame) -> Result<(), NetplayError> {
        let removed = self.history.truncate_from(first_incorrect)?;
        let resimulated = self.resimulate(removed.into_iter())?;
        self.stats.rollbacks += 1;
        self.stats.resimulated_frames += resimulated as u64;
        self.events.push_back(NetplayEvent::RolledBack {
            first_incorrect,
            resimulated,
        });
        debug!(
            first_incorrect = first_incorrect.as_i32(),
            resimulated, "rolled back and resimulated"
        );
        Ok(())
    }

    /// Re-appends removed entries one by one, reusing confirmed inputs and
    /// re-deriving predictions (repeat-last) from the already-corrected
    /// predecessor, then restepping each state.
    fn resimulate(
        &mut self,
        removed: impl Iterator<Item = HistoryEntry<T>>,
    ) -> Result<usize, NetplayError> {
        let mut resimulated = 0;
        for entry in removed {
            let HistoryEntry {
                frame, mut inputs, ..
            } = entry;
            let state = {
                let Some(prev) = self.history.latest() else {
                    return Err(NetplayError::Internal {
                        context: format!("no pre-image state while resimulating frame {frame}"),
                    });
                };
                for (handle, record) in inputs.iter_mut() {
                    if record.is_prediction() {
                        if let Some(prev_record) = prev.inputs.get(*handle) {
                            record.input = prev_record.input;
                        }
                    }
                }
                prev.state.step(&inputs, self.timestep)
            };
            self.history.append(HistoryEntry {
                frame,
                state,
                inputs,
            })?;
            resimulated += 1;
        }
        Ok(resimulated)
    }

    fn report_stale(&mut self, frame: Frame) -> Result<(), NetplayError> {
        let oldest_retained = self.history.first_frame();
        warn!(
            %frame,
            %oldest_retained,
            "correction precedes retained history; local simulation has diverged"
        );
        self.stats.stale_corrections += 1;
        self.events.push_back(NetplayEvent::DesyncDetected {
            frame,
            oldest_retained,
        });
        Err(NetplayError::StaleCorrection {
            frame,
            oldest_retained,
        })
    }
}

/// An engine behind a single mutual-exclusion boundary.
///
/// The three entry points (`advance_frame`, `on_remote_input`,
/// `on_state_sync`) mutate shared history, so in environments with real
/// OS-level concurrency they must be funneled through one serialization
/// point. `SharedEngine` is that point: a cheaply clonable handle whose
/// methods lock, run the operation to completion, and unlock.
pub struct SharedEngine<T>
where
    T: Config,
{
    inner: Arc<Mutex<RollbackEngine<T>>>,
}

impl<T: Config> Clone for SharedEngine<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Config> std::fmt::Debug for SharedEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEngine").finish_non_exhaustive()
    }
}

impl<T: Config> SharedEngine<T> {
    /// Wraps an engine in its serialization boundary.
    #[must_use]
    pub fn new(engine: RollbackEngine<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// See [`RollbackEngine::advance_frame`].
    pub fn advance_frame(&self, local_input: T::Input) -> Result<(), NetplayError> {
        self.inner.lock().advance_frame(local_input)
    }

    /// See [`RollbackEngine::on_remote_input`].
    pub fn on_remote_input(
        &self,
        handle: PlayerHandle,
        frame: Frame,
        input: T::Input,
    ) -> Result<(), NetplayError> {
        self.inner.lock().on_remote_input(handle, frame, input)
    }

    /// See [`RollbackEngine::on_state_sync`].
    pub fn on_state_sync(&self, frame: Frame, state: T::State) -> Result<(), NetplayError> {
        self.inner.lock().on_state_sync(frame, state)
    }

    /// See [`RollbackEngine::handle_message`].
    pub fn handle_message(&self, from: PlayerHandle, message: Message<T>) -> Result<(), NetplayError> {
        self.inner.lock().handle_message(from, message)
    }

    /// See [`RollbackEngine::handle_encoded_message`].
    pub fn handle_encoded_message(
        &self,
        from: PlayerHandle,
        bytes: &[u8],
    ) -> Result<(), NetplayError> {
        self.inner.lock().handle_encoded_message(from, bytes)
    }

    /// See [`RollbackEngine::should_stall`].
    #[must_use]
    pub fn should_stall(&self) -> bool {
        self.inner.lock().should_stall()
    }

    /// See [`RollbackEngine::current_frame`].
    #[must_use]
    pub fn current_frame(&self) -> Frame {
        self.inner.lock().current_frame()
    }

    /// A clone of the current state (the lock cannot escape, so the state is
    /// copied out for rendering).
    #[must_use]
    pub fn state_snapshot(&self) -> T::State {
        self.inner.lock().current_state().clone()
    }

    /// See [`RollbackEngine::stats`].
    pub fn stats(&self) -> EngineStats {
        self.inner.lock().stats()
    }

    /// Runs `f` with exclusive access to the engine, for compound queries
    /// (e.g. draining events) under a single lock acquisition.
    pub fn with<R>(&self, f: impl FnOnce(&mut RollbackEngine<T>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

// #########
// # TESTS #
// #########
