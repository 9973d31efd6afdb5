//! Frame-indexed input and state history.
//!
//! The [`HistoryBuffer`] is a bounded, contiguous sequence of simulation
//! snapshots plus the per-participant inputs used to produce each one, tagged
//! confirmed or predicted. It is owned exclusively by the engine; no external
//! caller ever mutates it.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::collections::VecDeque;

use crate::{Config, Frame, InputStatus, NetplayError, PlayerHandle};

/// One participant's input for one frame, tagged with whether it was guessed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InputRecord<I> {
    /// The input value.
    pub input: I,
    /// Confirmed (received/local) or predicted (repeat of the last known
    /// value).
    pub status: InputStatus,
}

impl<I> InputRecord<I> {
    /// A confirmed input record.
    #[must_use]
    pub const fn confirmed(input: I) -> Self {
        Self {
            input,
            status: InputStatus::Confirmed,
        }
    }

    /// A predicted input record.
    #[must_use]
    pub const fn predicted(input: I) -> Self {
        Self {
            input,
            status: InputStatus::Predicted,
        }
    }

    /// Returns `true` if this record is a prediction.
    #[inline]
    #[must_use]
    pub const fn is_prediction(&self) -> bool {
        self.status.is_prediction()
    }
}

/// The full input set for a single frame: one [`InputRecord`] per
/// participant.
///
/// Backed by a `BTreeMap` so iteration order is deterministic across peers;
/// a simulation stepping over these inputs sees them in handle order on every
/// machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInputs<I> {
    records: BTreeMap<PlayerHandle, InputRecord<I>>,
}

impl<I> Default for PlayerInputs<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> PlayerInputs<I> {
    /// Creates an empty input set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Inserts or replaces the record for `handle`.
    pub fn insert(&mut self, handle: PlayerHandle, record: InputRecord<I>) {
        self.records.insert(handle, record);
    }

    /// The record for `handle`, if present.
    #[must_use]
    pub fn get(&self, handle: PlayerHandle) -> Option<&InputRecord<I>> {
        self.records.get(&handle)
    }

    /// Mutable access to the record for `handle`, if present.
    pub fn get_mut(&mut self, handle: PlayerHandle) -> Option<&mut InputRecord<I>> {
        self.records.get_mut(&handle)
    }

    /// Iterates records in handle order.
    pub fn iter(&self) -> btree_map::Iter<'_, PlayerHandle, InputRecord<I>> {
        self.records.iter()
    }

    /// Iterates records mutably in handle order.
    pub fn iter_mut(&mut self) -> btree_map::IterMut<'_, PlayerHandle, InputRecord<I>> {
        self.records.iter_mut()
    }

    /// Number of participant records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no records are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns `true` if any participant's record is still a prediction.
    #[must_use]
    pub fn has_prediction(&self) -> bool {
        self.records.values().any(InputRecord::is_prediction)
    }

    /// Marks every record confirmed, keeping the stored values.
    ///
    /// Used when an authoritative snapshot rebaselines a frame.
    pub fn confirm_all(&mut self) {
        for record in self.records.values_mut() {
            record.status = InputStatus::Confirmed;
        }
    }
}

impl<'a, I> IntoIterator for &'a PlayerInputs<I> {
    type Item = (&'a PlayerHandle, &'a InputRecord<I>);
    type IntoIter = btree_map::Iter<'a, PlayerHandle, InputRecord<I>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// One simulated frame: the resulting state and the inputs that produced it.
///
/// Invariant: `state` is the result of applying `inputs` to the previous
/// entry's state via the deterministic step function.
#[derive(Clone)]
pub struct HistoryEntry<T>
where
    T: Config,
{
    /// The frame this entry belongs to.
    pub frame: Frame,
    /// The simulation state *after* stepping with `inputs`.
    pub state: T::State,
    /// The per-participant inputs used to produce `state`.
    pub inputs: PlayerInputs<T::Input>,
}

/// Bounded, contiguous, frame-indexed sequence of [`HistoryEntry`]s.
///
/// Entries form a contiguous increasing run of frame numbers with no gaps.
/// The head is evicted as frames confirm; the entry immediately preceding the
/// oldest prediction is always retained so a rollback can resimulate from its
/// state.
#[derive(Clone)]
pub struct HistoryBuffer<T>
where
    T: Config,
{
    entries: VecDeque<HistoryEntry<T>>,
}

impl<T: Config> std::fmt::Debug for HistoryEntry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryEntry")
            .field("frame", &self.frame)
            .field("inputs", &self.inputs)
            .finish_non_exhaustive()
    }
}

impl<T: Config> std::fmt::Debug for HistoryBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryBuffer")
            .field("entries", &self.entries)
            .finish()
    }
}

impl<T: Config> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Config> HistoryBuffer<T> {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The oldest retained frame, or [`Frame::NULL`] when empty.
    #[must_use]
    pub fn first_frame(&self) -> Frame {
        self.entries.front().map_or(Frame::NULL, |e| e.frame)
    }

    /// The newest retained frame, or [`Frame::NULL`] when empty.
    #[must_use]
    pub fn last_frame(&self) -> Frame {
        self.entries.back().map_or(Frame::NULL, |e| e.frame)
    }

    /// The newest retained entry.
    #[must_use]
    pub fn latest(&self) -> Option<&HistoryEntry<T>> {
        self.entries.back()
    }

    /// Adds the next contiguous entry.
    ///
    /// # Errors
    ///
    /// Returns [`NetplayError::Internal`] if `entry.frame` is not exactly one
    /// greater than the current tail (or not a valid frame on an empty
    /// buffer); a gap here is an engine bug, not a network condition.
    pub fn append(&mut self, entry: HistoryEntry<T>) -> Result<(), NetplayError> {
        if !entry.frame.is_valid() {
            return Err(NetplayError::Internal {
                context: format!("history append with invalid frame {}", entry.frame),
            });
        }
        if let Some(tail) = self.entries.back() {
            if entry.frame != tail.frame + 1 {
                return Err(NetplayError::Internal {
                    context: format!(
                        "non-contiguous history append: tail is {}, got {}",
                        tail.frame, entry.frame
                    ),
                });
            }
        }
        self.entries.push_back(entry);
        Ok(())
    }

    /// The entry for `frame`, if retained.
    #[must_use]
    pub fn entry_at(&self, frame: Frame) -> Option<&HistoryEntry<T>> {
        let index = self.index_of(frame)?;
        self.entries.get(index)
    }

    /// Mutable access to the entry for `frame`, if retained.
    pub fn entry_at_mut(&mut self, frame: Frame) -> Option<&mut HistoryEntry<T>> {
        let index = self.index_of(frame)?;
        self.entries.get_mut(index)
    }

    /// Removes and returns all entries with frame number >= `frame`,
    /// preserving order. Used before resimulation.
    ///
    /// # Errors
    ///
    /// Returns [`NetplayError::StaleCorrection`] if `frame` precedes the
    /// oldest retained entry: the pre-image state needed to resimulate is
    /// gone.
    pub fn truncate_from(&mut self, frame: Frame) -> Result<Vec<HistoryEntry<T>>, NetplayError> {
        let first = self.first_frame();
        if self.entries.is_empty() || frame < first {
            return Err(NetplayError::StaleCorrection {
                frame,
                oldest_retained: first,
            });
        }
        if frame > self.last_frame() {
            return Ok(Vec::new());
        }
        let keep = (frame - first) as usize;
        Ok(self.entries.split_off(keep).into())
    }

    /// The oldest frame whose entry still contains a prediction for any
    /// participant.
    #[must_use]
    pub fn oldest_predicted_frame(&self) -> Option<Frame> {
        self.entries
            .iter()
            .find(|e| e.inputs.has_prediction())
            .map(|e| e.frame)
    }

    /// Speculative depth: the number of entries from the oldest prediction
    /// to the tail, inclusive.
    ///
    /// Entries after the oldest prediction count even when their own inputs
    /// are confirmed; their states were computed on top of a guessed state
    /// and remain provisional until the guess confirms. This can therefore
    /// exceed the number of entries that actually contain a `Predicted`
    /// record (a confirmed-input frame sandwiched between predictions counts
    /// here but not there).
    #[must_use]
    pub fn predicted_frames(&self) -> usize {
        match self.oldest_predicted_frame() {
            Some(frame) => (self.last_frame() - frame) as usize + 1,
            None => 0,
        }
    }

    /// Drops head entries until `len <= max_len`, but never evicts the entry
    /// immediately preceding the oldest prediction (its state is the rollback
    /// pre-image) and never evicts the tail.
    pub fn evict_oldest(&mut self, max_len: usize) {
        // Everything up to (exclusive) this frame is safe to drop.
        let limit = match self.oldest_predicted_frame() {
            Some(frame) => frame - 1,
            None => self.last_frame(),
        };
        while self.entries.len() > max_len.max(1) {
            match self.entries.front() {
                Some(head) if head.frame < limit => {
                    self.entries.pop_front();
                }
                _ => break,
            }
        }
    }

    /// Iterates retained entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry<T>> {
        self.entries.iter()
    }

    fn index_of(&self, frame: Frame) -> Option<usize> {
        let first = self.first_frame();
        if self.entries.is_empty() || frame < first || frame > self.last_frame() {
            return None;
        }
        Some((frame - first) as usize)
    }
}

// #########
// # TESTS #
// #########

#[cfg(test)]
mod history_tests {
    use super::*;
    use crate::Simulation;
    use serde::{Deserialize, Serialize};
    use web_time::Duration;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Counter(i64);

    impl Simulation<u8> for Counter {
        fn initial() -> Self {
            Counter(0)
        }

        fn timestep() -> Duration {
            Duration::from_millis(16)
        }

        fn step(&self, inputs: &PlayerInputs<u8>, _dt: Duration) -> Self {
            let sum: i64 = inputs.iter().map(|(_, r)| i64::from(r.input)).sum();
            Counter(self.0 + sum)
        }
    }

    struct TestConfig;
    impl Config for TestConfig {
        type Input = u8;
        type State = Counter;
    }

    fn entry(frame: i32, predicted: bool) -> HistoryEntry<TestConfig> {
        let mut inputs = PlayerInputs::new();
        inputs.insert(PlayerHandle::new(0), InputRecord::confirmed(1));
        let remote = if predicted {
            InputRecord::predicted(0)
        } else {
            InputRecord::confirmed(0)
        };
        inputs.insert(PlayerHandle::new(1), remote);
        HistoryEntry {
            frame: Frame::new(frame),
            state: Counter(i64::from(frame)),
            inputs,
        }
    }

    #[test]
    fn append_contiguous_frames() {
        let mut buffer = HistoryBuffer::<TestConfig>::new();
        buffer.append(entry(0, false)).unwrap();
        buffer.append(entry(1, false)).unwrap();
        buffer.append(entry(2, true)).unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.first_frame(), Frame::new(0));
        assert_eq!(buffer.last_frame(), Frame::new(2));
    }

    #[test]
    fn append_rejects_gap() {
        let mut buffer = HistoryBuffer::<TestConfig>::new();
        buffer.append(entry(0, false)).unwrap();
        let result = buffer.append(entry(2, false));
        assert!(matches!(result, Err(NetplayError::Internal { .. })));
    }

    #[test]
    fn append_rejects_null_frame() {
        let mut buffer = HistoryBuffer::<TestConfig>::new();
        let result = buffer.append(entry(-1, false));
        assert!(matches!(result, Err(NetplayError::Internal { .. })));
    }

    #[test]
    fn entry_lookup() {
        let mut buffer = HistoryBuffer::<TestConfig>::new();
        for frame in 0..5 {
            buffer.append(entry(frame, false)).unwrap();
        }
        assert_eq!(buffer.entry_at(Frame::new(3)).unwrap().state, Counter(3));
        assert!(buffer.entry_at(Frame::new(5)).is_none());
        assert!(buffer.entry_at(Frame::new(-1)).is_none());

        buffer.entry_at_mut(Frame::new(3)).unwrap().state = Counter(99);
        assert_eq!(buffer.entry_at(Frame::new(3)).unwrap().state, Counter(99));
    }

    #[test]
    fn truncate_from_returns_tail() {
        let mut buffer = HistoryBuffer::<TestConfig>::new();
        for frame in 0..6 {
            buffer.append(entry(frame, false)).unwrap();
        }
        let removed = buffer.truncate_from(Frame::new(4)).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].frame, Frame::new(4));
        assert_eq!(buffer.last_frame(), Frame::new(3));
        // Appending the next contiguous frame works again.
        buffer.append(entry(4, false)).unwrap();
    }

    #[test]
    fn truncate_from_past_tail_is_empty() {
        let mut buffer = HistoryBuffer::<TestConfig>::new();
        buffer.append(entry(0, false)).unwrap();
        let removed = buffer.truncate_from(Frame::new(5)).unwrap();
        assert!(removed.is_empty());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn truncate_before_head_is_stale() {
        let mut buffer = HistoryBuffer::<TestConfig>::new();
        for frame in 3..6 {
            buffer.append(entry(frame, false)).unwrap();
        }
        let result = buffer.truncate_from(Frame::new(1));
        assert!(matches!(
            result,
            Err(NetplayError::StaleCorrection {
                oldest_retained, ..
            }) if oldest_retained == Frame::new(3)
        ));
    }

    #[test]
    fn evict_respects_bound_when_confirmed() {
        let mut buffer = HistoryBuffer::<TestConfig>::new();
        for frame in 0..8 {
            buffer.append(entry(frame, false)).unwrap();
        }
        buffer.evict_oldest(3);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.first_frame(), Frame::new(5));
    }

    #[test]
    fn evict_keeps_rollback_pre_image() {
        let mut buffer = HistoryBuffer::<TestConfig>::new();
        buffer.append(entry(0, false)).unwrap();
        buffer.append(entry(1, false)).unwrap();
        // Frames 2.. are still predictions; frame 1 is their pre-image.
        for frame in 2..8 {
            buffer.append(entry(frame, true)).unwrap();
        }
        buffer.evict_oldest(3);
        // Only frame 0 may go: frame 1 precedes the oldest prediction.
        assert_eq!(buffer.first_frame(), Frame::new(1));
        assert_eq!(buffer.oldest_predicted_frame(), Some(Frame::new(2)));
    }

    #[test]
    fn evict_never_removes_tail() {
        let mut buffer = HistoryBuffer::<TestConfig>::new();
        buffer.append(entry(0, false)).unwrap();
        buffer.evict_oldest(0);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn predicted_frames_measures_depth_from_oldest_prediction() {
        let mut buffer = HistoryBuffer::<TestConfig>::new();
        buffer.append(entry(0, false)).unwrap();
        buffer.append(entry(1, true)).unwrap();
        buffer.append(entry(2, false)).unwrap();
        buffer.append(entry(3, true)).unwrap();
        buffer.append(entry(4, true)).unwrap();
        // Frame 2 is confirmed but sits atop predicted frame 1, so frames
        // 1..=4 are all speculative.
        assert_eq!(buffer.predicted_frames(), 4);
        assert_eq!(buffer.oldest_predicted_frame(), Some(Frame::new(1)));
    }

    #[test]
    fn predicted_frames_is_zero_when_fully_confirmed() {
        let mut buffer = HistoryBuffer::<TestConfig>::new();
        for frame in 0..4 {
            buffer.append(entry(frame, false)).unwrap();
        }
        assert_eq!(buffer.predicted_frames(), 0);
        assert_eq!(buffer.oldest_predicted_frame(), None);
    }

    #[test]
    fn confirm_all_clears_predictions() {
        let mut inputs = PlayerInputs::new();
        inputs.insert(PlayerHandle::new(0), InputRecord::predicted(7u8));
        inputs.insert(PlayerHandle::new(1), InputRecord::confirmed(3u8));
        assert!(inputs.has_prediction());
        inputs.confirm_all();
        assert!(!inputs.has_prediction());
        assert_eq!(inputs.get(PlayerHandle::new(0)).unwrap().input, 7);
    }
}
