use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Access history for a single tracked frame.
///
/// The history holds at most `k` timestamps, oldest at the front. A frame
/// with fewer than `k` recorded accesses has infinite backward k-distance.
#[derive(Debug)]
struct FrameRecord {
    history: VecDeque<Timestamp>,
    evictable: bool,
}

impl FrameRecord {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            evictable: false,
        }
    }

    fn record_access(&mut self, timestamp: Timestamp, k: usize) {
        if self.history.len() == k {
            self.history.pop_front();
        }
        self.history.push_back(timestamp);
    }

    fn oldest(&self) -> Timestamp {
        *self.history.front().expect("frame record with empty history")
    }
}

/// Everything the replacer mutates, guarded by a single mutex.
struct ReplacerState {
    frames: HashMap<FrameId, FrameRecord>,
    /// Number of frames currently marked evictable
    curr_size: usize,
    /// Monotonic logical clock, bumped on every recorded access
    current_timestamp: Timestamp,
}

/// LRU-K replacement policy.
///
/// The replacer evicts the evictable frame with the largest backward
/// k-distance: frames with fewer than `k` recorded accesses count as
/// infinitely distant and are preferred victims; ties (and the choice
/// among frames with a full history) are broken by the oldest recorded
/// timestamp, so cold frames leave in arrival order and warm frames by
/// the age of their k-th most recent access.
pub struct LruKReplacer {
    k: usize,
    /// Maximum number of frames the replacer will track
    capacity: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a replacer tracking at most `capacity` frames with history depth `k`.
    pub fn new(k: usize, capacity: usize) -> Self {
        assert!(k > 0, "LRU-K requires k > 0");
        Self {
            k,
            capacity,
            state: Mutex::new(ReplacerState {
                frames: HashMap::new(),
                curr_size: 0,
                current_timestamp: 0,
            }),
        }
    }

    /// Records an access to `frame_id` at the next logical timestamp.
    ///
    /// Unknown frames are admitted with `evictable = false`; if the tracked
    /// set is already at capacity the event is silently dropped.
    pub fn record_access(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if !state.frames.contains_key(&frame_id) && state.frames.len() == self.capacity {
            return;
        }
        let timestamp = state.current_timestamp;
        state.current_timestamp += 1;
        state
            .frames
            .entry(frame_id)
            .or_insert_with(FrameRecord::new)
            .record_access(timestamp, self.k);
    }

    /// Marks a frame evictable or pinned. No-op for unknown frames.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if let Some(record) = state.frames.get_mut(&frame_id) {
            if record.evictable != evictable {
                record.evictable = evictable;
                if evictable {
                    state.curr_size += 1;
                } else {
                    state.curr_size -= 1;
                }
            }
        }
    }

    /// Drops a frame's record entirely. No-op if the frame is unknown or
    /// not evictable (callers release pins before removing).
    pub fn remove(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        let removable = matches!(state.frames.get(&frame_id), Some(record) if record.evictable);
        if removable {
            state.frames.remove(&frame_id);
            state.curr_size -= 1;
        }
    }

    /// Evicts the frame with the largest backward k-distance, or `None`
    /// if no frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        let mut victim: Option<FrameId> = None;
        for (&frame_id, record) in state.frames.iter() {
            if !record.evictable {
                continue;
            }
            match victim {
                None => victim = Some(frame_id),
                Some(best) => {
                    if self.beats(record, &state.frames[&best]) {
                        victim = Some(frame_id);
                    }
                }
            }
        }

        if let Some(frame_id) = victim {
            state.frames.remove(&frame_id);
            state.curr_size -= 1;
        }
        victim
    }

    /// Returns true if candidate `s` is a better victim than `t`.
    fn beats(&self, s: &FrameRecord, t: &FrameRecord) -> bool {
        if s.history.len() < self.k && t.history.len() == self.k {
            return true;
        }
        if s.history.len() == self.k && t.history.len() < self.k {
            return false;
        }
        s.oldest() < t.oldest()
    }

    /// Returns the number of evictable frames (not the number tracked).
    pub fn size(&self) -> usize {
        self.state.lock().curr_size
    }

    /// Returns the k value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }
}
