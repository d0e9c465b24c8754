//! Integration tests for the LRU-K replacer

use arbor::buffer::LruKReplacer;
use arbor::common::FrameId;

#[test]
fn test_lru_k_eviction_order() {
    let replacer = LruKReplacer::new(2, 10);

    for i in 0..5 {
        replacer.record_access(FrameId::new(i));
        replacer.set_evictable(FrameId::new(i), true);
    }

    assert_eq!(replacer.size(), 5);

    // All frames have a single access (< k=2), so all are infinitely
    // distant and leave in order of first access.
    for i in 0..5 {
        assert_eq!(replacer.evict(), Some(FrameId::new(i)));
    }

    assert_eq!(replacer.size(), 0);
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_lru_k_cold_then_warm_scenario() {
    let replacer = LruKReplacer::new(2, 7);

    // First touch for frames 1..=6.
    for i in 1..=6 {
        replacer.record_access(FrameId::new(i));
    }
    for i in 1..=6 {
        replacer.set_evictable(FrameId::new(i), true);
    }
    assert_eq!(replacer.size(), 6);

    // Second touch for frames 1..=4 only; 5 and 6 stay cold.
    for i in 1..=4 {
        replacer.record_access(FrameId::new(i));
    }

    // Cold frames go first, oldest first touch breaking the tie...
    assert_eq!(replacer.evict(), Some(FrameId::new(5)));
    assert_eq!(replacer.evict(), Some(FrameId::new(6)));

    // ...then the warm frames by the age of their oldest retained access.
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    assert_eq!(replacer.evict(), Some(FrameId::new(3)));
    assert_eq!(replacer.evict(), Some(FrameId::new(4)));
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_lru_k_unknown_frame_operations_are_noops() {
    let replacer = LruKReplacer::new(2, 3);

    // Neither toggling nor removing an untracked frame does anything.
    replacer.set_evictable(FrameId::new(9), true);
    replacer.remove(FrameId::new(9));
    assert_eq!(replacer.size(), 0);

    // Fill the tracked set; further unknown frames are dropped silently.
    for i in 0..3 {
        replacer.record_access(FrameId::new(i));
    }
    replacer.record_access(FrameId::new(9));
    replacer.set_evictable(FrameId::new(9), true);
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_lru_k_pinned_frame_never_wins() {
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(FrameId::new(0));
    replacer.record_access(FrameId::new(1));
    replacer.set_evictable(FrameId::new(0), true);
    replacer.set_evictable(FrameId::new(1), true);

    // Frame 0 would be the natural victim; pinning it diverts eviction.
    replacer.set_evictable(FrameId::new(0), false);
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), None);

    replacer.set_evictable(FrameId::new(0), true);
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
}

#[test]
fn test_lru_k_size_tracks_evictable_only() {
    let replacer = LruKReplacer::new(2, 10);

    for i in 0..4 {
        replacer.record_access(FrameId::new(i));
    }
    assert_eq!(replacer.size(), 0);

    replacer.set_evictable(FrameId::new(0), true);
    replacer.set_evictable(FrameId::new(1), true);
    assert_eq!(replacer.size(), 2);

    replacer.set_evictable(FrameId::new(1), false);
    assert_eq!(replacer.size(), 1);

    replacer.remove(FrameId::new(0));
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_lru_k_warm_frames_by_kth_recent_access() {
    let replacer = LruKReplacer::new(2, 10);

    // Frame 0: t=0, t=1. Frame 1: t=2, t=3. Frame 2: t=4, t=5.
    for i in 0..3 {
        replacer.record_access(FrameId::new(i));
        replacer.record_access(FrameId::new(i));
    }
    for i in 0..3 {
        replacer.set_evictable(FrameId::new(i), true);
    }

    // All warm; the oldest second-most-recent access loses.
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
}

#[test]
fn test_lru_k_history_truncated_to_k() {
    let replacer = LruKReplacer::new(2, 10);

    for _ in 0..10 {
        replacer.record_access(FrameId::new(0));
    }
    replacer.record_access(FrameId::new(1));
    replacer.record_access(FrameId::new(1));

    replacer.set_evictable(FrameId::new(0), true);
    replacer.set_evictable(FrameId::new(1), true);

    // Frame 0 keeps only its two latest accesses, which are still older
    // than frame 1's.
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
}

#[test]
fn test_lru_k_concurrent_access() {
    use std::sync::Arc;
    use std::thread;

    let replacer = Arc::new(LruKReplacer::new(2, 100));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let replacer = Arc::clone(&replacer);
            thread::spawn(move || {
                for i in 0..25 {
                    let frame_id = FrameId::new((t * 25 + i) as u32);
                    replacer.record_access(frame_id);
                    replacer.set_evictable(frame_id, true);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(replacer.size(), 100);

    for _ in 0..100 {
        assert!(replacer.evict().is_some());
    }
    assert_eq!(replacer.size(), 0);
}
