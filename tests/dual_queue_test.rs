/*!
 * Double-Buffered Queue Tests
 * Capacity, swap and FIFO behavior across writer threads
 */

use cothread::{DoubleBufferedQueue, SwapOutcome};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_push_rejects_when_write_region_full() {
    let queue = DoubleBufferedQueue::new(2);
    assert!(queue.push(1).is_ok());
    assert!(queue.push(2).is_ok());
    assert_eq!(queue.push(3), Err(3));
    assert_eq!(queue.write_len(), 2);
}

#[test]
fn test_swap_exposes_writes_in_order() {
    let mut queue = DoubleBufferedQueue::new(8);
    for i in 0..5 {
        queue.push(i).unwrap();
    }
    assert_eq!(queue.pop(), None);

    assert_eq!(queue.swap(), SwapOutcome::Swapped(5));
    assert!(queue.is_write_empty());
    let drained: Vec<_> = queue.drain().collect();
    assert_eq!(drained, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_swap_frees_write_capacity() {
    let mut queue = DoubleBufferedQueue::new(2);
    queue.push("a").unwrap();
    queue.push("b").unwrap();
    assert!(queue.push("c").is_err());

    queue.swap();
    assert!(queue.push("c").is_ok());
    assert_eq!(queue.read_len(), 2);
    assert_eq!(queue.write_len(), 1);
}

#[test]
fn test_swap_keeps_unread_items() {
    let mut queue = DoubleBufferedQueue::new(4);
    queue.push(1).unwrap();
    queue.swap();
    queue.push(2).unwrap();

    assert_eq!(queue.swap(), SwapOutcome::Pending(1));
    assert_eq!(queue.peek(), Some(&1));
    assert_eq!(queue.write_len(), 1);

    assert_eq!(queue.pop(), Some(1));
    assert_eq!(queue.swap(), SwapOutcome::Swapped(1));
    assert_eq!(queue.pop(), Some(2));
}

#[test]
fn test_swap_discarding_drops_unread() {
    let mut queue = DoubleBufferedQueue::new(4);
    queue.push(1).unwrap();
    queue.push(2).unwrap();
    queue.swap();
    queue.push(3).unwrap();

    assert_eq!(queue.swap_discarding(), 2);
    assert_eq!(queue.pop(), Some(3));
    assert!(queue.is_empty());
}

#[test]
fn test_writers_keep_per_thread_order() {
    let mut queue = DoubleBufferedQueue::new(3 * 100);
    let handles: Vec<_> = (0..3u32)
        .map(|writer_id| {
            let writer = queue.writer();
            thread::spawn(move || {
                for seq in 0..100u32 {
                    writer.push((writer_id, seq)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(queue.swap().is_swapped());
    let mut last = [None::<u32>; 3];
    let mut total = 0;
    while let Some((writer_id, seq)) = queue.pop() {
        let slot = &mut last[writer_id as usize];
        if let Some(prev) = *slot {
            assert!(seq > prev, "writer {} went backwards", writer_id);
        }
        *slot = Some(seq);
        total += 1;
    }
    assert_eq!(total, 300);
}

#[test]
fn test_wait_for_writes_times_out_when_idle() {
    let queue: DoubleBufferedQueue<u8> = DoubleBufferedQueue::new(1);
    let start = Instant::now();
    assert!(!queue.wait_for_writes(Some(Duration::from_millis(20))));
    assert!(start.elapsed() >= Duration::from_millis(15));
}

#[test]
fn test_wait_for_writes_wakes_on_push() {
    let queue = DoubleBufferedQueue::new(1);
    let writer = queue.writer();
    let pusher = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        writer.push(7u8).unwrap();
    });

    assert!(queue.wait_for_writes(Some(Duration::from_secs(5))));
    pusher.join().unwrap();
}

#[test]
fn test_expand_only_grows() {
    let mut queue = DoubleBufferedQueue::<u8>::new(4);
    assert!(!queue.expand(4));
    assert!(!queue.expand(2));
    assert!(queue.expand(16));
    assert_eq!(queue.capacity(), 16);
    assert_eq!(queue.writer().capacity(), 16);
}

#[test]
fn test_erase_all_releases_owned_items() {
    let tracked = Arc::new(());
    let mut queue = DoubleBufferedQueue::new(4);
    queue.push(Arc::clone(&tracked)).unwrap();
    queue.swap();
    queue.push(Arc::clone(&tracked)).unwrap();
    assert_eq!(Arc::strong_count(&tracked), 3);

    assert_eq!(queue.erase_all(), 2);
    assert_eq!(Arc::strong_count(&tracked), 1);
    assert!(queue.is_empty());
}

#[test]
fn test_take_all_returns_read_side_first() {
    let mut queue = DoubleBufferedQueue::new(4);
    queue.push(1).unwrap();
    queue.swap();
    queue.push(2).unwrap();
    assert_eq!(queue.take_all(), vec![1, 2]);
}

proptest! {
    #[test]
    fn prop_write_region_never_exceeds_capacity(capacity in 1usize..32, pushes in 0usize..96) {
        let queue = DoubleBufferedQueue::new(capacity);
        let accepted = (0..pushes).filter(|&i| queue.push(i).is_ok()).count();
        prop_assert_eq!(accepted, pushes.min(capacity));
        prop_assert_eq!(queue.write_len(), pushes.min(capacity));
    }

    #[test]
    fn prop_swap_preserves_fifo(items in proptest::collection::vec(any::<u16>(), 0..64)) {
        let mut queue = DoubleBufferedQueue::new(64);
        for item in &items {
            queue.push(*item).unwrap();
        }
        prop_assert_eq!(queue.swap(), SwapOutcome::Swapped(items.len()));
        let out: Vec<u16> = queue.drain().collect();
        prop_assert_eq!(out, items);
    }
}
