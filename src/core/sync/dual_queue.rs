/*!
 * Double-Buffered Queue
 *
 * Bounded two-region mailbox for single-reader / many-writer message passing.
 *
 * Writers append to the write region under a mutex. The reader owns the read
 * region outright and drains it without locking; `swap()` hands the write
 * region's contents to the reader in one exchange.
 *
 * # Ownership
 *
 * `DoubleBufferedQueue<T>` is the reader. Every draining method takes
 * `&mut self`, so only one thread can ever drain. Writers are obtained with
 * `writer()` and may be cloned freely across threads.
 *
 * # Capacity
 *
 * Both regions are allocated with `capacity` slots at construction. `push`
 * fails once the write region holds `capacity` items and never grows the
 * buffer. Growth happens only through an explicit `expand()` by the reader.
 */

use parking_lot::{Condvar, Mutex};
use std::collections::vec_deque::Drain;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of a `swap()` attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// Regions exchanged; the read side now holds this many items
    Swapped(usize),
    /// Read side still holds this many unread items; nothing was exchanged
    Pending(usize),
}

impl SwapOutcome {
    #[inline]
    pub fn is_swapped(self) -> bool {
        matches!(self, SwapOutcome::Swapped(_))
    }
}

struct WriteRegion<T> {
    items: VecDeque<T>,
    capacity: usize,
}

struct WriteSide<T> {
    region: Mutex<WriteRegion<T>>,
    ready: Condvar,
}

impl<T> WriteSide<T> {
    /// # Performance
    /// Hot path - one lock, one bounds check, one broadcast
    fn push(&self, item: T) -> Result<(), T> {
        let mut region = self.region.lock();
        if region.items.len() >= region.capacity {
            return Err(item);
        }
        region.items.push_back(item);
        drop(region);
        self.ready.notify_all();
        Ok(())
    }
}

/// Cloneable write handle onto a `DoubleBufferedQueue`
pub struct QueueWriter<T> {
    shared: Arc<WriteSide<T>>,
}

impl<T> QueueWriter<T> {
    /// Append to the write region; hands the item back when the region is full
    #[inline]
    pub fn push(&self, item: T) -> Result<(), T> {
        self.shared.push(item)
    }

    pub fn len(&self) -> usize {
        self.shared.region.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.region.lock().items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        let region = self.shared.region.lock();
        region.items.len() >= region.capacity
    }

    pub fn capacity(&self) -> usize {
        self.shared.region.lock().capacity
    }

    /// Wake a reader blocked in `wait_for_writes` without posting anything
    pub fn notify(&self) {
        self.shared.ready.notify_all();
    }
}

impl<T> Clone for QueueWriter<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for QueueWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let region = self.shared.region.lock();
        f.debug_struct("QueueWriter")
            .field("len", &region.items.len())
            .field("capacity", &region.capacity)
            .finish()
    }
}

/// Bounded double-buffered queue (reader side)
pub struct DoubleBufferedQueue<T> {
    read: VecDeque<T>,
    shared: Arc<WriteSide<T>>,
}

impl<T> DoubleBufferedQueue<T> {
    /// Allocate both regions up front
    pub fn new(capacity: usize) -> Self {
        Self {
            read: VecDeque::with_capacity(capacity),
            shared: Arc::new(WriteSide {
                region: Mutex::new(WriteRegion {
                    items: VecDeque::with_capacity(capacity),
                    capacity,
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// New write handle sharing this queue's write region
    pub fn writer(&self) -> QueueWriter<T> {
        QueueWriter {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Push from the reader's own thread
    #[inline]
    pub fn push(&self, item: T) -> Result<(), T> {
        self.shared.push(item)
    }

    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.read.pop_front()
    }

    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.read.front()
    }

    /// Drain the read region in FIFO order
    pub fn drain(&mut self) -> Drain<'_, T> {
        self.read.drain(..)
    }

    /// Move the write region's items to the read side
    ///
    /// Unread items are never discarded: if the read side is not empty the
    /// call returns `Pending` and both regions stay as they are.
    pub fn swap(&mut self) -> SwapOutcome {
        if !self.read.is_empty() {
            return SwapOutcome::Pending(self.read.len());
        }
        let mut region = self.shared.region.lock();
        mem::swap(&mut self.read, &mut region.items);
        SwapOutcome::Swapped(self.read.len())
    }

    /// Swap even if unread items remain, dropping them; returns how many were lost
    pub fn swap_discarding(&mut self) -> usize {
        let stale = self.read.len();
        if stale > 0 {
            warn!(stale, "Discarding unread items before swap");
            self.read.clear();
        }
        let mut region = self.shared.region.lock();
        mem::swap(&mut self.read, &mut region.items);
        stale
    }

    /// Reset both regions
    pub fn clear(&mut self) {
        self.clear_read();
        self.clear_write();
    }

    /// Reset the read region (reader-only, no lock)
    #[inline]
    pub fn clear_read(&mut self) {
        self.read.clear();
    }

    /// Reset the write region (locks out writers)
    pub fn clear_write(&self) {
        self.shared.region.lock().items.clear();
    }

    /// Drop every element on both sides, releasing whatever they own
    pub fn erase_all(&mut self) -> usize {
        let erased = self.take_all().len();
        if erased > 0 {
            debug!(erased, "Erased queued items");
        }
        erased
    }

    /// Take ownership of every element, read side first, each side in FIFO order
    pub fn take_all(&mut self) -> Vec<T> {
        let mut items: Vec<T> = self.read.drain(..).collect();
        items.extend(self.shared.region.lock().items.drain(..));
        items
    }

    /// Grow both regions to `new_capacity`; returns false if it would not grow
    pub fn expand(&mut self, new_capacity: usize) -> bool {
        let mut region = self.shared.region.lock();
        if new_capacity <= region.capacity {
            return false;
        }
        let read_extra = new_capacity.saturating_sub(self.read.len());
        self.read.reserve(read_extra);
        let write_extra = new_capacity.saturating_sub(region.items.len());
        region.items.reserve(write_extra);
        debug!(from = region.capacity, to = new_capacity, "Expanded queue");
        region.capacity = new_capacity;
        true
    }

    /// Block until the write region holds something
    ///
    /// Returns true if items are waiting, false if `timeout` elapsed first or
    /// a writer called `notify()` without posting.
    pub fn wait_for_writes(&self, timeout: Option<Duration>) -> bool {
        let mut region = self.shared.region.lock();
        if !region.items.is_empty() {
            return true;
        }
        match timeout {
            Some(limit) => {
                let deadline = Instant::now() + limit;
                let _ = self.shared.ready.wait_until(&mut region, deadline);
            }
            None => self.shared.ready.wait(&mut region),
        }
        !region.items.is_empty()
    }

    #[inline]
    pub fn is_read_empty(&self) -> bool {
        self.read.is_empty()
    }

    pub fn is_write_empty(&self) -> bool {
        self.shared.region.lock().items.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.is_read_empty() && self.is_write_empty()
    }

    #[inline]
    pub fn read_len(&self) -> usize {
        self.read.len()
    }

    pub fn write_len(&self) -> usize {
        self.shared.region.lock().items.len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.region.lock().capacity
    }
}

impl<T> fmt::Debug for DoubleBufferedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let region = self.shared.region.lock();
        f.debug_struct("DoubleBufferedQueue")
            .field("read_len", &self.read.len())
            .field("write_len", &region.items.len())
            .field("capacity", &region.capacity)
            .finish()
    }
}
