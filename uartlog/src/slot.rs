use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::storage::{BlockStorage, Signal};

/// Outcome of a slot write or flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteOutcome<E> {
    /// Nothing to do: the slot was not ready (`write`) or empty (`flush`).
    Skipped,
    /// Bytes handed to the backend and durably synced; the slot is empty
    /// and available to the producer again.
    Written(usize),
    /// The backend rejected the write. The slot keeps its data so a later
    /// `flush` can retry it.
    WriteFailed(E),
    /// The write was accepted but durability could not be confirmed. The
    /// bytes count as sent; the slot keeps its data.
    SyncFailed { written: usize, err: E },
}

impl<E> WriteOutcome<E> {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            WriteOutcome::WriteFailed(_) | WriteOutcome::SyncFailed { .. }
        )
    }
}

/// One fixed-capacity receive buffer.
///
/// `len` doubles as the write cursor: the producer is the only side that
/// grows it, and the consumer resets it to 0 only after a successful
/// write-and-sync. The byte array is shared between the two contexts, but
/// accesses stay disjoint: the producer writes at and above the `len` it
/// published, the consumer reads strictly below it.
pub struct SlotBuffer<const C: usize> {
    bytes: UnsafeCell<[u8; C]>,
    len: AtomicUsize,
    ready: AtomicBool,
}

// Shared between the interrupt producer and the mainline consumer; see the
// disjointness note above. All cross-context handover goes through the
// Release/Acquire pairs on `len` and `ready`.
unsafe impl<const C: usize> Sync for SlotBuffer<C> {}

impl<const C: usize> SlotBuffer<C> {
    pub const fn new() -> Self {
        Self {
            bytes: UnsafeCell::new([0; C]),
            len: AtomicUsize::new(0),
            ready: AtomicBool::new(false),
        }
    }

    pub const fn capacity(&self) -> usize {
        C
    }

    /// Count of valid bytes currently held.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while the slot is full and waiting for the consumer to claim it.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Back to the empty state. Exclusive access means neither context is
    /// running, so plain stores are enough.
    pub fn reset(&mut self) {
        *self.len.get_mut() = 0;
        *self.ready.get_mut() = false;
    }

    /// Same as [`reset`](Self::reset) through a shared reference, for pool
    /// reinitialization once the producer side is quiescent.
    pub(crate) fn clear(&self) {
        self.ready.store(false, Ordering::Relaxed);
        self.len.store(0, Ordering::Release);
    }

    /// Append one byte. Returns true when this byte filled the slot, which
    /// also marks it ready. Producer context only; the pool guarantees the
    /// slot is not full when calling (the index stays checked regardless).
    pub(crate) fn put_byte(&self, byte: u8) -> bool {
        let at = self.len.load(Ordering::Relaxed);
        unsafe { (*self.bytes.get())[at] = byte };
        self.len.store(at + 1, Ordering::Release);
        if at + 1 == C {
            self.ready.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Write the slot to storage if it is full and unclaimed.
    pub fn write<S, G>(&self, storage: &mut S, busy: &mut G) -> WriteOutcome<S::Error>
    where
        S: BlockStorage,
        G: Signal,
    {
        if !self.ready.swap(false, Ordering::Acquire) {
            return WriteOutcome::Skipped;
        }
        self.drain(storage, busy)
    }

    /// Write the slot to storage if it holds any data, full or not. Meant
    /// for end-of-session draining, once the producer side is quiescent;
    /// flushing the slot the producer is actively filling can clip or
    /// restart its contents (never corrupt memory).
    pub fn flush<S, G>(&self, storage: &mut S, busy: &mut G) -> WriteOutcome<S::Error>
    where
        S: BlockStorage,
        G: Signal,
    {
        if self.len.load(Ordering::Acquire) == 0 {
            return WriteOutcome::Skipped;
        }
        self.ready.store(false, Ordering::Relaxed);
        self.drain(storage, busy)
    }

    fn drain<S, G>(&self, storage: &mut S, busy: &mut G) -> WriteOutcome<S::Error>
    where
        S: BlockStorage,
        G: Signal,
    {
        let len = self.len.load(Ordering::Acquire);
        // Sound even if the producer is still appending: it only touches
        // indices at and above the `len` loaded here.
        let data = unsafe { &(&(*self.bytes.get()))[..len] };
        busy.assert();
        let wrote = storage.write(data);
        let synced = storage.sync();
        busy.deassert();
        match (wrote, synced) {
            (Err(err), _) => WriteOutcome::WriteFailed(err),
            (Ok(written), Err(err)) => WriteOutcome::SyncFailed { written, err },
            (Ok(written), Ok(())) => {
                self.len.store(0, Ordering::Release);
                WriteOutcome::Written(written)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn contents(&self) -> Vec<u8> {
        let len = self.len();
        let data = unsafe { &(&(*self.bytes.get()))[..len] };
        data.to_vec()
    }
}
