use core::fmt::Write as _;
use core::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};

use crate::slot::{SlotBuffer, WriteOutcome};
use crate::storage::{BlockStorage, Signal};

/// `<LOST 0x` + 4 hex digits + `>`.
const LOSS_MARKER_LEN: usize = 13;

/// What happened to one byte fed into the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PutResult {
    /// Byte stored.
    Stored,
    /// Byte stored, but it filled the last free slot: the ring wrapped into
    /// a slot the consumer has not yet drained. Bytes are dropped from here
    /// until the consumer catches up.
    OverrunEntered,
    /// Byte dropped and counted into the next loss marker.
    Dropped,
}

/// Ring of receive slots shared between an interrupt-context producer and a
/// mainline consumer.
///
/// Construct once (usable in a `static`: the constructor is `const`), then
/// [`try_split`](Self::try_split) into the two context-bound halves. There is
/// no lock anywhere; the two sides coordinate through the per-slot `len` and
/// `ready` atomics plus the pool-level `head`, `overrun` and `lost` fields,
/// each written from only one side at a time.
pub struct BufferPool<const C: usize, const N: usize> {
    slots: [SlotBuffer<C>; N],
    /// Index of the slot currently receiving bytes. Producer-written.
    head: AtomicUsize,
    /// Producer-written in both directions: raised on wrap into an occupied
    /// slot, cleared when the producer observes the slot drained.
    overrun: AtomicBool,
    /// Bytes dropped in the current overrun episode. 16-bit on purpose: the
    /// loss marker encodes exactly four hex digits, and wraparound past
    /// 0xFFFF is accepted behavior.
    lost: AtomicU16,
    split: AtomicBool,
}

impl<const C: usize, const N: usize> BufferPool<C, N> {
    pub const fn new() -> Self {
        assert!(C > LOSS_MARKER_LEN + 1, "slot too small for a loss marker");
        assert!(N >= 2, "the pool needs at least two slots");
        Self {
            slots: [const { SlotBuffer::new() }; N],
            head: AtomicUsize::new(0),
            overrun: AtomicBool::new(false),
            lost: AtomicU16::new(0),
            split: AtomicBool::new(false),
        }
    }

    /// Hand out the producer and consumer halves. Returns `None` after the
    /// first successful call; there is exactly one of each.
    pub fn try_split(&self) -> Option<(Producer<'_, C, N>, Consumer<'_, C, N>)> {
        if self.split.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some((Producer { pool: self }, Consumer { pool: self, tail: 0 }))
    }

    /// True while the producer has nowhere to put incoming bytes. Intended
    /// for an external indicator to sample.
    pub fn is_overrun(&self) -> bool {
        self.overrun.load(Ordering::Relaxed)
    }

    /// Bytes dropped so far in the current overrun episode.
    pub fn lost_count(&self) -> u16 {
        self.lost.load(Ordering::Relaxed)
    }
}

/// Interrupt-context half of a [`BufferPool`]. Move it into whatever installs
/// the receive callback; every call is constant time, allocation-free and
/// non-blocking.
pub struct Producer<'a, const C: usize, const N: usize> {
    pool: &'a BufferPool<C, N>,
}

impl<const C: usize, const N: usize> Producer<'_, C, N> {
    /// Feed one received byte into the pool.
    pub fn put_byte(&mut self, byte: u8) -> PutResult {
        let pool = self.pool;
        if !pool.overrun.load(Ordering::Relaxed) {
            let head = pool.head.load(Ordering::Relaxed);
            if pool.slots[head].put_byte(byte) {
                // Slot filled: move to the next ring position.
                let next = (head + 1) % N;
                pool.head.store(next, Ordering::Release);
                if pool.slots[next].len() != 0 {
                    // The consumer has not drained it yet.
                    pool.overrun.store(true, Ordering::Relaxed);
                    return PutResult::OverrunEntered;
                }
            }
            PutResult::Stored
        } else {
            let head = pool.head.load(Ordering::Relaxed);
            if pool.slots[head].len() == 0 {
                // Consumer caught up: record the loss in-band, then resume.
                pool.overrun.store(false, Ordering::Relaxed);
                self.emit_loss_marker(head);
                pool.slots[head].put_byte(byte);
                pool.lost.store(0, Ordering::Relaxed);
                PutResult::Stored
            } else {
                let lost = pool.lost.load(Ordering::Relaxed);
                pool.lost.store(lost.wrapping_add(1), Ordering::Relaxed);
                PutResult::Dropped
            }
        }
    }

    /// True while bytes are being dropped.
    pub fn is_overrun(&self) -> bool {
        self.pool.is_overrun()
    }

    fn emit_loss_marker(&self, head: usize) {
        let mut marker: heapless::String<LOSS_MARKER_LEN> = heapless::String::new();
        let _ = write!(marker, "<LOST 0x{:04X}>", self.pool.lost.load(Ordering::Relaxed));
        // The slot was just observed empty and C > LOSS_MARKER_LEN + 1, so
        // the marker plus the trailing byte cannot fill it.
        for &b in marker.as_bytes() {
            self.pool.slots[head].put_byte(b);
        }
    }
}

/// Mainline half of a [`BufferPool`]: performs the blocking storage I/O.
pub struct Consumer<'a, const C: usize, const N: usize> {
    pool: &'a BufferPool<C, N>,
    /// Next slot eligible for writing. Ring order, never skips a slot.
    tail: usize,
}

impl<const C: usize, const N: usize> Consumer<'_, C, N> {
    /// Write the slot at the consumer position if it is ready, then advance
    /// one ring position whether or not a write happened. Call this on a
    /// steady cadence so every slot is inspected once per `N` calls.
    pub fn write<S, G>(&mut self, storage: &mut S, busy: &mut G) -> WriteOutcome<S::Error>
    where
        S: BlockStorage,
        G: Signal,
    {
        let outcome = self.pool.slots[self.tail].write(storage, busy);
        self.tail = (self.tail + 1) % N;
        outcome
    }

    /// Drain every slot holding data, oldest first, for an orderly shutdown
    /// or pause. Starts one past the producer's current slot, visits all `N`
    /// positions, stops at the first failure and returns its outcome
    /// (otherwise the outcome of the last slot that held data).
    pub fn flush_all<S, G>(&mut self, storage: &mut S, busy: &mut G) -> WriteOutcome<S::Error>
    where
        S: BlockStorage,
        G: Signal,
    {
        self.tail = (self.pool.head.load(Ordering::Acquire) + 1) % N;
        let mut outcome = WriteOutcome::Skipped;
        for _ in 0..N {
            let res = self.pool.slots[self.tail].flush(storage, busy);
            let failed = res.is_failure();
            if !matches!(res, WriteOutcome::Skipped) {
                outcome = res;
            }
            if failed {
                break;
            }
            self.tail = (self.tail + 1) % N;
        }
        outcome
    }

    /// Reset the whole pool to its initial state. Requiring both halves
    /// `&mut` proves no producer call can be in flight.
    pub fn reset(&mut self, producer: &mut Producer<'_, C, N>) {
        debug_assert!(core::ptr::eq(self.pool, producer.pool));
        for slot in &self.pool.slots {
            slot.clear();
        }
        self.pool.head.store(0, Ordering::Relaxed);
        self.pool.overrun.store(false, Ordering::Relaxed);
        self.pool.lost.store(0, Ordering::Relaxed);
        self.tail = 0;
    }

    /// Overrun flag, for external alarming.
    pub fn is_overrun(&self) -> bool {
        self.pool.is_overrun()
    }
}
