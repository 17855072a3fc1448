//! Double-buffered byte logging between an interrupt-driven receiver and a
//! slower block-storage writer.
//!
//! A [`BufferPool`] owns a small ring of fixed-capacity [`SlotBuffer`]s.
//! [`BufferPool::try_split`] hands out a [`Producer`] for the interrupt
//! context (one byte per call, constant time, never blocks) and a
//! [`Consumer`] for the mainline loop, which writes filled slots to a
//! [`BlockStorage`] backend. When the consumer falls behind and the producer
//! wraps into a slot that still holds data, bytes are dropped and counted;
//! once the consumer catches up, a `<LOST 0xNNNN>` marker is injected into
//! the stream so the loss stays visible in the stored log.
//!
//! The [`Heartbeat`] blinker is an independent status indicator driven from
//! the mainline loop; it shares nothing with the buffering logic.

#![cfg_attr(not(test), no_std)]

pub mod heartbeat;
pub mod pool;
pub mod slot;
pub mod storage;

#[cfg(test)]
pub(crate) mod testutil;

pub use heartbeat::{BlinkMode, Heartbeat};
pub use pool::{BufferPool, Consumer, Producer, PutResult};
pub use slot::{SlotBuffer, WriteOutcome};
pub use storage::{BlockStorage, NoSignal, PinSignal, Signal};
