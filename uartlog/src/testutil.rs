//! Hand-rolled mocks shared by the unit tests.

use crate::storage::{BlockStorage, Signal};

/// In-memory storage backend with programmable failures.
pub struct MemStorage {
    pub data: Vec<u8>,
    pub syncs: usize,
    /// Fail this many upcoming write calls.
    pub fail_writes: usize,
    /// Fail this many upcoming sync calls.
    pub fail_syncs: usize,
}

impl MemStorage {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            syncs: 0,
            fail_writes: 0,
            fail_syncs: 0,
        }
    }
}

impl BlockStorage for MemStorage {
    type Error = &'static str;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err("write failed");
        }
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn sync(&mut self) -> Result<(), Self::Error> {
        if self.fail_syncs > 0 {
            self.fail_syncs -= 1;
            return Err("sync failed");
        }
        self.syncs += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingSignal {
    pub asserts: usize,
    pub deasserts: usize,
}

impl Signal for CountingSignal {
    fn assert(&mut self) {
        self.asserts += 1;
    }

    fn deassert(&mut self) {
        self.deasserts += 1;
    }
}
