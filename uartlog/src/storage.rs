use embedded_hal::digital::OutputPin;

/// Block-storage backend that persists a contiguous byte range.
///
/// `write` returns the number of bytes the backend accepted; `sync` confirms
/// that previously written bytes are durably committed, which is a separate
/// step on backends like SD cards that buffer internally.
pub trait BlockStorage {
    type Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    fn sync(&mut self) -> Result<(), Self::Error>;
}

/// Busy-line capability, asserted for the duration of each storage write.
pub trait Signal {
    fn assert(&mut self);
    fn deassert(&mut self);
}

/// Drives a GPIO pin as the busy signal. Pin errors are swallowed; a status
/// line that cannot toggle must not fail the write path.
pub struct PinSignal<P>(pub P);

impl<P: OutputPin> Signal for PinSignal<P> {
    fn assert(&mut self) {
        let _ = self.0.set_high();
    }

    fn deassert(&mut self) {
        let _ = self.0.set_low();
    }
}

/// For setups without a busy indicator.
pub struct NoSignal;

impl Signal for NoSignal {
    fn assert(&mut self) {}
    fn deassert(&mut self) {}
}
