//! Host-side stand-in for the logger firmware: a spawned thread plays the
//! UART receive interrupt, the main loop plays the mainline poll, and a file
//! plays the storage card. Useful for watching overrun and loss-marker
//! behavior without hardware:
//!
//!     cargo run -p uartlog-sim -- out.log        # keep up, no loss
//!     cargo run -p uartlog-sim -- out.log 50     # stall the consumer 50 ms

use std::env;
use std::fs::File;
use std::io::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use uartlog::{
    heartbeat, BlinkMode, BlockStorage, BufferPool, Heartbeat, NoSignal, PutResult, WriteOutcome,
};

const SLOT_CAPACITY: usize = 512;
const FEED_BYTES: usize = 64 * 1024;

struct FileStorage(File);

impl BlockStorage for FileStorage {
    type Error = std::io::Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.0.write_all(buf)?;
        Ok(buf.len())
    }

    fn sync(&mut self) -> Result<(), Self::Error> {
        self.0.sync_data()
    }
}

/// Stand-in LED pin for the heartbeat; the sim reports mode changes on the
/// console instead of driving hardware.
struct SimPin;

impl embedded_hal::digital::ErrorType for SimPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "uartlog.bin".into());
    let stall_ms: u64 = args
        .next()
        .map(|s| s.parse())
        .transpose()
        .context("stall must be a number of milliseconds")?
        .unwrap_or(0);

    let file = File::create(&path).with_context(|| format!("creating {path}"))?;
    let mut storage = FileStorage(file);

    let pool: BufferPool<SLOT_CAPACITY, 2> = BufferPool::new();
    let (mut producer, mut consumer) = pool.try_split().expect("first split");
    let done = AtomicBool::new(false);

    let start = Instant::now();
    let now_ms = || heartbeat::Instant::from_ticks(start.elapsed().as_millis() as u32);
    let mut led = Heartbeat::new(SimPin);
    led.begin(BlinkMode::Run, now_ms());

    let (written, dropped) = thread::scope(|s| {
        let feeder = s.spawn(|| {
            // Roughly 100 kB/s of line-oriented traffic.
            let mut dropped = 0usize;
            let mut fed = 0usize;
            let mut tick = 0u32;
            while fed < FEED_BYTES {
                let line = format!("tick {tick:06}\n");
                tick += 1;
                for &b in line.as_bytes() {
                    if producer.put_byte(b) == PutResult::Dropped {
                        dropped += 1;
                    }
                    fed += 1;
                }
                thread::sleep(Duration::from_micros(100));
            }
            done.store(true, Ordering::Release);
            dropped
        });

        let mut written = 0usize;
        let mut stalled = false;
        let mut mode = BlinkMode::Run;
        while !done.load(Ordering::Acquire) {
            if stall_ms > 0 && !stalled && start.elapsed() > Duration::from_millis(200) {
                // One long stall to provoke an overrun episode.
                stalled = true;
                thread::sleep(Duration::from_millis(stall_ms));
            }
            match consumer.write(&mut storage, &mut NoSignal) {
                WriteOutcome::Written(n) => written += n,
                WriteOutcome::WriteFailed(e) => eprintln!("write failed: {e}"),
                WriteOutcome::SyncFailed { written: n, err } => {
                    written += n;
                    eprintln!("sync failed after {n} bytes: {err}");
                }
                WriteOutcome::Skipped => {}
            }
            let want = if pool.is_overrun() {
                BlinkMode::Error
            } else {
                BlinkMode::Run
            };
            if want != mode {
                mode = want;
                led.set_mode(mode, now_ms());
                println!("status: {mode:?}");
            }
            led.poll(now_ms());
            thread::sleep(Duration::from_millis(1));
        }
        if let WriteOutcome::Written(n) | WriteOutcome::SyncFailed { written: n, .. } =
            consumer.flush_all(&mut storage, &mut NoSignal)
        {
            written += n;
        }
        (written, feeder.join().expect("feeder thread"))
    });

    println!("fed {FEED_BYTES} bytes, stored {written}, dropped {dropped}");
    println!("log written to {path}; grep for '<LOST 0x' to see loss markers");
    Ok(())
}
