use std::hint::black_box;
use std::path::Path;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use tracing::warn;

use flightrec_dcmd::DiagnosticCommands;

use crate::Bridge;
use crate::BridgeError;

/// Recording length the demo asks for when none is given.
pub const DEFAULT_DURATION_SECS: u32 = 3;

const WORK_WINDOW: Duration = Duration::from_secs(5);
const PAUSE_BETWEEN_BURSTS: Duration = Duration::from_secs(1);
const BURST_ADDITIONS: u64 = 1_000_000_000;

/// Drives the bridge end to end: starts a timed recording, then keeps the
/// CPU busy for a few seconds while polling and printing recording status,
/// with a final status check once the work window closes.
pub fn run<C: DiagnosticCommands>(
    bridge: &Bridge<C>,
    duration_secs: u32,
    output: Option<&Path>,
) -> Result<(), BridgeError> {
    let started = match output {
        Some(path) => bridge.record_for(duration_secs, path)?,
        None => bridge.record_for_default(duration_secs)?,
    };
    if !started {
        warn!("Recording did not start; status checks will report the failure");
    }

    let deadline = Instant::now() + WORK_WINDOW;
    while Instant::now() < deadline {
        println!("{}", bridge.check_recordings());
        busy_work();
        thread::sleep(PAUSE_BETWEEN_BURSTS);
    }
    println!("{}", bridge.check_recordings());
    Ok(())
}

/// One CPU-bound burst: a billion additions the optimizer is not allowed to
/// elide, so the recording has something to sample.
fn busy_work() {
    let mut sum: u64 = 0;
    for i in 0..BURST_ADDITIONS {
        sum = sum.wrapping_add(black_box(i));
    }
    black_box(sum);
}
