use std::{
    thread,
    time::{Duration, Instant},
};

/// How long end-to-end tests wait for something to happen over loopback
pub const DEFAULT_WAIT: Duration = Duration::from_secs(2);

/// Polls `condition` until it holds or `timeout` runs out. Returns whether
/// it held.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}
