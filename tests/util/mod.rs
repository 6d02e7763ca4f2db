//! Shared test helpers, mirroring the shape of `mio`'s own `tests/util`.

use std::sync::Once;
use std::time::{Duration, Instant};

use bufferevent::EventBase;

static INIT: Once = Once::new();

/// Initializes `env_logger` exactly once, regardless of how many tests call
/// this within one test binary.
pub fn init() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Repeatedly polls `base` (up to `timeout`) until `done` returns `true`.
///
/// Panics if `timeout` elapses first, so a test that hangs reports a clear
/// failure instead of the harness's own default timeout.
pub fn pump_until<F>(base: &mut EventBase, timeout: Duration, mut done: F)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if done() {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining == Duration::ZERO {
            panic!("pump_until: condition not met within {:?}", timeout);
        }
        base.poll(Some(remaining.min(Duration::from_millis(50))))
            .expect("poll failed");
    }
}
