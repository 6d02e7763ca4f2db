use std::cell::Cell;
use std::io::Read;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::time::Duration;

use bufferevent::{BufferedEvent, Direction, EventBase};

mod util;

fn nonblocking_pair() -> (UnixStream, UnixStream) {
    let (a, b) = UnixStream::pair().unwrap();
    a.set_nonblocking(true).unwrap();
    b.set_nonblocking(true).unwrap();
    (a, b)
}

#[test]
fn write_cb_fires_once_when_output_fully_drains() {
    util::init();
    let (local, mut peer) = nonblocking_pair();
    let fd = local.as_raw_fd();
    std::mem::forget(local);

    let write_calls = Rc::new(Cell::new(0u32));
    let calls_cb = write_calls.clone();

    let be = BufferedEvent::new(
        fd,
        None::<fn(&BufferedEvent)>,
        Some(move |be: &BufferedEvent| {
            calls_cb.set(calls_cb.get() + 1);
            assert_eq!(be.output_len(), 0);
        }),
        |_be, flags| panic!("unexpected error: {:?}", flags),
    );

    let mut base = EventBase::new().unwrap();
    be.base_set(&base).unwrap();
    be.enable(Direction::WRITE).unwrap();

    let payload = vec![7u8; 100];
    be.write(&payload).unwrap();

    let mut consumed = Vec::new();
    util::pump_until(&mut base, Duration::from_secs(2), || {
        let mut chunk = [0u8; 64];
        while let Ok(n) = peer.read(&mut chunk) {
            if n == 0 {
                break;
            }
            consumed.extend_from_slice(&chunk[..n]);
        }
        write_calls.get() >= 1
    });

    assert_eq!(write_calls.get(), 1);
    assert_eq!(consumed, payload);

    be.free();
    unsafe { libc::close(fd) };
}
