use std::cell::Cell;
use std::io::Read;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::time::Duration;

use bufferevent::{Buffer, BufferedEvent, Direction, EventBase};

mod util;

fn nonblocking_pair() -> (UnixStream, UnixStream) {
    let (a, b) = UnixStream::pair().unwrap();
    a.set_nonblocking(true).unwrap();
    b.set_nonblocking(true).unwrap();
    (a, b)
}

#[test]
fn write_buffer_drains_src_only_on_success() {
    util::init();
    let (local, _peer) = nonblocking_pair();
    let fd = local.as_raw_fd();
    std::mem::forget(local);

    let be = BufferedEvent::new(
        fd,
        None::<fn(&BufferedEvent)>,
        None::<fn(&BufferedEvent)>,
        |_be, flags| panic!("unexpected error: {:?}", flags),
    );

    let mut src = Buffer::new();
    src.append(b"move me");
    be.write_buffer(&mut src).unwrap();

    assert_eq!(src.len(), 0);
    assert_eq!(be.output_len(), 7);

    be.free();
    unsafe { libc::close(fd) };
}

#[test]
fn disable_then_enable_restores_registration() {
    util::init();
    let (local, mut peer) = nonblocking_pair();
    let fd = local.as_raw_fd();
    std::mem::forget(local);

    let read_calls = Rc::new(Cell::new(0u32));
    let calls_cb = read_calls.clone();

    let be = BufferedEvent::new(
        fd,
        Some(move |be: &BufferedEvent| {
            calls_cb.set(calls_cb.get() + 1);
            be.read(be.input_len());
        }),
        None::<fn(&BufferedEvent)>,
        |_be, flags| panic!("unexpected error: {:?}", flags),
    );

    let mut base = EventBase::new().unwrap();
    be.base_set(&base).unwrap();
    be.enable(Direction::READ).unwrap();

    peer.write_all(b"one").unwrap();
    util::pump_until(&mut base, Duration::from_secs(2), || read_calls.get() >= 1);
    assert_eq!(read_calls.get(), 1);

    be.disable(Direction::READ).unwrap();
    peer.write_all(b"two").unwrap();
    base.poll(Some(Duration::from_millis(100))).unwrap();
    assert_eq!(read_calls.get(), 1, "disabled direction must not dispatch");

    be.enable(Direction::READ).unwrap();
    util::pump_until(&mut base, Duration::from_secs(2), || read_calls.get() >= 2);
    assert_eq!(read_calls.get(), 2);

    be.free();
    unsafe { libc::close(fd) };
}

#[test]
fn free_silences_all_further_callbacks() {
    util::init();
    let (local, mut peer) = nonblocking_pair();
    let fd = local.as_raw_fd();
    std::mem::forget(local);

    let read_calls = Rc::new(Cell::new(0u32));
    let calls_cb = read_calls.clone();

    let be = BufferedEvent::new(
        fd,
        Some(move |_be: &BufferedEvent| {
            calls_cb.set(calls_cb.get() + 1);
        }),
        None::<fn(&BufferedEvent)>,
        |_be, flags| panic!("unexpected error: {:?}", flags),
    );

    let mut base = EventBase::new().unwrap();
    be.base_set(&base).unwrap();
    be.enable(Direction::READ).unwrap();

    be.free();

    peer.write_all(b"ignored").unwrap();
    base.poll(Some(Duration::from_millis(100))).unwrap();
    assert_eq!(read_calls.get(), 0);

    let mut buf = [0u8; 16];
    let _ = peer.read(&mut buf);
    unsafe { libc::close(fd) };
}
