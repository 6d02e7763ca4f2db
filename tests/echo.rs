use std::cell::RefCell;
use std::io::{Read, Write};
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
fn echo_round_trip() {
    util::init();
    let (local, mut peer) = nonblocking_pair();
    let fd = local.as_raw_fd();
    std::mem::forget(local);

    let received: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    let received_cb = received.clone();

    let be = BufferedEvent::new(
        fd,
        Some(move |be: &BufferedEvent| {
            let data = be.read(be.input_len());
            received_cb.borrow_mut().extend_from_slice(&data);
        }),
        None::<fn(&BufferedEvent)>,
        |_be, flags| panic!("unexpected error: {:?}", flags),
    );

    let mut base = EventBase::new().unwrap();
    be.base_set(&base).unwrap();
    be.enable(Direction::READ | Direction::WRITE).unwrap();
    be.write(b"hello").unwrap();

    // Drive the write out to the peer, then have the peer echo it back.
    util::pump_until(&mut base, Duration::from_secs(2), || {
        let mut buf = [0u8; 5];
        match peer.read(&mut buf) {
            Ok(5) => {
                peer.write_all(&buf).unwrap();
                true
            }
            _ => false,
        }
    });

    util::pump_until(&mut base, Duration::from_secs(2), || {
        received.borrow().len() == 5
    });

    assert_eq!(&received.borrow()[..], b"hello");

    be.free();
    unsafe { libc::close(fd) };
}
