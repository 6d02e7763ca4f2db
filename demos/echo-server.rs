//! A minimal TCP echo server built on `bufferevent`.
//!
//! Grounded on the original `libevent` sample
//! (`sample/echo-server/echo-server.c`): a listener accepts connections,
//! wraps each socket in a `BufferedEvent`, and echoes back whatever arrives
//! on it until the peer closes or a connection error occurs.
//!
//! This file illustrates the crate's public API; it is not part of the
//! library's build (the listener/accept loop is a caller concern, not
//! something this crate owns) and is not wired into `Cargo.toml`.
//!
//! Run by hand with e.g. `rustc --edition 2021 -L target/debug/deps
//! --extern bufferevent=target/debug/libbufferevent.rlib
//! --extern log=... demos/echo-server.rs` after a normal `cargo build`.

use std::cell::RefCell;
use std::io;
use std::net::TcpListener;
use std::os::unix::io::IntoRawFd;
use std::rc::Rc;

use bufferevent::{BufferedEvent, Direction, EventBase};

const PORT: u16 = 9999;

fn main() -> io::Result<()> {
    env_logger::init();

    let listener = TcpListener::bind(("0.0.0.0", PORT))?;
    listener.set_nonblocking(true)?;
    println!("Listening on port {}", PORT);

    let mut base = EventBase::new()?;
    // Connections are kept alive only through the closures captured by
    // their own error callback (which removes them from this list), the
    // same lifetime trick `echo-server.c`'s `bufferevent_free` plays in its
    // own `conn_eventcb`.
    let connections: Rc<RefCell<Vec<BufferedEvent>>> = Rc::new(RefCell::new(Vec::new()));

    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                stream.set_nonblocking(true)?;
                println!("accepted connection from {}", addr);
                let fd = stream.into_raw_fd();

                let conns_for_error = connections.clone();
                let be = BufferedEvent::new(
                    fd,
                    Some(|be: &BufferedEvent| {
                        let data = be.read(be.input_len());
                        let _ = be.write(&data);
                    }),
                    None::<fn(&BufferedEvent)>,
                    move |be: &BufferedEvent, flags| {
                        println!("connection closed: {:?}", flags);
                        let fd = be.fd();
                        // Mirrors `echo-server.c`'s `conn_eventcb`, which always
                        // calls `bufferevent_free(bev)` before the fd goes away:
                        // dropping the last `Rc` here without `free()` would leave
                        // this token's entries in `EventBase`'s sink/priority maps
                        // forever.
                        let mut conns = conns_for_error.borrow_mut();
                        if let Some(pos) = conns.iter().position(|c| c.fd() == fd) {
                            conns.remove(pos).free();
                        }
                        unsafe { libc::close(fd) };
                    },
                );
                be.base_set(&base)?;
                be.enable(Direction::READ | Direction::WRITE)?;
                connections.borrow_mut().push(be);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(e),
        }

        base.poll(Some(std::time::Duration::from_millis(50)))?;
    }
}
