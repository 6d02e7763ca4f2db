use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use crate::{Interest, Token};

#[derive(Debug)]
pub struct Selector {
    ep: RawFd,
}

impl Selector {
    pub fn new() -> io::Result<Selector> {
        let ep = syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?;
        trace!("created epoll selector, fd={}", ep);
        Ok(Selector { ep })
    }

    pub fn register(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: interest_to_epoll(interest),
            u64: usize::from(token) as u64,
        };
        trace!("epoll_ctl(ADD, fd={}, token={:?})", fd, token);
        syscall!(epoll_ctl(self.ep, libc::EPOLL_CTL_ADD, fd, &mut event)).map(|_| ())
    }

    pub fn reregister(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: interest_to_epoll(interest),
            u64: usize::from(token) as u64,
        };
        trace!("epoll_ctl(MOD, fd={}, token={:?})", fd, token);
        syscall!(epoll_ctl(self.ep, libc::EPOLL_CTL_MOD, fd, &mut event)).map(|_| ())
    }

    pub fn deregister(&self, fd: RawFd) -> io::Result<()> {
        trace!("epoll_ctl(DEL, fd={})", fd);
        syscall!(epoll_ctl(
            self.ep,
            libc::EPOLL_CTL_DEL,
            fd,
            std::ptr::null_mut()
        ))
        .map(|_| ())
    }

    pub fn select(
        &self,
        raw: &mut Vec<libc::epoll_event>,
        timeout: Option<Duration>,
    ) -> io::Result<()> {
        let timeout_ms = timeout
            .map(|to| {
                to.checked_add(Duration::from_nanos(999_999))
                    .unwrap_or(to)
                    .as_millis() as libc::c_int
            })
            .unwrap_or(-1);

        raw.clear();
        let n = loop {
            match syscall!(epoll_wait(
                self.ep,
                raw.as_mut_ptr(),
                raw.capacity() as i32,
                timeout_ms,
            )) {
                Ok(n) => break n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        unsafe { raw.set_len(n as usize) };
        Ok(())
    }
}

impl AsRawFd for Selector {
    fn as_raw_fd(&self) -> RawFd {
        self.ep
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        let _ = syscall!(close(self.ep));
    }
}

/// The crate's readiness contract is level-triggered, unlike `mio`'s own
/// epoll selector: `EPOLLET` is deliberately not set here (see `sys::mod`).
fn interest_to_epoll(interest: Interest) -> u32 {
    let mut kind = 0;
    if interest.is_readable() {
        kind |= libc::EPOLLIN | libc::EPOLLRDHUP;
    }
    if interest.is_writable() {
        kind |= libc::EPOLLOUT;
    }
    kind as u32
}

pub mod decode {
    use crate::Token;

    pub fn token(event: &libc::epoll_event) -> Token {
        Token(event.u64 as usize)
    }

    pub fn is_readable(event: &libc::epoll_event) -> bool {
        let e = event.events as libc::c_int;
        (e & libc::EPOLLIN) != 0 || (e & libc::EPOLLERR) != 0 || (e & libc::EPOLLHUP) != 0
    }

    pub fn is_writable(event: &libc::epoll_event) -> bool {
        let e = event.events as libc::c_int;
        (e & libc::EPOLLOUT) != 0 || (e & libc::EPOLLERR) != 0 || (e & libc::EPOLLHUP) != 0
    }
}

pub type RawEvent = libc::epoll_event;
