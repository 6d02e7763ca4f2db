use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use crate::{Interest, Token};

#[cfg(any(target_os = "freebsd", target_os = "openbsd"))]
type Filter = libc::c_short;
#[cfg(any(target_os = "macos", target_os = "ios"))]
type Filter = i16;
#[cfg(any(target_os = "netbsd", target_os = "dragonfly"))]
type Filter = u32;

fn kevent_entry(fd: RawFd, filter: libc::c_int, flags: u16, udata: usize) -> libc::kevent {
    libc::kevent {
        ident: fd as libc::uintptr_t,
        filter: filter as Filter,
        flags,
        fflags: 0,
        data: 0,
        udata: udata as *mut libc::c_void,
    }
}

#[derive(Debug)]
pub struct Selector {
    kq: RawFd,
}

impl Selector {
    pub fn new() -> io::Result<Selector> {
        let kq = syscall!(kqueue())?;
        syscall!(fcntl(kq, libc::F_SETFD, libc::FD_CLOEXEC))?;
        trace!("created kqueue selector, fd={}", kq);
        Ok(Selector { kq })
    }

    fn apply(&self, changes: &mut [libc::kevent]) -> io::Result<()> {
        syscall!(kevent(
            self.kq,
            changes.as_ptr(),
            changes.len() as libc::c_int,
            std::ptr::null_mut(),
            0,
            std::ptr::null(),
        ))
        .map(|_| ())
    }

    pub fn register(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        trace!("kevent(ADD, fd={}, token={:?})", fd, token);
        let mut changes = Vec::with_capacity(2);
        if interest.is_readable() {
            changes.push(kevent_entry(
                fd,
                libc::EVFILT_READ,
                libc::EV_ADD,
                token.0,
            ));
        }
        if interest.is_writable() {
            changes.push(kevent_entry(
                fd,
                libc::EVFILT_WRITE,
                libc::EV_ADD,
                token.0,
            ));
        }
        self.apply(&mut changes)
    }

    pub fn reregister(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        // kqueue has no single "modify" op across filters; clear both and
        // re-add exactly the requested set. Deletes of a filter that was
        // never added simply fail with ENOENT, which we ignore.
        let _ = self.apply(&mut [
            kevent_entry(fd, libc::EVFILT_READ, libc::EV_DELETE, 0),
            kevent_entry(fd, libc::EVFILT_WRITE, libc::EV_DELETE, 0),
        ]);
        self.register(fd, token, interest)
    }

    pub fn deregister(&self, fd: RawFd) -> io::Result<()> {
        trace!("kevent(DELETE, fd={})", fd);
        let _ = self.apply(&mut [
            kevent_entry(fd, libc::EVFILT_READ, libc::EV_DELETE, 0),
            kevent_entry(fd, libc::EVFILT_WRITE, libc::EV_DELETE, 0),
        ]);
        Ok(())
    }

    pub fn select(
        &self,
        raw: &mut Vec<libc::kevent>,
        timeout: Option<Duration>,
    ) -> io::Result<()> {
        let ts = timeout.map(|to| libc::timespec {
            tv_sec: to.as_secs() as libc::time_t,
            tv_nsec: to.subsec_nanos() as libc::c_long,
        });
        let ts_ptr = ts
            .as_ref()
            .map(|t| t as *const libc::timespec)
            .unwrap_or(std::ptr::null());

        raw.clear();
        let n = loop {
            match syscall!(kevent(
                self.kq,
                std::ptr::null(),
                0,
                raw.as_mut_ptr(),
                raw.capacity() as libc::c_int,
                ts_ptr,
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
        self.kq
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        let _ = syscall!(close(self.kq));
    }
}

pub mod decode {
    use crate::Token;

    pub fn token(event: &libc::kevent) -> Token {
        Token(event.udata as usize)
    }

    pub fn is_readable(event: &libc::kevent) -> bool {
        event.filter as libc::c_int == libc::EVFILT_READ
    }

    pub fn is_writable(event: &libc::kevent) -> bool {
        event.filter as libc::c_int == libc::EVFILT_WRITE
    }
}

pub type RawEvent = libc::kevent;
