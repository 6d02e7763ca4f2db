//! Documented stub selector for targets with no epoll/kqueue backend.
//!
//! Every operation fails with [`io::ErrorKind::Unsupported`], mirroring
//! `mio`'s own `sys::shell` pattern for platforms it does not implement.

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::{Interest, Token};

fn unsupported<T>() -> io::Result<T> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "bufferevent: no os-poll backend for this target; build with a supported \
         unix target or disable the `os-poll` feature",
    ))
}

#[derive(Debug)]
pub struct Selector {
    _private: (),
}

impl Selector {
    pub fn new() -> io::Result<Selector> {
        unsupported()
    }

    pub fn register(&self, _fd: RawFd, _token: Token, _interest: Interest) -> io::Result<()> {
        unsupported()
    }

    pub fn reregister(&self, _fd: RawFd, _token: Token, _interest: Interest) -> io::Result<()> {
        unsupported()
    }

    pub fn deregister(&self, _fd: RawFd) -> io::Result<()> {
        unsupported()
    }

    pub fn select(&self, _raw: &mut Vec<RawEvent>, _timeout: Option<Duration>) -> io::Result<()> {
        unsupported()
    }
}

pub mod decode {
    use super::RawEvent;
    use crate::Token;

    pub fn token(_event: &RawEvent) -> Token {
        unreachable!("shell selector never produces events")
    }

    pub fn is_readable(_event: &RawEvent) -> bool {
        unreachable!("shell selector never produces events")
    }

    pub fn is_writable(_event: &RawEvent) -> bool {
        unreachable!("shell selector never produces events")
    }
}

#[derive(Debug)]
pub struct RawEvent;
