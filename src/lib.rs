#![crate_name = "bufferevent"]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A small, single-threaded reactor core that couples a non-blocking file
//! descriptor to an input and an output byte [`Buffer`], driving both from
//! the readiness notifications an [`EventBase`] delivers.
//!
//! This crate is the buffered-event half of a reactor-style event library:
//! [`EventBase`] is the demultiplexer (backed by epoll on Linux, kqueue on
//! BSD/macOS), and [`BufferedEvent`] is the state machine that multiplexes
//! readability/writability into three callbacks — "data arrived", "output
//! drained", "error/timeout/EOF" — while enforcing flow control via
//! configurable low/high [watermark](Watermark)s.
//!
//! # Example
//!
//! ```no_run
//! use std::os::unix::io::AsRawFd;
//! use std::os::unix::net::UnixStream;
//!
//! use bufferevent::{BufferedEvent, Direction, EventBase};
//!
//! let (a, _b) = UnixStream::pair()?;
//! a.set_nonblocking(true)?;
//! let fd = a.as_raw_fd();
//!
//! let base = EventBase::new()?;
//! let be = BufferedEvent::new(
//!     fd,
//!     Some(|be: &BufferedEvent| {
//!         let data = be.read(4096);
//!         println!("got {} bytes", data.len());
//!     }),
//!     None::<fn(&BufferedEvent)>,
//!     |_be, flags| eprintln!("error: {:?}", flags),
//! );
//! be.base_set(&base)?;
//! be.enable(Direction::READ | Direction::WRITE)?;
//! be.write(b"hello")?;
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! # Features
//!
//! * `os-poll`: enabled by default. Builds the real [`EventBase`] selector
//!   backend (epoll on Linux/Android, kqueue on the BSDs/macOS/iOS) and pulls
//!   in the optional `log` dependency for `trace!`/`debug!`/`warn!` call
//!   sites throughout the crate. Without it, [`EventBase::new`] still
//!   compiles but every operation returns
//!   [`io::ErrorKind::Unsupported`](std::io::ErrorKind::Unsupported) via the
//!   documented shell backend, and all logging compiles out — useful for
//!   checking that code depending on this crate compiles on a target with no
//!   supported selector.

#[macro_use]
mod macros;

mod base;
mod buf;
mod bufferevent;
mod direction;
mod error_flags;
mod event;
mod interest;
mod sys;
mod timer;
mod token;
mod watermark;

pub use crate::base::{Config, EventBase, MAX_PRIORITY};
pub use crate::buf::Buffer;
pub use crate::bufferevent::BufferedEvent;
pub use crate::direction::Direction;
pub use crate::error_flags::ErrorFlags;
pub use crate::event::{Event, Events};
pub use crate::interest::Interest;
pub use crate::token::Token;
pub use crate::watermark::Watermark;
