//! OS-level selector backends.
//!
//! Mirrors `mio`'s `sys` module: a small `cfg`-selected facade over one
//! concrete backend per target family. Each backend exposes the same
//! `Selector` shape (`new`, `register`, `reregister`, `deregister`,
//! `select`) plus a `decode` module translating the backend's raw readiness
//! record into `(Token, readable, writable)` triples.
//!
//! Unlike `mio`'s own epoll backend, the epoll selector here does not set
//! `EPOLLET`. `BufferedEvent` needs a level-triggered readiness contract: a
//! readiness condition it doesn't fully drain, because a watermark capped
//! the read, must be reported again on the next `poll` with no extra re-arm.
//!
//! Setting `--cfg bufferevent_unsupported_force_shell` forces the shell
//! backend even on an otherwise-supported target, for exercising the
//! unsupported-platform error paths without cross-compiling.

cfg_os_poll! {
    #[cfg(all(
        not(bufferevent_unsupported_force_shell),
        unix,
        any(target_os = "linux", target_os = "android")
    ))]
    #[path = "unix/epoll.rs"]
    mod imp;

    #[cfg(all(
        not(bufferevent_unsupported_force_shell),
        unix,
        any(
            target_os = "freebsd",
            target_os = "dragonfly",
            target_os = "openbsd",
            target_os = "netbsd",
            target_os = "macos",
            target_os = "ios",
        )
    ))]
    #[path = "unix/kqueue.rs"]
    mod imp;

    #[cfg(any(
        bufferevent_unsupported_force_shell,
        not(any(
            all(unix, any(target_os = "linux", target_os = "android")),
            all(
                unix,
                any(
                    target_os = "freebsd",
                    target_os = "dragonfly",
                    target_os = "openbsd",
                    target_os = "netbsd",
                    target_os = "macos",
                    target_os = "ios",
                )
            )
        ))
    ))]
    #[path = "shell/mod.rs"]
    mod imp;
}

cfg_not_os_poll! {
    #[path = "shell/mod.rs"]
    mod imp;
}

pub use imp::{decode, RawEvent, Selector};
