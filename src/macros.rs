//! Macros to ease conditional code based on enabled features and platforms.

#![allow(unused_macros)]

/// Helper macro to execute a system call that returns an `io::Result`.
///
/// Must be defined before any modules that use it.
macro_rules! syscall {
    ($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
        let res = unsafe { libc::$fn($($arg, )*) };
        if res == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

/// The `os-poll` feature is enabled.
macro_rules! cfg_os_poll {
    ($($item:item)*) => {
        $(
            #[cfg(feature = "os-poll")]
            #[cfg_attr(docsrs, doc(cfg(feature = "os-poll")))]
            $item
        )*
    }
}

/// The `os-poll` feature is disabled.
macro_rules! cfg_not_os_poll {
    ($($item:item)*) => {
        $(
            #[cfg(not(feature = "os-poll"))]
            $item
        )*
    }
}

/// Mirrors `mio`'s own `log`-optional trace/debug/warn macros: expands to the
/// real `log` crate call when `log` is actually compiled in (i.e. whenever
/// `os-poll` pulls in `dep:log`), and to nothing when it isn't, so call
/// sites never need their own `cfg`.
macro_rules! trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "os-poll")]
        log::trace!($($arg)*);
    };
}

/// See [`trace`].
macro_rules! debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "os-poll")]
        log::debug!($($arg)*);
    };
}

/// See [`trace`].
macro_rules! warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "os-poll")]
        log::warn!($($arg)*);
    };
}

/// See [`trace`].
macro_rules! error {
    ($($arg:tt)*) => {
        #[cfg(feature = "os-poll")]
        log::error!($($arg)*);
    };
}
