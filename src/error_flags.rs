use std::fmt;

use crate::Direction;

/// Flags accompanying an `error_cb` invocation.
///
/// Always carries exactly one of [`READ`]/[`WRITE`] and at least one of
/// [`EOF`]/[`ERROR`]/[`TIMEOUT`].
///
/// [`READ`]: ErrorFlags::READ
/// [`WRITE`]: ErrorFlags::WRITE
/// [`EOF`]: ErrorFlags::EOF
/// [`ERROR`]: ErrorFlags::ERROR
/// [`TIMEOUT`]: ErrorFlags::TIMEOUT
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct ErrorFlags(u8);

const READ: u8 = 0b0_0001;
const WRITE: u8 = 0b0_0010;
const EOF: u8 = 0b0_0100;
const ERROR: u8 = 0b0_1000;
const TIMEOUT: u8 = 0b1_0000;

impl ErrorFlags {
    /// The triggering event was on the read direction.
    pub const READ: ErrorFlags = ErrorFlags(READ);
    /// The triggering event was on the write direction.
    pub const WRITE: ErrorFlags = ErrorFlags(WRITE);
    /// The remote end closed (EOF on read, or the write end became unwritable).
    pub const EOF: ErrorFlags = ErrorFlags(EOF);
    /// An unrecoverable OS error occurred.
    pub const ERROR: ErrorFlags = ErrorFlags(ERROR);
    /// The configured direction timeout expired without readiness.
    pub const TIMEOUT: ErrorFlags = ErrorFlags(TIMEOUT);

    pub(crate) fn for_direction(dir: Direction, cause: ErrorFlags) -> ErrorFlags {
        let dir_bit = if dir.contains(Direction::READ) {
            ErrorFlags::READ
        } else {
            ErrorFlags::WRITE
        };
        dir_bit | cause
    }

    /// Returns `true` if `self` contains every flag in `other`.
    #[inline]
    pub fn contains(self, other: ErrorFlags) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns the [`Direction`] this error flag set was reported on.
    pub fn direction(self) -> Direction {
        if self.contains(ErrorFlags::READ) {
            Direction::READ
        } else {
            Direction::WRITE
        }
    }
}

impl std::ops::BitOr for ErrorFlags {
    type Output = ErrorFlags;

    fn bitor(self, other: ErrorFlags) -> ErrorFlags {
        ErrorFlags(self.0 | other.0)
    }
}

impl fmt::Debug for ErrorFlags {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags: &[(ErrorFlags, &str)] = &[
            (ErrorFlags::READ, "READ"),
            (ErrorFlags::WRITE, "WRITE"),
            (ErrorFlags::EOF, "EOF"),
            (ErrorFlags::ERROR, "ERROR"),
            (ErrorFlags::TIMEOUT, "TIMEOUT"),
        ];
        let mut one = false;
        for (flag, name) in flags {
            if self.contains(*flag) {
                if one {
                    write!(fmt, " | ")?;
                }
                write!(fmt, "{}", name)?;
                one = true;
            }
        }
        if !one {
            fmt.write_str("(empty)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_direction_sets_exactly_one_direction_bit() {
        let flags = ErrorFlags::for_direction(Direction::READ, ErrorFlags::EOF);
        assert!(flags.contains(ErrorFlags::READ));
        assert!(!flags.contains(ErrorFlags::WRITE));
        assert!(flags.contains(ErrorFlags::EOF));
    }

    #[test]
    fn debug_lists_all_set_flags() {
        let flags = ErrorFlags::READ | ErrorFlags::TIMEOUT;
        assert_eq!("READ | TIMEOUT", format!("{:?}", flags));
    }
}
