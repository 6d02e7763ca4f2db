use std::{fmt, ops};

/// A set of I/O directions, `READ` and/or `WRITE`.
///
/// `Direction` is the bitset used at the [`BufferedEvent`] boundary to name
/// which of its two I/O events an operation targets: [`enable`], [`disable`]
/// and [`set_watermark`] all take a `Direction` set rather than requiring two
/// separate calls.
///
/// [`BufferedEvent`]: crate::BufferedEvent
/// [`enable`]: crate::BufferedEvent::enable
/// [`disable`]: crate::BufferedEvent::disable
/// [`set_watermark`]: crate::BufferedEvent::set_watermark
///
/// # Examples
///
/// ```
/// use bufferevent::Direction;
///
/// let both = Direction::READ | Direction::WRITE;
/// assert!(both.contains(Direction::READ));
/// assert!(both.contains(Direction::WRITE));
/// ```
#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash, Default)]
pub struct Direction(u8);

const READ: u8 = 0b01;
const WRITE: u8 = 0b10;

impl Direction {
    /// The empty set.
    pub const NONE: Direction = Direction(0);

    /// The read direction.
    pub const READ: Direction = Direction(READ);

    /// The write direction.
    pub const WRITE: Direction = Direction(WRITE);

    /// Both directions.
    pub const BOTH: Direction = Direction(READ | WRITE);

    /// Returns `true` if `self` contains every direction in `other`.
    #[inline]
    pub fn contains(self, other: Direction) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns `true` if the set is empty.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Inserts `other` into `self`.
    #[inline]
    pub fn insert(&mut self, other: Direction) {
        self.0 |= other.0;
    }

    /// Removes `other` from `self`.
    #[inline]
    pub fn remove(&mut self, other: Direction) {
        self.0 &= !other.0;
    }
}

impl ops::BitOr for Direction {
    type Output = Direction;

    fn bitor(self, other: Direction) -> Direction {
        Direction(self.0 | other.0)
    }
}

impl ops::Sub for Direction {
    type Output = Direction;

    fn sub(self, other: Direction) -> Direction {
        Direction(self.0 & !other.0)
    }
}

impl fmt::Debug for Direction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut one = false;
        if self.contains(Direction::READ) {
            write!(fmt, "READ")?;
            one = true;
        }
        if self.contains(Direction::WRITE) {
            if one {
                write!(fmt, " | ")?;
            }
            write!(fmt, "WRITE")?;
            one = true;
        }
        if !one {
            fmt.write_str("(none)")?;
        }
        Ok(())
    }
}
