/// A low/high byte-count pair controlling when callbacks fire and when a
/// direction is paused.
///
/// `low == 0` means "no low threshold" (the read callback fires on any data;
/// the write callback fires only when fully drained). `high == 0` means "no
/// high threshold" (read-side backpressure disabled).
///
/// # Examples
///
/// ```
/// use bufferevent::Watermark;
///
/// let wm = Watermark::new(0, 1024);
/// assert_eq!(wm.low, 0);
/// assert_eq!(wm.high, 1024);
/// ```
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Watermark {
    /// The low watermark, in bytes. `0` disables the threshold.
    pub low: usize,
    /// The high watermark, in bytes. `0` disables the threshold.
    pub high: usize,
}

impl Watermark {
    /// Creates a new watermark pair.
    pub fn new(low: usize, high: usize) -> Watermark {
        Watermark { low, high }
    }

    /// Returns `true` if `len` has reached or exceeded a nonzero high
    /// watermark.
    pub fn in_pressure(&self, len: usize) -> bool {
        self.high > 0 && len >= self.high
    }

    /// Returns `true` if `len` clears a nonzero low watermark (or there is
    /// none, in which case any data at all clears it).
    pub fn clears_low(&self, len: usize) -> bool {
        self.low == 0 || len >= self.low
    }

    /// The read budget remaining before `len` reaches the high watermark,
    /// or `None` if the high watermark is disabled (an unbounded read).
    ///
    /// Uses saturating subtraction: if `len` already exceeds `high` (which
    /// can happen right after a `set_watermark` that lowers `high`), the
    /// budget is `0` rather than wrapping, which the caller interprets as an
    /// immediate entry into read pressure.
    pub fn read_budget(&self, len: usize) -> Option<usize> {
        if self.high == 0 {
            None
        } else {
            Some(self.high.saturating_sub(len))
        }
    }
}
