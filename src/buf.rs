use std::io::{self, Read, Write};

/// A growable output/input byte buffer with a read cursor.
///
/// Backed by a plain `Vec<u8>` plus a head offset that is periodically
/// compacted away, not by the ring buffer used in some historical
/// `bufferevent`-style implementations: `BufferedEvent` never needs random
/// access into the middle of a buffer, only append-at-tail and
/// drain-from-head, which a `Vec` with an amortized `drain`/`copy_within`
/// compaction serves just as well with far less code.
#[derive(Default)]
pub struct Buffer {
    data: Vec<u8>,
    head: usize,
    occupancy_hook: Option<Box<dyn FnMut(usize, usize) -> bool>>,
}

/// Once the dead space at the front of the buffer exceeds this many bytes
/// (and is at least half the buffer), it is compacted away.
const COMPACT_THRESHOLD: usize = 4096;

impl Buffer {
    /// An empty buffer.
    pub fn new() -> Buffer {
        Buffer::default()
    }

    /// The number of unread bytes currently held.
    pub fn len(&self) -> usize {
        self.data.len() - self.head
    }

    /// Returns `true` if the buffer holds no unread bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A view of the unread bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data[self.head..]
    }

    /// Appends `data` to the tail of the buffer, then runs the occupancy
    /// hook (if any) with the old and new length.
    pub fn append(&mut self, data: &[u8]) {
        let old_len = self.len();
        self.data.extend_from_slice(data);
        self.run_hook(old_len);
    }

    /// Removes and returns the first `n` bytes (or fewer, if the buffer
    /// holds less), then runs the occupancy hook with the old and new
    /// length.
    pub fn drain(&mut self, n: usize) -> Vec<u8> {
        let old_len = self.len();
        let n = n.min(old_len);
        let out = self.data[self.head..self.head + n].to_vec();
        self.head += n;
        self.maybe_compact();
        self.run_hook(old_len);
        out
    }

    /// Discards the first `n` bytes without copying them out.
    pub fn consume(&mut self, n: usize) {
        let old_len = self.len();
        let n = n.min(old_len);
        self.head += n;
        self.maybe_compact();
        self.run_hook(old_len);
    }

    fn maybe_compact(&mut self) {
        if self.head >= COMPACT_THRESHOLD && self.head * 2 >= self.data.len() {
            self.data.copy_within(self.head.., 0);
            self.data.truncate(self.data.len() - self.head);
            self.head = 0;
        }
    }

    /// Installs an occupancy hook: invoked every time the buffer's length
    /// changes (by [`append`], [`drain`], [`consume`], [`read_from_fd`] or
    /// [`write_to_fd`]), with the length just before and just after the
    /// change. The hook returns `true` to uninstall itself, `false` to stay
    /// installed for the next length change.
    ///
    /// At most one hook is ever installed at a time; installing a new one
    /// replaces any still-pending hook without running it. This is not a
    /// one-shot callback: a hook that keeps returning `false` is invoked on
    /// every subsequent mutation, matching a pressure-release hook that
    /// must survive several partial drains before the releasing condition
    /// is finally met.
    ///
    /// [`append`]: Buffer::append
    /// [`drain`]: Buffer::drain
    /// [`consume`]: Buffer::consume
    /// [`read_from_fd`]: Buffer::read_from_fd
    /// [`write_to_fd`]: Buffer::write_to_fd
    pub fn set_occupancy_hook<F>(&mut self, hook: F)
    where
        F: FnMut(usize, usize) -> bool + 'static,
    {
        self.occupancy_hook = Some(Box::new(hook));
    }

    /// Clears any pending occupancy hook without running it.
    pub fn clear_occupancy_hook(&mut self) {
        self.occupancy_hook = None;
    }

    fn run_hook(&mut self, old_len: usize) {
        if let Some(mut hook) = self.occupancy_hook.take() {
            let new_len = self.len();
            if !hook(old_len, new_len) {
                self.occupancy_hook = Some(hook);
            }
        }
    }

    /// Reads up to `max` bytes from `source` and appends them to the
    /// buffer. A `max` of `0` bytes is read as a zero-length `read`, which
    /// this function reports by returning `Ok(0)` without touching the
    /// underlying source's EOF semantics (callers should not pass `0`
    /// unless they mean it).
    ///
    /// Returns `Ok(0)` when `source` reports EOF. Propagates
    /// `WouldBlock`/`Interrupted` as-is so callers can reschedule.
    pub fn read_from_fd<R: Read>(&mut self, source: &mut R, max: usize) -> io::Result<usize> {
        if max == 0 {
            return Ok(0);
        }
        let old_len = self.len();
        let start = self.data.len();
        self.data.resize(start + max, 0);
        let result = source.read(&mut self.data[start..]);
        match result {
            Ok(n) => {
                self.data.truncate(start + n);
                self.run_hook(old_len);
                Ok(n)
            }
            Err(e) => {
                self.data.truncate(start);
                Err(e)
            }
        }
    }

    /// Writes as many unread bytes as `sink` accepts in a single call,
    /// removing them from the buffer. Propagates `WouldBlock`/`Interrupted`
    /// as-is.
    pub fn write_to_fd<W: Write>(&mut self, sink: &mut W) -> io::Result<usize> {
        if self.is_empty() {
            return Ok(0);
        }
        let old_len = self.len();
        match sink.write(self.bytes()) {
            Ok(n) => {
                self.head += n;
                self.maybe_compact();
                self.run_hook(old_len);
                Ok(n)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_drain_round_trip() {
        let mut buf = Buffer::new();
        buf.append(b"hello");
        assert_eq!(buf.len(), 5);
        let out = buf.drain(3);
        assert_eq!(out, b"hel");
        assert_eq!(buf.bytes(), b"lo");
    }

    #[test]
    fn occupancy_hook_stays_installed_until_it_returns_true() {
        let mut buf = Buffer::new();
        let fired = std::rc::Rc::new(std::cell::Cell::new((0, 0)));
        let fired2 = fired.clone();
        buf.set_occupancy_hook(move |old_len, new_len| {
            fired2.set((old_len, new_len));
            new_len >= 6
        });
        buf.append(b"abc");
        assert_eq!(fired.get(), (0, 3));

        // did not return true yet, so it fires again on the next mutation.
        buf.append(b"def");
        assert_eq!(fired.get(), (3, 6));

        // now it released itself; a further mutation does not refire it.
        fired.set((999, 999));
        buf.append(b"g");
        assert_eq!(fired.get(), (999, 999));
    }

    #[test]
    fn occupancy_hook_receives_old_len_not_capacity() {
        let mut buf = Buffer::new();
        buf.append(&vec![0u8; 10]);
        let seen = std::rc::Rc::new(std::cell::Cell::new(None));
        let seen2 = seen.clone();
        buf.set_occupancy_hook(move |old_len, new_len| {
            seen2.set(Some((old_len, new_len)));
            true
        });
        buf.drain(4);
        assert_eq!(seen.get(), Some((10, 6)));
    }

    #[test]
    fn compaction_keeps_unread_bytes_intact() {
        let mut buf = Buffer::new();
        buf.append(&vec![1u8; COMPACT_THRESHOLD * 2]);
        buf.drain(COMPACT_THRESHOLD + 10);
        let remaining = buf.len();
        buf.append(&[9, 9, 9]);
        assert_eq!(buf.len(), remaining + 3);
        assert_eq!(&buf.bytes()[buf.bytes().len() - 3..], &[9, 9, 9]);
    }

    #[test]
    fn read_from_fd_reports_eof_as_zero() {
        let mut buf = Buffer::new();
        let mut empty: &[u8] = &[];
        let n = buf.read_from_fd(&mut empty, 16).unwrap();
        assert_eq!(n, 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn write_to_fd_drains_written_bytes() {
        let mut buf = Buffer::new();
        buf.append(b"payload");
        let mut sink = Vec::new();
        let n = buf.write_to_fd(&mut sink).unwrap();
        assert_eq!(n, 7);
        assert!(buf.is_empty());
        assert_eq!(sink, b"payload");
    }
}
