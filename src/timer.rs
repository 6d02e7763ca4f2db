use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use crate::{Direction, Token};

/// A merged deadline queue for per-direction I/O timeouts.
///
/// Grounded on `event-internal.h`'s `min_heap` of pending timer events:
/// every armed direction with a nonzero timeout contributes one deadline,
/// and [`EventBase::poll`] folds the nearest deadline into its `select`
/// timeout argument, synthesizing a timeout dispatch when it arrives before
/// any readiness does.
///
/// [`EventBase::poll`]: crate::EventBase::poll
///
/// Rearming the same `(token, direction)` before its old deadline fires
/// invalidates the old entry without a heap removal: entries carry a
/// generation counter, and a popped entry whose generation no longer
/// matches the live generation for its key is silently discarded. This is
/// the same "lazy deletion" trick `BinaryHeap`-backed timer wheels commonly
/// use to avoid an O(n) linear scan for cancellation.
#[derive(Default)]
pub struct Timers {
    heap: BinaryHeap<Reverse<(Instant, u64, Token, Direction)>>,
    generation: HashMap<(Token, Direction), u64>,
}

impl Timers {
    pub fn new() -> Timers {
        Timers::default()
    }

    /// Arms (or re-arms) a deadline `timeout` from now for `(token, dir)`.
    /// Returns the absolute deadline.
    pub fn arm(&mut self, token: Token, dir: Direction, timeout: Duration) -> Instant {
        let deadline = Instant::now() + timeout;
        let gen = self.generation.entry((token, dir)).or_insert(0);
        *gen += 1;
        self.heap.push(Reverse((deadline, *gen, token, dir)));
        deadline
    }

    /// Cancels any pending deadline for `(token, dir)`.
    pub fn cancel(&mut self, token: Token, dir: Direction) {
        if let Some(gen) = self.generation.get_mut(&(token, dir)) {
            *gen += 1;
        }
    }

    /// Cancels every pending deadline for `token`, both directions.
    pub fn cancel_all(&mut self, token: Token) {
        self.cancel(token, Direction::READ);
        self.cancel(token, Direction::WRITE);
    }

    /// The duration until the next live deadline, if any.
    pub fn next_timeout(&mut self) -> Option<Duration> {
        self.peek_next().map(|deadline| {
            let now = Instant::now();
            if deadline > now {
                deadline - now
            } else {
                Duration::from_secs(0)
            }
        })
    }

    fn peek_next(&mut self) -> Option<Instant> {
        self.drop_stale();
        self.heap.peek().map(|Reverse((deadline, ..))| *deadline)
    }

    fn drop_stale(&mut self) {
        while let Some(Reverse((_, gen, token, dir))) = self.heap.peek() {
            let live = self.generation.get(&(*token, *dir)).copied().unwrap_or(0);
            if *gen != live {
                self.heap.pop();
            } else {
                break;
            }
        }
    }

    /// Pops every deadline that has elapsed, returning `(token, direction)`
    /// pairs in no particular order. Stale (cancelled or superseded)
    /// entries are discarded without being reported.
    pub fn expired(&mut self) -> Vec<(Token, Direction)> {
        let now = Instant::now();
        let mut out = Vec::new();
        loop {
            self.drop_stale();
            match self.heap.peek() {
                Some(Reverse((deadline, ..))) if *deadline <= now => {
                    let Reverse((_, _, token, dir)) = self.heap.pop().unwrap();
                    out.push((token, dir));
                }
                _ => break,
            }
        }
        out
    }
}
