use std::cell::RefCell;
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::event::{Event, Events};
use crate::sys;
use crate::timer::Timers;
use crate::{Direction, Interest, Token};

/// The maximum dispatch priority accepted by [`EventBase::set_priority`].
///
/// Grounded on `event-internal.h`'s `nactivequeues`, reduced from a
/// dynamically-sized array of active-event queues to eight fixed buckets,
/// since this crate has no configurable queue count.
pub const MAX_PRIORITY: u8 = 7;

/// The default dispatch priority assigned to a newly registered token.
pub const DEFAULT_PRIORITY: u8 = MAX_PRIORITY / 2;

/// Why an internal dispatch fired: which direction, and whether it was a
/// readiness notification or a timeout.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Readiness {
    /// The read direction became ready.
    Read,
    /// The write direction became ready.
    Write,
    /// The read-direction timeout expired.
    ReadTimeout,
    /// The write-direction timeout expired.
    WriteTimeout,
}

type Sink = Weak<dyn Fn(Readiness)>;

struct Shared {
    selector: sys::Selector,
    raw: Vec<sys::RawEvent>,
    events: Events,
    timers: Timers,
    next_token: usize,
    priorities: HashMap<Token, u8>,
    sinks: HashMap<Token, Sink>,
}

/// Configuration knobs for [`EventBase`].
///
/// Grounded on `mio`'s deprecated `EventLoopBuilder`, reduced to the one
/// pair of knobs this single-threaded core actually has a use for: there is
/// no cross-thread notify channel to size, so only the initial `Events`
/// buffer capacity and a default poll timeout remain.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    events_capacity: usize,
    default_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            events_capacity: 1024,
            default_timeout: None,
        }
    }
}

impl Config {
    /// A new default configuration.
    pub fn new() -> Config {
        Config::default()
    }

    /// Sets the initial capacity of the raw readiness-event buffer.
    pub fn events_capacity(&mut self, capacity: usize) -> &mut Self {
        self.events_capacity = capacity;
        self
    }

    /// Sets the timeout used by [`EventBase::poll`] when `None` is passed
    /// explicitly is not desired as the default blocking behavior.
    pub fn default_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.default_timeout = timeout;
        self
    }

    /// Builds the configured [`EventBase`].
    pub fn build(&self) -> std::io::Result<EventBase> {
        EventBase::with_config(*self)
    }
}

/// The reactor: registers I/O readiness and timer interest, and dispatches
/// callbacks when either fires.
///
/// Grounded on `mio`'s `Poll`/`Registry` split and the `event-internal.h`
/// `event_base`, folded into a single type since this crate has no
/// multi-threaded registration path to split a `Registry` out for. Cheap to
/// clone (an `Rc` handle over shared state), matching the way `mio::Registry`
/// is cloned to register sources from multiple places.
#[derive(Clone)]
pub struct EventBase {
    shared: Rc<RefCell<Shared>>,
    default_timeout: Option<Duration>,
}

impl EventBase {
    /// Creates a new `EventBase` with default configuration.
    pub fn new() -> std::io::Result<EventBase> {
        Config::default().build()
    }

    /// Creates a new `EventBase` whose raw readiness-event buffer can hold
    /// `capacity` events without reallocating.
    pub fn with_capacity(capacity: usize) -> std::io::Result<EventBase> {
        Config::new().events_capacity(capacity).build()
    }

    fn with_config(config: Config) -> std::io::Result<EventBase> {
        let selector = sys::Selector::new()?;
        trace!("EventBase created, events_capacity={}", config.events_capacity);
        Ok(EventBase {
            shared: Rc::new(RefCell::new(Shared {
                selector,
                raw: Vec::with_capacity(config.events_capacity),
                events: Events::with_capacity(config.events_capacity),
                timers: Timers::new(),
                next_token: 0,
                priorities: HashMap::new(),
                sinks: HashMap::new(),
            })),
            default_timeout: config.default_timeout,
        })
    }

    /// Allocates a fresh, never-before-used [`Token`].
    pub(crate) fn alloc_token(&self) -> Token {
        let mut shared = self.shared.borrow_mut();
        let token = Token(shared.next_token);
        shared.next_token += 1;
        shared.priorities.insert(token, DEFAULT_PRIORITY);
        token
    }

    /// Associates a dispatch callback with `token`. Internal handlers are
    /// invoked through this callback whenever [`poll`] observes readiness or
    /// an expired timeout for `token`.
    ///
    /// The callback is held weakly: once every strong reference (held by
    /// the owning [`BufferedEvent`]) is dropped, it stops firing, even if
    /// the token was never explicitly released.
    ///
    /// [`poll`]: EventBase::poll
    /// [`BufferedEvent`]: crate::BufferedEvent
    pub(crate) fn bind(&self, token: Token, dispatch: Rc<dyn Fn(Readiness)>) {
        self.shared
            .borrow_mut()
            .sinks
            .insert(token, Rc::downgrade(&dispatch));
    }

    /// Releases all bookkeeping for `token`: its priority, dispatch
    /// callback, and any pending timers. Does not touch the selector
    /// registration; callers must `deregister` the fd first.
    pub(crate) fn release(&self, token: Token) {
        let mut shared = self.shared.borrow_mut();
        shared.sinks.remove(&token);
        shared.priorities.remove(&token);
        shared.timers.cancel_all(token);
    }

    /// Registers `fd` for `interest`, tagging events with `token`.
    pub fn register(&self, fd: RawFd, token: Token, interest: Interest) -> std::io::Result<()> {
        trace!("register fd={} token={:?} interest={:?}", fd, token, interest);
        self.shared.borrow().selector.register(fd, token, interest)
    }

    /// Updates the interest set previously registered for `fd`/`token`.
    pub fn reregister(&self, fd: RawFd, token: Token, interest: Interest) -> std::io::Result<()> {
        trace!("reregister fd={} token={:?} interest={:?}", fd, token, interest);
        self.shared
            .borrow()
            .selector
            .reregister(fd, token, interest)
    }

    /// Removes `fd`'s registration entirely.
    pub fn deregister(&self, fd: RawFd) -> std::io::Result<()> {
        trace!("deregister fd={}", fd);
        self.shared.borrow().selector.deregister(fd)
    }

    /// Sets the dispatch priority for `token`. Lower numbers are dispatched
    /// first within one [`poll`] batch, matching `event-internal.h`'s
    /// active-queue ordering (queue `0` is serviced before queue `1`, etc).
    ///
    /// [`poll`]: EventBase::poll
    pub fn set_priority(&self, token: Token, priority: u8) -> std::io::Result<()> {
        if priority > MAX_PRIORITY {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("priority must be <= {}", MAX_PRIORITY),
            ));
        }
        self.shared.borrow_mut().priorities.insert(token, priority);
        Ok(())
    }

    /// Arms a `timeout`-from-now deadline for `(token, dir)`. Fires
    /// `Readiness::ReadTimeout`/`WriteTimeout` from the next [`poll`] in
    /// which it has elapsed, unless cancelled or re-armed first.
    ///
    /// [`poll`]: EventBase::poll
    pub fn arm_timeout(&self, token: Token, dir: Direction, timeout: Duration) {
        self.shared.borrow_mut().timers.arm(token, dir, timeout);
    }

    /// Cancels any pending deadline for `(token, dir)`.
    pub fn cancel_timeout(&self, token: Token, dir: Direction) {
        self.shared.borrow_mut().timers.cancel(token, dir);
    }

    /// Blocks (up to `timeout`, or the configured default, or forever)
    /// waiting for I/O readiness or timer expiry, then dispatches every
    /// resulting callback. Returns the number of callbacks dispatched.
    ///
    /// Dispatch happens in ascending priority order within this one batch.
    /// A timer that expired in the same tick a readiness event also landed
    /// for the same `(token, direction)` is dropped rather than dispatched:
    /// `select()` blocking until the fd is ready can easily run past the
    /// configured deadline by the time timers are checked, and a handler is
    /// only ever meant to see one of `READ`/`TIMEOUT` per tick, never a
    /// successful read immediately followed by a spurious timeout error on
    /// the same connection.
    pub fn poll(&mut self, timeout: Option<Duration>) -> std::io::Result<usize> {
        let timeout = timeout.or(self.default_timeout);

        // Clamp the select timeout to the nearest pending timer deadline so
        // a timer that would otherwise never be observed (select blocking
        // forever) still fires on time.
        let select_timeout = {
            let mut shared = self.shared.borrow_mut();
            match (timeout, shared.timers.next_timeout()) {
                (Some(t), Some(n)) => Some(t.min(n)),
                (Some(t), None) => Some(t),
                (None, next) => next,
            }
        };

        {
            let mut shared = self.shared.borrow_mut();
            // `select` borrows `shared.raw` mutably while the selector is
            // also behind `shared`; split the borrow so both are available.
            let Shared { selector, raw, events, .. } = &mut *shared;
            selector.select(raw, select_timeout)?;
            trace!("poll woke with {} raw events", raw.len());
            decode_into(raw, events);
        }

        let expired = self.shared.borrow_mut().timers.expired();

        let mut ready: std::collections::HashSet<(Token, Direction)> = std::collections::HashSet::new();

        let mut batch: Vec<(u8, Token, Readiness)> = Vec::new();
        {
            let shared = self.shared.borrow();
            for event in &shared.events {
                let pri = shared.priorities.get(&event.token()).copied().unwrap_or(DEFAULT_PRIORITY);
                if event.is_readable() {
                    ready.insert((event.token(), Direction::READ));
                    batch.push((pri, event.token(), Readiness::Read));
                }
                if event.is_writable() {
                    ready.insert((event.token(), Direction::WRITE));
                    batch.push((pri, event.token(), Readiness::Write));
                }
            }
            for (token, dir) in expired {
                if ready.contains(&(token, dir)) {
                    debug!("dropping stale timer, token={:?} dir={:?} (readiness also fired this tick)", token, dir);
                    continue;
                }
                let pri = shared.priorities.get(&token).copied().unwrap_or(DEFAULT_PRIORITY);
                let readiness = if dir.contains(Direction::READ) {
                    Readiness::ReadTimeout
                } else {
                    Readiness::WriteTimeout
                };
                debug!("timer expired token={:?} dir={:?}", token, dir);
                batch.push((pri, token, readiness));
            }
        }
        batch.sort_by_key(|(pri, ..)| *pri);

        let mut dispatched = 0;
        for (_, token, readiness) in batch {
            let sink = self.shared.borrow().sinks.get(&token).cloned();
            if let Some(sink) = sink {
                if let Some(dispatch) = sink.upgrade() {
                    dispatch(readiness);
                    dispatched += 1;
                }
            }
        }
        Ok(dispatched)
    }
}

fn decode_into(raw: &[sys::RawEvent], events: &mut Events) {
    events.clear();
    for r in raw {
        let token = sys::decode::token(r);
        let readable = sys::decode::is_readable(r);
        let writable = sys::decode::is_writable(r);
        events.push(Event::new(token, readable, writable));
    }
}
