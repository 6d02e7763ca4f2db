use std::fmt;

use crate::Token;

/// A readiness event returned by [`EventBase::poll`].
///
/// [`EventBase::poll`]: crate::EventBase::poll
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Event {
    token: Token,
    readable: bool,
    writable: bool,
}

impl Event {
    pub(crate) fn new(token: Token, readable: bool, writable: bool) -> Event {
        Event {
            token,
            readable,
            writable,
        }
    }

    /// The token associated with the I/O event this readiness event reports.
    pub fn token(&self) -> Token {
        self.token
    }

    /// Returns `true` if the event reports read-readiness.
    pub fn is_readable(&self) -> bool {
        self.readable
    }

    /// Returns `true` if the event reports write-readiness.
    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

/// A collection of readiness events, filled in by [`EventBase::poll`].
///
/// A single `Events` instance is typically created once and reused across
/// calls to [`poll`], mirroring the historical `mio::Events` usage pattern.
///
/// [`EventBase::poll`]: crate::EventBase::poll
/// [`poll`]: crate::EventBase::poll
pub struct Events {
    inner: Vec<Event>,
}

impl Events {
    /// Returns a new `Events` capable of holding up to `capacity` events
    /// without reallocating.
    pub fn with_capacity(capacity: usize) -> Events {
        Events {
            inner: Vec::with_capacity(capacity),
        }
    }

    /// The number of `Event`s `self` can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Returns `true` if `self` contains no events.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The number of events currently held.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// An iterator over the held events.
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.inner.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.inner.clear();
    }

    pub(crate) fn push(&mut self, event: Event) {
        self.inner.push(event);
    }
}

impl<'a> IntoIterator for &'a Events {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("length", &self.inner.len())
            .field("capacity", &self.inner.capacity())
            .finish()
    }
}
