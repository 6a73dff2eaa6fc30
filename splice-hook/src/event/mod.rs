//! Ordered multicast events
//!
//! This module contains the [`EventBus`] primitive: a thread-safe, priority
//! ordered callback chain with short-circuit veto semantics.

pub mod bus;

pub use bus::{EventBus, Handler};

use std::fmt;

/// Opaque subscription identifier returned by [`EventBus::connect`]
///
/// Cookies are unique per bus and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cookie(usize);

impl Cookie {
    /// Sentinel returned when a subscription could not be made
    pub const INVALID: Cookie = Cookie(usize::MAX);

    pub(crate) fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// True unless this is the [`Cookie::INVALID`] sentinel
    pub fn is_valid(&self) -> bool {
        *self != Cookie::INVALID
    }

    /// Raw numeric value
    pub fn get(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            write!(f, "#invalid")
        }
    }
}

/// Adapt a handler without a continuation decision into one that always continues
///
/// # Example
/// ```
/// use splice_hook::event::{always_continue, EventBus};
///
/// let bus: EventBus<u32> = EventBus::new();
/// bus.connect(always_continue(|value: &mut u32| *value += 1), 0);
/// let mut value = 1;
/// assert!(bus.invoke(&mut value));
/// assert_eq!(value, 2);
/// ```
pub fn always_continue<A, F>(handler: F) -> impl Fn(&mut A) -> bool + Send + Sync + 'static
where
    A: 'static,
    F: Fn(&mut A) + Send + Sync + 'static,
{
    move |args: &mut A| {
        handler(args);
        true
    }
}
