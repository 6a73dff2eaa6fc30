//! Event bus implementation
//!
//! Callbacks live in a slot table (`slab::Slab`) and are walked through a
//! separately maintained index sorted by `(order, cookie)`. Because cookies are
//! handed out in ascending order, sorting by cookie within one `order` gives
//! stable FIFO ordering for ties.

use super::{always_continue, Cookie};
use parking_lot::Mutex;
use slab::Slab;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Boxed event handler; returns `false` to veto the remaining handlers
pub type Handler<A> = Box<dyn Fn(&mut A) -> bool + Send + Sync + 'static>;

/// A single registered callback
struct Callback<A> {
    handler: Handler<A>,
    order: i32,
    cookie: Cookie,
}

/// Callback storage guarded by the bus lock
struct Chain<A> {
    slots: Slab<Callback<A>>,
    /// Slab keys sorted ascending by (order, cookie)
    index: Vec<usize>,
}

impl<A> Chain<A> {
    fn new() -> Self {
        Self {
            slots: Slab::new(),
            index: Vec::new(),
        }
    }

    fn insert(&mut self, callback: Callback<A>) {
        let order = callback.order;
        // Insert after every existing entry with order <= ours
        let position = self
            .index
            .partition_point(|&key| self.slots[key].order <= order);
        let key = self.slots.insert(callback);
        self.index.insert(position, key);
    }

    fn remove(&mut self, cookie: Cookie) -> bool {
        let position = self
            .index
            .iter()
            .position(|&key| self.slots[key].cookie == cookie);

        match position {
            Some(position) => {
                let key = self.index.remove(position);
                self.slots.remove(key);
                true
            }
            None => false,
        }
    }
}

/// Ordered, thread-safe multicast event
///
/// Handlers run from lowest to highest `order`; equal orders run in the order
/// they were connected. The first handler returning `false` stops the walk.
///
/// The bus lock is held for the entire [`invoke`](EventBus::invoke) call, so a
/// handler must not call `connect`/`disconnect` on the bus that is invoking it.
/// Other threads may connect and disconnect freely; they wait for the walk to
/// finish.
pub struct EventBus<A> {
    chain: Mutex<Chain<A>>,
    next_cookie: AtomicUsize,
}

impl<A> EventBus<A> {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            chain: Mutex::new(Chain::new()),
            next_cookie: AtomicUsize::new(0),
        }
    }

    /// Register a handler with the given priority
    ///
    /// # Returns
    /// * `Cookie` - Identifier to pass to [`disconnect`](EventBus::disconnect)
    pub fn connect<F>(&self, handler: F, order: i32) -> Cookie
    where
        F: Fn(&mut A) -> bool + Send + Sync + 'static,
    {
        self.connect_handler(Some(Box::new(handler)), order)
    }

    /// Register a handler that never vetoes
    pub fn connect_void<F>(&self, handler: F, order: i32) -> Cookie
    where
        A: 'static,
        F: Fn(&mut A) + Send + Sync + 'static,
    {
        self.connect(always_continue(handler), order)
    }

    /// Register an optional boxed handler
    ///
    /// An absent handler is rejected with [`Cookie::INVALID`] and the bus is left
    /// untouched.
    pub fn connect_handler(&self, handler: Option<Handler<A>>, order: i32) -> Cookie {
        let Some(handler) = handler else {
            log::debug!("Rejected empty event handler");
            return Cookie::INVALID;
        };

        // Draw the cookie under the lock so ties stay sorted by cookie
        let mut chain = self.chain.lock();
        let cookie = Cookie::new(self.next_cookie.fetch_add(1, Ordering::AcqRel));
        chain.insert(Callback {
            handler,
            order,
            cookie,
        });
        cookie
    }

    /// Remove the handler registered under `cookie`
    ///
    /// # Returns
    /// * `bool` - true if a handler was removed, false if none matched
    pub fn disconnect(&self, cookie: Cookie) -> bool {
        if !cookie.is_valid() {
            return false;
        }
        self.chain.lock().remove(cookie)
    }

    /// Call every handler in order until one vetoes
    ///
    /// # Returns
    /// * `bool` - false if a handler returned false, true otherwise (including an empty bus)
    pub fn invoke(&self, args: &mut A) -> bool {
        let chain = self.chain.lock();
        for &key in &chain.index {
            if !(chain.slots[key].handler)(args) {
                return false;
            }
        }
        true
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.chain.lock().index.len()
    }

    /// True if no handler is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every handler; cookies already handed out stay retired
    pub fn clear(&self) {
        let mut chain = self.chain.lock();
        chain.index.clear();
        chain.slots.clear();
    }
}

impl<A> Default for EventBus<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for EventBus<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.len())
            .finish()
    }
}
