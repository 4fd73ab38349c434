//! A small synchronous signaling mechanism
//!
//! Modules of this crate communicate by letting interested parties register
//! callbacks for the events another module produces. The mechanism is
//! synchronous and single-threaded: emitting an event invokes every live
//! callback before [`Emitter::emit`] returns, unless a dispatch is already in
//! progress higher up the stack, in which case the event is queued and
//! delivered by that dispatch.
//!
//! Callbacks are owned by the [`Subscription`] value returned at registration
//! time. Dropping the subscription unregisters the callback; there is no
//! separate unsubscribe call. This makes one-shot listeners easy to express:
//! have the callback drop its own subscription when it has seen what it was
//! waiting for.
//!
//! Emitting or subscribing from within a callback is supported. A callback
//! registered during a dispatch does not observe the event currently being
//! delivered; an event emitted during a dispatch is delivered once the
//! current event has reached every callback.

use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    rc::{Rc, Weak},
};

type Callback<E> = Rc<RefCell<dyn FnMut(&E)>>;

/// A single-threaded event emitter.
///
/// Cloning an `Emitter` yields another handle to the same callback list, with
/// `Rc`-like semantics.
pub struct Emitter<E> {
    inner: Rc<Inner<E>>,
}

struct Inner<E> {
    callbacks: RefCell<Vec<Weak<RefCell<dyn FnMut(&E)>>>>,
    queue: RefCell<VecDeque<E>>,
    dispatching: Cell<bool>,
}

impl<E> Emitter<E> {
    /// Creates an emitter with no subscribers.
    pub fn new() -> Emitter<E> {
        Emitter {
            inner: Rc::new(Inner {
                callbacks: RefCell::new(Vec::new()),
                queue: RefCell::new(VecDeque::new()),
                dispatching: Cell::new(false),
            }),
        }
    }

    /// Registers a callback, returning the [`Subscription`] that keeps it
    /// alive.
    ///
    /// The callback stays registered for as long as the subscription exists;
    /// dropping the subscription unregisters it. A callback registered while
    /// an event is being delivered will only see later events.
    #[must_use]
    pub fn subscribe<F: FnMut(&E) + 'static>(&self, callback: F) -> Subscription
    where
        E: 'static,
    {
        let strong: Callback<E> = Rc::new(RefCell::new(callback));
        self.inner
            .callbacks
            .borrow_mut()
            .push(Rc::downgrade(&strong));
        Subscription {
            _callback: Rc::new(CallbackHolder(strong)),
        }
    }

    /// Delivers `event` to every live callback.
    ///
    /// If this is called from within a callback of the same emitter, the
    /// event is queued and delivered after the event currently in flight.
    pub fn emit(&self, event: E) {
        self.inner.queue.borrow_mut().push_back(event);

        // Re-entrant emit: the outer dispatch drains the queue.
        if self.inner.dispatching.replace(true) {
            return;
        }

        loop {
            let next = self.inner.queue.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };

            // Snapshot the live callbacks so that subscribing or dropping a
            // subscription from inside a callback never observes a borrowed
            // list. Dead weak entries are compacted on the way.
            let snapshot: Vec<Callback<E>> = {
                let mut callbacks = self.inner.callbacks.borrow_mut();
                callbacks.retain(|weak| weak.strong_count() > 0);
                callbacks.iter().filter_map(Weak::upgrade).collect()
            };

            for callback in snapshot {
                (callback.borrow_mut())(&event);
            }
        }

        self.inner.dispatching.set(false);
    }

    /// Number of currently registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .callbacks
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Emitter<E> {
        Emitter {
            inner: self.inner.clone(),
        }
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("subscribers", &self.subscriber_count())
            .field("dispatching", &self.inner.dispatching.get())
            .finish()
    }
}

/// Keeps a callback registered on an [`Emitter`].
///
/// Dropping the subscription unregisters and frees the callback. Dropping it
/// from inside the very callback it owns is allowed; the callback finishes
/// its current invocation and is not called again.
pub struct Subscription {
    _callback: Rc<dyn Any>,
}

/// Sized wrapper so a `Callback<E>` (an `Rc` to an unsized `RefCell<dyn
/// FnMut(&E)>`) can be type-erased into `Rc<dyn Any>`.
struct CallbackHolder<E: 'static>(Callback<E>);

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
