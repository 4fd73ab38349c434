//! One-shot completers for deferred method replies
//!
//! Some operations cannot answer their caller synchronously: activating an
//! open session is only done once the next VT switch has been observed. Such
//! operations receive a [`Reply`], an opaque completer the embedding layer
//! builds around its own notion of a pending method call. The operation (or a
//! callback it registered) eventually calls [`Reply::send`] exactly once.
//!
//! A `Reply` can be cloned and carried into callbacks; all clones share one
//! completion slot. Completing a reply twice is a programming error and
//! panics.

use std::{cell::RefCell, fmt, rc::Rc};

/// A one-shot completer for a deferred reply carrying a `T`.
pub struct Reply<T> {
    inner: Rc<ReplyInner<T>>,
}

struct ReplyInner<T> {
    complete: RefCell<Option<Box<dyn FnOnce(T)>>>,
}

impl<T> Reply<T> {
    /// Creates a reply that feeds its value into `complete`.
    pub fn new<F: FnOnce(T) + 'static>(complete: F) -> Reply<T> {
        Reply {
            inner: Rc::new(ReplyInner {
                complete: RefCell::new(Some(Box::new(complete))),
            }),
        }
    }

    /// Completes the reply with `value`.
    ///
    /// # Panics
    ///
    /// Panics if the reply has already been completed; every reply must be
    /// completed exactly once.
    pub fn send(&self, value: T) {
        let complete = self
            .inner
            .complete
            .borrow_mut()
            .take()
            .expect("reply completed twice");
        complete(value);
    }

    /// Whether the reply has been completed already.
    pub fn is_complete(&self) -> bool {
        self.inner.complete.borrow().is_none()
    }
}

impl<T> Clone for Reply<T> {
    fn clone(&self) -> Reply<T> {
        Reply {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("complete", &self.is_complete())
            .finish()
    }
}
