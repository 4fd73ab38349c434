//! The seam toward the IPC bus
//!
//! The core never talks to a message bus directly. Everything it needs from
//! the transport is captured by the [`Transport`] trait: sending a *directed*
//! signal (a point-to-point notification addressed to one named peer, never
//! broadcast) and watching a peer for disappearance. Broadcast signals (the
//! session-added/removed and active-session-changed notifications) are not
//! routed through this trait; the embedding glue subscribes to
//! [`Seat::wire_events`](crate::seat::Seat::wire_events) and forwards them
//! itself.

use std::fmt;

use indexmap::IndexMap;

/// A point-to-point notification for the manager of a seat.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectedSignal {
    /// Ask the manager to open (bring up) a session.
    OpenSessionRequest {
        /// Id of the session to open.
        session: String,
        /// The session's type, e.g. `LoginWindow`.
        session_type: String,
        /// Name of the display template the session refers to.
        display_template: String,
        /// The session's display variables, unexpanded.
        display_variables: IndexMap<String, String>,
        /// The template's display type, e.g. `X11`.
        display_type: String,
        /// The template parameters after `$variable` substitution.
        parameters: IndexMap<String, String>,
    },
    /// Ask the manager to close a session.
    CloseSessionRequest {
        /// Id of the session to close.
        session: String,
    },
    /// Ask the manager to stop respawning a session.
    NoRespawn {
        /// Id of the session not to respawn.
        session: String,
    },
    /// Ask the manager to remove the seat itself.
    RemoveRequest,
}

/// Errors produced by the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// A directed signal could not be delivered.
    #[error("failed to send signal to peer '{peer}': {message}")]
    SendFailed {
        /// The peer the signal was addressed to.
        peer: String,
        /// The transport's own description of the failure.
        message: String,
    },
    /// A liveness watch could not be installed.
    #[error("failed to watch peer '{peer}': {message}")]
    WatchFailed {
        /// The peer that was to be watched.
        peer: String,
        /// The transport's own description of the failure.
        message: String,
    },
}

/// Interface to the IPC bus the embedding daemon is connected to.
pub trait Transport {
    /// Emits `signal` to the single peer named `peer`.
    fn send_to(&self, peer: &str, signal: &DirectedSignal) -> Result<(), TransportError>;

    /// Watches `peer` for disappearance.
    ///
    /// `on_disappeared` is invoked at most once, when the peer leaves the
    /// bus. The returned guard cancels the watch when dropped; cancelling
    /// after the watch has fired must be tolerated by the implementation.
    fn watch_peer(
        &self,
        peer: &str,
        on_disappeared: Box<dyn FnOnce()>,
    ) -> Result<PeerWatch, TransportError>;
}

/// Guard for an installed peer-liveness watch.
///
/// Dropping the guard cancels the watch; the disappearance callback will not
/// run afterwards.
pub struct PeerWatch {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl PeerWatch {
    /// Wraps the transport-specific cancellation action.
    pub fn new<F: FnOnce() + 'static>(cancel: F) -> PeerWatch {
        PeerWatch {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for PeerWatch {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for PeerWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerWatch").finish_non_exhaustive()
    }
}
