//! The seam toward session entities
//!
//! Sessions (one login each, with their authentication state, idle
//! tracking and property storage) live outside this crate. The seat only
//! needs the fixed accessor surface below, plus four write accessors for the
//! flags it owns, and the session's *activate request* signal, which fires
//! when something asks the session itself (rather than its seat) to become
//! active.
//!
//! Sessions are shared by reference ([`Rc<dyn Session>`]) between a seat and
//! the embedding manager. To avoid ownership cycles a session stores only the
//! *identifier* of its seat, never a handle to it.

use std::sync::Arc;

use downcast_rs::{impl_downcast, Downcast};
use indexmap::IndexMap;

use crate::display::DisplayTemplate;
use crate::seat::SeatReply;
use crate::utils::Emitter;

/// The accessor surface a session entity exposes to its seat.
///
/// Creation times are ISO-8601 strings with a fixed precision, so that
/// lexicographic comparison is temporal comparison; the seat relies on this
/// for its oldest-session tie-break.
pub trait Session: Downcast {
    /// The session's id (an opaque object path).
    fn id(&self) -> String;

    /// The session's type, e.g. `LoginWindow`, if set.
    fn session_type(&self) -> Option<String>;

    /// The text console device the session is displayed on, if any.
    fn display_device(&self) -> Option<String>;

    /// The console device its X11 display runs on, if any.
    fn x11_display_device(&self) -> Option<String>;

    /// ISO-8601 creation time.
    fn creation_time(&self) -> String;

    /// Whether the session is currently open.
    fn is_open(&self) -> bool;

    /// Whether the session is the active one on its seat.
    fn is_active(&self) -> bool;

    /// Whether an open of this session has ever been requested.
    fn ever_open(&self) -> bool;

    /// Whether an open request for this session is currently pending.
    fn under_request(&self) -> bool;

    /// The display template the session wants to be brought up with, if any.
    fn display_template(&self) -> Option<Arc<DisplayTemplate>>;

    /// The session's display variables, fed into template substitution on
    /// the first open request.
    fn display_variables(&self) -> IndexMap<String, String>;

    /// Sets the active flag. Only the owning seat calls this.
    fn set_active(&self, active: bool);

    /// Records the id of the owning seat.
    fn set_seat_id(&self, seat_id: &str);

    /// Sets the ever-open flag.
    fn set_ever_open(&self, ever_open: bool);

    /// Sets the under-request flag.
    fn set_under_request(&self, under_request: bool);

    /// Emitter firing when the session is asked to become active.
    ///
    /// The seat subscribes while it owns the session and answers the carried
    /// reply through its VT-switch machinery.
    fn activate_requests(&self) -> &Emitter<SeatReply>;
}

impl_downcast!(Session);
