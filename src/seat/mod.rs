//! Seats and their state machine
//!
//! A [`Seat`] owns a set of sessions, tracks which of them is *active*, and
//! coordinates with an external display manager over the seat's transport.
//! Static seats additionally follow the platform's virtual terminals: the
//! foreground VT decides the active session, and activating a session means
//! asking the VT monitor to switch.
//!
//! ## Signal tiers
//!
//! A seat reports its state changes on two observer lists. The *full* tier
//! ([`Seat::events`]) carries strongly-typed payloads (actual session
//! handles) and is meant for in-process consumers such as the enclosing
//! manager, which snapshots its database and runs callouts on these events.
//! The *wire* tier ([`Seat::wire_events`]) carries only ids and is what the
//! transport glue broadcasts to the bus. For every paired emission the full
//! tier fires first, so local consumers always complete before the change
//! becomes visible externally.
//!
//! ## Managers
//!
//! A display manager claims a seat with [`Seat::manage`]. While the binding
//! exists the seat may send it *directed* signals: requests to open a
//! session, close one, stop respawning one, or remove the seat. The binding
//! ends with [`Seat::unmanage`], with the peer disappearing from the bus, or
//! with the seat itself going away. An unmanaged seat drops its requests on
//! the floor; a freshly attached manager gets a full set of open requests so
//! it can bring every session up from scratch.

use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

use indexmap::IndexMap;
use tracing::{debug, info_span, warn};

use crate::display::substitution::evaluate_parameters;
use crate::session::Session;
use crate::transport::{DirectedSignal, PeerWatch, Transport};
use crate::utils::{Emitter, KeyFile, Reply, Subscription};
use crate::vt::{self, VtMonitor};

mod factory;

pub use self::factory::{SeatFactory, SessionLoader, SESSION_DEFINITIONS_DIR};

/// The reply completer carried by suspending seat methods.
pub type SeatReply = Reply<Result<(), SeatError>>;

/// What kind of seat this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatKind {
    /// A fixed, single-instance local seat whose active session follows VT
    /// switches.
    Static,
    /// A transient seat without VT semantics.
    Dynamic,
}

impl fmt::Display for SeatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeatKind::Static => f.write_str("Static"),
            SeatKind::Dynamic => f.write_str("Dynamic"),
        }
    }
}

/// Errors reported by seat operations.
///
/// The seat never aborts on a protocol error; every contract violation maps
/// to the single [`SeatError::General`] kind with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeatError {
    /// A contract violation, described by its message.
    #[error("{0}")]
    General(String),
}

fn general(message: impl Into<String>) -> SeatError {
    SeatError::General(message.into())
}

/// One hardware device belonging to a seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// The device class, e.g. `keyboard`.
    pub class: String,
    /// The device identifier within its class.
    pub id: String,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.class, self.id)
    }
}

/// Strongly-typed seat events, for in-process consumers.
///
/// These are the `-full` halves of the paired emissions; they always precede
/// their [`WireEvent`] counterparts.
#[derive(Clone)]
pub enum SeatEvent {
    /// A session was attached to the seat.
    SessionAdded(Rc<dyn Session>),
    /// A session was detached from the seat.
    SessionRemoved(Rc<dyn Session>),
    /// The active session changed.
    ActiveSessionChanged {
        /// The previously active session, if any.
        old: Option<Rc<dyn Session>>,
        /// The newly active session, if any.
        new: Option<Rc<dyn Session>>,
    },
}

impl fmt::Debug for SeatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeatEvent::SessionAdded(session) => {
                f.debug_tuple("SessionAdded").field(&session.id()).finish()
            }
            SeatEvent::SessionRemoved(session) => {
                f.debug_tuple("SessionRemoved").field(&session.id()).finish()
            }
            SeatEvent::ActiveSessionChanged { old, new } => f
                .debug_struct("ActiveSessionChanged")
                .field("old", &old.as_ref().map(|s| s.id()))
                .field("new", &new.as_ref().map(|s| s.id()))
                .finish(),
        }
    }
}

/// Path-only seat events, for the transport glue to broadcast.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    /// A session was attached to the seat.
    SessionAdded(String),
    /// A session was detached from the seat.
    SessionRemoved(String),
    /// The active session changed; `None` means the seat now has no active
    /// session (broadcast as an empty path).
    ActiveSessionChanged(Option<String>),
    /// A device was added to the seat.
    DeviceAdded(Device),
    /// A device was removed from the seat.
    DeviceRemoved(Device),
}

struct ManagerBinding {
    peer: String,
    _watch: PeerWatch,
}

struct Inner {
    id: String,
    kind: SeatKind,
    seat_type: Option<String>,
    transport: Rc<dyn Transport>,
    vt_monitor: Option<Rc<dyn VtMonitor>>,
    sessions: RefCell<IndexMap<String, Rc<dyn Session>>>,
    devices: RefCell<Vec<Device>>,
    active: RefCell<Option<Rc<dyn Session>>>,
    manager: RefCell<Option<ManagerBinding>>,
    activate_watches: RefCell<HashMap<String, Subscription>>,
    vt_watch: RefCell<Option<Subscription>>,
    events: Emitter<SeatEvent>,
    wire: Emitter<WireEvent>,
    span: tracing::Span,
}

/// A seat: a bundle of devices with a set of sessions, one of them active.
///
/// `Seat` is a handle over `Rc`-shared state; clones refer to the same seat
/// and compare equal. All operations run synchronously on the calling
/// thread, except that [`Seat::activate_session`] may suspend by holding on
/// to its [`SeatReply`] until the next VT switch completes.
pub struct Seat {
    inner: Rc<Inner>,
}

impl Clone for Seat {
    fn clone(&self) -> Seat {
        Seat {
            inner: self.inner.clone(),
        }
    }
}

impl PartialEq for Seat {
    fn eq(&self, other: &Seat) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sessions = self.sessions();
        let active = self.inner.active.borrow().as_ref().map(|s| s.id());
        f.debug_struct("Seat")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("sessions", &sessions)
            .field("active", &active)
            .field("managed", &self.is_managed())
            .finish_non_exhaustive()
    }
}

impl Seat {
    /// Creates a static seat.
    ///
    /// Static seats follow `vt_monitor`: whenever the foreground VT changes
    /// the seat re-evaluates its active session.
    pub fn new_static(
        id: &str,
        seat_type: Option<&str>,
        transport: Rc<dyn Transport>,
        vt_monitor: Rc<dyn VtMonitor>,
    ) -> Seat {
        Seat::build(id, SeatKind::Static, seat_type, transport, Some(vt_monitor))
    }

    /// Creates a dynamic seat.
    ///
    /// Dynamic seats have no VT semantics; their active session is the first
    /// open session in iteration order.
    pub fn new_dynamic(id: &str, seat_type: Option<&str>, transport: Rc<dyn Transport>) -> Seat {
        Seat::build(id, SeatKind::Dynamic, seat_type, transport, None)
    }

    fn build(
        id: &str,
        kind: SeatKind,
        seat_type: Option<&str>,
        transport: Rc<dyn Transport>,
        vt_monitor: Option<Rc<dyn VtMonitor>>,
    ) -> Seat {
        let inner = Rc::new(Inner {
            id: id.to_owned(),
            kind,
            seat_type: seat_type.map(str::to_owned),
            transport,
            vt_monitor,
            sessions: RefCell::new(IndexMap::new()),
            devices: RefCell::new(Vec::new()),
            active: RefCell::new(None),
            manager: RefCell::new(None),
            activate_watches: RefCell::new(HashMap::new()),
            vt_watch: RefCell::new(None),
            events: Emitter::new(),
            wire: Emitter::new(),
            span: info_span!("seat", id = %id),
        });

        if let Some(monitor) = &inner.vt_monitor {
            let weak = Rc::downgrade(&inner);
            let watch = monitor.active_changed().subscribe(move |&vt| {
                if let Some(inner) = weak.upgrade() {
                    let seat = Seat { inner };
                    let _span = seat.inner.span.enter();
                    debug!("active vt changed: {}", vt);
                    seat.update_active_vt(vt);
                }
            });
            *inner.vt_watch.borrow_mut() = Some(watch);
        }

        Seat { inner }
    }

    /// The seat's id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The seat's kind.
    pub fn kind(&self) -> SeatKind {
        self.inner.kind
    }

    /// The seat's type string, if it has one.
    pub fn seat_type(&self) -> Option<String> {
        self.inner.seat_type.clone()
    }

    /// Whether sessions on this seat can be activated.
    ///
    /// Only static seats support activation.
    pub fn can_activate_sessions(&self) -> bool {
        self.inner.kind == SeatKind::Static
    }

    /// Whether a manager currently holds the seat.
    pub fn is_managed(&self) -> bool {
        self.inner.manager.borrow().is_some()
    }

    /// Snapshot of the ids of all sessions on the seat, in insertion order.
    pub fn sessions(&self) -> Vec<String> {
        self.inner.sessions.borrow().keys().cloned().collect()
    }

    /// The session with id `ssid`, if it is on this seat.
    pub fn session(&self, ssid: &str) -> Option<Rc<dyn Session>> {
        self.inner.sessions.borrow().get(ssid).cloned()
    }

    /// Snapshot of the seat's devices.
    pub fn devices(&self) -> Vec<Device> {
        self.inner.devices.borrow().clone()
    }

    /// The id of the active session.
    pub fn active_session(&self) -> Result<String, SeatError> {
        self.inner
            .active
            .borrow()
            .as_ref()
            .map(|session| session.id())
            .ok_or_else(|| general("Seat has no active session"))
    }

    /// The full-tier event emitter; see the module docs for the tiers.
    pub fn events(&self) -> &Emitter<SeatEvent> {
        &self.inner.events
    }

    /// The wire-tier event emitter; see the module docs for the tiers.
    pub fn wire_events(&self) -> &Emitter<WireEvent> {
        &self.inner.wire
    }

    /// Attaches `session` to the seat.
    ///
    /// Sets the session's seat id, subscribes to its activate requests,
    /// emits the session-added pair, re-evaluates the active session, and,
    /// if the seat is managed, requests that the manager open the session.
    ///
    /// A session whose id is already present on the seat is rejected.
    pub fn add_session(&self, session: Rc<dyn Session>) -> Result<(), SeatError> {
        let _span = self.inner.span.enter();
        let ssid = session.id();

        if self.inner.sessions.borrow().contains_key(&ssid) {
            return Err(general(format!(
                "Session '{ssid}' is already attached to this seat"
            )));
        }

        debug!("adding session {}", ssid);
        session.set_seat_id(&self.inner.id);

        let watch = session.activate_requests().subscribe({
            let weak = Rc::downgrade(&self.inner);
            let ssid = ssid.clone();
            move |reply: &SeatReply| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let seat = Seat { inner };
                if let Some(session) = seat.session(&ssid) {
                    seat.activate_open_session(&session, reply.clone());
                }
            }
        });

        self.inner
            .sessions
            .borrow_mut()
            .insert(ssid.clone(), session.clone());
        self.inner
            .activate_watches
            .borrow_mut()
            .insert(ssid.clone(), watch);

        self.inner.events.emit(SeatEvent::SessionAdded(session.clone()));
        self.inner.wire.emit(WireEvent::SessionAdded(ssid));

        self.maybe_update_active_session();

        if self.is_managed() {
            self.request_open_session(&session)?;
        }

        Ok(())
    }

    /// Detaches `session` from the seat.
    ///
    /// Emits the session-removed pair and re-evaluates the active session;
    /// if the removed session was active and no replacement was found, the
    /// seat ends up with no active session.
    pub fn remove_session(&self, session: &Rc<dyn Session>) -> Result<(), SeatError> {
        let _span = self.inner.span.enter();
        let ssid = session.id();

        let removed = self.inner.sessions.borrow_mut().shift_remove(&ssid);
        let Some(removed) = removed else {
            debug!("session {} is not attached to seat {}", ssid, self.inner.id);
            return Err(general("Session is not attached to this seat"));
        };

        debug!("removing session {}", ssid);
        self.inner.activate_watches.borrow_mut().remove(&ssid);

        self.inner
            .events
            .emit(SeatEvent::SessionRemoved(removed.clone()));
        self.inner.wire.emit(WireEvent::SessionRemoved(ssid));

        self.maybe_update_active_session();

        // The selection pass cannot re-pick the removed session, but it may
        // find nothing at all; the active reference must not dangle.
        let still_active = self
            .inner
            .active
            .borrow()
            .as_ref()
            .map(|active| Rc::ptr_eq(active, &removed))
            .unwrap_or(false);
        if still_active {
            self.change_active_session(None);
        }

        Ok(())
    }

    /// Adds a device to the seat.
    pub fn add_device(&self, device: Device) -> Result<(), SeatError> {
        let _span = self.inner.span.enter();

        if self.inner.devices.borrow().contains(&device) {
            return Err(general("Device already present"));
        }

        debug!("adding device {}", device);
        self.inner.devices.borrow_mut().push(device.clone());
        self.inner.wire.emit(WireEvent::DeviceAdded(device));
        Ok(())
    }

    /// Removes a device from the seat.
    pub fn remove_device(&self, device: &Device) -> Result<(), SeatError> {
        let _span = self.inner.span.enter();

        let position = self
            .inner
            .devices
            .borrow()
            .iter()
            .position(|candidate| candidate == device);
        let Some(position) = position else {
            return Err(general("Device not present"));
        };

        debug!("removing device {}", device);
        self.inner.devices.borrow_mut().remove(position);
        self.inner.wire.emit(WireEvent::DeviceRemoved(device.clone()));
        Ok(())
    }

    /// Activates the session with id `ssid`.
    ///
    /// An unknown id fails the reply immediately. A session that is not yet
    /// open is requested from the manager and the reply succeeds at once;
    /// the actual switch is retried once the session opens. An open session
    /// goes through the VT switch machinery, and the reply completes only
    /// when the next VT transition has been observed.
    pub fn activate_session(&self, ssid: &str, reply: SeatReply) {
        let _span = self.inner.span.enter();
        debug!("trying to activate session: {}", ssid);

        let Some(session) = self.session(ssid) else {
            reply.send(Err(general("Unknown session id")));
            return;
        };

        if !session.is_open() {
            if let Err(err) = self.request_open_session(&session) {
                warn!("open request for {} failed: {}", ssid, err);
            }
            reply.send(Ok(()));
        } else {
            self.activate_open_session(&session, reply);
        }
    }

    /// Binds the seat to the manager peer `peer`.
    ///
    /// Fails if another manager already holds the seat. On success every
    /// session's ever-open and under-request flags are reset and an open
    /// request is issued for each, so the new manager can bring the seat up
    /// from scratch.
    pub fn manage(&self, peer: &str) -> Result<(), SeatError> {
        let _span = self.inner.span.enter();
        debug!("manage requested by '{}'", peer);

        {
            let manager = self.inner.manager.borrow();
            if let Some(binding) = &*manager {
                return Err(general(format!(
                    "Seat already managed (by '{}')",
                    binding.peer
                )));
            }
        }

        let watch = self
            .inner
            .transport
            .watch_peer(peer, {
                let weak = Rc::downgrade(&self.inner);
                Box::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        Seat { inner }.manager_disappeared();
                    }
                })
            })
            .map_err(|err| general(err.to_string()))?;

        *self.inner.manager.borrow_mut() = Some(ManagerBinding {
            peer: peer.to_owned(),
            _watch: watch,
        });

        let sessions: Vec<_> = self.inner.sessions.borrow().values().cloned().collect();
        for session in sessions {
            session.set_ever_open(false);
            session.set_under_request(false);
            self.request_open_session(&session)?;
        }

        Ok(())
    }

    /// Releases the manager binding held by `peer`.
    ///
    /// Fails if the seat is unmanaged or held by a different peer.
    pub fn unmanage(&self, peer: &str) -> Result<(), SeatError> {
        let _span = self.inner.span.enter();
        debug!("unmanage requested by '{}'", peer);

        let held_by = {
            let manager = self.inner.manager.borrow();
            let Some(binding) = &*manager else {
                return Err(general("Seat not managed"));
            };
            binding.peer.clone()
        };

        if held_by != peer {
            return Err(general(format!(
                "Seat managed by '{held_by}' not '{peer}'"
            )));
        }

        self.manager_disappeared();
        Ok(())
    }

    /// Asks the manager to open `session`.
    ///
    /// The request is skipped (successfully) when the session is already
    /// open, already has a request pending, or lacks a display template or
    /// session type. Otherwise the session is marked as under request and an
    /// `OpenSessionRequest` is emitted, its template parameters evaluated
    /// against the session's display variables on the first request and
    /// against nothing on later ones.
    pub fn request_open_session(&self, session: &Rc<dyn Session>) -> Result<(), SeatError> {
        if session.is_open() || session.under_request() {
            return Ok(());
        }
        let Some(template) = session.display_template() else {
            return Ok(());
        };
        let Some(session_type) = session.session_type() else {
            return Ok(());
        };

        session.set_under_request(true);

        let variables = session.display_variables();
        let parameters = if !session.ever_open() {
            evaluate_parameters(template.parameters(), &variables)
        } else {
            evaluate_parameters(template.parameters(), &IndexMap::new())
        };

        self.emit_to_manager(DirectedSignal::OpenSessionRequest {
            session: session.id(),
            session_type,
            display_template: template.name().to_owned(),
            display_variables: variables,
            display_type: template.display_type().to_owned(),
            parameters,
        });

        Ok(())
    }

    /// Asks the manager to close `session`. Requires a managed seat.
    pub fn request_close_session(&self, session: &Rc<dyn Session>) -> Result<(), SeatError> {
        if !self.is_managed() {
            return Err(general("Seat not managed"));
        }

        let _span = self.inner.span.enter();
        debug!("requesting close of session {}", session.id());
        self.emit_to_manager(DirectedSignal::CloseSessionRequest {
            session: session.id(),
        });
        Ok(())
    }

    /// Asks the manager to stop respawning `session`. Requires a managed
    /// seat.
    pub fn no_respawn(&self, session: &Rc<dyn Session>) -> Result<(), SeatError> {
        if !self.is_managed() {
            return Err(general("Seat not managed"));
        }

        let _span = self.inner.span.enter();
        debug!("requesting no-respawn of session {}", session.id());
        self.emit_to_manager(DirectedSignal::NoRespawn {
            session: session.id(),
        });
        Ok(())
    }

    /// Asks the manager to remove this seat. Requires a managed seat.
    pub fn request_removal(&self) -> Result<(), SeatError> {
        if !self.is_managed() {
            return Err(general("Seat not managed"));
        }

        let _span = self.inner.span.enter();
        debug!("requesting seat removal");
        self.emit_to_manager(DirectedSignal::RemoveRequest);
        Ok(())
    }

    /// Writes a snapshot of the seat into `file`, under the group
    /// `Seat <id>`.
    pub fn dump(&self, file: &mut KeyFile) {
        let group = format!("Seat {}", self.inner.id);

        file.set(&group, "kind", &self.inner.kind.to_string());

        let sessions = self.sessions().join(" ");
        file.set(&group, "sessions", &sessions);

        let devices = self
            .inner
            .devices
            .borrow()
            .iter()
            .map(Device::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        file.set(&group, "devices", &devices);

        if let Ok(active) = self.active_session() {
            file.set(&group, "active_session", &active);
        }
    }

    fn manager_disappeared(&self) {
        let _span = self.inner.span.enter();
        debug!("manager is gone");
        // Dropping the binding also drops the peer watch.
        self.inner.manager.borrow_mut().take();
    }

    fn emit_to_manager(&self, signal: DirectedSignal) {
        let peer = {
            let manager = self.inner.manager.borrow();
            match &*manager {
                Some(binding) => binding.peer.clone(),
                None => {
                    debug!("seat is not managed, dropping request");
                    return;
                }
            }
        };

        if let Err(err) = self.inner.transport.send_to(&peer, &signal) {
            warn!("dropping undeliverable request: {}", err);
        }
    }

    /// Runs the VT switch machinery for an open session.
    fn activate_open_session(&self, session: &Rc<dyn Session>, reply: SeatReply) {
        let _span = self.inner.span.enter();
        let monitor = match (self.inner.kind, self.inner.vt_monitor.as_ref()) {
            (SeatKind::Static, Some(monitor)) => monitor.clone(),
            _ => {
                reply.send(Err(general(
                    "Activation not supported for this kind of seat",
                )));
                return;
            }
        };

        let device = session
            .x11_display_device()
            .or_else(|| session.display_device());
        let Some(vt) = device.as_deref().and_then(vt::console_number) else {
            reply.send(Err(general("Unable to activate session")));
            return;
        };

        debug!("attempting to activate vt {}", vt);

        // One-shot: the observer owns its own subscription through `pending`
        // and drops it the first time it fires.
        let pending: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let observer = monitor.active_changed().subscribe({
            let pending = pending.clone();
            let reply = reply.clone();
            move |&active| {
                if pending.borrow_mut().take().is_none() {
                    return;
                }
                if active == vt {
                    reply.send(Ok(()));
                } else {
                    reply.send(Err(general("Another session was activated while waiting")));
                }
            }
        });
        *pending.borrow_mut() = Some(observer);

        if let Err(err) = monitor.switch_to(vt) {
            debug!("unable to activate session: {}", err);
            if pending.borrow_mut().take().is_some() {
                reply.send(Err(general(err.to_string())));
            }
        }
    }

    /// Re-evaluates which session should be active.
    fn maybe_update_active_session(&self) {
        match self.inner.kind {
            SeatKind::Static => {
                let Some(monitor) = self.inner.vt_monitor.as_ref() else {
                    return;
                };
                if let Some(vt) = monitor.active_vt() {
                    self.update_active_vt(vt);
                }
            }
            SeatKind::Dynamic => self.find_possible_session_to_activate(),
        }
    }

    fn update_active_vt(&self, vt: u32) {
        let device = vt::console_device(vt);
        debug!("active device: {}", device);

        match self.find_session_for_device(&device) {
            Some(session) => self.change_active_session(Some(session)),
            None => self.find_possible_session_to_activate(),
        }
    }

    /// The session displayed on `device`; the oldest one if several claim it.
    fn find_session_for_device(&self, device: &str) -> Option<Rc<dyn Session>> {
        let mut matches: Vec<Rc<dyn Session>> = {
            let sessions = self.inner.sessions.borrow();
            let on_display: Vec<_> = sessions
                .values()
                .filter(|session| session.display_device().as_deref() == Some(device))
                .cloned()
                .collect();
            if !on_display.is_empty() {
                on_display
            } else {
                sessions
                    .values()
                    .filter(|session| session.x11_display_device().as_deref() == Some(device))
                    .cloned()
                    .collect()
            }
        };

        // ISO-8601 creation times compare lexicographically.
        matches.sort_by(|a, b| a.creation_time().cmp(&b.creation_time()));
        matches.into_iter().next()
    }

    /// Fallback selection: the first open session wins; failing that, a
    /// LoginWindow session is primed so the manager brings a greeter up. The
    /// active session does not change in the latter case.
    fn find_possible_session_to_activate(&self) {
        let sessions: Vec<Rc<dyn Session>> =
            self.inner.sessions.borrow().values().cloned().collect();

        let mut login_window = None;
        for session in sessions {
            if session.is_open() {
                self.change_active_session(Some(session));
                return;
            }
            if login_window.is_none()
                && session.session_type().as_deref() == Some("LoginWindow")
            {
                login_window = Some(session);
            }
        }

        if let Some(login_window) = login_window {
            login_window.set_ever_open(false);
            if let Err(err) = self.request_open_session(&login_window) {
                warn!("unable to prime login window: {}", err);
            }
        }
    }

    fn change_active_session(&self, new: Option<Rc<dyn Session>>) {
        let old = self.inner.active.borrow().clone();

        match (&old, &new) {
            (None, None) => return,
            (Some(old), Some(new)) if Rc::ptr_eq(old, new) => return,
            _ => {}
        }

        if let Some(old) = &old {
            old.set_active(false);
        }
        *self.inner.active.borrow_mut() = new.clone();
        if let Some(new) = &new {
            new.set_active(true);
        }

        let new_id = new.as_ref().map(|session| session.id());
        debug!(
            "active session changed: {}",
            new_id.as_deref().unwrap_or("(none)")
        );

        // Local consumers must observe the change before it is broadcast, so
        // the full tier goes first.
        self.inner
            .events
            .emit(SeatEvent::ActiveSessionChanged { old, new });
        self.inner
            .wire
            .emit(WireEvent::ActiveSessionChanged(new_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;
    use std::sync::Arc;

    use crate::display::DisplayTemplate;
    use crate::transport::TransportError;
    use crate::vt::source::ChannelVtMonitor;
    use crate::vt::VtSwitchError;

    struct TestSession {
        id: String,
        session_type: RefCell<Option<String>>,
        display_device: RefCell<Option<String>>,
        x11_display_device: RefCell<Option<String>>,
        creation_time: RefCell<String>,
        open: Cell<bool>,
        active: Cell<bool>,
        ever_open: Cell<bool>,
        under_request: Cell<bool>,
        seat_id: RefCell<Option<String>>,
        template: RefCell<Option<Arc<DisplayTemplate>>>,
        variables: RefCell<IndexMap<String, String>>,
        activate: Emitter<SeatReply>,
    }

    impl Session for TestSession {
        fn id(&self) -> String {
            self.id.clone()
        }
        fn session_type(&self) -> Option<String> {
            self.session_type.borrow().clone()
        }
        fn display_device(&self) -> Option<String> {
            self.display_device.borrow().clone()
        }
        fn x11_display_device(&self) -> Option<String> {
            self.x11_display_device.borrow().clone()
        }
        fn creation_time(&self) -> String {
            self.creation_time.borrow().clone()
        }
        fn is_open(&self) -> bool {
            self.open.get()
        }
        fn is_active(&self) -> bool {
            self.active.get()
        }
        fn ever_open(&self) -> bool {
            self.ever_open.get()
        }
        fn under_request(&self) -> bool {
            self.under_request.get()
        }
        fn display_template(&self) -> Option<Arc<DisplayTemplate>> {
            self.template.borrow().clone()
        }
        fn display_variables(&self) -> IndexMap<String, String> {
            self.variables.borrow().clone()
        }
        fn set_active(&self, active: bool) {
            self.active.set(active);
        }
        fn set_seat_id(&self, seat_id: &str) {
            *self.seat_id.borrow_mut() = Some(seat_id.to_owned());
        }
        fn set_ever_open(&self, ever_open: bool) {
            self.ever_open.set(ever_open);
        }
        fn set_under_request(&self, under_request: bool) {
            self.under_request.set(under_request);
        }
        fn activate_requests(&self) -> &Emitter<SeatReply> {
            &self.activate
        }
    }

    fn session(id: &str) -> Rc<TestSession> {
        Rc::new(TestSession {
            id: id.to_owned(),
            session_type: RefCell::new(None),
            display_device: RefCell::new(None),
            x11_display_device: RefCell::new(None),
            creation_time: RefCell::new("2020-01-01T00:00:00Z".to_owned()),
            open: Cell::new(false),
            active: Cell::new(false),
            ever_open: Cell::new(false),
            under_request: Cell::new(false),
            seat_id: RefCell::new(None),
            template: RefCell::new(None),
            variables: RefCell::new(IndexMap::new()),
            activate: Emitter::new(),
        })
    }

    fn dyn_session(session: &Rc<TestSession>) -> Rc<dyn Session> {
        session.clone()
    }

    fn vars(entries: &[(&str, &str)]) -> IndexMap<String, String> {
        entries
            .iter()
            .map(|&(k, v)| (k.to_owned(), v.to_owned()))
            .collect()
    }

    fn x11_template() -> Arc<DisplayTemplate> {
        Arc::new(DisplayTemplate::new(
            "default",
            "X11",
            vars(&[("Exec", "/usr/bin/X $display vt$vt")]),
        ))
    }

    struct WatchEntry {
        peer: String,
        on_disappeared: RefCell<Option<Box<dyn FnOnce()>>>,
        cancelled: Cell<bool>,
    }

    #[derive(Default)]
    struct TestTransport {
        sent: RefCell<Vec<(String, DirectedSignal)>>,
        fail_sends: Cell<bool>,
        watches: RefCell<Vec<Rc<WatchEntry>>>,
    }

    impl Transport for TestTransport {
        fn send_to(&self, peer: &str, signal: &DirectedSignal) -> Result<(), TransportError> {
            if self.fail_sends.get() {
                return Err(TransportError::SendFailed {
                    peer: peer.to_owned(),
                    message: "bus unavailable".to_owned(),
                });
            }
            self.sent.borrow_mut().push((peer.to_owned(), signal.clone()));
            Ok(())
        }

        fn watch_peer(
            &self,
            peer: &str,
            on_disappeared: Box<dyn FnOnce()>,
        ) -> Result<PeerWatch, TransportError> {
            let entry = Rc::new(WatchEntry {
                peer: peer.to_owned(),
                on_disappeared: RefCell::new(Some(on_disappeared)),
                cancelled: Cell::new(false),
            });
            self.watches.borrow_mut().push(entry.clone());
            Ok(PeerWatch::new(move || entry.cancelled.set(true)))
        }
    }

    impl TestTransport {
        /// Simulates `peer` dropping off the bus.
        fn vanish(&self, peer: &str) {
            let entries: Vec<_> = self.watches.borrow().iter().cloned().collect();
            for entry in entries {
                if entry.peer != peer || entry.cancelled.get() {
                    continue;
                }
                let callback = entry.on_disappeared.borrow_mut().take();
                if let Some(callback) = callback {
                    callback();
                }
            }
        }
    }

    struct StaticFixture {
        transport: Rc<TestTransport>,
        monitor: Rc<ChannelVtMonitor>,
        switch_log: Rc<RefCell<Vec<u32>>>,
        switch_error: Rc<RefCell<Option<String>>>,
        seat: Seat,
    }

    fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn static_seat() -> StaticFixture {
        init_logging();
        let transport = Rc::new(TestTransport::default());
        let switch_log = Rc::new(RefCell::new(Vec::new()));
        let switch_error: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
        let (monitor, _sender, _source) = ChannelVtMonitor::new({
            let log = switch_log.clone();
            let error = switch_error.clone();
            move |vt| {
                log.borrow_mut().push(vt);
                match &*error.borrow() {
                    Some(message) => Err(VtSwitchError(message.clone())),
                    None => Ok(()),
                }
            }
        });
        let seat = Seat::new_static("/test/Seat0", None, transport.clone(), monitor.clone());
        StaticFixture {
            transport,
            monitor,
            switch_log,
            switch_error,
            seat,
        }
    }

    type ReplySlot = Rc<RefCell<Option<Result<(), SeatError>>>>;

    fn make_reply() -> (SeatReply, ReplySlot) {
        let slot: ReplySlot = Rc::new(RefCell::new(None));
        let slot2 = slot.clone();
        (Reply::new(move |result| *slot2.borrow_mut() = Some(result)), slot)
    }

    struct EventLog {
        entries: Rc<RefCell<Vec<String>>>,
        _full: Subscription,
        _wire: Subscription,
    }

    fn record(seat: &Seat) -> EventLog {
        let entries = Rc::new(RefCell::new(Vec::new()));

        let full_entries = entries.clone();
        let full = seat.events().subscribe(move |event: &SeatEvent| {
            let tag = match event {
                SeatEvent::SessionAdded(s) => format!("full:session-added:{}", s.id()),
                SeatEvent::SessionRemoved(s) => format!("full:session-removed:{}", s.id()),
                SeatEvent::ActiveSessionChanged { old, new } => format!(
                    "full:active-changed:{}>{}",
                    old.as_ref().map(|s| s.id()).unwrap_or_default(),
                    new.as_ref().map(|s| s.id()).unwrap_or_default(),
                ),
            };
            full_entries.borrow_mut().push(tag);
        });

        let wire_entries = entries.clone();
        let wire = seat.wire_events().subscribe(move |event: &WireEvent| {
            let tag = match event {
                WireEvent::SessionAdded(id) => format!("wire:session-added:{id}"),
                WireEvent::SessionRemoved(id) => format!("wire:session-removed:{id}"),
                WireEvent::ActiveSessionChanged(id) => {
                    format!("wire:active-changed:{}", id.clone().unwrap_or_default())
                }
                WireEvent::DeviceAdded(device) => format!("wire:device-added:{device}"),
                WireEvent::DeviceRemoved(device) => format!("wire:device-removed:{device}"),
            };
            wire_entries.borrow_mut().push(tag);
        });

        EventLog {
            entries,
            _full: full,
            _wire: wire,
        }
    }

    #[test]
    fn accessors_report_construction_parameters() {
        let fixture = static_seat();
        assert_eq!(fixture.seat.id(), "/test/Seat0");
        assert_eq!(fixture.seat.kind(), SeatKind::Static);
        assert_eq!(fixture.seat.seat_type(), None);
        assert!(fixture.seat.can_activate_sessions());
        assert!(!fixture.seat.is_managed());

        let dynamic = Seat::new_dynamic(
            "/test/Seat1",
            Some("Transient"),
            Rc::new(TestTransport::default()),
        );
        assert_eq!(dynamic.kind(), SeatKind::Dynamic);
        assert_eq!(dynamic.seat_type(), Some("Transient".to_owned()));
        assert!(!dynamic.can_activate_sessions());
    }

    #[test]
    fn static_seat_activates_session_on_current_vt() {
        let fixture = static_seat();
        fixture.monitor.notify(1);

        let log = record(&fixture.seat);

        let a = session("/test/SessionA");
        a.display_device.replace(Some("/dev/tty1".to_owned()));
        let b = session("/test/SessionB");
        b.display_device.replace(Some("/dev/tty2".to_owned()));
        b.creation_time.replace("2020-01-01T00:00:01Z".to_owned());

        fixture.seat.add_session(a.clone()).unwrap();
        fixture.seat.add_session(b.clone()).unwrap();

        assert_eq!(fixture.seat.active_session().unwrap(), "/test/SessionA");
        assert!(a.active.get());
        assert!(!b.active.get());
        assert_eq!(
            log.entries.borrow().as_slice(),
            [
                "full:session-added:/test/SessionA",
                "wire:session-added:/test/SessionA",
                "full:active-changed:>/test/SessionA",
                "wire:active-changed:/test/SessionA",
                "full:session-added:/test/SessionB",
                "wire:session-added:/test/SessionB",
            ]
        );
    }

    #[test]
    fn vt_switch_moves_the_active_session() {
        let fixture = static_seat();
        fixture.monitor.notify(1);

        let a = session("/test/SessionA");
        a.display_device.replace(Some("/dev/tty1".to_owned()));
        let b = session("/test/SessionB");
        b.display_device.replace(Some("/dev/tty2".to_owned()));
        b.creation_time.replace("2020-01-01T00:00:01Z".to_owned());
        fixture.seat.add_session(a.clone()).unwrap();
        fixture.seat.add_session(b.clone()).unwrap();

        let log = record(&fixture.seat);
        fixture.monitor.notify(2);

        assert_eq!(fixture.seat.active_session().unwrap(), "/test/SessionB");
        assert!(!a.active.get());
        assert!(b.active.get());
        assert_eq!(
            log.entries.borrow().as_slice(),
            [
                "full:active-changed:/test/SessionA>/test/SessionB",
                "wire:active-changed:/test/SessionB",
            ]
        );
    }

    #[test]
    fn oldest_session_wins_a_device_tie() {
        let fixture = static_seat();

        let newer = session("/test/SessionNew");
        newer.display_device.replace(Some("/dev/tty3".to_owned()));
        newer.creation_time.replace("2021-06-01T12:00:00Z".to_owned());
        let older = session("/test/SessionOld");
        older.display_device.replace(Some("/dev/tty3".to_owned()));
        older.creation_time.replace("2021-06-01T11:59:59Z".to_owned());

        fixture.seat.add_session(newer.clone()).unwrap();
        fixture.seat.add_session(older.clone()).unwrap();

        fixture.monitor.notify(3);

        assert_eq!(fixture.seat.active_session().unwrap(), "/test/SessionOld");
    }

    #[test]
    fn x11_display_device_matches_as_a_fallback() {
        let fixture = static_seat();

        let x = session("/test/SessionX");
        x.x11_display_device.replace(Some("/dev/tty7".to_owned()));
        fixture.seat.add_session(x.clone()).unwrap();

        fixture.monitor.notify(7);

        assert_eq!(fixture.seat.active_session().unwrap(), "/test/SessionX");
    }

    #[test]
    fn add_session_records_the_seat_id() {
        let fixture = static_seat();
        let a = session("/test/SessionA");
        fixture.seat.add_session(a.clone()).unwrap();
        assert_eq!(*a.seat_id.borrow(), Some("/test/Seat0".to_owned()));
    }

    #[test]
    fn duplicate_session_ids_are_rejected() {
        let fixture = static_seat();
        let a = session("/test/SessionA");
        fixture.seat.add_session(a).unwrap();

        let log = record(&fixture.seat);
        let again = session("/test/SessionA");
        let err = fixture.seat.add_session(again).unwrap_err();

        assert_eq!(
            err,
            SeatError::General(
                "Session '/test/SessionA' is already attached to this seat".to_owned()
            )
        );
        assert_eq!(fixture.seat.sessions(), vec!["/test/SessionA".to_owned()]);
        assert!(log.entries.borrow().is_empty());
    }

    #[test]
    fn removing_the_active_session_clears_it() {
        let fixture = static_seat();
        fixture.monitor.notify(1);

        let a = session("/test/SessionA");
        a.display_device.replace(Some("/dev/tty1".to_owned()));
        fixture.seat.add_session(a.clone()).unwrap();
        assert_eq!(fixture.seat.active_session().unwrap(), "/test/SessionA");

        let log = record(&fixture.seat);
        fixture.seat.remove_session(&dyn_session(&a)).unwrap();

        assert!(fixture.seat.active_session().is_err());
        assert!(fixture.seat.sessions().is_empty());
        assert!(!a.active.get());
        assert_eq!(
            log.entries.borrow().as_slice(),
            [
                "full:session-removed:/test/SessionA",
                "wire:session-removed:/test/SessionA",
                "full:active-changed:/test/SessionA>",
                "wire:active-changed:",
            ]
        );
    }

    #[test]
    fn removal_falls_back_to_an_open_session() {
        let fixture = static_seat();
        fixture.monitor.notify(1);

        let a = session("/test/SessionA");
        a.display_device.replace(Some("/dev/tty1".to_owned()));
        let b = session("/test/SessionB");
        b.open.set(true);
        fixture.seat.add_session(a.clone()).unwrap();
        fixture.seat.add_session(b.clone()).unwrap();
        assert_eq!(fixture.seat.active_session().unwrap(), "/test/SessionA");

        fixture.seat.remove_session(&dyn_session(&a)).unwrap();

        assert_eq!(fixture.seat.active_session().unwrap(), "/test/SessionB");
        assert!(b.active.get());
        assert!(!a.active.get());
    }

    #[test]
    fn removing_a_foreign_session_fails() {
        let fixture = static_seat();
        let stranger = session("/test/SessionZ");
        assert_eq!(
            fixture
                .seat
                .remove_session(&dyn_session(&stranger))
                .unwrap_err(),
            SeatError::General("Session is not attached to this seat".to_owned())
        );
    }

    #[test]
    fn activating_an_unknown_session_fails() {
        let fixture = static_seat();
        let (reply, slot) = make_reply();
        fixture.seat.activate_session("/test/SessionNone", reply);
        assert_eq!(
            *slot.borrow(),
            Some(Err(SeatError::General("Unknown session id".to_owned())))
        );
    }

    #[test]
    fn activating_an_unopened_session_requests_it() {
        let fixture = static_seat();
        fixture.seat.manage("dm-1").unwrap();

        let x = session("/test/SessionX");
        fixture.seat.add_session(x.clone()).unwrap();

        x.template.replace(Some(x11_template()));
        x.session_type.replace(Some("LoginWindow".to_owned()));
        x.variables.replace(vars(&[("display", ":0")]));

        let (reply, slot) = make_reply();
        fixture.seat.activate_session("/test/SessionX", reply);

        assert_eq!(*slot.borrow(), Some(Ok(())));
        assert!(fixture.seat.active_session().is_err());
        assert!(x.under_request.get());

        let sent = fixture.transport.sent.borrow();
        assert_eq!(sent.len(), 1);
        let (peer, signal) = &sent[0];
        assert_eq!(peer, "dm-1");
        match signal {
            DirectedSignal::OpenSessionRequest {
                session,
                session_type,
                display_template,
                display_variables,
                display_type,
                parameters,
            } => {
                assert_eq!(session, "/test/SessionX");
                assert_eq!(session_type, "LoginWindow");
                assert_eq!(display_template, "default");
                assert_eq!(display_type, "X11");
                assert_eq!(
                    display_variables.get("display").map(String::as_str),
                    Some(":0")
                );
                assert_eq!(
                    parameters.get("Exec").map(String::as_str),
                    Some("/usr/bin/X :0 vt$vt")
                );
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[test]
    fn activation_is_rejected_on_dynamic_seats() {
        let transport = Rc::new(TestTransport::default());
        let seat = Seat::new_dynamic("/test/Seat1", None, transport);

        let open = session("/test/SessionOpen");
        open.open.set(true);
        seat.add_session(open.clone()).unwrap();
        assert_eq!(seat.active_session().unwrap(), "/test/SessionOpen");

        let (reply, slot) = make_reply();
        seat.activate_session("/test/SessionOpen", reply);

        assert_eq!(
            *slot.borrow(),
            Some(Err(SeatError::General(
                "Activation not supported for this kind of seat".to_owned()
            )))
        );
    }

    #[test]
    fn sessions_without_a_console_device_cannot_activate() {
        let fixture = static_seat();
        let odd = session("/test/SessionOdd");
        odd.open.set(true);
        odd.display_device.replace(Some("/dev/ttyS0".to_owned()));
        fixture.seat.add_session(odd.clone()).unwrap();

        let (reply, slot) = make_reply();
        fixture.seat.activate_session("/test/SessionOdd", reply);

        assert_eq!(
            *slot.borrow(),
            Some(Err(SeatError::General(
                "Unable to activate session".to_owned()
            )))
        );
        assert!(fixture.switch_log.borrow().is_empty());
    }

    #[test]
    fn activation_completes_when_the_requested_vt_arrives() {
        let fixture = static_seat();
        let a = session("/test/SessionA");
        a.display_device.replace(Some("/dev/tty2".to_owned()));
        a.open.set(true);
        fixture.seat.add_session(a.clone()).unwrap();

        let (reply, slot) = make_reply();
        fixture.seat.activate_session("/test/SessionA", reply);

        assert_eq!(*fixture.switch_log.borrow(), vec![2]);
        assert!(slot.borrow().is_none());

        fixture.monitor.notify(2);

        assert_eq!(*slot.borrow(), Some(Ok(())));
        assert_eq!(fixture.seat.active_session().unwrap(), "/test/SessionA");
    }

    #[test]
    fn a_competing_vt_switch_fails_the_waiting_reply() {
        let fixture = static_seat();
        let a = session("/test/SessionA");
        a.display_device.replace(Some("/dev/tty2".to_owned()));
        a.open.set(true);
        let b = session("/test/SessionB");
        b.display_device.replace(Some("/dev/tty3".to_owned()));
        b.open.set(true);
        b.creation_time.replace("2020-01-01T00:00:01Z".to_owned());
        fixture.seat.add_session(a.clone()).unwrap();
        fixture.seat.add_session(b.clone()).unwrap();

        let (reply, slot) = make_reply();
        fixture.seat.activate_session("/test/SessionA", reply);
        assert!(slot.borrow().is_none());

        fixture.monitor.notify(3);

        assert_eq!(
            *slot.borrow(),
            Some(Err(SeatError::General(
                "Another session was activated while waiting".to_owned()
            )))
        );
        assert_eq!(fixture.seat.active_session().unwrap(), "/test/SessionB");
    }

    #[test]
    fn a_refused_vt_switch_fails_the_reply_verbatim() {
        let fixture = static_seat();
        let a = session("/test/SessionA");
        a.display_device.replace(Some("/dev/tty2".to_owned()));
        a.open.set(true);
        fixture.seat.add_session(a.clone()).unwrap();

        fixture.switch_error.replace(Some("VT switch refused".to_owned()));
        let (reply, slot) = make_reply();
        fixture.seat.activate_session("/test/SessionA", reply);

        assert_eq!(
            *slot.borrow(),
            Some(Err(SeatError::General("VT switch refused".to_owned())))
        );

        // The one-shot observer is gone; a later transition must not try to
        // complete the reply again.
        fixture.monitor.notify(2);
    }

    #[test]
    fn session_activate_requests_run_the_switch() {
        let fixture = static_seat();
        let a = session("/test/SessionA");
        a.display_device.replace(Some("/dev/tty2".to_owned()));
        a.open.set(true);
        fixture.seat.add_session(a.clone()).unwrap();

        let (reply, slot) = make_reply();
        a.activate.emit(reply);

        assert_eq!(*fixture.switch_log.borrow(), vec![2]);
        fixture.monitor.notify(2);
        assert_eq!(*slot.borrow(), Some(Ok(())));
    }

    #[test]
    fn removed_sessions_no_longer_reach_the_seat() {
        let fixture = static_seat();
        let a = session("/test/SessionA");
        a.display_device.replace(Some("/dev/tty2".to_owned()));
        a.open.set(true);
        fixture.seat.add_session(a.clone()).unwrap();
        fixture.seat.remove_session(&dyn_session(&a)).unwrap();

        let (reply, slot) = make_reply();
        a.activate.emit(reply);

        assert!(slot.borrow().is_none());
        assert!(fixture.switch_log.borrow().is_empty());
    }

    #[test]
    fn a_second_manager_is_rejected() {
        let fixture = static_seat();
        fixture.seat.manage("dm-1").unwrap();

        let err = fixture.seat.manage("dm-2").unwrap_err();
        assert_eq!(
            err,
            SeatError::General("Seat already managed (by 'dm-1')".to_owned())
        );

        assert!(fixture.seat.is_managed());
        fixture.seat.request_removal().unwrap();
        assert_eq!(fixture.transport.sent.borrow().last().unwrap().0, "dm-1");
    }

    #[test]
    fn unmanage_checks_the_caller() {
        let fixture = static_seat();
        assert_eq!(
            fixture.seat.unmanage("dm-1").unwrap_err(),
            SeatError::General("Seat not managed".to_owned())
        );

        fixture.seat.manage("dm-1").unwrap();
        assert_eq!(
            fixture.seat.unmanage("dm-2").unwrap_err(),
            SeatError::General("Seat managed by 'dm-1' not 'dm-2'".to_owned())
        );

        fixture.seat.unmanage("dm-1").unwrap();
        assert!(!fixture.seat.is_managed());
    }

    #[test]
    fn a_vanished_manager_unbinds_the_seat() {
        let fixture = static_seat();
        fixture.seat.manage("dm-1").unwrap();
        assert!(fixture.seat.is_managed());

        fixture.transport.vanish("dm-1");

        assert!(!fixture.seat.is_managed());
        let x = session("/test/SessionX");
        fixture.seat.add_session(x.clone()).unwrap();
        assert_eq!(
            fixture
                .seat
                .request_close_session(&dyn_session(&x))
                .unwrap_err(),
            SeatError::General("Seat not managed".to_owned())
        );
    }

    #[test]
    fn manage_requests_every_session_afresh() {
        let fixture = static_seat();

        let x = session("/test/SessionX");
        x.template.replace(Some(x11_template()));
        x.session_type.replace(Some("LoginWindow".to_owned()));
        x.ever_open.set(true);
        x.under_request.set(true);
        let y = session("/test/SessionY");
        y.template.replace(Some(x11_template()));
        y.session_type.replace(Some("Default".to_owned()));
        y.ever_open.set(true);
        y.under_request.set(true);
        fixture.seat.add_session(x.clone()).unwrap();
        fixture.seat.add_session(y.clone()).unwrap();
        assert!(fixture.transport.sent.borrow().is_empty());

        fixture.seat.manage("dm-1").unwrap();

        assert!(!x.ever_open.get());
        assert!(!y.ever_open.get());
        assert!(x.under_request.get());
        assert!(y.under_request.get());

        let sent = fixture.transport.sent.borrow();
        let requested: Vec<_> = sent
            .iter()
            .map(|(_, signal)| match signal {
                DirectedSignal::OpenSessionRequest { session, .. } => session.clone(),
                other => panic!("unexpected signal: {other:?}"),
            })
            .collect();
        assert_eq!(
            requested,
            vec!["/test/SessionX".to_owned(), "/test/SessionY".to_owned()]
        );
    }

    #[test]
    fn open_requests_are_skipped_when_pointless() {
        let fixture = static_seat();
        fixture.seat.manage("dm-1").unwrap();

        let open = session("/test/SessionOpen");
        open.open.set(true);
        open.template.replace(Some(x11_template()));
        open.session_type.replace(Some("Default".to_owned()));
        fixture.seat.request_open_session(&dyn_session(&open)).unwrap();

        let pending = session("/test/SessionPending");
        pending.template.replace(Some(x11_template()));
        pending.session_type.replace(Some("Default".to_owned()));
        pending.under_request.set(true);
        fixture
            .seat
            .request_open_session(&dyn_session(&pending))
            .unwrap();

        let bare = session("/test/SessionBare");
        bare.session_type.replace(Some("Default".to_owned()));
        fixture.seat.request_open_session(&dyn_session(&bare)).unwrap();
        assert!(!bare.under_request.get());

        let untyped = session("/test/SessionUntyped");
        untyped.template.replace(Some(x11_template()));
        fixture
            .seat
            .request_open_session(&dyn_session(&untyped))
            .unwrap();
        assert!(!untyped.under_request.get());

        assert!(fixture.transport.sent.borrow().is_empty());
    }

    #[test]
    fn repeat_open_requests_do_not_resubstitute() {
        let fixture = static_seat();
        fixture.seat.manage("dm-1").unwrap();

        let x = session("/test/SessionX");
        x.template.replace(Some(x11_template()));
        x.session_type.replace(Some("Default".to_owned()));
        x.variables.replace(vars(&[("display", ":0"), ("vt", "7")]));
        x.ever_open.set(true);

        fixture.seat.request_open_session(&dyn_session(&x)).unwrap();

        let sent = fixture.transport.sent.borrow();
        match &sent[0].1 {
            DirectedSignal::OpenSessionRequest { parameters, .. } => {
                assert_eq!(
                    parameters.get("Exec").map(String::as_str),
                    Some("/usr/bin/X $display vt$vt")
                );
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[test]
    fn a_login_window_is_primed_when_nothing_is_open() {
        let transport = Rc::new(TestTransport::default());
        let seat = Seat::new_dynamic("/test/Seat1", None, transport.clone());
        seat.manage("dm-1").unwrap();

        let greeter = session("/test/SessionGreeter");
        greeter.session_type.replace(Some("LoginWindow".to_owned()));
        greeter.template.replace(Some(x11_template()));
        greeter.ever_open.set(true);
        seat.add_session(greeter.clone()).unwrap();

        assert!(seat.active_session().is_err());
        assert!(!greeter.ever_open.get());

        let sent = transport.sent.borrow();
        assert_eq!(sent.len(), 1);
        match &sent[0].1 {
            DirectedSignal::OpenSessionRequest { session, .. } => {
                assert_eq!(session, "/test/SessionGreeter");
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[test]
    fn close_and_no_respawn_are_directed_at_the_manager() {
        let fixture = static_seat();
        let x = session("/test/SessionX");
        fixture.seat.add_session(x.clone()).unwrap();
        let x = dyn_session(&x);

        let unmanaged = SeatError::General("Seat not managed".to_owned());
        assert_eq!(
            fixture.seat.request_close_session(&x).unwrap_err(),
            unmanaged
        );
        assert_eq!(fixture.seat.no_respawn(&x).unwrap_err(), unmanaged);
        assert_eq!(fixture.seat.request_removal().unwrap_err(), unmanaged);

        fixture.seat.manage("dm-1").unwrap();
        fixture.seat.request_close_session(&x).unwrap();
        fixture.seat.no_respawn(&x).unwrap();
        fixture.seat.request_removal().unwrap();

        let sent = fixture.transport.sent.borrow();
        let signals: Vec<_> = sent.iter().map(|(_, signal)| signal.clone()).collect();
        assert_eq!(
            signals,
            vec![
                DirectedSignal::CloseSessionRequest {
                    session: "/test/SessionX".to_owned()
                },
                DirectedSignal::NoRespawn {
                    session: "/test/SessionX".to_owned()
                },
                DirectedSignal::RemoveRequest,
            ]
        );
    }

    #[test]
    fn failed_emissions_do_not_roll_back_state() {
        let fixture = static_seat();
        fixture.seat.manage("dm-1").unwrap();
        fixture.transport.fail_sends.set(true);

        let x = session("/test/SessionX");
        x.template.replace(Some(x11_template()));
        x.session_type.replace(Some("Default".to_owned()));
        fixture.seat.add_session(x.clone()).unwrap();

        assert!(x.under_request.get());
        assert!(fixture.transport.sent.borrow().is_empty());
    }

    #[test]
    fn devices_are_tracked_and_signalled() {
        let fixture = static_seat();
        let log = record(&fixture.seat);

        let kbd = Device {
            class: "keyboard".to_owned(),
            id: "kbd0".to_owned(),
        };
        fixture.seat.add_device(kbd.clone()).unwrap();
        assert_eq!(
            fixture.seat.add_device(kbd.clone()).unwrap_err(),
            SeatError::General("Device already present".to_owned())
        );
        assert_eq!(fixture.seat.devices(), vec![kbd.clone()]);

        fixture.seat.remove_device(&kbd).unwrap();
        assert_eq!(
            fixture.seat.remove_device(&kbd).unwrap_err(),
            SeatError::General("Device not present".to_owned())
        );
        assert!(fixture.seat.devices().is_empty());

        assert_eq!(
            log.entries.borrow().as_slice(),
            [
                "wire:device-added:keyboard:kbd0",
                "wire:device-removed:keyboard:kbd0",
            ]
        );
    }

    #[test]
    fn dump_snapshots_the_seat() {
        let fixture = static_seat();
        fixture.monitor.notify(1);

        let a = session("/test/SessionA");
        a.display_device.replace(Some("/dev/tty1".to_owned()));
        fixture.seat.add_session(a).unwrap();
        fixture
            .seat
            .add_device(Device {
                class: "keyboard".to_owned(),
                id: "kbd0".to_owned(),
            })
            .unwrap();

        let mut file = KeyFile::new();
        fixture.seat.dump(&mut file);

        assert_eq!(file.get("Seat /test/Seat0", "kind"), Some("Static"));
        assert_eq!(
            file.get("Seat /test/Seat0", "sessions"),
            Some("/test/SessionA")
        );
        assert_eq!(file.get("Seat /test/Seat0", "devices"), Some("keyboard:kbd0"));
        assert_eq!(
            file.get("Seat /test/Seat0", "active_session"),
            Some("/test/SessionA")
        );
    }
}
