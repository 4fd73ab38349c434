//! Seats from definition files
//!
//! A static seat can be described on disk by a `.seat` file:
//!
//! ```text
//! [Seat Entry]
//! ID=Seat0
//! Hidden=false
//! Sessions=Login
//! Devices=keyboard:kbd0;pointer:mouse0
//! ```
//!
//! The [`SeatFactory`] turns such files into wired-up [`Seat`]s. Session
//! construction stays outside the core: every name in `Sessions=` resolves
//! to a definition file which is handed to the injected [`SessionLoader`]
//! together with the deterministic session id derived from the seat.

use std::{
    path::{Path, PathBuf},
    rc::Rc,
};

use tracing::{debug, warn};

use super::{Device, Seat};
use crate::session::Session;
use crate::transport::Transport;
use crate::utils::KeyFile;
use crate::vt::VtMonitor;

/// Directory session definition files are looked up in by default.
pub const SESSION_DEFINITIONS_DIR: &str = "/etc/seatsmith/sessions.d";

/// Builds session entities for the seat factory.
///
/// Implemented for closures of the matching shape, so a factory can be
/// wired with `|ssid, path| ...` directly.
pub trait SessionLoader {
    /// Constructs the session with id `ssid` from the definition file at
    /// `path`, or `None` if it cannot be loaded.
    fn load_session(&self, ssid: &str, path: &Path) -> Option<Rc<dyn Session>>;
}

impl<F> SessionLoader for F
where
    F: Fn(&str, &Path) -> Option<Rc<dyn Session>>,
{
    fn load_session(&self, ssid: &str, path: &Path) -> Option<Rc<dyn Session>> {
        self(ssid, path)
    }
}

/// Constructs seats from seat definition files.
pub struct SeatFactory {
    base_path: String,
    sessions_dir: PathBuf,
    transport: Rc<dyn Transport>,
    vt_monitor: Rc<dyn VtMonitor>,
    loader: Box<dyn SessionLoader>,
}

impl std::fmt::Debug for SeatFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeatFactory")
            .field("base_path", &self.base_path)
            .field("sessions_dir", &self.sessions_dir)
            .finish_non_exhaustive()
    }
}

impl SeatFactory {
    /// Creates a factory generating ids under `base_path` and loading
    /// session definitions from [`SESSION_DEFINITIONS_DIR`].
    ///
    /// Seats built from files are always static and share `vt_monitor`.
    pub fn new(
        base_path: &str,
        transport: Rc<dyn Transport>,
        vt_monitor: Rc<dyn VtMonitor>,
        loader: Box<dyn SessionLoader>,
    ) -> SeatFactory {
        SeatFactory {
            base_path: base_path.to_owned(),
            sessions_dir: PathBuf::from(SESSION_DEFINITIONS_DIR),
            transport,
            vt_monitor,
            loader,
        }
    }

    /// Overrides the directory session definitions are loaded from.
    pub fn with_sessions_dir(mut self, dir: PathBuf) -> SeatFactory {
        self.sessions_dir = dir;
        self
    }

    /// Builds the seat described by the definition file at `path`.
    ///
    /// `default_sid` is the id the seat gets when the file carries no `ID=`
    /// key. Hidden seats, unreadable files and files that do not start with
    /// a `[Seat Entry]` group yield `None`. Sessions that fail to load are
    /// skipped; the seat is still created with the remaining ones.
    pub fn load_seat(&self, default_sid: &str, path: &Path) -> Option<Seat> {
        debug!("loading seat from {}", path.display());

        let file = match KeyFile::load(path) {
            Ok(file) => file,
            Err(err) => {
                warn!("unable to load seat from {}: {}", path.display(), err);
                return None;
            }
        };

        const GROUP: &str = "Seat Entry";
        if file.start_group() != Some(GROUP) {
            warn!("not a seat file: {}", path.display());
            return None;
        }

        if file.get_bool(GROUP, "Hidden") {
            debug!("seat is hidden");
            return None;
        }

        let sid = match file.get(GROUP, "ID").filter(|id| !id.is_empty()) {
            Some(id) => format!("{}/{}", self.base_path, id),
            None => default_sid.to_owned(),
        };

        let seat = Seat::new_static(
            &sid,
            None,
            self.transport.clone(),
            self.vt_monitor.clone(),
        );

        for entry in file.get_list(GROUP, "Devices") {
            let Some((class, id)) = entry.split_once(':') else {
                warn!("malformed device entry '{}'", entry);
                continue;
            };
            debug!("adding device: {} {}", class, id);
            if let Err(err) = seat.add_device(Device {
                class: class.to_owned(),
                id: id.to_owned(),
            }) {
                warn!("unable to add device '{}': {}", entry, err);
            }
        }

        for name in file.get_list(GROUP, "Sessions") {
            let file = self.sessions_dir.join(format!("{name}.session"));
            let ssid = static_session_id(&self.base_path, &sid, &name);

            let Some(session) = self.loader.load_session(&ssid, &file) else {
                warn!("unable to load session from {}", file.display());
                continue;
            };
            session.set_seat_id(&sid);
            if let Err(err) = seat.add_session(session) {
                warn!("unable to add session '{}': {}", ssid, err);
            }
        }

        Some(seat)
    }
}

/// The deterministic id of a statically defined session:
/// `<base_path>/Session<seat-basename><session-name>`.
fn static_session_id(base_path: &str, sid: &str, session_name: &str) -> String {
    let seat_name = match sid.rsplit_once('/') {
        Some((_, basename)) => basename,
        None => {
            warn!("seat id '{}' lacks a /", sid);
            sid
        }
    };
    format!("{base_path}/Session{seat_name}{session_name}")
}
