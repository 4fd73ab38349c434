//! Virtual terminal monitoring
//!
//! Static seats follow the kernel's virtual terminal multiplexer: whichever
//! VT is in the foreground decides which session is active. The platform
//! specifics of watching and requesting VT switches stay outside the core;
//! the seat only talks to a [`VtMonitor`].
//!
//! The contract is deliberately asynchronous: [`VtMonitor::switch_to`]
//! returns promptly and only reports whether the *request* was accepted.
//! Completion, which may land on a different VT than requested if the user
//! or another process intervenes, is observed through
//! [`VtMonitor::active_changed`].
//!
//! [`source::ChannelVtMonitor`] is a ready-made implementation fed from a
//! [`calloop`] channel for embedders that read VT transitions off a platform
//! event source.

use crate::utils::Emitter;

pub mod source;

/// Interface to the platform's virtual terminal layer.
pub trait VtMonitor {
    /// The currently foregrounded VT, if known.
    fn active_vt(&self) -> Option<u32>;

    /// Asks the kernel to switch to `vt`.
    ///
    /// Success means the request was submitted; the switch itself completes
    /// through [`VtMonitor::active_changed`], and not necessarily onto `vt`.
    fn switch_to(&self, vt: u32) -> Result<(), VtSwitchError>;

    /// Emitter firing with the new VT number whenever the foreground VT
    /// changes.
    fn active_changed(&self) -> &Emitter<u32>;
}

/// A refused or failed VT switch request, with the platform's message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct VtSwitchError(
    /// The platform's description of the failure, relayed verbatim to
    /// whoever requested the switch.
    pub String,
);

/// Extracts the VT number from a console device path.
///
/// `/dev/tty7` maps to `7`; devices that are not virtual consoles (serial
/// ttys, ptys, arbitrary paths) map to `None`.
pub fn console_number(device: &str) -> Option<u32> {
    scan_fmt::scan_fmt!(device, "/dev/tty{d}", u32).ok()
}

/// The console device path for a VT number: `7` maps to `/dev/tty7`.
pub fn console_device(vt: u32) -> String {
    format!("/dev/tty{vt}")
}
