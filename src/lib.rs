#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # Seatsmith: a smithy for login seats
//!
//! This crate is a framework for building privileged coordinators of login
//! **seats** and **sessions** on multi-user machines. A seat is a bundle of
//! input/output hardware usable by one user at a time; a session is one login
//! attached to a seat. Seatsmith tracks which sessions exist on each seat,
//! which one is currently active, follows virtual-terminal (VT) switches on
//! static seats, and speaks a small request protocol to an external *display
//! manager* that actually starts and stops login screens and user sessions.
//!
//! ## Structure of the crate
//!
//! The heart of the crate is the [`seat`] module: the per-seat state machine
//! that owns sessions, keeps the active-session invariant and issues
//! open/close/no-respawn requests to the seat's manager. Around it sit narrow
//! trait seams toward everything the core deliberately does not implement
//! itself:
//!
//! - [`session`]: the accessor surface a session entity must provide,
//! - [`transport`]: directed signal emission and peer-liveness watching on
//!   whatever IPC bus the embedding daemon uses,
//! - [`vt`]: the platform virtual-terminal monitor, plus helpers to map
//!   console device paths to VT numbers and a ready-made [`calloop`]-driven
//!   monitor implementation,
//! - [`display`]: named display templates and the `$variable` substitution
//!   applied to their parameters before an open request is sent out.
//!
//! ## The event loop and state handling
//!
//! Seatsmith is built for callback-oriented, single-threaded event loops such
//! as [`calloop`]: every state transition on a [`seat::Seat`] happens as a
//! discrete callback on one thread, so the core uses `Rc`-shared state and
//! plain interior mutability instead of locks. Incoming method calls that
//! must wait (a session activation racing a VT switch) suspend by carrying a
//! one-shot [`utils::Reply`] completer rather than by blocking.

pub mod display;
pub mod seat;
pub mod session;
pub mod transport;
pub mod utils;
pub mod vt;
