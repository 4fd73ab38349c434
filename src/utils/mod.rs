//! Various utility functions and types

pub mod emitter;
pub mod keyfile;
pub mod reply;

pub use self::emitter::{Emitter, Subscription};
pub use self::keyfile::KeyFile;
pub use self::reply::Reply;
