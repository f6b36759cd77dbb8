//! Reflector
//!
//! Turns a remote List+Watch pair into delta submissions:
//!
//! ```text
//! list()  -> populate(all objects)
//! watch() -> Created -> add
//!            Updated -> update
//!            Deleted -> delete
//! ```

#[allow(clippy::module_inception)]
mod reflector;
mod source;
mod watch;

pub use reflector::*;
pub use source::*;
pub use watch::*;
