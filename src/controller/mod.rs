#[allow(clippy::module_inception)]
mod controller;
mod reconciler;
mod resync;

pub use controller::*;
pub use reconciler::*;
pub use resync::*;
