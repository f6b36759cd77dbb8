pub(crate) mod async_task;
mod signal;

pub use signal::*;
