mod coordinator;
mod listener;
mod registry;
mod shared_informer;

pub(crate) use coordinator::*;
pub use listener::*;
pub(crate) use registry::*;
pub use shared_informer::*;

#[cfg(test)]
mod registry_test;
