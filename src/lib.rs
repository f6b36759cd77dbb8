//! Cache synchronization core for control-plane clients.
//!
//! A [`Reflector`] mirrors a remote List+Watch source into a [`DeltaFifo`]; a
//! [`Controller`] pops the queued deltas per key and hands them to a
//! [`Reconciler`]; a [`SharedInformer`] is a controller whose reconciler
//! applies the deltas to one [`Store`] and fans the resulting notifications out
//! to any number of [`ResourceEventHandler`]s.

mod cache;
mod config;
mod controller;
mod errors;
mod fifo;
mod handler;
mod informer;
pub mod metrics;
mod reflector;
pub mod utils;

pub use cache::*;
pub use config::*;
pub use controller::*;
pub use errors::*;
pub use fifo::*;
pub use handler::*;
pub use informer::*;
pub use reflector::*;
pub use utils::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;

#[cfg(test)]
mod errors_test;
