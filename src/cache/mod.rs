mod key_func;
mod store;

pub use key_func::*;
pub use store::*;


/// Bound shared by every object flowing through the informer.
pub trait Object: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Object for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}
