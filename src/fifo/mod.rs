mod delta;
mod delta_fifo;

pub use delta::*;
pub use delta_fifo::*;
