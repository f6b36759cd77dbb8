mod event_handler;
mod notification;

pub use event_handler::*;
pub use notification::*;
