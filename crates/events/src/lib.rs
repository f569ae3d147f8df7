//! Result channel mechanics shared by job producers and result consumers.

pub mod channel;
pub mod in_memory_bus;
pub mod message;

pub use channel::{ChannelClosed, ResultChannel, Subscription};
pub use in_memory_bus::{InMemoryBusError, InMemoryResultBus};
pub use message::WorkMsg;
