pub mod channel;
pub mod events;
pub mod memory;

pub use channel::{Subscription, SyncChannel};
pub use events::RoomEvent;
pub use memory::InMemoryChannel;
