pub mod chat;
pub mod playback;
pub mod queue;
pub mod room;

pub use room::create_room;
