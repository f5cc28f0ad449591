pub mod events;
pub mod models;

pub use events::PushEvent;
pub use models::{Chat, Message, NewMessage};
