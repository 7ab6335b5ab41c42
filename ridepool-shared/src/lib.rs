pub mod models;
pub mod pii;

pub use models::events::{NotificationEvent, NotificationKind};
pub use pii::Masked;
