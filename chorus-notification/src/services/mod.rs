pub mod grouping;
pub mod memory_store;
pub mod notification_service;
pub mod store;

pub use grouping::{group_notifications, NotificationGroup};
pub use memory_store::MemoryNotificationStore;
pub use notification_service::PgNotificationStore;
pub use store::{NotificationFilter, NotificationStore};
