use uuid::Uuid;

use chorus_shared::errors::AppResult;

use crate::models::{NewNotification, Notification};

/// Optional narrowing applied on top of the owner scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    pub category: Option<String>,
    pub notification_type: Option<String>,
}

impl NotificationFilter {
    pub fn matches(&self, category: &str, notification_type: &str) -> bool {
        self.category.as_deref().map_or(true, |c| c == category)
            && self.notification_type.as_deref().map_or(true, |t| t == notification_type)
    }
}

/// Data access for notifications. Every read and write is scoped to one owner.
///
/// Lists are ordered newest first, ties broken by id descending.
pub trait NotificationStore: Send + Sync {
    fn create(&self, new: NewNotification) -> AppResult<Notification>;

    /// One page of the owner's notifications plus the total matching `filter`.
    fn list(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Notification>, i64)>;

    fn count_unread(&self, user_id: Uuid, category: Option<&str>) -> AppResult<i64>;

    fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> AppResult<Notification>;

    fn mark_all_read(&self, user_id: Uuid, category: Option<&str>) -> AppResult<usize>;

    fn delete(&self, notification_id: Uuid, user_id: Uuid) -> AppResult<()>;

    /// Cheap liveness probe for the health endpoint.
    fn ping(&self) -> AppResult<()>;
}
