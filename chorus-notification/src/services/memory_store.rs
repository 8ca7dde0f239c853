use std::cmp::Reverse;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use uuid::Uuid;

use chorus_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{decode_rows, NewNotification, Notification, NotificationRow};
use crate::services::store::{NotificationFilter, NotificationStore};

/// In-process [`NotificationStore`] for local development and tests.
///
/// Contents are lost on restart.
#[derive(Default)]
pub struct MemoryNotificationStore {
    rows: RwLock<Vec<NotificationRow>>,
}

impl MemoryNotificationStore {
    /// Seed the store with raw rows, bypassing draft validation.
    pub fn with_rows(rows: Vec<NotificationRow>) -> Self {
        Self { rows: RwLock::new(rows) }
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Vec<NotificationRow>>> {
        self.rows
            .read()
            .map_err(|_| AppError::internal("notification store lock poisoned"))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Vec<NotificationRow>>> {
        self.rows
            .write()
            .map_err(|_| AppError::internal("notification store lock poisoned"))
    }
}

fn not_found() -> AppError {
    AppError::new(ErrorCode::NotificationNotFound, "notification not found")
}

impl NotificationStore for MemoryNotificationStore {
    fn create(&self, new: NewNotification) -> AppResult<Notification> {
        new.validate()?;

        let row = NotificationRow {
            id: Uuid::now_v7(),
            user_id: new.user_id,
            notification_type: new.notification_type,
            category: new.category,
            title: new.title,
            body: new.body,
            data: new.data,
            is_read: false,
            created_at: Utc::now(),
        };
        self.write()?.push(row.clone());

        tracing::debug!(
            notification_id = %row.id,
            user_id = %row.user_id,
            notification_type = %row.notification_type,
            "notification created"
        );

        Ok(Notification::try_from(row)?)
    }

    fn list(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Notification>, i64)> {
        let mut matching: Vec<NotificationRow> = self
            .read()?
            .iter()
            .filter(|r| r.user_id == user_id && filter.matches(&r.category, &r.notification_type))
            .cloned()
            .collect();
        matching.sort_by_key(|r| Reverse((r.created_at, r.id)));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();

        Ok((decode_rows(page)?, total))
    }

    fn count_unread(&self, user_id: Uuid, category: Option<&str>) -> AppResult<i64> {
        let count = self
            .read()?
            .iter()
            .filter(|r| r.user_id == user_id && !r.is_read)
            .filter(|r| category.map_or(true, |c| r.category == c))
            .count();

        Ok(count as i64)
    }

    fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> AppResult<Notification> {
        let mut rows = self.write()?;
        let row = rows
            .iter_mut()
            .find(|r| r.id == notification_id && r.user_id == user_id)
            .ok_or_else(not_found)?;
        row.is_read = true;

        Ok(Notification::try_from(row.clone())?)
    }

    fn mark_all_read(&self, user_id: Uuid, category: Option<&str>) -> AppResult<usize> {
        let mut updated = 0;
        for row in self.write()?.iter_mut() {
            if row.user_id == user_id
                && !row.is_read
                && category.map_or(true, |c| row.category == c)
            {
                row.is_read = true;
                updated += 1;
            }
        }

        Ok(updated)
    }

    fn delete(&self, notification_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut rows = self.write()?;
        let before = rows.len();
        rows.retain(|r| !(r.id == notification_id && r.user_id == user_id));

        if rows.len() == before {
            return Err(not_found());
        }

        Ok(())
    }

    fn ping(&self) -> AppResult<()> {
        self.read().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn like(user_id: Uuid, target: &str) -> NewNotification {
        NewNotification::new(user_id, "like", "New like", "someone liked your post")
            .with_category("social")
            .with_data(json!({ "target_id": target }))
    }

    #[test]
    fn test_create_and_list_newest_first() {
        let store = MemoryNotificationStore::default();
        let user = Uuid::now_v7();
        let first = store.create(like(user, "p1")).unwrap();
        let second = store.create(like(user, "p2")).unwrap();

        let (items, total) = store.list(user, &NotificationFilter::default(), 20, 0).unwrap();

        assert_eq!(total, 2);
        assert_eq!(items[0].id, second.id);
        assert_eq!(items[1].id, first.id);
    }

    #[test]
    fn test_list_is_owner_scoped_and_filtered() {
        let store = MemoryNotificationStore::default();
        let user = Uuid::now_v7();
        let other = Uuid::now_v7();
        store.create(like(user, "p1")).unwrap();
        store.create(like(other, "p1")).unwrap();
        store
            .create(NewNotification::new(user, "login", "New sign-in", "from Firefox"))
            .unwrap();

        let (_, total) = store.list(user, &NotificationFilter::default(), 20, 0).unwrap();
        assert_eq!(total, 2);

        let filter = NotificationFilter { category: Some("social".into()), notification_type: None };
        let (items, total) = store.list(user, &filter, 20, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].kind.as_str(), "like");

        let filter = NotificationFilter { category: None, notification_type: Some("login".into()) };
        let (items, _) = store.list(user, &filter, 20, 0).unwrap();
        assert_eq!(items[0].category, "system");
    }

    #[test]
    fn test_list_paginates_but_reports_full_total() {
        let store = MemoryNotificationStore::default();
        let user = Uuid::now_v7();
        for i in 0..5 {
            store.create(like(user, &format!("p{i}"))).unwrap();
        }

        let (items, total) = store.list(user, &NotificationFilter::default(), 2, 4).unwrap();
        assert_eq!(total, 5);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_mark_read_requires_ownership() {
        let store = MemoryNotificationStore::default();
        let user = Uuid::now_v7();
        let n = store.create(like(user, "p1")).unwrap();

        let err = store.mark_read(n.id, Uuid::now_v7()).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::NotificationNotFound);

        assert!(store.mark_read(n.id, user).unwrap().read);
        assert_eq!(store.count_unread(user, None).unwrap(), 0);
    }

    #[test]
    fn test_mark_all_read_by_category() {
        let store = MemoryNotificationStore::default();
        let user = Uuid::now_v7();
        store.create(like(user, "p1")).unwrap();
        store.create(like(user, "p2")).unwrap();
        store
            .create(NewNotification::new(user, "achievement", "Achievement unlocked", "First post"))
            .unwrap();

        assert_eq!(store.mark_all_read(user, Some("social")).unwrap(), 2);
        assert_eq!(store.count_unread(user, None).unwrap(), 1);
        assert_eq!(store.count_unread(user, Some("system")).unwrap(), 1);
        assert_eq!(store.mark_all_read(user, None).unwrap(), 1);
        assert_eq!(store.mark_all_read(user, None).unwrap(), 0);
    }

    #[test]
    fn test_delete() {
        let store = MemoryNotificationStore::default();
        let user = Uuid::now_v7();
        let n = store.create(like(user, "p1")).unwrap();

        assert!(store.delete(n.id, Uuid::now_v7()).is_err());
        store.delete(n.id, user).unwrap();
        assert!(store.delete(n.id, user).is_err());
        assert_eq!(store.list(user, &NotificationFilter::default(), 20, 0).unwrap().1, 0);
    }

    #[test]
    fn test_create_rejects_malformed_payload() {
        let store = MemoryNotificationStore::default();
        let draft = NewNotification::new(Uuid::now_v7(), "message", "t", "b").with_data(json!([1, 2]));

        assert_eq!(store.create(draft).unwrap_err().error_code(), ErrorCode::ValidationError);
    }

    #[test]
    fn test_malformed_seeded_row_fails_listing() {
        let user = Uuid::now_v7();
        let store = MemoryNotificationStore::with_rows(vec![NotificationRow {
            id: Uuid::now_v7(),
            user_id: user,
            notification_type: "message".into(),
            category: "messages".into(),
            title: "t".into(),
            body: "b".into(),
            data: Some(json!("not an object")),
            is_read: false,
            created_at: Utc::now(),
        }]);

        let err = store.list(user, &NotificationFilter::default(), 20, 0).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::NotificationMalformed);
    }
}
