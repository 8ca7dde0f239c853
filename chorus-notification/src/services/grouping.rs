//! Collapses a flat notification feed into per-subject groups.
//!
//! Grouping is a pure in-process step: it runs on whatever page the store
//! returned and keeps no state between calls.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Notification, NotificationKind};

/// Summary of all notifications sharing a grouping key. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationGroup {
    /// The grouping key, not a database id.
    pub id: String,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub category: String,
    /// Newest first.
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub latest_notification: Notification,
    /// Timestamp of the latest member, not of the first one.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Group notifications by [`NotificationKind::group_key`], most recent group first.
///
/// Input order does not matter. Duplicate rows are kept and counted twice.
pub fn group_notifications(notifications: Vec<Notification>) -> Vec<NotificationGroup> {
    let mut buckets: HashMap<String, Vec<Notification>> = HashMap::new();
    for notification in notifications {
        buckets
            .entry(notification.kind.group_key())
            .or_default()
            .push(notification);
    }

    let mut groups: Vec<NotificationGroup> = buckets
        .into_iter()
        .filter_map(|(key, members)| summarize(key, members))
        .collect();

    groups.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    groups
}

fn summarize(key: String, mut members: Vec<Notification>) -> Option<NotificationGroup> {
    members.sort_by(newest_first);
    let latest = members.first()?.clone();
    let unread_count = members.iter().filter(|n| !n.read).count();

    Some(NotificationGroup {
        id: key,
        user_id: latest.user_id,
        kind: latest.kind.clone(),
        category: latest.category.clone(),
        unread_count,
        created_at: latest.created_at,
        updated_at: latest.created_at,
        latest_notification: latest,
        notifications: members,
    })
}

// Ties on `created_at` fall back to id so the result is independent of input order.
fn newest_first(a: &Notification, b: &Notification) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Unread notifications across a set of groups.
pub fn total_unread(groups: &[NotificationGroup]) -> usize {
    groups.iter().map(|g| g.unread_count).sum()
}
