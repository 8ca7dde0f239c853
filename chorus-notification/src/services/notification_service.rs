use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use uuid::Uuid;

use chorus_shared::clients::db::DbPool;
use chorus_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{decode_rows, NewNotification, Notification, NotificationRow};
use crate::schema::notifications;
use crate::services::store::{NotificationFilter, NotificationStore};

/// Postgres-backed [`NotificationStore`].
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: DbPool,
}

impl PgNotificationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> AppResult<PooledConnection<ConnectionManager<PgConnection>>> {
        self.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection");
            AppError::internal("database connection error")
        })
    }
}

fn scoped<'a>(user_id: Uuid, filter: &'a NotificationFilter) -> notifications::BoxedQuery<'a, Pg> {
    let mut query = notifications::table
        .filter(notifications::user_id.eq(user_id))
        .into_boxed();

    if let Some(category) = filter.category.as_deref() {
        query = query.filter(notifications::category.eq(category));
    }
    if let Some(notification_type) = filter.notification_type.as_deref() {
        query = query.filter(notifications::notification_type.eq(notification_type));
    }

    query
}

fn not_found(e: diesel::result::Error) -> AppError {
    match e {
        diesel::result::Error::NotFound => {
            AppError::new(ErrorCode::NotificationNotFound, "notification not found")
        }
        other => AppError::Database(other),
    }
}

impl NotificationStore for PgNotificationStore {
    fn create(&self, new: NewNotification) -> AppResult<Notification> {
        new.validate()?;
        let mut conn = self.conn()?;

        let row = diesel::insert_into(notifications::table)
            .values(&new)
            .get_result::<NotificationRow>(&mut conn)?;

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
        let mut conn = self.conn()?;

        let total: i64 = scoped(user_id, filter)
            .count()
            .get_result(&mut conn)?;

        let rows = scoped(user_id, filter)
            .order((notifications::created_at.desc(), notifications::id.desc()))
            .limit(limit)
            .offset(offset)
            .load::<NotificationRow>(&mut conn)?;

        Ok((decode_rows(rows)?, total))
    }

    fn count_unread(&self, user_id: Uuid, category: Option<&str>) -> AppResult<i64> {
        let mut conn = self.conn()?;

        let mut query = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_read.eq(false))
            .into_boxed();
        if let Some(category) = category {
            query = query.filter(notifications::category.eq(category));
        }

        Ok(query.count().get_result(&mut conn)?)
    }

    fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> AppResult<Notification> {
        let mut conn = self.conn()?;

        let row = diesel::update(
            notifications::table
                .filter(notifications::id.eq(notification_id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set(notifications::is_read.eq(true))
        .get_result::<NotificationRow>(&mut conn)
        .map_err(not_found)?;

        Ok(Notification::try_from(row)?)
    }

    fn mark_all_read(&self, user_id: Uuid, category: Option<&str>) -> AppResult<usize> {
        let mut conn = self.conn()?;

        let unread = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_read.eq(false));

        let updated = match category {
            Some(category) => diesel::update(unread.filter(notifications::category.eq(category)))
                .set(notifications::is_read.eq(true))
                .execute(&mut conn)?,
            None => diesel::update(unread)
                .set(notifications::is_read.eq(true))
                .execute(&mut conn)?,
        };

        Ok(updated)
    }

    fn delete(&self, notification_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut conn = self.conn()?;

        let deleted = diesel::delete(
            notifications::table
                .filter(notifications::id.eq(notification_id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .execute(&mut conn)?;

        if deleted == 0 {
            return Err(AppError::new(ErrorCode::NotificationNotFound, "notification not found"));
        }

        Ok(())
    }

    fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }
}
