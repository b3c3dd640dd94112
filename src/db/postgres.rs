//! PostgreSQL datastore
//!
//! Raw SQL over a `deadpool-postgres` pool. Deal cascades run inside one
//! transaction each.

use super::queries::{
    like_pattern, WhereBuilder, ACTIVITY_COLUMNS, BOOKING_COLUMNS, DEAL_COLUMNS, LEAD_COLUMNS,
    LEAD_STATUS_COUNTS, STAGE_AGGREGATES, TASK_COLUMNS, USER_COLUMNS,
};
use super::store::{CrmStore, Page, MISSING_REFERENCE};
use crate::auth::Role;
use crate::error::AppError;
use crate::lifecycle::{lead_status_for_stage, lead_status_on_deal_created, lead_status_on_deal_deleted};
use crate::models::{
    Activity, ActivityFilter, Booking, BookingFilter, Deal, DealChanges, DealFilter, DealStage, Lead,
    LeadFilter, LeadStatus, NewActivity, NewBooking, NewDeal, NewLead, NewTask, NewUser, PageRequest,
    StageAggregate, Task, TaskChanges, TaskFilter, UpdateLeadRequest, UpdateUserRequest, User,
    UserFilter,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use std::collections::HashMap;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use tracing::debug;
use uuid::Uuid;

/// Datastore backed by PostgreSQL
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Run a filtered, ordered and paged `SELECT` plus its `COUNT(*)`
    async fn fetch_page<T>(
        &self,
        table: &str,
        columns: &str,
        order_by: &str,
        filter: WhereBuilder,
        page: PageRequest,
        map: fn(&Row) -> T,
    ) -> Result<Page<T>, AppError> {
        let client = self.pool.get().await?;
        let where_sql = filter.sql();
        let limit = i64::from(page.limit);
        let offset = page.offset() as i64;

        let mut params = filter.params();
        let total: i64 = client
            .query_one(&format!("SELECT COUNT(*) FROM {}{}", table, where_sql), &params)
            .await?
            .get(0);

        let n = filter.next_placeholder();
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {} LIMIT ${} OFFSET ${}",
            columns,
            table,
            where_sql,
            order_by,
            n,
            n + 1
        );
        params.push(&limit);
        params.push(&offset);

        let rows = client.query(&sql, &params).await?;
        Ok((rows.iter().map(map).collect(), total as u64))
    }

    async fn count(&self, table: &str, filter: WhereBuilder) -> Result<u64, AppError> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", table, filter.sql());
        let total: i64 = client.query_one(&sql, &filter.params()).await?.get(0);
        Ok(total as u64)
    }

    async fn fetch_one<T>(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        map: fn(&Row) -> T,
    ) -> Result<Option<T>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(sql, params).await.map_err(map_db_error)?;
        Ok(row.as_ref().map(map))
    }

    /// Rows of `table` whose `key` column is one of `ids`
    async fn fetch_any<T>(
        &self,
        table: &str,
        columns: &str,
        key: &str,
        ids: &[Uuid],
        map: fn(&Row) -> T,
    ) -> Result<Vec<T>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.pool.get().await?;
        let sql = format!("SELECT {} FROM {} WHERE {} = ANY($1)", columns, table, key);
        let rows = client.query(&sql, &[&ids]).await?;
        Ok(rows.iter().map(map).collect())
    }
}

/// Translate constraint violations into client errors
fn map_db_error(e: tokio_postgres::Error) -> AppError {
    if e.code() == Some(&SqlState::FOREIGN_KEY_VIOLATION) {
        return AppError::BadRequest(MISSING_REFERENCE.to_string());
    }
    AppError::Database(e)
}

fn is_unique_violation(e: &tokio_postgres::Error) -> bool {
    e.code() == Some(&SqlState::UNIQUE_VIOLATION)
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        role: row.get("role"),
        is_active: row.get("is_active"),
        avatar: row.get("avatar"),
        last_login: row.get("last_login"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn lead_from_row(row: &Row) -> Lead {
    Lead {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        phone: row.get("phone"),
        company: row.get("company"),
        job_title: row.get("job_title"),
        source: row.get("source"),
        status: row.get("status"),
        score: row.get("score"),
        estimated_value: row.get("estimated_value"),
        notes: row.get("notes"),
        created_by_id: row.get("created_by_id"),
        assigned_to_id: row.get("assigned_to_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn deal_from_row(row: &Row) -> Deal {
    Deal {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        value: row.get("value"),
        stage: row.get("stage"),
        probability: row.get("probability"),
        expected_close_date: row.get("expected_close_date"),
        actual_close_date: row.get("actual_close_date"),
        lead_id: row.get("lead_id"),
        assigned_to_id: row.get("assigned_to_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn activity_from_row(row: &Row) -> Activity {
    Activity {
        id: row.get("id"),
        activity_type: row.get("type"),
        title: row.get("title"),
        description: row.get("description"),
        lead_id: row.get("lead_id"),
        deal_id: row.get("deal_id"),
        user_id: row.get("user_id"),
        scheduled_at: row.get("scheduled_at"),
        duration: row.get("duration"),
        created_at: row.get("created_at"),
    }
}

fn task_from_row(row: &Row) -> Task {
    Task {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        status: row.get("status"),
        priority: row.get("priority"),
        due_date: row.get("due_date"),
        completed_at: row.get("completed_at"),
        deal_id: row.get("deal_id"),
        assigned_to_id: row.get("assigned_to_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn booking_from_row(row: &Row) -> Booking {
    Booking {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        attendee_email: row.get("attendee_email"),
        attendee_name: row.get("attendee_name"),
        meeting_type: row.get("meeting_type"),
        status: row.get("status"),
        user_id: row.get("user_id"),
        lead_id: row.get("lead_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn user_where(filter: &UserFilter) -> WhereBuilder {
    let mut w = WhereBuilder::new();
    w.push_opt("role = $?", filter.role)
        .push_opt("is_active = $?", filter.is_active);
    w
}

fn lead_where(filter: &LeadFilter) -> WhereBuilder {
    let mut w = WhereBuilder::new();
    w.push_opt("status = $?", filter.status)
        .push_opt("source = $?", filter.source)
        .push_opt("assigned_to_id = $?", filter.assigned_to)
        .push_opt("created_at >= $?", filter.created_since)
        .push_opt(
            "(first_name ILIKE $? OR last_name ILIKE $? OR email ILIKE $? OR company ILIKE $?)",
            filter.search.as_deref().map(like_pattern),
        );
    w
}

fn deal_where(filter: &DealFilter) -> WhereBuilder {
    let mut w = WhereBuilder::new();
    w.push_opt("stage = $?", filter.stage)
        .push_opt("assigned_to_id = $?", filter.assigned_to)
        .push_opt("lead_id = $?", filter.lead_id)
        .push_opt("value >= $?", filter.min_value)
        .push_opt("value <= $?", filter.max_value);
    w
}

fn activity_where(filter: &ActivityFilter) -> WhereBuilder {
    let mut w = WhereBuilder::new();
    w.push_opt("type = $?", filter.activity_type)
        .push_opt("lead_id = $?", filter.lead_id)
        .push_opt("deal_id = $?", filter.deal_id)
        .push_opt("user_id = $?", filter.user_id);
    w
}

fn task_where(filter: &TaskFilter) -> WhereBuilder {
    let mut w = WhereBuilder::new();
    if !filter.statuses.is_empty() {
        w.push("status = ANY($?)", filter.statuses.clone());
    }
    w.push_opt("priority = $?", filter.priority)
        .push_opt("assigned_to_id = $?", filter.assigned_to)
        .push_opt("deal_id = $?", filter.deal_id);
    w
}

fn booking_where(filter: &BookingFilter) -> WhereBuilder {
    let mut w = WhereBuilder::new();
    if !filter.statuses.is_empty() {
        w.push("status = ANY($?)", filter.statuses.clone());
    }
    w.push_opt("user_id = $?", filter.user_id)
        .push_opt("start_time >= $?", filter.starts_after);
    w
}

#[async_trait]
impl CrmStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        client.query_one("SELECT 1", &[]).await?;
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO users (id, email, password_hash, first_name, last_name, role)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            USER_COLUMNS
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &Uuid::new_v4(),
                    &user.email,
                    &user.password_hash,
                    &user.first_name,
                    &user.last_name,
                    &user.role,
                ],
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::BadRequest("User already exists".to_string())
                } else {
                    AppError::Database(e)
                }
            })?;
        Ok(user_from_row(&row))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        self.fetch_one(&sql, &[&id], user_from_row).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        self.fetch_one(&sql, &[&email], user_from_row).await
    }

    async fn list_users(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<User>, AppError> {
        self.fetch_page(
            "users",
            USER_COLUMNS,
            "created_at DESC",
            user_where(filter),
            page,
            user_from_row,
        )
        .await
    }

    async fn update_user(&self, id: Uuid, changes: &UpdateUserRequest) -> Result<Option<User>, AppError> {
        let sql = format!(
            "UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                avatar = COALESCE($4, avatar),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            USER_COLUMNS
        );
        self.fetch_one(
            &sql,
            &[&id, &changes.first_name, &changes.last_name, &changes.avatar],
            user_from_row,
        )
        .await
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>, AppError> {
        let sql = format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        self.fetch_one(&sql, &[&id, &role], user_from_row).await
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> Result<Option<User>, AppError> {
        let sql = format!(
            "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        self.fetch_one(&sql, &[&id, &active], user_from_row).await
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
                &[&id, &password_hash],
            )
            .await?;
        Ok(updated > 0)
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        client
            .execute("UPDATE users SET last_login = $2 WHERE id = $1", &[&id, &at])
            .await?;
        Ok(())
    }

    async fn list_leads(&self, filter: &LeadFilter, page: PageRequest) -> Result<Page<Lead>, AppError> {
        self.fetch_page(
            "leads",
            LEAD_COLUMNS,
            "created_at DESC",
            lead_where(filter),
            page,
            lead_from_row,
        )
        .await
    }

    async fn count_leads(&self, filter: &LeadFilter) -> Result<u64, AppError> {
        self.count("leads", lead_where(filter)).await
    }

    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>, AppError> {
        let sql = format!("SELECT {} FROM leads WHERE id = $1", LEAD_COLUMNS);
        self.fetch_one(&sql, &[&id], lead_from_row).await
    }

    async fn create_lead(&self, lead: NewLead) -> Result<Lead, AppError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO leads (id, first_name, last_name, email, phone, company, job_title,
                                source, estimated_value, notes, created_by_id, assigned_to_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {}",
            LEAD_COLUMNS
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &Uuid::new_v4(),
                    &lead.first_name,
                    &lead.last_name,
                    &lead.email,
                    &lead.phone,
                    &lead.company,
                    &lead.job_title,
                    &lead.source,
                    &lead.estimated_value,
                    &lead.notes,
                    &lead.created_by_id,
                    &lead.assigned_to_id,
                ],
            )
            .await
            .map_err(map_db_error)?;
        Ok(lead_from_row(&row))
    }

    async fn update_lead(&self, id: Uuid, changes: &UpdateLeadRequest) -> Result<Option<Lead>, AppError> {
        let sql = format!(
            "UPDATE leads SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                company = COALESCE($6, company),
                job_title = COALESCE($7, job_title),
                source = COALESCE($8, source),
                status = COALESCE($9, status),
                assigned_to_id = COALESCE($10, assigned_to_id),
                notes = COALESCE($11, notes),
                estimated_value = COALESCE($12, estimated_value),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            LEAD_COLUMNS
        );
        self.fetch_one(
            &sql,
            &[
                &id,
                &changes.first_name,
                &changes.last_name,
                &changes.email,
                &changes.phone,
                &changes.company,
                &changes.job_title,
                &changes.source,
                &changes.status,
                &changes.assigned_to_id,
                &changes.notes,
                &changes.estimated_value,
            ],
            lead_from_row,
        )
        .await
    }

    async fn delete_lead(&self, id: Uuid) -> Result<bool, AppError> {
        // deal, activity and booking links follow through the foreign keys
        let client = self.pool.get().await?;
        let deleted = client.execute("DELETE FROM leads WHERE id = $1", &[&id]).await?;
        Ok(deleted > 0)
    }

    async fn set_lead_score(&self, id: Uuid, score: i32) -> Result<Option<Lead>, AppError> {
        let sql = format!(
            "UPDATE leads SET score = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            LEAD_COLUMNS
        );
        self.fetch_one(&sql, &[&id, &score], lead_from_row).await
    }

    async fn lead_status_counts(&self) -> Result<HashMap<LeadStatus, u64>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(LEAD_STATUS_COUNTS, &[]).await?;
        Ok(rows
            .iter()
            .map(|row| (row.get::<_, LeadStatus>(0), row.get::<_, i64>(1) as u64))
            .collect())
    }

    async fn list_deals(&self, filter: &DealFilter, page: PageRequest) -> Result<Page<Deal>, AppError> {
        self.fetch_page(
            "deals",
            DEAL_COLUMNS,
            "created_at DESC",
            deal_where(filter),
            page,
            deal_from_row,
        )
        .await
    }

    async fn find_deal(&self, id: Uuid) -> Result<Option<Deal>, AppError> {
        let sql = format!("SELECT {} FROM deals WHERE id = $1", DEAL_COLUMNS);
        self.fetch_one(&sql, &[&id], deal_from_row).await
    }

    async fn find_deal_by_lead(&self, lead_id: Uuid) -> Result<Option<Deal>, AppError> {
        let sql = format!("SELECT {} FROM deals WHERE lead_id = $1", DEAL_COLUMNS);
        self.fetch_one(&sql, &[&lead_id], deal_from_row).await
    }

    async fn create_deal(&self, deal: NewDeal) -> Result<Deal, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let lead_status: LeadStatus = tx
            .query_opt("SELECT status FROM leads WHERE id = $1 FOR UPDATE", &[&deal.lead_id])
            .await?
            .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))?
            .get(0);

        let existing = tx
            .query_opt("SELECT id FROM deals WHERE lead_id = $1", &[&deal.lead_id])
            .await?;
        if existing.is_some() {
            return Err(AppError::BadRequest("Lead already has an associated deal".to_string()));
        }

        let sql = format!(
            "INSERT INTO deals (id, title, description, value, stage, probability,
                                expected_close_date, lead_id, assigned_to_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {}",
            DEAL_COLUMNS
        );
        let row = tx
            .query_one(
                &sql,
                &[
                    &Uuid::new_v4(),
                    &deal.title,
                    &deal.description,
                    &deal.value,
                    &deal.stage,
                    &deal.probability,
                    &deal.expected_close_date,
                    &deal.lead_id,
                    &deal.assigned_to_id,
                ],
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::BadRequest("Lead already has an associated deal".to_string())
                } else {
                    map_db_error(e)
                }
            })?;

        if let Some(status) = lead_status_on_deal_created(lead_status) {
            tx.execute(
                "UPDATE leads SET status = $2, updated_at = NOW() WHERE id = $1",
                &[&deal.lead_id, &status],
            )
            .await?;
            debug!("Lead {} promoted to {:?}", deal.lead_id, status);
        }

        tx.commit().await?;
        Ok(deal_from_row(&row))
    }

    async fn update_deal(&self, id: Uuid, changes: DealChanges) -> Result<Option<Deal>, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let sql = format!(
            "UPDATE deals SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                value = COALESCE($4, value),
                stage = COALESCE($5, stage),
                probability = COALESCE($6, probability),
                expected_close_date = COALESCE($7, expected_close_date),
                actual_close_date = COALESCE($8, actual_close_date),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            DEAL_COLUMNS
        );
        let Some(row) = tx
            .query_opt(
                &sql,
                &[
                    &id,
                    &changes.title,
                    &changes.description,
                    &changes.value,
                    &changes.stage,
                    &changes.probability,
                    &changes.expected_close_date,
                    &changes.actual_close_date,
                ],
            )
            .await?
        else {
            return Ok(None);
        };
        let deal = deal_from_row(&row);

        if let Some(stage) = changes.stage {
            tx.execute(
                "UPDATE leads SET status = $2, updated_at = NOW() WHERE id = $1",
                &[&deal.lead_id, &lead_status_for_stage(stage)],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(Some(deal))
    }

    async fn delete_deal(&self, id: Uuid) -> Result<bool, AppError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let Some(row) = tx
            .query_opt("DELETE FROM deals WHERE id = $1 RETURNING lead_id", &[&id])
            .await?
        else {
            return Ok(false);
        };
        let lead_id: Uuid = row.get(0);

        tx.execute(
            "UPDATE leads SET status = $2, updated_at = NOW() WHERE id = $1",
            &[&lead_id, &lead_status_on_deal_deleted()],
        )
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn stage_aggregates(&self, assigned_to: Option<Uuid>) -> Result<Vec<StageAggregate>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(STAGE_AGGREGATES, &[&assigned_to]).await?;
        Ok(rows
            .iter()
            .map(|row| StageAggregate {
                stage: row.get::<_, DealStage>("stage"),
                count: row.get::<_, i64>("count") as u64,
                total_value: row.get("total_value"),
                avg_probability: row.get("avg_probability"),
            })
            .collect())
    }

    async fn closed_won_deals(&self, assigned_to: Uuid, since: DateTime<Utc>) -> Result<Vec<Deal>, AppError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {} FROM deals
             WHERE assigned_to_id = $1 AND stage = $2 AND actual_close_date >= $3
             ORDER BY actual_close_date ASC",
            DEAL_COLUMNS
        );
        let rows = client
            .query(&sql, &[&assigned_to, &DealStage::ClosedWon, &since])
            .await?;
        Ok(rows.iter().map(deal_from_row).collect())
    }

    async fn list_activities(&self, filter: &ActivityFilter, page: PageRequest) -> Result<Page<Activity>, AppError> {
        self.fetch_page(
            "activities",
            ACTIVITY_COLUMNS,
            "created_at DESC",
            activity_where(filter),
            page,
            activity_from_row,
        )
        .await
    }

    async fn count_activities(&self, filter: &ActivityFilter) -> Result<u64, AppError> {
        self.count("activities", activity_where(filter)).await
    }

    async fn create_activity(&self, activity: NewActivity) -> Result<Activity, AppError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO activities (id, type, title, description, lead_id, deal_id, user_id,
                                     scheduled_at, duration)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {}",
            ACTIVITY_COLUMNS
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &Uuid::new_v4(),
                    &activity.activity_type,
                    &activity.title,
                    &activity.description,
                    &activity.lead_id,
                    &activity.deal_id,
                    &activity.user_id,
                    &activity.scheduled_at,
                    &activity.duration,
                ],
            )
            .await
            .map_err(map_db_error)?;
        Ok(activity_from_row(&row))
    }

    async fn list_tasks(&self, filter: &TaskFilter, page: PageRequest) -> Result<Page<Task>, AppError> {
        self.fetch_page(
            "tasks",
            TASK_COLUMNS,
            "due_date ASC NULLS LAST, created_at ASC",
            task_where(filter),
            page,
            task_from_row,
        )
        .await
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, AppError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO tasks (id, title, description, priority, due_date, deal_id, assigned_to_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            TASK_COLUMNS
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &Uuid::new_v4(),
                    &task.title,
                    &task.description,
                    &task.priority,
                    &task.due_date,
                    &task.deal_id,
                    &task.assigned_to_id,
                ],
            )
            .await
            .map_err(map_db_error)?;
        Ok(task_from_row(&row))
    }

    async fn update_task(&self, id: Uuid, changes: TaskChanges) -> Result<Option<Task>, AppError> {
        let sql = format!(
            "UPDATE tasks SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                status = COALESCE($4, status),
                priority = COALESCE($5, priority),
                due_date = COALESCE($6, due_date),
                assigned_to_id = COALESCE($7, assigned_to_id),
                completed_at = $8,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            TASK_COLUMNS
        );
        self.fetch_one(
            &sql,
            &[
                &id,
                &changes.title,
                &changes.description,
                &changes.status,
                &changes.priority,
                &changes.due_date,
                &changes.assigned_to_id,
                &changes.completed_at,
            ],
            task_from_row,
        )
        .await
    }

    async fn list_bookings(&self, filter: &BookingFilter, page: PageRequest) -> Result<Page<Booking>, AppError> {
        self.fetch_page(
            "bookings",
            BOOKING_COLUMNS,
            "start_time ASC",
            booking_where(filter),
            page,
            booking_from_row,
        )
        .await
    }

    async fn create_booking(&self, booking: NewBooking) -> Result<Booking, AppError> {
        let client = self.pool.get().await?;
        let sql = format!(
            "INSERT INTO bookings (id, title, description, start_time, end_time, attendee_email,
                                   attendee_name, meeting_type, user_id, lead_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {}",
            BOOKING_COLUMNS
        );
        let row = client
            .query_one(
                &sql,
                &[
                    &Uuid::new_v4(),
                    &booking.title,
                    &booking.description,
                    &booking.start_time,
                    &booking.end_time,
                    &booking.attendee_email,
                    &booking.attendee_name,
                    &booking.meeting_type,
                    &booking.user_id,
                    &booking.lead_id,
                ],
            )
            .await
            .map_err(map_db_error)?;
        Ok(booking_from_row(&row))
    }

    async fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError> {
        self.fetch_any("users", USER_COLUMNS, "id", ids, user_from_row).await
    }

    async fn leads_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Lead>, AppError> {
        self.fetch_any("leads", LEAD_COLUMNS, "id", ids, lead_from_row).await
    }

    async fn deals_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Deal>, AppError> {
        self.fetch_any("deals", DEAL_COLUMNS, "id", ids, deal_from_row).await
    }

    async fn deals_by_lead_ids(&self, lead_ids: &[Uuid]) -> Result<Vec<Deal>, AppError> {
        self.fetch_any("deals", DEAL_COLUMNS, "lead_id", lead_ids, deal_from_row)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, TaskStatus};

    #[test]
    fn test_lead_search_binds_one_pattern() {
        let filter = LeadFilter {
            status: Some(LeadStatus::New),
            search: Some("acme".to_string()),
            ..Default::default()
        };
        let w = lead_where(&filter);
        assert_eq!(
            w.sql(),
            " WHERE status = $1 AND (first_name ILIKE $2 OR last_name ILIKE $2 \
             OR email ILIKE $2 OR company ILIKE $2)"
        );
        assert_eq!(w.params().len(), 2);
    }

    #[test]
    fn test_deal_value_range() {
        let filter = DealFilter {
            min_value: Some(100.0),
            max_value: Some(500.0),
            ..Default::default()
        };
        assert_eq!(deal_where(&filter).sql(), " WHERE value >= $1 AND value <= $2");
        assert_eq!(deal_where(&DealFilter::default()).sql(), "");
    }

    #[test]
    fn test_status_sets_use_any() {
        let tasks = TaskFilter {
            statuses: TaskStatus::OPEN.to_vec(),
            assigned_to: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert_eq!(
            task_where(&tasks).sql(),
            " WHERE status = ANY($1) AND assigned_to_id = $2"
        );

        let bookings = BookingFilter {
            statuses: BookingStatus::UPCOMING.to_vec(),
            starts_after: Some(Utc::now()),
            ..Default::default()
        };
        assert_eq!(
            booking_where(&bookings).sql(),
            " WHERE status = ANY($1) AND start_time >= $2"
        );
    }
}
