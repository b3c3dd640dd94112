//! SQL fragments and a small builder for filtered list queries

use tokio_postgres::types::ToSql;

pub const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, is_active, \
     avatar, last_login, created_at, updated_at";

pub const LEAD_COLUMNS: &str = "id, first_name, last_name, email, phone, company, job_title, source, \
     status, score, estimated_value, notes, created_by_id, assigned_to_id, created_at, updated_at";

pub const DEAL_COLUMNS: &str = "id, title, description, value, stage, probability, expected_close_date, \
     actual_close_date, lead_id, assigned_to_id, created_at, updated_at";

pub const ACTIVITY_COLUMNS: &str =
    "id, type, title, description, lead_id, deal_id, user_id, scheduled_at, duration, created_at";

pub const TASK_COLUMNS: &str = "id, title, description, status, priority, due_date, completed_at, \
     deal_id, assigned_to_id, created_at, updated_at";

pub const BOOKING_COLUMNS: &str = "id, title, description, start_time, end_time, attendee_email, \
     attendee_name, meeting_type, status, user_id, lead_id, created_at, updated_at";

pub const STAGE_AGGREGATES: &str = r#"
    SELECT stage,
           COUNT(*) AS count,
           COALESCE(SUM(value), 0)::DOUBLE PRECISION AS total_value,
           COALESCE(AVG(probability), 0)::DOUBLE PRECISION AS avg_probability
    FROM deals
    WHERE ($1::UUID IS NULL OR assigned_to_id = $1)
    GROUP BY stage
"#;

pub const LEAD_STATUS_COUNTS: &str = "SELECT status, COUNT(*) AS count FROM leads GROUP BY status";

/// Accumulates `WHERE` conditions and their bound parameters.
///
/// Conditions are written with `$?` placeholders; each one is numbered as it
/// is added, so a condition may repeat its placeholder to reuse one value.
#[derive(Default)]
pub struct WhereBuilder {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql + Sync + Send>>,
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition bound to `value`
    pub fn push<T>(&mut self, clause: &str, value: T) -> &mut Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        self.params.push(Box::new(value));
        let placeholder = format!("${}", self.params.len());
        self.clauses.push(clause.replace("$?", &placeholder));
        self
    }

    /// Add a condition only when a value is present
    pub fn push_opt<T>(&mut self, clause: &str, value: Option<T>) -> &mut Self
    where
        T: ToSql + Sync + Send + 'static,
    {
        if let Some(value) = value {
            self.push(clause, value);
        }
        self
    }

    /// The `WHERE ...` clause, or an empty string without conditions
    pub fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Placeholder number of the next parameter appended after the conditions
    pub fn next_placeholder(&self) -> usize {
        self.params.len() + 1
    }

    pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| &**p as &(dyn ToSql + Sync))
            .collect()
    }
}

/// Wrap a user search term for `ILIKE`, escaping its wildcards
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_numbered_in_order() {
        let mut builder = WhereBuilder::new();
        builder
            .push("status = $?", "NEW".to_string())
            .push_opt::<i32>("score > $?", None)
            .push("(first_name ILIKE $? OR email ILIKE $?)", "%a%".to_string());

        assert_eq!(
            builder.sql(),
            " WHERE status = $1 AND (first_name ILIKE $2 OR email ILIKE $2)"
        );
        assert_eq!(builder.params().len(), 2);
        assert_eq!(builder.next_placeholder(), 3);
    }

    #[test]
    fn test_empty_builder() {
        let builder = WhereBuilder::new();
        assert_eq!(builder.sql(), "");
        assert_eq!(builder.next_placeholder(), 1);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("acme"), "%acme%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
