//! Schema bootstrap, run once at startup

use crate::error::AppError;
use deadpool_postgres::Pool;
use tracing::info;

/// Enum types; `CREATE TYPE` has no `IF NOT EXISTS`, so duplicates are swallowed
const ENUM_TYPES: &[(&str, &str)] = &[
    ("user_role", "'ADMIN', 'MANAGER', 'SALES_REP', 'MARKETING'"),
    (
        "lead_status",
        "'NEW', 'CONTACTED', 'QUALIFIED', 'PROPOSAL_SENT', 'NEGOTIATION', 'CLOSED_WON', 'CLOSED_LOST', 'ON_HOLD'",
    ),
    (
        "lead_source",
        "'WEBSITE', 'REFERRAL', 'SOCIAL_MEDIA', 'EMAIL_CAMPAIGN', 'COLD_CALL', 'TRADE_SHOW', 'PARTNER', 'MANUAL', 'IMPORT'",
    ),
    (
        "deal_stage",
        "'QUALIFICATION', 'PROPOSAL', 'NEGOTIATION', 'CLOSED_WON', 'CLOSED_LOST'",
    ),
    (
        "activity_type",
        "'CALL', 'EMAIL', 'MEETING', 'TASK', 'NOTE', 'PROPOSAL_SENT', 'FOLLOW_UP'",
    ),
    ("task_status", "'PENDING', 'IN_PROGRESS', 'COMPLETED', 'CANCELLED'"),
    ("task_priority", "'LOW', 'MEDIUM', 'HIGH', 'URGENT'"),
    (
        "booking_status",
        "'SCHEDULED', 'CONFIRMED', 'COMPLETED', 'CANCELLED', 'NO_SHOW'",
    ),
    ("meeting_type", "'IN_PERSON', 'VIDEO_CALL', 'PHONE_CALL'"),
];

const TABLES: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email VARCHAR(255) UNIQUE NOT NULL,
        password_hash VARCHAR(255) NOT NULL,
        first_name VARCHAR(100) NOT NULL,
        last_name VARCHAR(100) NOT NULL,
        role user_role NOT NULL DEFAULT 'SALES_REP',
        is_active BOOLEAN NOT NULL DEFAULT true,
        avatar TEXT,
        last_login TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS leads (
        id UUID PRIMARY KEY,
        first_name VARCHAR(100) NOT NULL,
        last_name VARCHAR(100) NOT NULL,
        email VARCHAR(255) NOT NULL,
        phone VARCHAR(50),
        company VARCHAR(255),
        job_title VARCHAR(255),
        source lead_source NOT NULL DEFAULT 'MANUAL',
        status lead_status NOT NULL DEFAULT 'NEW',
        score INTEGER NOT NULL DEFAULT 0 CHECK (score BETWEEN 0 AND 100),
        estimated_value DOUBLE PRECISION,
        notes TEXT,
        created_by_id UUID NOT NULL REFERENCES users(id),
        assigned_to_id UUID NOT NULL REFERENCES users(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS deals (
        id UUID PRIMARY KEY,
        title VARCHAR(255) NOT NULL,
        description TEXT,
        value DOUBLE PRECISION NOT NULL,
        stage deal_stage NOT NULL DEFAULT 'QUALIFICATION',
        probability INTEGER NOT NULL DEFAULT 0 CHECK (probability BETWEEN 0 AND 100),
        expected_close_date TIMESTAMPTZ,
        actual_close_date TIMESTAMPTZ,
        lead_id UUID UNIQUE NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
        assigned_to_id UUID NOT NULL REFERENCES users(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS activities (
        id UUID PRIMARY KEY,
        type activity_type NOT NULL,
        title VARCHAR(255) NOT NULL,
        description TEXT,
        lead_id UUID REFERENCES leads(id) ON DELETE SET NULL,
        deal_id UUID REFERENCES deals(id) ON DELETE SET NULL,
        user_id UUID NOT NULL REFERENCES users(id),
        scheduled_at TIMESTAMPTZ,
        duration INTEGER,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS tasks (
        id UUID PRIMARY KEY,
        title VARCHAR(255) NOT NULL,
        description TEXT,
        status task_status NOT NULL DEFAULT 'PENDING',
        priority task_priority NOT NULL DEFAULT 'MEDIUM',
        due_date TIMESTAMPTZ,
        completed_at TIMESTAMPTZ,
        deal_id UUID REFERENCES deals(id) ON DELETE SET NULL,
        assigned_to_id UUID NOT NULL REFERENCES users(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS bookings (
        id UUID PRIMARY KEY,
        title VARCHAR(255) NOT NULL,
        description TEXT,
        start_time TIMESTAMPTZ NOT NULL,
        end_time TIMESTAMPTZ NOT NULL,
        attendee_email VARCHAR(255) NOT NULL,
        attendee_name VARCHAR(255) NOT NULL,
        meeting_type meeting_type NOT NULL DEFAULT 'VIDEO_CALL',
        status booking_status NOT NULL DEFAULT 'SCHEDULED',
        user_id UUID NOT NULL REFERENCES users(id),
        lead_id UUID REFERENCES leads(id) ON DELETE SET NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_leads_assigned_to ON leads(assigned_to_id)",
    "CREATE INDEX IF NOT EXISTS idx_leads_status ON leads(status)",
    "CREATE INDEX IF NOT EXISTS idx_deals_assigned_to ON deals(assigned_to_id)",
    "CREATE INDEX IF NOT EXISTS idx_deals_stage ON deals(stage)",
    "CREATE INDEX IF NOT EXISTS idx_activities_user ON activities(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_assigned_to ON tasks(assigned_to_id)",
    "CREATE INDEX IF NOT EXISTS idx_bookings_user_start ON bookings(user_id, start_time)",
];

fn create_enum_sql(name: &str, variants: &str) -> String {
    format!(
        "DO $$ BEGIN CREATE TYPE {} AS ENUM ({}); \
         EXCEPTION WHEN duplicate_object THEN NULL; END $$",
        name, variants
    )
}

/// Create enum types, tables and indexes if they don't exist
pub async fn create_database_tables(pool: &Pool) -> Result<(), AppError> {
    let client = pool.get().await?;

    for (name, variants) in ENUM_TYPES {
        client.batch_execute(&create_enum_sql(name, variants)).await?;
    }
    for table in TABLES {
        client.batch_execute(table).await?;
    }
    for index in INDEXES {
        client.batch_execute(index).await?;
    }

    info!("✅ Database tables initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_sql_is_idempotent_block() {
        let sql = create_enum_sql("task_priority", "'LOW', 'HIGH'");
        assert!(sql.starts_with("DO $$ BEGIN CREATE TYPE task_priority AS ENUM ('LOW', 'HIGH');"));
        assert!(sql.contains("duplicate_object"));
    }

    #[test]
    fn test_every_table_is_created_conditionally() {
        assert_eq!(TABLES.len(), 6);
        assert!(TABLES.iter().all(|t| t.starts_with("CREATE TABLE IF NOT EXISTS")));
    }
}
