//! Authentication and authorization module
//!
//! Provides JWT-based authentication and role-based access control.

mod jwt;
mod middleware;
mod password;

pub use jwt::{
    create_access_token, create_reset_token, create_tokens, decode_access_token, decode_refresh_token,
    decode_reset_token, TokenPair,
};
pub use middleware::{auth_middleware, ensure_self_or_manager, require_role, AuthUser};
pub use password::{hash_password, verify_password};

use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};

/// User roles for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[postgres(name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Full access, including role changes
    Admin,
    /// Can see and manage the whole team
    Manager,
    #[default]
    SalesRep,
    Marketing,
}

impl Role {
    /// Admins and managers may act on other users' records
    pub fn is_manager(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Manager => write!(f, "MANAGER"),
            Role::SalesRep => write!(f, "SALES_REP"),
            Role::Marketing => write!(f, "MARKETING"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::SalesRep).unwrap(), "\"SALES_REP\"");
        let role: Role = serde_json::from_str("\"MANAGER\"").unwrap();
        assert_eq!(role, Role::Manager);
        assert_eq!(Role::default(), Role::SalesRep);
    }

    #[test]
    fn test_manager_roles() {
        assert!(Role::Admin.is_manager());
        assert!(Role::Manager.is_manager());
        assert!(!Role::SalesRep.is_manager());
        assert!(!Role::Marketing.is_manager());
    }
}
