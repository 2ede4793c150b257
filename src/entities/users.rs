use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account role. Admin is a strict superset of user in the permission table.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Account lifecycle state. Only `active` accounts may authenticate;
/// `locked` auto-clears after the lock window, `suspended` and `inactive`
/// require an admin action or a completed password reset.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "locked")]
    Locked,
    #[sea_orm(string_value = "suspended")]
    Suspended,
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Locked => write!(f, "locked"),
            Self::Suspended => write!(f, "suspended"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "locked" => Ok(Self::Locked),
            "suspended" => Ok(Self::Suspended),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown account status: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    /// Stored lowercased so uniqueness and lookup are case-insensitive.
    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id PHC string (algorithm, params and salt are embedded).
    pub password_hash: String,

    pub role: Role,

    pub status: AccountStatus,

    pub failed_login_attempts: i32,

    /// Lockout reference time (RFC3339), set when the failure threshold trips.
    pub locked_at: Option<String>,

    pub last_login: Option<String>,

    /// SHA-256 hex digest of the outstanding reset token; the raw token is
    /// never persisted. Cleared together with the expiry on consume.
    pub password_reset_token: Option<String>,

    pub password_reset_expires: Option<String>,

    pub last_password_reset: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
