//! Account data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Account role carried in token claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Guest => "guest",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "guest" => Ok(Role::Guest),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Account database model
///
/// The password hash and the current refresh token are never serialized.
#[derive(FromRow, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
    pub avatar: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Fields for a new account; every creation path maps into this explicitly.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
    pub avatar: Option<String>,
}

// ==================== Admin user management ====================

/// Columns a listing may be ordered by, named as the API exposes them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Id,
    Email,
    FirstName,
    LastName,
    Role,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Email => "email",
            SortField::FirstName => "first_name",
            SortField::LastName => "last_name",
            SortField::Role => "role",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(SortField::Id),
            "email" => Ok(SortField::Email),
            "firstName" => Ok(SortField::FirstName),
            "lastName" => Ok(SortField::LastName),
            "role" => Ok(SortField::Role),
            "createdAt" => Ok(SortField::CreatedAt),
            "updatedAt" => Ok(SortField::UpdatedAt),
            other => Err(format!("unknown sort field: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(SortOrder::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(SortOrder::Desc)
        } else {
            Err(format!("unknown sort order: {}", s))
        }
    }
}

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Raw query string of `GET /api/users`; checked by `ListAccountsValidator`
/// before it becomes an [`AccountFilter`].
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListAccountsQuery {
    pub search: Option<String>,
    pub role: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Typed listing filter. Pages start at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountFilter {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub page: u32,
    pub limit: u32,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for AccountFilter {
    fn default() -> Self {
        Self {
            search: None,
            role: None,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl AccountFilter {
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

/// Unparseable values fall back to defaults; validate first to reject them.
impl From<&ListAccountsQuery> for AccountFilter {
    fn from(query: &ListAccountsQuery) -> Self {
        let defaults = AccountFilter::default();
        Self {
            search: query
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            role: query.role.as_deref().and_then(|r| r.parse().ok()),
            page: query
                .page
                .as_deref()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.page),
            limit: query
                .limit
                .as_deref()
                .and_then(|l| l.parse().ok())
                .unwrap_or(defaults.limit),
            sort_by: query
                .sort_by
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sort_by),
            sort_order: query
                .sort_order
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sort_order),
        }
    }
}

/// One page of accounts with the totals needed to page through the rest
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AccountPage {
    pub data: Vec<Account>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
}

impl AccountPage {
    pub fn new(data: Vec<Account>, total: i64, filter: &AccountFilter) -> Self {
        let limit = i64::from(filter.limit.max(1));
        Self {
            data,
            total,
            page: filter.page,
            limit: filter.limit,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub email: String,
    /// Omitted for accounts that will only sign in through OAuth
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub avatar: Option<String>,
}

/// Partial update; absent fields are left as they are.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub avatar: Option<String>,
    pub is_active: Option<bool>,
}
