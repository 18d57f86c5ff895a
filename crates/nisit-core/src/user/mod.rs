//! User records and the institutional email policy.
//!
//! Users are created at registration or first SSO login and are never hard
//! deleted; an administrator may only disable them. Credential material is
//! owned by the identity provider and never reaches this crate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ParseValueError};
use crate::ids::UserId;
use crate::role::RoleSet;

/// Soft account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// The account may act.
    Active,
    /// The account is retained for history but may not act.
    Disabled,
}

impl UserStatus {
    /// Returns the stored name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "disabled" => Ok(Self::Disabled),
            other => Err(ParseValueError::new("user status", other)),
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Row id.
    pub id: UserId,
    /// Normalised institutional email.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// University student or staff code, if known.
    pub student_code: Option<String>,
    /// Faculty.
    pub faculty: Option<String>,
    /// Department.
    pub department: Option<String>,
    /// Soft status.
    pub status: UserStatus,
    /// Roles currently held.
    pub roles: RoleSet,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Returns `true` if the account may act.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Registration input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Institutional email (normalised on registration).
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// University student or staff code.
    #[serde(default)]
    pub student_code: Option<String>,
    /// Faculty.
    #[serde(default)]
    pub faculty: Option<String>,
    /// Department.
    #[serde(default)]
    pub department: Option<String>,
}

impl NewUser {
    /// Creates registration input with only the required fields.
    #[must_use]
    pub fn new(email: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            full_name: full_name.into(),
            ..Self::default()
        }
    }
}

/// Which email domains may register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailPolicy {
    allowed_domains: Vec<String>,
}

impl EmailPolicy {
    /// Creates a policy accepting addresses under any of `domains`.
    #[must_use]
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().trim_start_matches('@').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Trims and lowercases `raw`, then checks it against the policy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] if the address is malformed or its
    /// domain is not allowed.
    pub fn normalize(&self, raw: &str) -> Result<String, EngineError> {
        let email = raw.trim().to_ascii_lowercase();
        let Some((local, domain)) = email.split_once('@') else {
            return Err(EngineError::validation("email", "missing '@'"));
        };
        let local_ok = !local.is_empty()
            && local
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '%' | '+' | '-'));
        if !local_ok {
            return Err(EngineError::validation(
                "email",
                format!("invalid local part in '{email}'"),
            ));
        }
        if !self.allowed_domains.iter().any(|d| d == domain) {
            return Err(EngineError::validation(
                "email",
                format!(
                    "domain '{domain}' is not one of: {}",
                    self.allowed_domains.join(", ")
                ),
            ));
        }
        Ok(email)
    }
}

impl Default for EmailPolicy {
    fn default() -> Self {
        Self::new(["ku.th", "live.ku.th"])
    }
}

/// Validates and normalises registration input.
pub(crate) fn validate_new_user(
    policy: &EmailPolicy,
    input: &NewUser,
) -> Result<NewUser, EngineError> {
    let email = policy.normalize(&input.email)?;
    let full_name = input.full_name.trim();
    if full_name.is_empty() {
        return Err(EngineError::validation("full_name", "must not be empty"));
    }
    let clean = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Ok(NewUser {
        email,
        full_name: full_name.to_string(),
        student_code: clean(&input.student_code),
        faculty: clean(&input.faculty),
        department: clean(&input.department),
    })
}
