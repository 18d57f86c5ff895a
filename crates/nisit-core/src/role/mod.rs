//! Roles, role sets and authorization.
//!
//! A user holds a *set* of roles. For routing and tie-breaking a single
//! primary role is derived from that set by the fixed priority
//!
//! ```text
//! ADMIN > COMMITTEE_PRESIDENT > DEAN > SUB_DEAN > COMMITTEE > STAFF > STUDENT
//! ```
//!
//! Every engine operation receives an explicit [`Identity`]; nothing here
//! reads ambient session state.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ParseValueError};
use crate::ids::UserId;

/// A role a user may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Applicant.
    Student,
    /// First-level reviewer.
    Staff,
    /// Second-level reviewer.
    SubDean,
    /// Third-level reviewer.
    Dean,
    /// Voting committee member.
    Committee,
    /// Voting committee member who also signs announcements.
    CommitteePresident,
    /// System administrator; verifies nominations and drives phases.
    Admin,
}

impl Role {
    /// All roles, highest priority first.
    pub const PRIORITY: [Self; 7] = [
        Self::Admin,
        Self::CommitteePresident,
        Self::Dean,
        Self::SubDean,
        Self::Committee,
        Self::Staff,
        Self::Student,
    ];

    /// Roles that may cast committee votes.
    pub const VOTERS: [Self; 2] = [Self::Committee, Self::CommitteePresident];

    /// Returns the canonical role name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "STUDENT",
            Self::Staff => "STAFF",
            Self::SubDean => "SUB_DEAN",
            Self::Dean => "DEAN",
            Self::Committee => "COMMITTEE",
            Self::CommitteePresident => "COMMITTEE_PRESIDENT",
            Self::Admin => "ADMIN",
        }
    }

    /// Default landing route for users whose primary role is `self`.
    #[must_use]
    pub const fn dashboard_path(&self) -> &'static str {
        match self {
            Self::Student => "/student/student_dashboard",
            Self::Staff => "/staff/staff_dashboard",
            Self::SubDean => "/subdean/subdean_dashboard",
            Self::Dean => "/dean/dean_dashboard",
            Self::Committee => "/committee/committee_dashboard",
            Self::CommitteePresident => "/committee_president/president_dashboard",
            Self::Admin => "/admin/admin_dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PRIORITY
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseValueError::new("role", s))
    }
}

/// The set of roles held by one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `role` is in the set.
    #[must_use]
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// Returns `true` if the set shares at least one role with `required`.
    #[must_use]
    pub fn intersects(&self, required: &[Role]) -> bool {
        required.iter().any(|role| self.0.contains(role))
    }

    /// Adds a role. Returns `true` if it was not already present.
    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    /// Removes a role. Returns `true` if it was present.
    pub fn remove(&mut self, role: Role) -> bool {
        self.0.remove(&role)
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of roles held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates the roles in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    /// The highest-priority role in the set, or `None` if the set is empty.
    #[must_use]
    pub fn primary(&self) -> Option<Role> {
        primary_role(self)
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Role; N]> for RoleSet {
    fn from(roles: [Role; N]) -> Self {
        roles.into_iter().collect()
    }
}

/// Resolves the primary role of `roles` by the fixed priority order.
///
/// Returns `None` only for an empty set; a role that is not held is never
/// returned.
#[must_use]
pub fn primary_role(roles: &RoleSet) -> Option<Role> {
    Role::PRIORITY.into_iter().find(|role| roles.contains(*role))
}

/// An authenticated caller: who they are and which roles they hold.
///
/// Supplied by the identity provider after credential or SSO verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// The authenticated user.
    pub user_id: UserId,
    /// The roles the user holds.
    pub roles: RoleSet,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub fn new(user_id: UserId, roles: impl Into<RoleSet>) -> Self {
        Self {
            user_id,
            roles: roles.into(),
        }
    }

    /// Returns `true` if the identity holds `role`.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role)
    }

    /// The identity's primary role.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoRolesAssigned`] if the role set is empty.
    pub fn primary_role(&self) -> Result<Role, EngineError> {
        self.roles.primary().ok_or(EngineError::NoRolesAssigned {
            user_id: self.user_id,
        })
    }

    /// Fails with [`EngineError::Unauthorized`] unless [`authorize`] allows
    /// the identity for `required`.
    pub(crate) fn require_any(
        &self,
        required: &[Role],
        operation: &str,
    ) -> Result<(), EngineError> {
        if authorize(self, required) {
            Ok(())
        } else {
            Err(EngineError::Unauthorized {
                actor_id: self.user_id,
                operation: operation.to_string(),
            })
        }
    }
}

/// Returns `true` iff the identity holds at least one of `required`.
#[must_use]
pub fn authorize(identity: &Identity, required: &[Role]) -> bool {
    identity.roles.intersects(required)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_role_follows_priority() {
        let roles = RoleSet::from([Role::Student, Role::Committee, Role::Dean]);
        assert_eq!(primary_role(&roles), Some(Role::Dean));

        let roles = RoleSet::from([Role::CommitteePresident, Role::Dean]);
        assert_eq!(primary_role(&roles), Some(Role::CommitteePresident));

        let roles = RoleSet::from([Role::Staff, Role::Admin]);
        assert_eq!(primary_role(&roles), Some(Role::Admin));
    }

    #[test]
    fn primary_role_never_fabricates_student() {
        assert_eq!(primary_role(&RoleSet::new()), None);
        let roles = RoleSet::from([Role::Staff]);
        assert_eq!(primary_role(&roles), Some(Role::Staff));
    }

    #[test]
    fn identity_without_roles_has_no_primary() {
        let identity = Identity::new(UserId(5), RoleSet::new());
        assert!(matches!(
            identity.primary_role(),
            Err(EngineError::NoRolesAssigned { user_id: UserId(5) })
        ));
    }

    #[test]
    fn authorize_is_intersection() {
        let identity = Identity::new(UserId(1), [Role::Staff, Role::Committee]);
        assert!(authorize(&identity, &Role::VOTERS));
        assert!(authorize(&identity, &[Role::Staff]));
        assert!(!authorize(&identity, &[Role::Admin, Role::Dean]));
        assert!(!authorize(&identity, &[]));
    }

    #[test]
    fn require_any_reports_operation() {
        let identity = Identity::new(UserId(2), [Role::Student]);
        let err = identity
            .require_any(&[Role::Admin], "advance phase")
            .unwrap_err();
        assert_eq!(err.kind(), "unauthorized");
        assert!(err.to_string().contains("advance phase"));
    }

    #[test]
    fn role_names_round_trip() {
        for role in Role::PRIORITY {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!("sub_dean".parse::<Role>().unwrap(), Role::SubDean);
        assert!("JANITOR".parse::<Role>().is_err());
    }

    #[test]
    fn dashboard_paths() {
        assert_eq!(Role::Admin.dashboard_path(), "/admin/admin_dashboard");
        assert_eq!(
            Role::CommitteePresident.dashboard_path(),
            "/committee_president/president_dashboard"
        );
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&RoleSet::from([Role::SubDean, Role::Student])).unwrap();
        assert_eq!(json, r#"["STUDENT","SUB_DEAN"]"#);
    }
}
