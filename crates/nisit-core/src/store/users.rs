//! `users` and `user_roles` rows.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::StoreError;
use crate::ids::UserId;
use crate::role::{Role, RoleSet};
use crate::user::{NewUser, User, UserStatus};

const USER_COLUMNS: &str =
    "id, email, full_name, student_code, faculty, department, status, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        student_code: row.get(3)?,
        faculty: row.get(4)?,
        department: row.get(5)?,
        status: row.get(6)?,
        roles: RoleSet::new(),
        created_at: row.get(7)?,
    })
}

fn with_roles(conn: &Connection, user: Option<User>) -> Result<Option<User>, StoreError> {
    match user {
        Some(mut user) => {
            user.roles = roles(conn, user.id)?;
            Ok(Some(user))
        },
        None => Ok(None),
    }
}

pub(crate) fn insert(
    conn: &Connection,
    input: &NewUser,
    at: DateTime<Utc>,
) -> Result<UserId, StoreError> {
    conn.execute(
        "INSERT INTO users (email, full_name, student_code, faculty, department, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            input.email,
            input.full_name,
            input.student_code,
            input.faculty,
            input.department,
            UserStatus::Active,
            at,
        ],
    )?;
    Ok(UserId(conn.last_insert_rowid()))
}

pub(crate) fn find(conn: &Connection, id: UserId) -> Result<Option<User>, StoreError> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            [id],
            user_from_row,
        )
        .optional()?;
    with_roles(conn, user)
}

pub(crate) fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>, StoreError> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            [email],
            user_from_row,
        )
        .optional()?;
    with_roles(conn, user)
}

pub(crate) fn list(conn: &Connection) -> Result<Vec<User>, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    users
        .into_iter()
        .map(|mut user| {
            user.roles = roles(conn, user.id)?;
            Ok(user)
        })
        .collect()
}

pub(crate) fn roles(conn: &Connection, id: UserId) -> Result<RoleSet, StoreError> {
    let mut stmt = conn.prepare("SELECT role FROM user_roles WHERE user_id = ?1")?;
    let roles = stmt
        .query_map([id], |row| row.get::<_, Role>(0))?
        .collect::<Result<RoleSet, _>>()?;
    Ok(roles)
}

/// Returns `true` if the role was newly granted.
pub(crate) fn grant_role(
    conn: &Connection,
    id: UserId,
    role: Role,
    at: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO user_roles (user_id, role, assigned_at) VALUES (?1, ?2, ?3)",
        params![id, role, at],
    )?;
    Ok(inserted > 0)
}

/// Returns `true` if the role was held and is now removed.
pub(crate) fn revoke_role(conn: &Connection, id: UserId, role: Role) -> Result<bool, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM user_roles WHERE user_id = ?1 AND role = ?2",
        params![id, role],
    )?;
    Ok(deleted > 0)
}

pub(crate) fn set_status(
    conn: &Connection,
    id: UserId,
    status: UserStatus,
) -> Result<bool, StoreError> {
    let updated = conn.execute(
        "UPDATE users SET status = ?2 WHERE id = ?1",
        params![id, status],
    )?;
    Ok(updated > 0)
}

/// Active users holding any of `roles`.
pub(crate) fn active_holders(
    conn: &Connection,
    roles: &[Role],
) -> Result<BTreeSet<UserId>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT u.id FROM users u
         JOIN user_roles r ON r.user_id = u.id
         WHERE r.role = ?1 AND u.status = ?2",
    )?;
    let mut holders = BTreeSet::new();
    for role in roles {
        let ids = stmt
            .query_map(params![role, UserStatus::Active], |row| row.get::<_, UserId>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        holders.extend(ids);
    }
    Ok(holders)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::store::Store;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn roster_excludes_disabled_users() {
        let store = Store::in_memory().unwrap();
        store
            .with_connection(|conn| {
                let a = insert(conn, &NewUser::new("a@ku.th", "A"), at())?;
                let b = insert(conn, &NewUser::new("b@ku.th", "B"), at())?;
                let c = insert(conn, &NewUser::new("c@ku.th", "C"), at())?;
                grant_role(conn, a, Role::Committee, at())?;
                grant_role(conn, b, Role::CommitteePresident, at())?;
                grant_role(conn, b, Role::Committee, at())?;
                grant_role(conn, c, Role::Committee, at())?;
                set_status(conn, c, UserStatus::Disabled)?;

                let roster = active_holders(conn, &Role::VOTERS)?;
                assert_eq!(roster, BTreeSet::from([a, b]));
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn grant_is_idempotent() {
        let store = Store::in_memory().unwrap();
        store
            .with_connection(|conn| {
                let id = insert(conn, &NewUser::new("a@ku.th", "A"), at())?;
                assert!(grant_role(conn, id, Role::Staff, at())?);
                assert!(!grant_role(conn, id, Role::Staff, at())?);
                let user = find(conn, id)?.unwrap();
                assert_eq!(user.roles, RoleSet::from([Role::Staff]));
                assert!(revoke_role(conn, id, Role::Staff)?);
                assert!(!revoke_role(conn, id, Role::Staff)?);
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }
}
