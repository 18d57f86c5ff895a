//! Registration, role administration and identity resolution.

use rusqlite::Connection;
use serde_json::json;
use tracing::info;

use super::{Engine, log_refusal};
use crate::audit::{AuditAction, NewAuditEntry, ResourceType};
use crate::error::EngineError;
use crate::ids::UserId;
use crate::role::{Identity, Role, RoleSet};
use crate::store;
use crate::user::{NewUser, User, UserStatus, validate_new_user};

const ADMIN_ONLY: &[Role] = &[Role::Admin];

fn load_user(conn: &Connection, user_id: UserId) -> Result<User, EngineError> {
    store::users::find(conn, user_id)?.ok_or(EngineError::UserNotFound { user_id })
}

fn user_snapshot(user: &User) -> serde_json::Value {
    json!({
        "email": user.email,
        "full_name": user.full_name,
        "status": user.status,
        "roles": user.roles,
    })
}

impl Engine {
    /// Registers a new user with the `STUDENT` role.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] for a malformed or non-institutional
    ///   email, an empty name, or an email that is already registered
    /// - [`EngineError::StorageFailure`] if the write fails
    pub fn register_user(&self, input: &NewUser) -> Result<User, EngineError> {
        log_refusal("register_user", self.register_user_inner(input))
    }

    fn register_user_inner(&self, input: &NewUser) -> Result<User, EngineError> {
        let input = validate_new_user(&self.email_policy, input)?;
        self.store.transaction(|tx| -> Result<User, EngineError> {
            if store::users::find_by_email(tx, &input.email)?.is_some() {
                return Err(EngineError::validation(
                    "email",
                    format!("{} is already registered", input.email),
                ));
            }
            let at = self.now();
            let id = store::users::insert(tx, &input, at)?;
            store::users::grant_role(tx, id, Role::Student, at)?;
            let user = load_user(tx, id)?;
            self.record_audit(
                tx,
                &NewAuditEntry::new(AuditAction::UserRegister, ResourceType::User, id)
                    .actor(Some(id))
                    .new_values(user_snapshot(&user)),
                at,
            );
            info!(user_id = %id, email = %user.email, "user registered");
            Ok(user)
        })
    }

    /// Creates the first administrator.
    ///
    /// Registers `input` (or reuses an existing account with the same email)
    /// and grants it `ADMIN`. Only allowed while no active administrator
    /// exists; after that, roles are granted with [`Engine::assign_role`].
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] if an active administrator already
    ///   exists or the input is invalid
    /// - [`EngineError::StorageFailure`] if the write fails
    pub fn bootstrap_admin(&self, input: &NewUser) -> Result<User, EngineError> {
        log_refusal("bootstrap_admin", self.bootstrap_admin_inner(input))
    }

    fn bootstrap_admin_inner(&self, input: &NewUser) -> Result<User, EngineError> {
        let input = validate_new_user(&self.email_policy, input)?;
        self.store.transaction(|tx| -> Result<User, EngineError> {
            if !store::users::active_holders(tx, ADMIN_ONLY)?.is_empty() {
                return Err(EngineError::validation(
                    "admin",
                    "an active administrator already exists",
                ));
            }
            let at = self.now();
            let id = match store::users::find_by_email(tx, &input.email)? {
                Some(existing) => {
                    if !existing.is_active() {
                        return Err(EngineError::validation(
                            "email",
                            format!("{} belongs to a disabled account", input.email),
                        ));
                    }
                    existing.id
                },
                None => {
                    let id = store::users::insert(tx, &input, at)?;
                    self.record_audit(
                        tx,
                        &NewAuditEntry::new(AuditAction::UserRegister, ResourceType::User, id)
                            .new_values(json!({
                                "email": input.email,
                                "full_name": input.full_name,
                            })),
                        at,
                    );
                    id
                },
            };
            let prior = store::users::roles(tx, id)?;
            store::users::grant_role(tx, id, Role::Admin, at)?;
            let user = load_user(tx, id)?;
            self.record_audit(
                tx,
                &NewAuditEntry::new(AuditAction::RoleAssign, ResourceType::User, id)
                    .prior(json!({ "roles": prior }))
                    .new_values(json!({ "roles": user.roles, "granted": Role::Admin })),
                at,
            );
            info!(user_id = %id, email = %user.email, "bootstrapped administrator");
            Ok(user)
        })
    }

    /// Grants `role` to `user_id`. Granting a held role is a no-op.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Unauthorized`] unless `actor` is an administrator
    /// - [`EngineError::UserNotFound`] if the user does not exist
    pub fn assign_role(
        &self,
        actor: &Identity,
        user_id: UserId,
        role: Role,
    ) -> Result<User, EngineError> {
        log_refusal("assign_role", self.change_role(actor, user_id, role, true))
    }

    /// Removes `role` from `user_id`. Removing a role not held is a no-op.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Unauthorized`] unless `actor` is an administrator
    /// - [`EngineError::UserNotFound`] if the user does not exist
    /// - [`EngineError::Validation`] if `role` is the user's only role
    pub fn revoke_role(
        &self,
        actor: &Identity,
        user_id: UserId,
        role: Role,
    ) -> Result<User, EngineError> {
        log_refusal("revoke_role", self.change_role(actor, user_id, role, false))
    }

    fn change_role(
        &self,
        actor: &Identity,
        user_id: UserId,
        role: Role,
        grant: bool,
    ) -> Result<User, EngineError> {
        actor.require_any(ADMIN_ONLY, if grant { "assign roles" } else { "revoke roles" })?;
        self.store.transaction(|tx| -> Result<User, EngineError> {
            let before = load_user(tx, user_id)?;
            let at = self.now();
            let changed = if grant {
                store::users::grant_role(tx, user_id, role, at)?
            } else {
                if before.roles.contains(role) && before.roles.len() == 1 {
                    return Err(EngineError::validation(
                        "role",
                        format!("cannot remove {role}, the only role of user {user_id}"),
                    ));
                }
                store::users::revoke_role(tx, user_id, role)?
            };
            if !changed {
                return Ok(before);
            }
            let after = load_user(tx, user_id)?;
            let action = if grant {
                AuditAction::RoleAssign
            } else {
                AuditAction::RoleRevoke
            };
            self.record_audit(
                tx,
                &NewAuditEntry::new(action, ResourceType::User, user_id)
                    .actor(Some(actor.user_id))
                    .prior(json!({ "roles": before.roles }))
                    .new_values(json!({ "roles": after.roles })),
                at,
            );
            info!(
                user_id = %user_id,
                role = %role,
                actor_id = %actor.user_id,
                grant,
                "role changed"
            );
            Ok(after)
        })
    }

    /// Disables `user_id`. The account is kept for history.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Unauthorized`] unless `actor` is an administrator
    /// - [`EngineError::UserNotFound`] if the user does not exist
    pub fn deactivate_user(&self, actor: &Identity, user_id: UserId) -> Result<User, EngineError> {
        log_refusal("deactivate_user", self.deactivate_user_inner(actor, user_id))
    }

    fn deactivate_user_inner(
        &self,
        actor: &Identity,
        user_id: UserId,
    ) -> Result<User, EngineError> {
        actor.require_any(ADMIN_ONLY, "deactivate users")?;
        self.store.transaction(|tx| -> Result<User, EngineError> {
            let before = load_user(tx, user_id)?;
            if !before.is_active() {
                return Ok(before);
            }
            let at = self.now();
            store::users::set_status(tx, user_id, UserStatus::Disabled)?;
            let after = load_user(tx, user_id)?;
            self.record_audit(
                tx,
                &NewAuditEntry::new(AuditAction::UserDeactivate, ResourceType::User, user_id)
                    .actor(Some(actor.user_id))
                    .prior(user_snapshot(&before))
                    .new_values(user_snapshot(&after)),
                at,
            );
            info!(user_id = %user_id, actor_id = %actor.user_id, "user deactivated");
            Ok(after)
        })
    }

    /// The roles held by `user_id`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::UserNotFound`] if the user does not exist
    /// - [`EngineError::NoRolesAssigned`] if the user holds no roles
    pub fn resolve_roles(&self, user_id: UserId) -> Result<RoleSet, EngineError> {
        let user = self.user(user_id)?;
        if user.roles.is_empty() {
            return log_refusal("resolve_roles", Err(EngineError::NoRolesAssigned { user_id }));
        }
        Ok(user.roles)
    }

    /// Builds the [`Identity`] an authenticated request acts as.
    ///
    /// This is the store-backed identity provider used by the CLI and by
    /// adapters that do not carry roles in their session.
    ///
    /// # Errors
    ///
    /// - [`EngineError::UserNotFound`] if the user does not exist
    /// - [`EngineError::Unauthorized`] if the account is disabled
    /// - [`EngineError::NoRolesAssigned`] if the user holds no roles
    pub fn resolve_identity(&self, user_id: UserId) -> Result<Identity, EngineError> {
        let user = self.user(user_id)?;
        if !user.is_active() {
            return log_refusal(
                "resolve_identity",
                Err(EngineError::Unauthorized {
                    actor_id: user_id,
                    operation: "act with a disabled account".to_string(),
                }),
            );
        }
        if user.roles.is_empty() {
            return log_refusal(
                "resolve_identity",
                Err(EngineError::NoRolesAssigned { user_id }),
            );
        }
        Ok(Identity::new(user.id, user.roles))
    }

    /// Looks up a user.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UserNotFound`] if the user does not exist.
    pub fn user(&self, user_id: UserId) -> Result<User, EngineError> {
        self.store.with_connection(|conn| load_user(conn, user_id))
    }

    /// Looks up a user by email. The address is normalised first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for a malformed address and
    /// [`EngineError::StorageFailure`] if the query fails.
    pub fn user_by_email(&self, email: &str) -> Result<Option<User>, EngineError> {
        let email = self.email_policy.normalize(email)?;
        Ok(self
            .store
            .with_connection(|conn| store::users::find_by_email(conn, &email))?)
    }

    /// All users in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageFailure`] if the query fails.
    pub fn users(&self) -> Result<Vec<User>, EngineError> {
        Ok(self.store.with_connection(store::users::list)?)
    }
}
