//! The operations callers invoke.
//!
//! [`Engine`] is the single entry point for the HTTP layer and the operator
//! CLI. Each mutating operation:
//!
//! 1. checks the caller's [`Identity`](crate::role::Identity) against the
//!    required roles,
//! 2. opens one `BEGIN IMMEDIATE` transaction,
//! 3. re-reads the affected rows and the active phase inside it,
//! 4. plans the change against the transition table,
//! 5. writes the change and its audit entry, then commits.
//!
//! Refusals are logged at `warn` and returned as [`EngineError`] values; the
//! transaction rolls back and nothing is written.
//!
//! # Audit entries
//!
//! The audit write runs behind a savepoint inside the business transaction.
//! If it fails, only the savepoint is rolled back: the failure is logged at
//! `error`, counted in [`Engine::audit_failures`], and the business change
//! still commits.

mod phase;
mod tickets;
mod users;
mod voting;


use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rusqlite::Transaction;
use tracing::{error, info, warn};

use crate::audit::{AuditAction, AuditEntry, NewAuditEntry, ResourceType};
use crate::clock::{Clock, SystemClock};
use crate::config::NisitConfig;
use crate::error::EngineError;
use crate::ids::AuditId;
use crate::phase::Phase;
use crate::store::{self, Store, StoreError};
use crate::user::EmailPolicy;
use crate::vote::TallyPolicy;

/// The award engine.
///
/// `Engine` is `Send + Sync`; share one instance behind an [`Arc`] across
/// request handlers.
#[derive(Debug)]
pub struct Engine {
    store: Store,
    email_policy: EmailPolicy,
    tally_policy: TallyPolicy,
    clock: Arc<dyn Clock>,
    audit_failures: AtomicU64,
}

impl Engine {
    /// Creates an engine over `store` using the system clock.
    ///
    /// Seeds the initial `NOMINATION` phase if the database has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the phase cannot
    /// be seeded.
    pub fn new(store: Store, config: &NisitConfig) -> Result<Self, EngineError> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Creates an engine with an injected clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the phase cannot
    /// be seeded.
    pub fn with_clock(
        store: Store,
        config: &NisitConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        let tally_policy = TallyPolicy::new(config.voting.pass_threshold_percent)?;
        let engine = Self {
            store,
            email_policy: config.email_policy(),
            tally_policy,
            clock,
            audit_failures: AtomicU64::new(0),
        };
        engine.seed_initial_phase()?;
        Ok(engine)
    }

    /// Opens the database named by `config` and creates an engine over it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the engine
    /// cannot be created.
    pub fn open(config: &NisitConfig) -> Result<Self, EngineError> {
        let store = Store::open(&config.database.path, config.database.busy_timeout())?;
        Self::new(store, config)
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// The pass rule applied when tallying.
    #[must_use]
    pub const fn tally_policy(&self) -> TallyPolicy {
        self.tally_policy
    }

    /// Number of audit entries that could not be written since start-up.
    #[must_use]
    pub fn audit_failures(&self) -> u64 {
        self.audit_failures.load(Ordering::Relaxed)
    }

    /// The most recent `limit` audit entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::StorageFailure`] if the query fails.
    pub fn recent_audit(&self, limit: u32) -> Result<Vec<AuditEntry>, EngineError> {
        Ok(self
            .store
            .with_connection(|conn| store::audit::recent(conn, limit))?)
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn seed_initial_phase(&self) -> Result<(), EngineError> {
        self.store.transaction(|tx| -> Result<(), EngineError> {
            if store::phases::active(tx)?.is_some() {
                return Ok(());
            }
            let at = self.now();
            let record = store::phases::activate(tx, Phase::Nomination, None, at)?;
            self.record_audit(
                tx,
                &NewAuditEntry::new(AuditAction::PhaseChange, ResourceType::Phase, record.id)
                    .new_values(serde_json::json!({ "phase": record.phase })),
                at,
            );
            info!(phase = %record.phase, "seeded initial phase");
            Ok(())
        })
    }

    /// Writes `entry` behind a savepoint. Never fails the caller.
    fn record_audit(
        &self,
        tx: &mut Transaction<'_>,
        entry: &NewAuditEntry,
        at: DateTime<Utc>,
    ) -> Option<AuditId> {
        let outcome = tx
            .savepoint()
            .map_err(StoreError::from)
            .and_then(|savepoint| -> Result<AuditId, StoreError> {
                let id = store::audit::insert(&savepoint, entry, at)?;
                savepoint.commit()?;
                Ok(id)
            });
        match outcome {
            Ok(id) => Some(id),
            Err(err) => {
                let failures = self.audit_failures.fetch_add(1, Ordering::Relaxed) + 1;
                error!(
                    action = %entry.action,
                    resource_type = %entry.resource_type,
                    resource_id = %entry.resource_id,
                    failures,
                    error = %err,
                    "failed to write audit entry; business change kept"
                );
                None
            },
        }
    }
}

/// Logs a refusal at the engine boundary and passes the result through.
fn log_refusal<T>(operation: &str, result: Result<T, EngineError>) -> Result<T, EngineError> {
    if let Err(err) = &result {
        if err.is_storage_failure() {
            error!(operation, error = %err, "operation failed");
        } else {
            warn!(operation, kind = err.kind(), error = %err, "operation refused");
        }
    }
    result
}
