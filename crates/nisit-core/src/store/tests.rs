//! Tests for the storage layer.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use super::*;
use crate::audit::{AuditAction, NewAuditEntry, ResourceType};
use crate::phase::Phase;
use crate::ticket::{AwardCategory, NewTicket, Semester, TicketStatus};
use crate::user::NewUser;
use crate::vote::VoteChoice;

fn temp_store() -> (Store, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("award.db"), Duration::from_secs(5)).unwrap();
    (store, dir)
}

fn at(minute: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 3, 9, minute, 0).unwrap()
}

fn new_ticket() -> NewTicket {
    NewTicket {
        category: AwardCategory::SocialService,
        academic_year: 2568,
        semester: Semester::Second,
        form_data: serde_json::json!({"activities": ["blood drive"]}),
    }
}

#[test]
fn file_store_uses_wal_and_nested_dirs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/deeper/award.db");
    let store = Store::open(&path, Duration::from_millis(500)).unwrap();
    assert!(store.verify_wal_mode().unwrap());
    assert_eq!(store.path(), Some(path.as_path()));
}

#[test]
fn schema_is_idempotent() {
    let (store, dir) = temp_store();
    drop(store);
    let reopened = Store::open(dir.path().join("award.db"), Duration::from_secs(1)).unwrap();
    let roles: i64 = reopened
        .with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM roles", [], |row| row.get(0))
                .map_err(StoreError::from)
        })
        .unwrap();
    assert_eq!(roles, 7);
}

#[test]
fn failed_transaction_rolls_back() {
    let store = Store::in_memory().unwrap();
    let result: Result<(), StoreError> = store.transaction(|tx| {
        users::insert(tx, &NewUser::new("a@ku.th", "A"), at(0))?;
        // Duplicate email violates the unique constraint.
        users::insert(tx, &NewUser::new("a@ku.th", "A again"), at(1))?;
        Ok(())
    });
    assert!(matches!(result, Err(StoreError::Database(_))));

    let count = store
        .with_connection(|conn| Ok::<_, StoreError>(users::list(conn)?.len()))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn only_one_phase_row_may_be_active() {
    let store = Store::in_memory().unwrap();
    store
        .transaction(|tx| {
            phases::activate(tx, Phase::Nomination, None, at(0))?;
            phases::activate(tx, Phase::ReviewEnd, None, at(1))?;
            Ok::<_, StoreError>(())
        })
        .unwrap();

    let err = store
        .with_connection(|conn| {
            conn.execute(
                "INSERT INTO phases (phase, activated_at, is_active) VALUES ('VOTING', ?1, 1)",
                [at(2)],
            )
            .map_err(StoreError::from)
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));

    let (active, history) = store
        .with_connection(|conn| {
            Ok::<_, StoreError>((phases::active(conn)?, phases::history(conn)?))
        })
        .unwrap();
    assert_eq!(active.unwrap().phase, Phase::ReviewEnd);
    assert_eq!(history.len(), 2);
    assert!(!history[0].is_active);
}

#[test]
fn audit_log_is_append_only() {
    let store = Store::in_memory().unwrap();
    let id = store
        .with_connection(|conn| {
            audit::insert(
                conn,
                &NewAuditEntry::new(AuditAction::PhaseChange, ResourceType::Phase, 1)
                    .new_values(serde_json::json!({"phase": "NOMINATION"})),
                at(0),
            )
        })
        .unwrap();

    for sql in [
        "UPDATE audit_logs SET action = 'ticket_sign' WHERE id = ?1",
        "DELETE FROM audit_logs WHERE id = ?1",
    ] {
        let result = store.with_connection(|conn| {
            conn.execute(sql, [id]).map_err(StoreError::from)
        });
        assert!(result.is_err(), "{sql} should be refused");
    }

    let entries = store
        .with_connection(|conn| audit::for_resource(conn, ResourceType::Phase, "1"))
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, id);
    assert_eq!(entries[0].prior_values, None);
    assert_eq!(entries[0].new_values["phase"], "NOMINATION");
}

#[test]
fn recent_audit_keeps_the_newest_in_insertion_order() {
    let store = Store::in_memory().unwrap();
    let ids: Vec<_> = (0..3_u32)
        .map(|minute| {
            store
                .with_connection(|conn| {
                    audit::insert(
                        conn,
                        &NewAuditEntry::new(AuditAction::PhaseChange, ResourceType::Phase, 1),
                        at(minute),
                    )
                })
                .unwrap()
        })
        .collect();

    let recent = store.with_connection(|conn| audit::recent(conn, 2)).unwrap();
    let recent_ids: Vec<_> = recent.iter().map(|entry| entry.id).collect();
    assert_eq!(recent_ids, vec![ids[1], ids[2]]);
    assert!(recent[0].recorded_at < recent[1].recorded_at);
}

#[test]
fn status_update_is_guarded_by_expected_status() {
    let store = Store::in_memory().unwrap();
    store
        .with_connection(|conn| {
            let owner = users::insert(conn, &NewUser::new("s@ku.th", "S"), at(0))?;
            let id = tickets::insert(conn, owner, &new_ticket(), at(0))?;
            assert!(tickets::update_status(
                conn,
                id,
                TicketStatus::Draft,
                TicketStatus::SubmittedStaff,
                at(1)
            )?);
            // A second writer still believing the ticket is a draft loses.
            assert!(!tickets::update_status(
                conn,
                id,
                TicketStatus::Draft,
                TicketStatus::SubmittedStaff,
                at(2)
            )?);
            let ticket = tickets::find(conn, id)?.unwrap();
            assert_eq!(ticket.status, TicketStatus::SubmittedStaff);
            assert_eq!(ticket.updated_at, at(1));
            assert_eq!(ticket.form_data["activities"][0], "blood drive");
            Ok::<_, StoreError>(())
        })
        .unwrap();
}

#[test]
fn vote_upsert_keeps_one_row() {
    let store = Store::in_memory().unwrap();
    store
        .with_connection(|conn| {
            let owner = users::insert(conn, &NewUser::new("s@ku.th", "S"), at(0))?;
            let member = users::insert(conn, &NewUser::new("c@ku.th", "C"), at(0))?;
            let ticket = tickets::insert(conn, owner, &new_ticket(), at(0))?;

            let first = votes::upsert(conn, ticket, member, VoteChoice::Reject, at(1))?;
            let second = votes::upsert(conn, ticket, member, VoteChoice::Approve, at(2))?;
            assert_eq!(first.id, second.id);
            assert_eq!(second.choice, VoteChoice::Approve);
            assert_eq!(second.cast_at, at(2));

            let all = votes::for_ticket(conn, ticket)?;
            assert_eq!(all, vec![second]);
            Ok::<_, StoreError>(())
        })
        .unwrap();
}
