//! Award applications (tickets) and their lifecycle.
//!
//! # State Machine
//!
//! | Current | Actor | Action | Next |
//! |---|---|---|---|
//! | `draft` | owning STUDENT | submit | `submitted_staff` |
//! | `submitted_staff` | STAFF | accept / reject | `submitted_subdean` / `rejected` |
//! | `submitted_subdean` | SUB_DEAN | accept / reject | `submitted_dean` / `rejected` |
//! | `submitted_dean` | DEAN | accept / reject | `admin_review` / `rejected` |
//! | `admin_review` | ADMIN | verify / reject | `nominated` / `rejected` |
//! | `nominated` | voting engine | tally pass / fail | `approved` / `rejected` |
//! | `approved` | COMMITTEE_PRESIDENT | sign | `announced` |
//!
//! `rejected` and `announced` are terminal. The table itself, with the phases
//! each row is legal in, lives in [`transition::TRANSITIONS`].

pub mod transition;


use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::AuditAction;
use crate::error::{EngineError, ParseValueError};
use crate::ids::{TicketId, UserId};

pub use transition::{
    ActorRequirement, TRANSITIONS, TransitionActor, TransitionRule, plan_edit, plan_transition,
    rule_for,
};

/// Lifecycle status of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Being prepared by the student.
    Draft,
    /// Awaiting staff review.
    SubmittedStaff,
    /// Awaiting sub-dean review.
    SubmittedSubdean,
    /// Awaiting dean review.
    SubmittedDean,
    /// Awaiting administrator verification.
    AdminReview,
    /// On the committee ballot.
    Nominated,
    /// Passed the committee vote; awaiting signature.
    Approved,
    /// Rejected at an approval stage or by the vote. Terminal.
    Rejected,
    /// Signed and announced. Terminal.
    Announced,
}

impl TicketStatus {
    /// All statuses in chain order (`rejected` sits beside `approved`).
    pub const ALL: [Self; 9] = [
        Self::Draft,
        Self::SubmittedStaff,
        Self::SubmittedSubdean,
        Self::SubmittedDean,
        Self::AdminReview,
        Self::Nominated,
        Self::Approved,
        Self::Rejected,
        Self::Announced,
    ];

    /// Statuses from which a human reviewer may `reject`.
    pub const APPROVAL_STAGES: [Self; 4] = [
        Self::SubmittedStaff,
        Self::SubmittedSubdean,
        Self::SubmittedDean,
        Self::AdminReview,
    ];

    /// Returns the stored status name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::SubmittedStaff => "submitted_staff",
            Self::SubmittedSubdean => "submitted_subdean",
            Self::SubmittedDean => "submitted_dean",
            Self::AdminReview => "admin_review",
            Self::Nominated => "nominated",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Announced => "announced",
        }
    }

    /// Returns `true` for `rejected` and `announced`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Announced)
    }

    /// Returns `true` for the four human approval stages.
    #[must_use]
    pub const fn is_approval_stage(&self) -> bool {
        matches!(
            self,
            Self::SubmittedStaff | Self::SubmittedSubdean | Self::SubmittedDean | Self::AdminReview
        )
    }

    /// Position along the main chain; `approved` and `rejected` share one.
    #[must_use]
    pub const fn chain_position(&self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::SubmittedStaff => 1,
            Self::SubmittedSubdean => 2,
            Self::SubmittedDean => 3,
            Self::AdminReview => 4,
            Self::Nominated => 5,
            Self::Approved | Self::Rejected => 6,
            Self::Announced => 7,
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| ParseValueError::new("ticket status", s))
    }
}

/// An action that moves a ticket along its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketAction {
    /// Student hands the draft in.
    Submit,
    /// Reviewer passes the ticket to the next stage.
    Accept,
    /// Reviewer or administrator rejects the ticket.
    Reject,
    /// Administrator nominates the ticket for voting.
    Verify,
    /// The vote passed.
    TallyPass,
    /// The vote failed.
    TallyFail,
    /// Committee president signs the announcement.
    Sign,
}

impl TicketAction {
    /// All actions.
    pub const ALL: [Self; 7] = [
        Self::Submit,
        Self::Accept,
        Self::Reject,
        Self::Verify,
        Self::TallyPass,
        Self::TallyFail,
        Self::Sign,
    ];

    /// Returns the action name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Verify => "verify",
            Self::TallyPass => "tally_pass",
            Self::TallyFail => "tally_fail",
            Self::Sign => "sign",
        }
    }

    /// The audit action recorded when this action commits.
    #[must_use]
    pub const fn audit_action(&self) -> AuditAction {
        match self {
            Self::Submit => AuditAction::TicketSubmit,
            Self::Accept => AuditAction::TicketAccept,
            Self::Reject => AuditAction::TicketReject,
            Self::Verify => AuditAction::TicketVerify,
            Self::TallyPass => AuditAction::TicketTallyPass,
            Self::TallyFail => AuditAction::TicketTallyFail,
            Self::Sign => AuditAction::TicketSign,
        }
    }
}

impl fmt::Display for TicketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketAction {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == needle)
            .ok_or_else(|| ParseValueError::new("ticket action", s))
    }
}

/// Award category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardCategory {
    /// Academic excellence.
    Academic,
    /// Sport.
    Sport,
    /// Arts and culture.
    ArtsCulture,
    /// Morality and ethics.
    MoralEthics,
    /// Social service.
    SocialService,
    /// Innovation.
    Innovation,
    /// Entrepreneurship.
    Entrepreneurship,
}

impl AwardCategory {
    /// All categories.
    pub const ALL: [Self; 7] = [
        Self::Academic,
        Self::Sport,
        Self::ArtsCulture,
        Self::MoralEthics,
        Self::SocialService,
        Self::Innovation,
        Self::Entrepreneurship,
    ];

    /// Returns the stored category name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Academic => "academic",
            Self::Sport => "sport",
            Self::ArtsCulture => "arts_culture",
            Self::MoralEthics => "moral_ethics",
            Self::SocialService => "social_service",
            Self::Innovation => "innovation",
            Self::Entrepreneurship => "entrepreneurship",
        }
    }

    /// Thai display label used on certificates.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Academic => "นิสิตดีเด่นด้านวิชาการ",
            Self::Sport => "นิสิตดีเด่นด้านกีฬา",
            Self::ArtsCulture => "นิสิตดีเด่นด้านศิลปวัฒนธรรม",
            Self::MoralEthics => "นิสิตดีเด่นด้านคุณธรรมจริยธรรม",
            Self::SocialService => "นิสิตดีเด่นด้านบริการสังคม",
            Self::Innovation => "นิสิตดีเด่นด้านนวัตกรรม",
            Self::Entrepreneurship => "นิสิตดีเด่นด้านผู้ประกอบการ",
        }
    }
}

impl fmt::Display for AwardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AwardCategory {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| ParseValueError::new("award category", s))
    }
}

/// Academic semester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Semester {
    /// First semester.
    First,
    /// Second semester.
    Second,
    /// Summer session.
    Summer,
}

impl Semester {
    /// Returns the stored semester name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Second => "second",
            Self::Summer => "summer",
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Semester {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "first" | "1" => Ok(Self::First),
            "second" | "2" => Ok(Self::Second),
            "summer" | "3" => Ok(Self::Summer),
            other => Err(ParseValueError::new("semester", other)),
        }
    }
}

/// An award application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Row id.
    pub id: TicketId,
    /// The applying student.
    pub owner_id: UserId,
    /// Award category.
    pub category: AwardCategory,
    /// Academic year (CE or Buddhist era).
    pub academic_year: u16,
    /// Semester.
    pub semester: Semester,
    /// Free-form application form. Evidence attachments appear here as
    /// opaque storage references.
    pub form_data: serde_json::Value,
    /// Current status.
    pub status: TicketStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last status or content change.
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Snapshot written to the audit log.
    #[must_use]
    pub fn audit_snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status,
            "category": self.category,
            "academic_year": self.academic_year,
            "semester": self.semester,
            "form_data": self.form_data,
        })
    }
}

/// Input for a new draft ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    /// Award category.
    pub category: AwardCategory,
    /// Academic year.
    pub academic_year: u16,
    /// Semester.
    pub semester: Semester,
    /// Application form.
    #[serde(default = "empty_form")]
    pub form_data: serde_json::Value,
}

fn empty_form() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Accepted academic years: CE or Buddhist-era four-digit years.
pub const ACADEMIC_YEAR_RANGE: std::ops::RangeInclusive<u16> = 2000..=2700;

impl NewTicket {
    /// Checks field ranges.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for an out-of-range academic year
    /// or a non-object form.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !ACADEMIC_YEAR_RANGE.contains(&self.academic_year) {
            return Err(EngineError::validation(
                "academic_year",
                format!(
                    "{} is outside {}..={}",
                    self.academic_year,
                    ACADEMIC_YEAR_RANGE.start(),
                    ACADEMIC_YEAR_RANGE.end()
                ),
            ));
        }
        validate_form(&self.form_data)
    }
}

/// Content edit. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketContentUpdate {
    /// Replacement form data.
    #[serde(default)]
    pub form_data: Option<serde_json::Value>,
    /// Replacement category.
    #[serde(default)]
    pub category: Option<AwardCategory>,
}

impl TicketContentUpdate {
    /// Returns `true` if the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.form_data.is_none() && self.category.is_none()
    }
}

pub(crate) fn validate_form(form: &serde_json::Value) -> Result<(), EngineError> {
    if form.is_object() {
        Ok(())
    } else {
        Err(EngineError::validation("form_data", "must be a JSON object"))
    }
}

/// Ticket counts for one student's dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSummary {
    /// All tickets.
    pub total: u32,
    /// Drafts and tickets still in review or voting.
    pub in_progress: u32,
    /// Passed the vote, awaiting signature.
    pub approved: u32,
    /// Rejected anywhere along the chain.
    pub rejected: u32,
    /// Signed and announced.
    pub announced: u32,
}

impl StudentSummary {
    /// Counts `tickets` by status.
    #[must_use]
    pub fn from_tickets(tickets: &[Ticket]) -> Self {
        tickets.iter().fold(Self::default(), |mut acc, t| {
            acc.total += 1;
            match t.status {
                TicketStatus::Approved => acc.approved += 1,
                TicketStatus::Rejected => acc.rejected += 1,
                TicketStatus::Announced => acc.announced += 1,
                _ => acc.in_progress += 1,
            }
            acc
        })
    }
}
