//! RFP and Proposal lifecycle: canonical status enums, the transition
//! tables, and the guards evaluated before every status change.
//!
//! Every status mutation in the system is validated here first. The store
//! layer then applies the change as a compare-and-swap on the old status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Entity name used in RFP errors.
pub const RFP_ENTITY: &str = "Rfp";

/// Entity name used in Proposal errors.
pub const PROPOSAL_ENTITY: &str = "Proposal";

// ---------------------------------------------------------------------------
// RFP status
// ---------------------------------------------------------------------------

/// RFP lifecycle status. Forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RfpStatus {
    Draft,
    Sent,
    Closed,
    Awarded,
}

impl RfpStatus {
    pub const ALL: [RfpStatus; 4] = [Self::Draft, Self::Sent, Self::Closed, Self::Awarded];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Sent => "SENT",
            Self::Closed => "CLOSED",
            Self::Awarded => "AWARDED",
        }
    }

    /// Returns the statuses this status may transition to.
    ///
    /// - `DRAFT`   -> `SENT`
    /// - `SENT`    -> `CLOSED`, `AWARDED`
    /// - `CLOSED`  -> `AWARDED`
    /// - `AWARDED` -> (terminal)
    pub fn allowed_next(self) -> &'static [RfpStatus] {
        match self {
            Self::Draft => &[Self::Sent],
            Self::Sent => &[Self::Closed, Self::Awarded],
            Self::Closed => &[Self::Awarded],
            Self::Awarded => &[],
        }
    }

    pub fn can_transition_to(self, next: RfpStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Proposals may only be accepted while the RFP is open for award.
    pub fn is_awardable(self) -> bool {
        self.can_transition_to(Self::Awarded)
    }
}

impl fmt::Display for RfpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RfpStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                CoreError::InvalidInput(format!(
                    "Invalid RFP status '{s}'. Must be one of: DRAFT, SENT, CLOSED, AWARDED"
                ))
            })
    }
}

impl TryFrom<String> for RfpStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Proposal status
// ---------------------------------------------------------------------------

/// Proposal lifecycle status. Forward-only; `DELETED` is a terminal removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    Received,
    Parsed,
    Evaluated,
    Accepted,
    Deleted,
}

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 5] = [
        Self::Received,
        Self::Parsed,
        Self::Evaluated,
        Self::Accepted,
        Self::Deleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Parsed => "PARSED",
            Self::Evaluated => "EVALUATED",
            Self::Accepted => "ACCEPTED",
            Self::Deleted => "DELETED",
        }
    }

    /// Returns the statuses this status may transition to.
    ///
    /// - `RECEIVED`  -> `PARSED`, `DELETED`
    /// - `PARSED`    -> `EVALUATED`, `DELETED`
    /// - `EVALUATED` -> `ACCEPTED`, `DELETED`
    /// - `ACCEPTED`, `DELETED` -> (terminal)
    pub fn allowed_next(self) -> &'static [ProposalStatus] {
        match self {
            Self::Received => &[Self::Parsed, Self::Deleted],
            Self::Parsed => &[Self::Evaluated, Self::Deleted],
            Self::Evaluated => &[Self::Accepted, Self::Deleted],
            Self::Accepted | Self::Deleted => &[],
        }
    }

    pub fn can_transition_to(self, next: ProposalStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Whether this proposal can back an award (`EVALUATED` or `ACCEPTED`).
    pub fn supports_award(self) -> bool {
        matches!(self, Self::Evaluated | Self::Accepted)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                CoreError::InvalidInput(format!(
                    "Invalid proposal status '{s}'. Must be one of: \
                     RECEIVED, PARSED, EVALUATED, ACCEPTED, DELETED"
                ))
            })
    }
}

impl TryFrom<String> for ProposalStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Table validation
// ---------------------------------------------------------------------------

fn illegal(
    entity: &'static str,
    id: DbId,
    from: impl fmt::Display,
    to: impl fmt::Display,
    reason: impl Into<String>,
) -> CoreError {
    CoreError::IllegalTransition {
        entity,
        id,
        from: from.to_string(),
        to: to.to_string(),
        reason: reason.into(),
    }
}

/// Validate an RFP status change against the transition table only.
pub fn validate_rfp_transition(id: DbId, from: RfpStatus, to: RfpStatus) -> Result<(), CoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(illegal(
            RFP_ENTITY,
            id,
            from,
            to,
            format!("allowed from {from}: {:?}", from.allowed_next()),
        ))
    }
}

/// Validate a proposal status change against the transition table only.
pub fn validate_proposal_transition(
    id: DbId,
    from: ProposalStatus,
    to: ProposalStatus,
) -> Result<(), CoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(illegal(
            PROPOSAL_ENTITY,
            id,
            from,
            to,
            format!("allowed from {from}: {:?}", from.allowed_next()),
        ))
    }
}

// ---------------------------------------------------------------------------
// RFP guards
// ---------------------------------------------------------------------------

/// DRAFT -> SENT requires a non-empty vendor selection.
pub fn guard_rfp_dispatch(
    id: DbId,
    from: RfpStatus,
    selected_vendors: &[DbId],
) -> Result<(), CoreError> {
    validate_rfp_transition(id, from, RfpStatus::Sent)?;
    if selected_vendors.is_empty() {
        return Err(CoreError::InvalidInput(format!(
            "RFP {id} cannot be sent without at least one selected vendor"
        )));
    }
    Ok(())
}

/// SENT -> CLOSED. Manual closes carry no guard; the deadline sweep passes
/// `require_deadline_passed` and only closes RFPs whose deadline elapsed.
pub fn guard_rfp_close(
    id: DbId,
    from: RfpStatus,
    deadline: Option<Timestamp>,
    now: Timestamp,
    require_deadline_passed: bool,
) -> Result<(), CoreError> {
    validate_rfp_transition(id, from, RfpStatus::Closed)?;
    if require_deadline_passed && !deadline_passed(deadline, now) {
        return Err(illegal(
            RFP_ENTITY,
            id,
            from,
            RfpStatus::Closed,
            "deadline has not passed",
        ));
    }
    Ok(())
}

/// SENT/CLOSED -> AWARDED requires the vendor to be among the selected
/// vendors and to hold an EVALUATED or ACCEPTED proposal for this RFP.
pub fn guard_rfp_award(
    id: DbId,
    from: RfpStatus,
    vendor_id: DbId,
    selected_vendors: &[DbId],
    vendor_proposal: Option<ProposalStatus>,
) -> Result<(), CoreError> {
    validate_rfp_transition(id, from, RfpStatus::Awarded)?;
    if !selected_vendors.contains(&vendor_id) {
        return Err(illegal(
            RFP_ENTITY,
            id,
            from,
            RfpStatus::Awarded,
            format!("vendor {vendor_id} was not selected for this RFP"),
        ));
    }
    match vendor_proposal {
        Some(status) if status.supports_award() => Ok(()),
        Some(status) => Err(illegal(
            RFP_ENTITY,
            id,
            from,
            RfpStatus::Awarded,
            format!("vendor {vendor_id} proposal is {status}, expected EVALUATED or ACCEPTED"),
        )),
        None => Err(illegal(
            RFP_ENTITY,
            id,
            from,
            RfpStatus::Awarded,
            format!("vendor {vendor_id} has no proposal for this RFP"),
        )),
    }
}

/// Whether a deadline is set and lies at or before `now`.
pub fn deadline_passed(deadline: Option<Timestamp>, now: Timestamp) -> bool {
    deadline.is_some_and(|d| d <= now)
}

/// Sorted, duplicate-free union of the current and newly selected vendors.
pub fn union_vendors(existing: &[DbId], added: &[DbId]) -> Vec<DbId> {
    let mut merged: Vec<DbId> = existing.iter().chain(added).copied().collect();
    merged.sort_unstable();
    merged.dedup();
    merged
}

// ---------------------------------------------------------------------------
// Proposal guards
// ---------------------------------------------------------------------------

/// RECEIVED -> PARSED requires extraction without fatal issues.
pub fn guard_proposal_parse(
    id: DbId,
    from: ProposalStatus,
    has_fatal_issues: bool,
) -> Result<(), CoreError> {
    validate_proposal_transition(id, from, ProposalStatus::Parsed)?;
    if has_fatal_issues {
        return Err(illegal(
            PROPOSAL_ENTITY,
            id,
            from,
            ProposalStatus::Parsed,
            "extraction reported fatal issues",
        ));
    }
    Ok(())
}

/// PARSED -> EVALUATED requires a score in `0..=100`.
pub fn guard_proposal_evaluate(
    id: DbId,
    from: ProposalStatus,
    score: Option<f64>,
) -> Result<(), CoreError> {
    validate_proposal_transition(id, from, ProposalStatus::Evaluated)?;
    match score {
        Some(s) if (0.0..=100.0).contains(&s) => Ok(()),
        Some(s) => Err(CoreError::Internal(format!(
            "score {s} for proposal {id} is outside 0..=100"
        ))),
        None => Err(illegal(
            PROPOSAL_ENTITY,
            id,
            from,
            ProposalStatus::Evaluated,
            "no score was produced",
        )),
    }
}

/// EVALUATED -> ACCEPTED; at most one accepted proposal per RFP.
pub fn guard_proposal_accept(
    id: DbId,
    from: ProposalStatus,
    rfp_has_accepted: bool,
) -> Result<(), CoreError> {
    validate_proposal_transition(id, from, ProposalStatus::Accepted)?;
    if rfp_has_accepted {
        return Err(illegal(
            PROPOSAL_ENTITY,
            id,
            from,
            ProposalStatus::Accepted,
            "another proposal for this RFP is already accepted",
        ));
    }
    Ok(())
}

/// Any non-ACCEPTED, non-DELETED status -> DELETED.
pub fn guard_proposal_delete(id: DbId, from: ProposalStatus) -> Result<(), CoreError> {
    validate_proposal_transition(id, from, ProposalStatus::Deleted)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
