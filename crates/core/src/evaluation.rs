//! Evaluation Engine: scores and ranks proposals against an RFP's criteria.
//!
//! Pure with respect to storage. Persisting scores is a separate commit
//! performed through the lifecycle by the caller.
//!
//! Policy notes:
//! - Only the most recently received proposal per vendor is ranked (ties go
//!   to the higher id); older ones are reported in `superseded`.
//! - A criterion the proposal has no value for contributes an explicit zero
//!   (outcome [`Outcome::Missing`]) rather than being dropped from the sum.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::extraction::ProposalFields;
use crate::lifecycle::ProposalStatus;
use crate::requirements::{Comparator, Criterion, Measure, Requirements};
use crate::types::{DbId, Timestamp};

/// The RFP being evaluated.
#[derive(Debug, Clone)]
pub struct EvaluationSubject {
    pub rfp_id: DbId,
    pub budget: Option<f64>,
    pub requirements: Requirements,
}

/// A proposal as seen by the engine.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub proposal_id: DbId,
    pub rfp_id: DbId,
    pub vendor_id: DbId,
    pub status: ProposalStatus,
    pub received_at: Timestamp,
    pub fields: Option<ProposalFields>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Value present and scored relative to the other candidates.
    Scored,
    /// No value extracted; contributes zero.
    Missing,
    /// Value breaks the criterion's ceiling or minimum; contributes zero.
    OutOfBounds,
}

/// Per-criterion breakdown entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: String,
    pub weight: f64,
    pub comparator: Comparator,
    /// Sub-score in `[0, 1]`.
    pub sub_score: f64,
    pub outcome: Outcome,
    pub value: Option<String>,
}

/// The typed evaluation document stored on a proposal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalEvaluation {
    pub criteria: Vec<CriterionScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedProposal {
    pub rank: usize,
    pub proposal_id: DbId,
    pub vendor_id: DbId,
    pub status: ProposalStatus,
    pub received_at: Timestamp,
    /// Normalized score in `[0, 100]`.
    pub score: f64,
    pub evaluation: ProposalEvaluation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub proposal_id: DbId,
    pub vendor_id: DbId,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub rfp_id: DbId,
    pub ranking: Vec<RankedProposal>,
    pub superseded: Vec<DbId>,
    pub summary: String,
    pub recommendation: Option<Recommendation>,
}

/// Score and rank `candidates` against `subject`.
pub fn evaluate(
    subject: &EvaluationSubject,
    candidates: &[Candidate],
) -> Result<ComparisonResult, CoreError> {
    if let Some(stray) = candidates.iter().find(|c| c.rfp_id != subject.rfp_id) {
        return Err(CoreError::EvaluationPrecondition(format!(
            "proposal {} belongs to RFP {}, not RFP {}",
            stray.proposal_id, stray.rfp_id, subject.rfp_id
        )));
    }
    if !subject.requirements.is_scorable() {
        return Err(CoreError::EvaluationPrecondition(format!(
            "RFP {} has no criteria to score against",
            subject.rfp_id
        )));
    }

    let (authoritative, superseded) = select_authoritative(candidates);

    let mut scored: Vec<(&Candidate, &ProposalFields)> = Vec::with_capacity(authoritative.len());
    for c in authoritative {
        match &c.fields {
            Some(fields) => scored.push((c, fields)),
            None => {
                return Err(CoreError::EvaluationPrecondition(format!(
                    "proposal {} has not been parsed (status {})",
                    c.proposal_id, c.status
                )))
            }
        }
    }

    let fields: Vec<&ProposalFields> = scored.iter().map(|(_, f)| *f).collect();
    let mut breakdowns: Vec<Vec<CriterionScore>> = vec![Vec::new(); scored.len()];
    for criterion in &subject.requirements.criteria {
        let column = score_criterion(criterion, subject.budget, &fields);
        for (breakdown, entry) in breakdowns.iter_mut().zip(column) {
            breakdown.push(entry);
        }
    }

    let mut ranking: Vec<RankedProposal> = scored
        .iter()
        .zip(breakdowns)
        .map(|((c, _), criteria)| RankedProposal {
            rank: 0,
            proposal_id: c.proposal_id,
            vendor_id: c.vendor_id,
            status: c.status,
            received_at: c.received_at,
            score: weighted_score(&criteria),
            evaluation: ProposalEvaluation { criteria },
        })
        .collect();

    ranking.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.received_at.cmp(&b.received_at))
            .then(a.proposal_id.cmp(&b.proposal_id))
    });
    for (i, entry) in ranking.iter_mut().enumerate() {
        entry.rank = i + 1;
    }

    let recommendation = ranking.first().map(|top| Recommendation {
        proposal_id: top.proposal_id,
        vendor_id: top.vendor_id,
        score: top.score,
    });
    let summary = summarize(subject, &ranking, superseded.len());

    Ok(ComparisonResult {
        rfp_id: subject.rfp_id,
        ranking,
        superseded,
        summary,
        recommendation,
    })
}

/// Drop DELETED proposals and keep the latest per vendor.
fn select_authoritative(candidates: &[Candidate]) -> (Vec<&Candidate>, Vec<DbId>) {
    let mut latest: BTreeMap<DbId, &Candidate> = BTreeMap::new();
    for c in candidates.iter().filter(|c| c.status != ProposalStatus::Deleted) {
        latest
            .entry(c.vendor_id)
            .and_modify(|cur| {
                if (c.received_at, c.proposal_id) > (cur.received_at, cur.proposal_id) {
                    *cur = c;
                }
            })
            .or_insert(c);
    }
    let kept: HashSet<DbId> = latest.values().map(|c| c.proposal_id).collect();
    let mut superseded: Vec<DbId> = candidates
        .iter()
        .filter(|c| c.status != ProposalStatus::Deleted && !kept.contains(&c.proposal_id))
        .map(|c| c.proposal_id)
        .collect();
    superseded.sort_unstable();
    (latest.into_values().collect(), superseded)
}

fn weighted_score(criteria: &[CriterionScore]) -> f64 {
    let total_weight: f64 = criteria.iter().map(|c| c.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = criteria.iter().map(|c| c.weight * c.sub_score).sum();
    (100.0 * weighted / total_weight).clamp(0.0, 100.0)
}

// ---------------------------------------------------------------------------
// Per-criterion scoring
// ---------------------------------------------------------------------------

fn score_criterion(
    criterion: &Criterion,
    budget: Option<f64>,
    fields: &[&ProposalFields],
) -> Vec<CriterionScore> {
    let entry = |sub_score: f64, outcome: Outcome, value: Option<String>| CriterionScore {
        criterion: criterion.criterion.clone(),
        weight: criterion.effective_weight(),
        comparator: criterion.measure.comparator(),
        sub_score,
        outcome,
        value,
    };

    match &criterion.measure {
        Measure::Price { ceiling } => {
            let values: Vec<Option<f64>> = fields.iter().map(|f| f.price).collect();
            numeric_column(&values, Direction::Lower(ceiling.or(budget)), entry)
        }
        Measure::DeliveryTime { max_days } => {
            let values: Vec<Option<f64>> = fields.iter().map(|f| f.delivery_days).collect();
            numeric_column(&values, Direction::Lower(*max_days), entry)
        }
        Measure::Warranty { min_months } => {
            let values: Vec<Option<f64>> = fields.iter().map(|f| f.warranty_months).collect();
            numeric_column(&values, Direction::Higher(*min_months), entry)
        }
        Measure::PaymentTerms { expected } => fields
            .iter()
            .map(|f| match_entry(f.payment_terms.as_deref(), expected, entry))
            .collect(),
        Measure::Specification { key, expected } => fields
            .iter()
            .map(|f| {
                let value = f
                    .specifications
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v.as_str());
                match_entry(value, expected, entry)
            })
            .collect(),
    }
}

#[derive(Clone, Copy)]
enum Direction {
    /// Lower is better; the bound is a ceiling.
    Lower(Option<f64>),
    /// Higher is better; the bound is a minimum.
    Higher(Option<f64>),
}

impl Direction {
    fn within_bound(self, v: f64) -> bool {
        match self {
            Self::Lower(Some(ceiling)) => v <= ceiling,
            Self::Higher(Some(minimum)) => v >= minimum,
            _ => true,
        }
    }
}

/// Min-max normalize the compliant values of one column.
fn numeric_column<F>(values: &[Option<f64>], direction: Direction, entry: F) -> Vec<CriterionScore>
where
    F: Fn(f64, Outcome, Option<String>) -> CriterionScore,
{
    let compliant: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| direction.within_bound(*v))
        .collect();
    let lo = compliant.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = compliant.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    values
        .iter()
        .map(|value| match value {
            None => entry(0.0, Outcome::Missing, None),
            Some(v) if !direction.within_bound(*v) => {
                entry(0.0, Outcome::OutOfBounds, Some(v.to_string()))
            }
            Some(v) => {
                let sub = if hi - lo <= f64::EPSILON {
                    1.0
                } else {
                    match direction {
                        Direction::Lower(_) => (hi - v) / (hi - lo),
                        Direction::Higher(_) => (v - lo) / (hi - lo),
                    }
                };
                entry(sub.clamp(0.0, 1.0), Outcome::Scored, Some(v.to_string()))
            }
        })
        .collect()
}

fn match_entry<F>(value: Option<&str>, expected: &str, entry: F) -> CriterionScore
where
    F: Fn(f64, Outcome, Option<String>) -> CriterionScore,
{
    match value {
        None => entry(0.0, Outcome::Missing, None),
        Some(v) => entry(match_score(v, expected), Outcome::Scored, Some(v.to_string())),
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// 1.0 on a normalized exact match, otherwise token Jaccard overlap.
pub fn match_score(value: &str, expected: &str) -> f64 {
    let a = tokens(value);
    let b = tokens(expected);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let a: HashSet<&String> = a.iter().collect();
    let b: HashSet<&String> = b.iter().collect();
    let shared = a.intersection(&b).count() as f64;
    let union = a.union(&b).count() as f64;
    shared / union
}

fn summarize(subject: &EvaluationSubject, ranking: &[RankedProposal], superseded: usize) -> String {
    let criteria = subject.requirements.criteria.len();
    let mut summary = match ranking.first() {
        None => format!("No proposals to evaluate for RFP {}.", subject.rfp_id),
        Some(top) => format!(
            "Evaluated {} proposal(s) against {criteria} criteria. Recommended: proposal {} from vendor {} with score {:.1}.",
            ranking.len(),
            top.proposal_id,
            top.vendor_id,
            top.score
        ),
    };
    if superseded > 0 {
        summary.push_str(&format!(" {superseded} superseded proposal(s) excluded."));
    }
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn at(minutes: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn subject(criteria: Vec<Criterion>) -> EvaluationSubject {
        EvaluationSubject {
            rfp_id: 1,
            budget: None,
            requirements: Requirements {
                criteria,
                items: vec![],
            },
        }
    }

    fn price_delivery() -> EvaluationSubject {
        subject(vec![
            Criterion::new("price", Some(2.0), Measure::Price { ceiling: None }),
            Criterion::new("delivery_time", Some(1.0), Measure::DeliveryTime { max_days: None }),
        ])
    }

    fn candidate(id: DbId, vendor: DbId, minutes: i64, fields: ProposalFields) -> Candidate {
        Candidate {
            proposal_id: id,
            rfp_id: 1,
            vendor_id: vendor,
            status: ProposalStatus::Parsed,
            received_at: at(minutes),
            fields: Some(fields),
        }
    }

    fn offer(price: f64, days: f64) -> ProposalFields {
        ProposalFields {
            price: Some(price),
            delivery_days: Some(days),
            ..Default::default()
        }
    }

    #[test]
    fn weighted_price_dominates() {
        let x = candidate(1, 10, 0, offer(1000.0, 10.0));
        let y = candidate(2, 20, 1, offer(1200.0, 5.0));
        let result = evaluate(&price_delivery(), &[x, y]).unwrap();

        assert_eq!(result.ranking[0].proposal_id, 1);
        assert!(result.ranking[0].score > result.ranking[1].score);
        assert_eq!(result.recommendation.unwrap().vendor_id, 10);
        assert!(result.summary.contains("proposal 1"));
    }

    #[test]
    fn order_independent() {
        let a = candidate(1, 10, 0, offer(1000.0, 10.0));
        let b = candidate(2, 20, 1, offer(1200.0, 5.0));
        let c = candidate(3, 30, 2, offer(900.0, 20.0));

        let forward = evaluate(&price_delivery(), &[a.clone(), b.clone(), c.clone()]).unwrap();
        let reversed = evaluate(&price_delivery(), &[c, a, b]).unwrap();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn scores_stay_in_bounds() {
        let candidates = vec![
            candidate(1, 10, 0, offer(0.0, 0.0)),
            candidate(2, 20, 0, offer(1e12, 1e6)),
            candidate(3, 30, 0, ProposalFields::default()),
        ];
        let result = evaluate(&price_delivery(), &candidates).unwrap();
        for entry in &result.ranking {
            assert!((0.0..=100.0).contains(&entry.score), "score {}", entry.score);
            for c in &entry.evaluation.criteria {
                assert!((0.0..=1.0).contains(&c.sub_score));
            }
        }
    }

    #[test]
    fn missing_fields_are_explicit_zeros() {
        let full = candidate(1, 10, 0, offer(1000.0, 10.0));
        let empty = candidate(2, 20, 0, ProposalFields::default());
        let result = evaluate(&price_delivery(), &[full, empty]).unwrap();

        let last = &result.ranking[1];
        assert_eq!(last.proposal_id, 2);
        assert_eq!(last.score, 0.0);
        assert_eq!(last.evaluation.criteria.len(), 2);
        assert!(last
            .evaluation
            .criteria
            .iter()
            .all(|c| c.outcome == Outcome::Missing && c.sub_score == 0.0));
    }

    #[test]
    fn price_over_budget_scores_zero() {
        let mut s = subject(vec![Criterion::new("price", None, Measure::Price { ceiling: None })]);
        s.budget = Some(1100.0);
        let result = evaluate(
            &s,
            &[
                candidate(1, 10, 0, offer(1000.0, 1.0)),
                candidate(2, 20, 0, offer(1200.0, 1.0)),
            ],
        )
        .unwrap();
        let over = result.ranking.iter().find(|r| r.proposal_id == 2).unwrap();
        assert_eq!(over.evaluation.criteria[0].outcome, Outcome::OutOfBounds);
        assert_eq!(over.score, 0.0);
        let under = result.ranking.iter().find(|r| r.proposal_id == 1).unwrap();
        assert_eq!(under.score, 100.0);
    }

    #[test]
    fn warranty_higher_is_better() {
        let s = subject(vec![Criterion::new(
            "warranty",
            None,
            Measure::Warranty { min_months: Some(6.0) },
        )]);
        let w = |months: f64| ProposalFields {
            warranty_months: Some(months),
            ..Default::default()
        };
        let result = evaluate(
            &s,
            &[
                candidate(1, 10, 0, w(12.0)),
                candidate(2, 20, 0, w(24.0)),
                candidate(3, 30, 0, w(3.0)),
            ],
        )
        .unwrap();
        let ids: Vec<_> = result.ranking.iter().map(|r| r.proposal_id).collect();
        assert_eq!(ids, [2, 1, 3]);
        assert_eq!(result.ranking[2].evaluation.criteria[0].outcome, Outcome::OutOfBounds);
    }

    #[test]
    fn payment_terms_match() {
        assert_eq!(match_score("Net 30", "net-30"), 1.0);
        assert!(match_score("net 45 days", "net 30 days") > 0.0);
        assert_eq!(match_score("prepaid", "net 30"), 0.0);
    }

    #[test]
    fn ties_break_on_earliest_submission() {
        let s = subject(vec![Criterion::new("price", None, Measure::Price { ceiling: None })]);
        let early = candidate(5, 10, 0, offer(100.0, 1.0));
        let late = candidate(4, 20, 10, offer(100.0, 1.0));
        let result = evaluate(&s, &[late, early]).unwrap();
        assert_eq!(result.ranking[0].proposal_id, 5);
        assert_eq!(result.ranking[0].rank, 1);
        assert_eq!(result.ranking[1].rank, 2);
    }

    #[test]
    fn latest_proposal_per_vendor_supersedes() {
        let old = candidate(1, 10, 0, offer(500.0, 1.0));
        let new = candidate(2, 10, 5, offer(900.0, 1.0));
        let mut deleted = candidate(3, 10, 9, offer(100.0, 1.0));
        deleted.status = ProposalStatus::Deleted;
        let other = candidate(4, 20, 0, offer(700.0, 1.0));

        let result = evaluate(&price_delivery(), &[old, new, deleted, other]).unwrap();
        let ranked: HashSet<_> = result.ranking.iter().map(|r| r.proposal_id).collect();
        assert_eq!(ranked, HashSet::from([2, 4]));
        assert_eq!(result.superseded, vec![1]);
        assert!(result.summary.contains("superseded"));
    }

    #[test]
    fn unparsed_proposal_fails_precondition() {
        let mut raw = candidate(1, 10, 0, offer(1.0, 1.0));
        raw.fields = None;
        raw.status = ProposalStatus::Received;
        assert_matches!(
            evaluate(&price_delivery(), &[raw]),
            Err(CoreError::EvaluationPrecondition(_))
        );
    }

    #[test]
    fn foreign_proposal_fails_precondition() {
        let mut stray = candidate(1, 10, 0, offer(1.0, 1.0));
        stray.rfp_id = 99;
        assert_matches!(
            evaluate(&price_delivery(), &[stray]),
            Err(CoreError::EvaluationPrecondition(_))
        );
    }

    #[test]
    fn rfp_without_criteria_fails_precondition() {
        let s = subject(vec![]);
        assert_matches!(
            evaluate(&s, &[candidate(1, 10, 0, offer(1.0, 1.0))]),
            Err(CoreError::EvaluationPrecondition(_))
        );
    }

    #[test]
    fn no_proposals_yields_empty_ranking() {
        let result = evaluate(&price_delivery(), &[]).unwrap();
        assert!(result.ranking.is_empty());
        assert!(result.recommendation.is_none());
    }
}
