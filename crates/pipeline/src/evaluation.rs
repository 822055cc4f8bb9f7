//! Runs the Evaluation Engine for an RFP and commits the scores.

use std::time::Duration;

use procura_core::error::CoreError;
use procura_core::evaluation::{evaluate, ComparisonResult, EvaluationSubject};
use procura_core::lifecycle::{ProposalStatus, RfpStatus};
use procura_core::types::DbId;
use procura_db::models::proposal::ScoreUpdate;

use crate::lifecycle::Lifecycle;
use crate::timeout::with_timeout;

#[derive(Clone)]
pub struct EvaluationService {
    lifecycle: Lifecycle,
    evaluation_timeout: Duration,
}

impl EvaluationService {
    pub fn new(lifecycle: Lifecycle, evaluation_timeout: Duration) -> Self {
        Self {
            lifecycle,
            evaluation_timeout,
        }
    }

    /// Score every authoritative proposal of `rfp_id` and commit the scores
    /// all-or-nothing. A lost race re-runs the whole evaluation.
    pub async fn evaluate_rfp(&self, rfp_id: DbId) -> Result<ComparisonResult, CoreError> {
        self.lifecycle
            .with_retry(move || self.evaluate_and_commit(rfp_id))
            .await
    }

    async fn evaluate_and_commit(&self, rfp_id: DbId) -> Result<ComparisonResult, CoreError> {
        let mut result = with_timeout(
            "evaluation",
            self.evaluation_timeout,
            self.compare(rfp_id),
        )
        .await?;

        let updates: Vec<ScoreUpdate> = result
            .ranking
            .iter()
            .filter_map(|ranked| {
                let (expected, next) = match ranked.status {
                    ProposalStatus::Parsed => (ProposalStatus::Parsed, ProposalStatus::Evaluated),
                    ProposalStatus::Evaluated => {
                        (ProposalStatus::Evaluated, ProposalStatus::Evaluated)
                    }
                    _ => return None,
                };
                Some(ScoreUpdate {
                    proposal_id: ranked.proposal_id,
                    expected,
                    next,
                    score: ranked.score,
                    evaluation: ranked.evaluation.clone(),
                })
            })
            .collect();

        if !updates.is_empty() {
            self.lifecycle.commit_scores(&updates).await?;
        }
        for ranked in &mut result.ranking {
            if ranked.status == ProposalStatus::Parsed {
                ranked.status = ProposalStatus::Evaluated;
            }
        }

        tracing::info!(
            rfp_id,
            ranked = result.ranking.len(),
            committed = updates.len(),
            superseded = result.superseded.len(),
            recommended = result.recommendation.as_ref().map(|r| r.proposal_id),
            "RFP evaluated",
        );
        Ok(result)
    }

    /// Load and rank without writing anything.
    async fn compare(&self, rfp_id: DbId) -> Result<ComparisonResult, CoreError> {
        let rfp = self.lifecycle.load_rfp(rfp_id).await?;
        if rfp.status == RfpStatus::Draft {
            return Err(CoreError::EvaluationPrecondition(format!(
                "RFP {rfp_id} is still DRAFT and has no proposals to evaluate"
            )));
        }
        let proposals = self.lifecycle.store().proposals_for_rfp(rfp_id).await?;
        let candidates: Vec<_> = proposals.iter().map(|p| p.as_candidate()).collect();
        let subject = EvaluationSubject {
            rfp_id,
            budget: rfp.budget,
            requirements: rfp.requirements.0,
        };
        evaluate(&subject, &candidates)
    }
}
