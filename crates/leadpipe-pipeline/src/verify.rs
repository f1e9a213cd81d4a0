//! Email verification stage.
//!
//! Each pending lead contributes its primary contact. Candidate addresses
//! are tried in order until one comes back `valid`, the per-firm attempt
//! limit is hit, or the spend cap would be crossed.

use std::collections::HashMap;

use leadpipe_core::{
    build_email_candidates, split_full_name, website_domain, EmailSource, EmailStatus, Stage,
};
use leadpipe_db::{ContactVerificationUpdate, NewEmailVerification, VerificationWorkRow};
use leadpipe_providers::{EmailVerifierClient, VERIFIER_PROVIDER};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::outcome::DoneReason;
use crate::spend::{run_stage, BatchCall, ItemOutcome, SpendCappedStage, SpendLedger, StageParams};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyParams {
    #[serde(flatten)]
    pub stage: StageParams,
    /// Only keep an address on the contact when it verified `valid`.
    #[serde(default = "default_true")]
    pub valid_only: bool,
    /// Also try common name patterns at the website's domain.
    #[serde(default)]
    pub generate_candidates: bool,
    #[serde(default)]
    pub max_attempts_per_firm: Option<u32>,
}

impl Default for VerifyParams {
    fn default() -> Self {
        Self {
            stage: StageParams::default(),
            valid_only: true,
            generate_candidates: false,
            max_attempts_per_firm: None,
        }
    }
}

impl VerifyParams {
    fn max_attempts(&self) -> usize {
        let attempts = self.max_attempts_per_firm.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1);
        usize::try_from(attempts).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub done: bool,
    pub verified_count: u32,
    pub spend_actual: Decimal,
    pub spend_cap: Decimal,
    pub reason: Option<DoneReason>,
}

struct VerificationStage<'a> {
    verifier: &'a EmailVerifierClient,
    unit_cost: Decimal,
    params: &'a VerifyParams,
    verified_count: u32,
}

impl VerificationStage<'_> {
    async fn verify_and_store(
        &mut self,
        call: &BatchCall<'_>,
        contact_id: i64,
        email: &str,
    ) -> Result<EmailStatus, PipelineError> {
        let verdict = self.verifier.verify(email).await?;
        self.verified_count += 1;

        leadpipe_db::upsert_email_verification(
            call.ctx.pool(),
            &NewEmailVerification {
                contact_id,
                email,
                provider: VERIFIER_PROVIDER,
                status: verdict.status,
                confidence: verdict.confidence,
                provider_response: &verdict.provider_response,
            },
        )
        .await?;
        Ok(verdict.status)
    }
}

impl SpendCappedStage for VerificationStage<'_> {
    const STAGE: Stage = Stage::Verification;
    type Item = VerificationWorkRow;

    async fn pending(
        &self,
        call: &BatchCall<'_>,
        limit: i64,
    ) -> Result<Vec<VerificationWorkRow>, PipelineError> {
        Ok(leadpipe_db::list_pending_verification(call.ctx.pool(), call.scope, limit).await?)
    }

    async fn process(
        &mut self,
        call: &BatchCall<'_>,
        item: &VerificationWorkRow,
        ledger: &mut SpendLedger,
    ) -> Result<ItemOutcome, PipelineError> {
        let pool = call.ctx.pool();

        let (split_first, split_last) = split_full_name(&item.full_name);
        let first = item.first_name.clone().or(split_first);
        let last = item.last_name.clone().or(split_last);
        let domain = item.website.as_deref().and_then(website_domain);

        let candidates = build_email_candidates(
            item.email.as_deref(),
            first.as_deref(),
            last.as_deref(),
            domain.as_deref(),
            self.params.generate_candidates,
        );

        if candidates.is_empty() {
            leadpipe_db::mark_verification_attempted(pool, item.contact_id).await?;
            return Ok(ItemOutcome::Handled);
        }

        let prior: HashMap<String, EmailStatus> =
            leadpipe_db::list_contact_verifications(pool, item.contact_id)
                .await?
                .into_iter()
                .filter(|row| row.provider == VERIFIER_PROVIDER)
                .filter_map(|row| Some((row.email.to_ascii_lowercase(), row.status.parse().ok()?)))
                .collect();

        let mut last_result: Option<(&str, EmailStatus)> = None;
        let mut cap_hit = false;

        for email in candidates.iter().take(self.params.max_attempts()) {
            let status = if let Some(status) = prior.get(&email.to_ascii_lowercase()) {
                *status
            } else {
                if !ledger.can_afford(self.unit_cost) {
                    cap_hit = true;
                    break;
                }
                let fresh = self.verify_and_store(call, item.contact_id, email).await?;
                ledger.charge(self.unit_cost);
                fresh
            };

            last_result = Some((email.as_str(), status));
            if status == EmailStatus::Valid {
                break;
            }
        }

        // Untried candidates remain: leave the contact pending so a higher
        // cap picks it up, reusing the verdicts already paid for.
        let (email, status) = match last_result {
            Some(result) if !cap_hit => result,
            _ => return Ok(ItemOutcome::CapReached),
        };

        let keep = !self.params.valid_only || status == EmailStatus::Valid;
        let found_on_site = item
            .email
            .as_deref()
            .is_some_and(|stored| stored.trim().eq_ignore_ascii_case(email));
        let source = if found_on_site {
            EmailSource::FoundOnSite
        } else {
            EmailSource::GeneratedPattern
        };

        leadpipe_db::record_contact_verification(
            pool,
            item.contact_id,
            &ContactVerificationUpdate {
                email: keep.then_some(email),
                email_status: status,
                email_source: keep.then_some(source),
            },
        )
        .await?;

        tracing::debug!(
            lead_id = item.lead_id,
            contact_id = item.contact_id,
            status = %status,
            "contact verified"
        );

        Ok(ItemOutcome::Handled)
    }

    fn summary(&self) -> serde_json::Value {
        json!({ "verified_count": self.verified_count })
    }
}

/// Runs one verification batch for `job_id`.
///
/// Each attempt is charged the configured unit cost; the buffer multiplier
/// only applies to estimates.
///
/// # Errors
///
/// - [`PipelineError::Validation`] for a missing or non-positive spend cap.
/// - [`PipelineError::Config`] if no verifier key is configured.
/// - [`PipelineError::NotFound`] for an unknown job.
/// - [`PipelineError::Upstream`] if the verifier fails; spend charged so
///   far is persisted first.
pub async fn run_verification_batch(
    ctx: &PipelineContext,
    job_id: Uuid,
    params: &VerifyParams,
) -> Result<VerifyOutcome, PipelineError> {
    params.stage.spend_cap()?;
    let mut stage = VerificationStage {
        verifier: ctx.verifier()?,
        unit_cost: ctx.config().verification_unit_cost_usd,
        params,
        verified_count: 0,
    };

    let run = run_stage(ctx, job_id, &params.stage, &mut stage).await?;

    Ok(VerifyOutcome {
        done: run.done,
        verified_count: stage.verified_count,
        spend_actual: run.spend_actual,
        spend_cap: run.spend_cap,
        reason: run.reason,
    })
}
