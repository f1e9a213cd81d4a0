//! Enrichment stage: rank each lead's contacts and write segment signals.
//!
//! A lead counts as enriched once it carries a
//! `segment_in_business_20_plus` signal, so re-running a completed batch
//! selects nothing and charges nothing.

use std::cmp::Ordering;

use leadpipe_core::{
    estimate_enrichment_cost, CompanyProfile, EnrichmentMode, SegmentFlag, Stage,
    SIGNAL_IN_BUSINESS_20_PLUS, SIGNAL_LEAD_CONFIDENCE, SIGNAL_MULTI_LOCATION_MEDICAL,
};
use leadpipe_db::{ContactRow, LeadWorkRow, NewSignal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::outcome::DoneReason;
use crate::spend::{run_stage, BatchCall, ItemOutcome, SpendCappedStage, SpendLedger, StageParams};

const DEFAULT_LEADS_PER_COMPANY: u32 = 3;
const MAX_LEADS_PER_COMPANY: u32 = 3;
const MAX_RANKED_CONTACTS: i64 = 25;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichParams {
    #[serde(flatten)]
    pub stage: StageParams,
    #[serde(default)]
    pub mode: EnrichmentMode,
    #[serde(default)]
    pub leads_per_company: Option<u32>,
}

impl EnrichParams {
    #[must_use]
    pub fn leads_per_company(&self) -> u32 {
        clamp_leads_per_company(self.leads_per_company)
    }
}

pub(crate) fn clamp_leads_per_company(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_LEADS_PER_COMPANY)
        .clamp(1, MAX_LEADS_PER_COMPANY)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichOutcome {
    pub done: bool,
    pub processed_companies: u32,
    pub lead_signals_written: u32,
    pub spend_actual: Decimal,
    pub spend_cap: Decimal,
    pub reason: Option<DoneReason>,
}

struct EnrichmentStage {
    mode: EnrichmentMode,
    leads_per_company: u32,
    cost_per_lead: Decimal,
    processed_companies: u32,
    lead_signals_written: u32,
}

/// Orders contacts by score, best first. Equal scores keep discovery order.
fn rank_contacts<'a>(
    contacts: &'a [ContactRow],
    score: impl Fn(&ContactRow) -> f64,
) -> Vec<(&'a ContactRow, f64)> {
    let mut ranked: Vec<(&ContactRow, f64)> = contacts.iter().map(|c| (c, score(c))).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked
}

fn segment_value(flag: SegmentFlag, mode: EnrichmentMode) -> serde_json::Value {
    json!({
        "value": flag.value,
        "confidence": flag.confidence,
        "mode": mode,
    })
}

impl SpendCappedStage for EnrichmentStage {
    const STAGE: Stage = Stage::Enrichment;
    type Item = LeadWorkRow;

    async fn pending(
        &self,
        call: &BatchCall<'_>,
        limit: i64,
    ) -> Result<Vec<LeadWorkRow>, PipelineError> {
        Ok(leadpipe_db::list_pending_enrichment(
            call.ctx.pool(),
            call.scope,
            SIGNAL_IN_BUSINESS_20_PLUS,
            limit,
        )
        .await?)
    }

    async fn process(
        &mut self,
        call: &BatchCall<'_>,
        item: &LeadWorkRow,
        ledger: &mut SpendLedger,
    ) -> Result<ItemOutcome, PipelineError> {
        if !ledger.try_charge(self.cost_per_lead) {
            return Ok(ItemOutcome::CapReached);
        }

        let pool = call.ctx.pool();
        let contacts = leadpipe_db::list_lead_contacts(pool, item.lead_id, MAX_RANKED_CONTACTS).await?;
        let scorer = call.ctx.contact_scorer();
        let ranked = rank_contacts(&contacts, |c| scorer.score(c.title.as_deref()));
        let keep = usize::try_from(self.leads_per_company).unwrap_or(usize::MAX);
        let top: Vec<(&ContactRow, f64)> = ranked.into_iter().take(keep).collect();

        let profile = CompanyProfile {
            name: &item.name,
            address: item.address.as_deref(),
            city: item.city.as_deref(),
            state: item.state.as_deref(),
            website: item.website.as_deref(),
        };
        let segments = call.ctx.segment_scorer().score(&profile);

        let mut signals: Vec<NewSignal<'_>> = top
            .iter()
            .map(|(contact, confidence)| NewSignal {
                lead_id: item.lead_id,
                contact_id: Some(contact.id),
                signal_type: SIGNAL_LEAD_CONFIDENCE,
                signal_value: json!({
                    "full_name": contact.full_name,
                    "title": contact.title,
                    "confidence": confidence,
                    "mode": self.mode,
                }),
                evidence_url: item.website.as_deref(),
            })
            .collect();
        signals.push(NewSignal {
            lead_id: item.lead_id,
            contact_id: None,
            signal_type: SIGNAL_IN_BUSINESS_20_PLUS,
            signal_value: segment_value(segments.in_business_20_plus, self.mode),
            evidence_url: item.website.as_deref(),
        });
        signals.push(NewSignal {
            lead_id: item.lead_id,
            contact_id: None,
            signal_type: SIGNAL_MULTI_LOCATION_MEDICAL,
            signal_value: segment_value(segments.multi_location_medical_practice, self.mode),
            evidence_url: item.website.as_deref(),
        });

        leadpipe_db::insert_signals(pool, &signals).await?;

        if let Some((best, _)) = top.first() {
            leadpipe_db::set_primary_contact_in_scope(pool, call.scope.job_ids, item.lead_id, best.id)
                .await?;
        }

        self.processed_companies += 1;
        self.lead_signals_written += u32::try_from(top.len()).unwrap_or(u32::MAX);
        Ok(ItemOutcome::Handled)
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "processed_companies": self.processed_companies,
            "lead_signals_written": self.lead_signals_written,
            "mode": self.mode,
        })
    }
}

/// Runs one enrichment batch for `job_id`.
///
/// Each lead is charged the per-company estimate for the requested mode
/// and `leads_per_company`, so estimates and actual spend agree.
///
/// # Errors
///
/// - [`PipelineError::Validation`] for a missing or non-positive spend cap.
/// - [`PipelineError::NotFound`] for an unknown job.
/// - [`PipelineError::Db`] on storage failure.
pub async fn run_enrichment_batch(
    ctx: &PipelineContext,
    job_id: Uuid,
    params: &EnrichParams,
) -> Result<EnrichOutcome, PipelineError> {
    let leads_per_company = params.leads_per_company();
    let cost_per_lead = estimate_enrichment_cost(
        ctx.enrichment_pricing(),
        1,
        leads_per_company,
        params.mode,
    )
    .estimated_cost_usd;

    let mut stage = EnrichmentStage {
        mode: params.mode,
        leads_per_company,
        cost_per_lead,
        processed_companies: 0,
        lead_signals_written: 0,
    };

    let run = run_stage(ctx, job_id, &params.stage, &mut stage).await?;

    Ok(EnrichOutcome {
        done: run.done,
        processed_companies: stage.processed_companies,
        lead_signals_written: stage.lead_signals_written,
        spend_actual: run.spend_actual,
        spend_cap: run.spend_cap,
        reason: run.reason,
    })
}
