//! Ads-library scan stage.
//!
//! Observations are keyed by `(lead, provider, period_start, period_end)`;
//! a lead already observed for the requested window is not selected again,
//! so re-running a scan never pays twice for the same window.

use chrono::{Days, NaiveDate, Utc};
use leadpipe_core::{estimate_ads_scan_cost, Stage};
use leadpipe_db::{LeadWorkRow, NewAdsObservation};
use leadpipe_providers::{AdsLibraryClient, AdsLookup};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::outcome::DoneReason;
use crate::spend::{run_stage, BatchCall, ItemOutcome, SpendCappedStage, SpendLedger, StageParams};

const DEFAULT_PERIOD_DAYS: u32 = 30;
const MAX_PERIOD_DAYS: u32 = 365;
const DEFAULT_MIN_ADS: i32 = 1;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdsScanParams {
    #[serde(flatten)]
    pub stage: StageParams,
    #[serde(default)]
    pub period_days: Option<u32>,
    #[serde(default)]
    pub min_ads: Option<i32>,
}

impl AdsScanParams {
    #[must_use]
    pub fn period_days(&self) -> u32 {
        clamp_period_days(self.period_days)
    }

    #[must_use]
    pub fn min_ads(&self) -> i32 {
        self.min_ads.unwrap_or(DEFAULT_MIN_ADS).max(0)
    }
}

pub(crate) fn clamp_period_days(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_PERIOD_DAYS)
        .clamp(1, MAX_PERIOD_DAYS)
}

/// The observation window ending on `today`, both ends inclusive.
#[must_use]
pub fn scan_period(today: NaiveDate, period_days: u32) -> (NaiveDate, NaiveDate) {
    let start = today
        .checked_sub_days(Days::new(u64::from(period_days)))
        .unwrap_or(NaiveDate::MIN);
    (start, today)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdsScanOutcome {
    pub done: bool,
    pub processed: u32,
    pub threshold_matches: u32,
    pub spend_actual: Decimal,
    pub spend_cap: Decimal,
    pub reason: Option<DoneReason>,
}

struct AdsScanStage<'a> {
    client: &'a AdsLibraryClient,
    unit_cost: Decimal,
    period_days: u32,
    period: (NaiveDate, NaiveDate),
    min_ads: i32,
    processed: u32,
    threshold_matches: u32,
}

impl SpendCappedStage for AdsScanStage<'_> {
    const STAGE: Stage = Stage::AdsScan;
    type Item = LeadWorkRow;

    async fn pending(
        &self,
        call: &BatchCall<'_>,
        limit: i64,
    ) -> Result<Vec<LeadWorkRow>, PipelineError> {
        Ok(leadpipe_db::list_pending_ads_scan(
            call.ctx.pool(),
            call.scope,
            self.client.provider_name(),
            self.period,
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
        if !ledger.can_afford(self.unit_cost) {
            return Ok(ItemOutcome::CapReached);
        }

        let (period_start, period_end) = self.period;
        let result = self
            .client
            .lookup(&AdsLookup {
                company_name: &item.name,
                website: item.website.as_deref(),
                city: item.city.as_deref(),
                state: item.state.as_deref(),
                period_days: self.period_days,
                period_start,
                period_end,
            })
            .await?;
        ledger.charge(self.unit_cost);

        let threshold_match = result.ads_count_in_period >= self.min_ads;
        let pool = call.ctx.pool();

        leadpipe_db::upsert_ads_observation(
            pool,
            &NewAdsObservation {
                lead_id: item.lead_id,
                job_id: call.job.id,
                provider: self.client.provider_name(),
                period_start,
                period_end,
                advertiser_name: Some(result.advertiser_name.as_str()),
                ads_count_active: result.ads_count_active,
                ads_count_in_period: result.ads_count_in_period,
                min_ads: self.min_ads,
                threshold_match,
                first_seen_at: result.first_seen_at,
                last_seen_at: result.last_seen_at,
                evidence_url: result.evidence_url.as_deref(),
                provider_response: &result.raw,
            },
        )
        .await?;

        leadpipe_db::append_run_log(
            pool,
            call.job.id,
            "ads_scan_item",
            &json!({
                "lead_id": item.lead_id,
                "lead_name": item.name,
                "period_days": self.period_days,
                "min_ads": self.min_ads,
                "ads_count_in_period": result.ads_count_in_period,
                "ads_count_active": result.ads_count_active,
                "threshold_match": threshold_match,
            }),
        )
        .await?;

        self.processed += 1;
        if threshold_match {
            self.threshold_matches += 1;
        }
        Ok(ItemOutcome::Handled)
    }

    fn summary(&self) -> serde_json::Value {
        json!({
            "processed": self.processed,
            "threshold_matches": self.threshold_matches,
            "period_start": self.period.0,
            "period_end": self.period.1,
        })
    }
}

/// Runs one ads-library scan batch for `job_id`.
///
/// Each lookup is charged the configured unit cost times the buffer
/// multiplier.
///
/// # Errors
///
/// - [`PipelineError::Validation`] for a missing or non-positive spend cap.
/// - [`PipelineError::Config`] if no ads-library provider is configured.
/// - [`PipelineError::NotFound`] for an unknown job.
/// - [`PipelineError::Upstream`] if a lookup fails; spend charged so far
///   is persisted first.
pub async fn run_ads_scan_batch(
    ctx: &PipelineContext,
    job_id: Uuid,
    params: &AdsScanParams,
) -> Result<AdsScanOutcome, PipelineError> {
    params.stage.spend_cap()?;
    let client = ctx.ads()?;
    let config = ctx.config();
    let unit_cost =
        estimate_ads_scan_cost(1, config.ads_unit_cost_usd, config.ads_buffer_multiplier)
            .cost_per_company_usd;
    let period_days = params.period_days();

    let mut stage = AdsScanStage {
        client,
        unit_cost,
        period_days,
        period: scan_period(Utc::now().date_naive(), period_days),
        min_ads: params.min_ads(),
        processed: 0,
        threshold_matches: 0,
    };

    let run = run_stage(ctx, job_id, &params.stage, &mut stage).await?;

    Ok(AdsScanOutcome {
        done: run.done,
        processed: stage.processed,
        threshold_matches: stage.threshold_matches,
        spend_actual: run.spend_actual,
        spend_cap: run.spend_cap,
        reason: run.reason,
    })
}
