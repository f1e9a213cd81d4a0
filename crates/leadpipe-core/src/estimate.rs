//! Pure cost estimators.
//!
//! The enrichment estimator doubles as the per-lead charge in the
//! enrichment stage, so estimates and actual spend use the same arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::status::EnrichmentMode;

const ENRICHMENT_MAX_LEADS_PER_COMPANY: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationEstimate {
    pub contact_count: u64,
    pub unit_cost_usd: Decimal,
    pub buffer_multiplier: Decimal,
    pub estimated_cost_usd: Decimal,
}

/// `count × unit × buffer`, rounded to cents.
#[must_use]
pub fn estimate_verification_cost(
    contact_count: u64,
    unit_cost_usd: Decimal,
    buffer_multiplier: Decimal,
) -> VerificationEstimate {
    let estimated = (Decimal::from(contact_count) * unit_cost_usd * buffer_multiplier).round_dp(2);
    VerificationEstimate {
        contact_count,
        unit_cost_usd,
        buffer_multiplier,
        estimated_cost_usd: estimated,
    }
}

/// Credit pricing of the enrichment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentPricing {
    pub credits_per_lead: Decimal,
    pub deep_profile_credits: Decimal,
    pub credit_cost_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentEstimate {
    pub company_count: u64,
    pub leads_per_company: u32,
    pub mode: EnrichmentMode,
    pub credits_per_company: Decimal,
    pub total_credits: Decimal,
    pub cost_per_company_usd: Decimal,
    pub estimated_cost_usd: Decimal,
}

/// Credits and currency for enriching `company_count` companies.
///
/// `leads_per_company` is clamped to `1..=10`. Deep mode adds a fixed
/// profile surcharge per company.
#[must_use]
pub fn estimate_enrichment_cost(
    pricing: EnrichmentPricing,
    company_count: u64,
    leads_per_company: u32,
    mode: EnrichmentMode,
) -> EnrichmentEstimate {
    let leads = leads_per_company.clamp(1, ENRICHMENT_MAX_LEADS_PER_COMPANY);
    let deep_surcharge = match mode {
        EnrichmentMode::Deep => pricing.deep_profile_credits,
        EnrichmentMode::Budget => Decimal::ZERO,
    };
    let credits_per_company = Decimal::from(leads) * pricing.credits_per_lead + deep_surcharge;
    let total_credits = credits_per_company * Decimal::from(company_count);

    EnrichmentEstimate {
        company_count,
        leads_per_company: leads,
        mode,
        credits_per_company,
        total_credits,
        cost_per_company_usd: (credits_per_company * pricing.credit_cost_usd).round_dp(6),
        estimated_cost_usd: (total_credits * pricing.credit_cost_usd).round_dp(6),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdsScanEstimate {
    pub company_count: u64,
    pub unit_cost_usd: Decimal,
    pub buffer_multiplier: Decimal,
    pub cost_per_company_usd: Decimal,
    pub estimated_cost_usd: Decimal,
}

#[must_use]
pub fn estimate_ads_scan_cost(
    company_count: u64,
    unit_cost_usd: Decimal,
    buffer_multiplier: Decimal,
) -> AdsScanEstimate {
    let per_company = (unit_cost_usd * buffer_multiplier).round_dp(6);
    AdsScanEstimate {
        company_count,
        unit_cost_usd,
        buffer_multiplier,
        cost_per_company_usd: per_company,
        estimated_cost_usd: (per_company * Decimal::from(company_count)).round_dp(6),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectApiCost {
    pub text_search_calls: u32,
    pub details_calls: u32,
    pub total_calls: u32,
    pub estimated_cost_usd: Decimal,
}

/// Directory API spend of one collection batch.
#[must_use]
pub fn estimate_collect_api_cost(
    text_search_calls: u32,
    details_calls: u32,
    text_search_unit_usd: Decimal,
    details_unit_usd: Decimal,
) -> CollectApiCost {
    let cost = Decimal::from(text_search_calls) * text_search_unit_usd
        + Decimal::from(details_calls) * details_unit_usd;
    CollectApiCost {
        text_search_calls,
        details_calls,
        total_calls: text_search_calls + details_calls,
        estimated_cost_usd: cost.round_dp(6),
    }
}
