//! Collection stage: one directory search per batch.
//!
//! Each batch resolves the cursor to a `(keyword, segment)` cell, searches
//! the directory, dedups and stores up to [`BATCH_PLACE_LIMIT`] candidates,
//! and advances the cursor. Progress is always recounted from
//! `job_results`, so a re-run batch never double counts.

use leadpipe_core::{
    build_geo_segments, build_query, choose_primary_contact, estimate_collect_api_cost,
    split_full_name, CrawlResult, EmailSource, EmailStatus, GeoSegment, JobPlan, LeadCandidate,
    SegmentCursor, Stage,
};
use leadpipe_db::{CollectProgress, JobRow, NewContact, NewSignal};
use leadpipe_providers::{to_lead_candidate, PlacesClient, BATCH_PLACE_LIMIT};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::outcome::DoneReason;
use crate::spend::load_job;

const PRIMARY_CANDIDATE_LIMIT: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectOutcome {
    pub done: bool,
    pub progress_count: i64,
    pub target: i64,
    pub reason: Option<DoneReason>,
    /// Details of the search this batch ran, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSummary {
    pub query: String,
    pub segment: String,
    pub found: usize,
    pub new: u32,
    pub duplicate: u32,
}

fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_usize(value: i32) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// The first condition that ends collection, if any.
fn completion_reason(
    job: &JobRow,
    progress: i64,
    cursor: SegmentCursor,
    segment_count: usize,
    searches_executed: i32,
) -> Option<DoneReason> {
    if progress >= i64::from(job.target_firm_count) {
        Some(DoneReason::TargetReached)
    } else if cursor.is_exhausted(segment_count) {
        Some(DoneReason::SegmentsExhausted)
    } else if searches_executed >= job.max_searches {
        Some(DoneReason::SearchBudgetExhausted)
    } else {
        None
    }
}

fn terminal_reason(job: &JobRow) -> Option<DoneReason> {
    match job.status.as_str() {
        "completed" => Some(DoneReason::AlreadyCompleted),
        "failed" if job.failure_reason.as_deref() == Some("canceled") => Some(DoneReason::Canceled),
        "failed" => Some(DoneReason::Failed),
        _ => None,
    }
}

impl CollectOutcome {
    fn noop(job: &JobRow, done: bool, reason: DoneReason) -> Self {
        Self {
            done,
            progress_count: i64::from(job.progress_count),
            target: i64::from(job.target_firm_count),
            reason: Some(reason),
            search: None,
        }
    }
}

/// Runs one collection batch for `job_id`.
///
/// # Errors
///
/// - [`PipelineError::Config`] if no Places key is configured.
/// - [`PipelineError::NotFound`] for an unknown job.
/// - [`PipelineError::Upstream`] if the text search fails.
/// - [`PipelineError::Db`] on storage failure.
pub async fn run_collect_batch(
    ctx: &PipelineContext,
    job_id: Uuid,
) -> Result<CollectOutcome, PipelineError> {
    let places = ctx.places()?;
    let job = load_job(ctx.pool(), job_id).await?;
    if let Some(reason) = terminal_reason(&job) {
        return Ok(CollectOutcome::noop(&job, true, reason));
    }
    run_locked_collect(ctx, places, &job).await
}

/// Takes the collection lock and runs one search from the job's current
/// cursor. `seen` is the row read before locking.
#[allow(clippy::too_many_lines)] // cursor checks, search, per-candidate loop, persistence
async fn run_locked_collect(
    ctx: &PipelineContext,
    places: &PlacesClient,
    seen: &JobRow,
) -> Result<CollectOutcome, PipelineError> {
    let pool = ctx.pool();

    let Some(lock) = leadpipe_db::try_lock_stage(pool, seen.id, Stage::Collect).await? else {
        tracing::info!(job = %seen.public_id, "collection batch already running; skipping");
        return Ok(CollectOutcome::noop(seen, false, DoneReason::Busy));
    };

    // Cursor and search count in `seen` may predate the last batch.
    let job = leadpipe_db::get_job(pool, seen.id).await?;
    let target = i64::from(job.target_firm_count);
    if let Some(reason) = terminal_reason(&job) {
        lock.release().await?;
        return Ok(CollectOutcome::noop(&job, true, reason));
    }

    if !leadpipe_db::mark_job_running(pool, job.id).await? {
        lock.release().await?;
        return Ok(CollectOutcome::noop(&job, true, DoneReason::Canceled));
    }

    let plan: JobPlan = serde_json::from_value(job.plan.clone())
        .map_err(|e| PipelineError::Validation(format!("stored plan is unreadable: {e}")))?;
    let segments = build_geo_segments(&plan);
    let mut cursor = SegmentCursor::new(to_usize(job.segment_offset), to_usize(job.keyword_offset));
    let mut searches_executed = job.searches_executed;
    let mut progress = leadpipe_db::count_job_results(pool, job.id).await?;

    let save = |cursor: SegmentCursor, progress: i64, searches: i32, completed: bool| CollectProgress {
        segment_offset: to_i32(cursor.segment_offset),
        keyword_offset: to_i32(cursor.keyword_offset),
        progress_count: i32::try_from(progress).unwrap_or(i32::MAX),
        searches_executed: searches,
        completed,
    };

    let resolved = cursor.resolve(&plan.keywords, &segments);
    let early = completion_reason(&job, progress, cursor, segments.len(), searches_executed)
        .or_else(|| resolved.is_none().then_some(DoneReason::SegmentsExhausted));

    let (keyword, segment) = match (early, resolved) {
        (None, Some(cell)) => cell,
        (reason, _) => {
            let reason = reason.unwrap_or(DoneReason::SegmentsExhausted);
            let applied = leadpipe_db::save_collect_progress(
                pool,
                job.id,
                &save(cursor, progress, searches_executed, true),
            )
            .await?;
            lock.release().await?;
            tracing::info!(job = %job.public_id, progress, %reason, "collection finished");
            return Ok(CollectOutcome {
                done: true,
                progress_count: progress,
                target,
                reason: Some(if applied { reason } else { DoneReason::Canceled }),
                search: None,
            });
        }
    };

    let query = build_query(keyword, segment);
    let summaries = match places.text_search(&query).await {
        Ok(found) => found,
        Err(err) => {
            tracing::error!(job = %job.public_id, %query, error = %err, "text search failed; batch aborted");
            return Err(err.into());
        }
    };

    let found = summaries.len().min(BATCH_PLACE_LIMIT);
    let mut details_calls: u32 = 0;
    let mut new_count: u32 = 0;
    let mut duplicate_count: u32 = 0;

    for summary in summaries.iter().take(BATCH_PLACE_LIMIT) {
        if progress >= target {
            break;
        }

        details_calls += 1;
        let details = match places.place_details(&summary.place_id).await {
            Ok(details) => details,
            Err(err) => {
                tracing::warn!(
                    job = %job.public_id,
                    place_id = %summary.place_id,
                    error = %err,
                    "place details failed; skipping candidate"
                );
                continue;
            }
        };

        let candidate = to_lead_candidate(&details, &query, &segment.label);
        if store_candidate(ctx, &job, &plan, &candidate).await? {
            new_count += 1;
            progress += 1;
        } else {
            duplicate_count += 1;
        }
    }

    searches_executed += 1;
    cursor = cursor.advance(plan.keywords.len());
    progress = leadpipe_db::count_job_results(pool, job.id).await?;

    let reason = completion_reason(&job, progress, cursor, segments.len(), searches_executed);
    let done = reason.is_some();
    let applied = leadpipe_db::save_collect_progress(
        pool,
        job.id,
        &save(cursor, progress, searches_executed, done),
    )
    .await?;

    let config = ctx.config();
    let api_cost = estimate_collect_api_cost(
        1,
        details_calls,
        config.places_text_search_unit_cost_usd,
        config.places_details_unit_cost_usd,
    );
    leadpipe_db::append_run_log(
        pool,
        job.id,
        "collect_batch",
        &json!({
            "query": query,
            "segment": segment.label,
            "found": found,
            "new": new_count,
            "duplicate": duplicate_count,
            "progress_count": progress,
            "api_calls": {
                "textsearch": api_cost.text_search_calls,
                "details": api_cost.details_calls,
                "total": api_cost.total_calls,
            },
            "estimated_api_cost_usd": api_cost.estimated_cost_usd,
        }),
    )
    .await?;

    lock.release().await?;

    tracing::info!(
        job = %job.public_id,
        %query,
        found,
        new = new_count,
        duplicate = duplicate_count,
        progress,
        done,
        "collection batch finished"
    );

    let (done, reason) = if applied {
        (done, reason)
    } else {
        (true, Some(DoneReason::Canceled))
    };

    Ok(CollectOutcome {
        done,
        progress_count: progress,
        target,
        reason,
        search: Some(SearchSummary {
            query,
            segment: segment.label.clone(),
            found,
            new: new_count,
            duplicate: duplicate_count,
        }),
    })
}

/// Dedups and stores one candidate. Returns `true` if it is new to the job.
async fn store_candidate(
    ctx: &PipelineContext,
    job: &JobRow,
    plan: &JobPlan,
    candidate: &LeadCandidate,
) -> Result<bool, PipelineError> {
    let pool = ctx.pool();
    let hash = candidate.identity_hash();
    let existing =
        leadpipe_db::find_existing_lead_id(pool, candidate.external_place_id.as_deref(), &hash)
            .await?;

    if let Some(lead_id) = existing {
        if !job.allow_reinclude {
            leadpipe_db::append_run_log(
                pool,
                job.id,
                "dedupe_skip",
                &json!({
                    "lead_id": lead_id,
                    "name": candidate.name,
                    "external_place_id": candidate.external_place_id,
                    "identity_hash": hash,
                }),
            )
            .await?;
            return Ok(false);
        }
    }

    let lead_id = leadpipe_db::upsert_lead(pool, existing, candidate, &hash).await?;

    if plan.toggles.crawl_websites {
        if let Some(website) = candidate.website.as_deref() {
            match ctx.crawler().crawl(website, plan.toggles.deep_crawl).await {
                Ok(crawl) => persist_crawl(ctx, lead_id, &crawl).await?,
                Err(err) => {
                    tracing::warn!(lead_id, %website, error = %err, "site crawl failed");
                }
            }
        }
    }

    let contacts = leadpipe_db::list_lead_contacts(pool, lead_id, PRIMARY_CANDIDATE_LIMIT).await?;
    let primary = choose_primary_contact(&contacts, |c| c.title.as_deref()).map(|c| c.id);

    Ok(leadpipe_db::upsert_job_result(pool, job.id, lead_id, primary).await?)
}

async fn persist_crawl(
    ctx: &PipelineContext,
    lead_id: i64,
    crawl: &CrawlResult,
) -> Result<(), PipelineError> {
    let pool = ctx.pool();

    if let Some(url) = crawl.contact_form_url.as_deref() {
        leadpipe_db::set_contact_form_url(pool, lead_id, url).await?;
    }
    if let Some(phone) = crawl.phones.first() {
        leadpipe_db::fill_missing_phone(pool, lead_id, phone).await?;
    }

    let names: Vec<(Option<String>, Option<String>)> = crawl
        .contacts
        .iter()
        .map(|c| split_full_name(&c.full_name))
        .collect();
    let contacts: Vec<NewContact<'_>> = crawl
        .contacts
        .iter()
        .zip(&names)
        .map(|(c, (first, last))| NewContact {
            full_name: &c.full_name,
            first_name: first.as_deref(),
            last_name: last.as_deref(),
            title: c.title.as_deref(),
            email: c.email.as_deref(),
            email_status: if c.email.is_some() {
                EmailStatus::Unverified
            } else {
                EmailStatus::None
            },
            email_source: c.email.as_ref().map(|_| EmailSource::FoundOnSite),
        })
        .collect();
    let inserted = leadpipe_db::insert_contacts(pool, lead_id, &contacts).await?;

    let signals: Vec<NewSignal<'_>> = crawl
        .signals
        .iter()
        .map(|s| NewSignal {
            lead_id,
            contact_id: None,
            signal_type: &s.signal_type,
            signal_value: s.signal_value.clone(),
            evidence_url: s.evidence_url.as_deref(),
        })
        .collect();
    leadpipe_db::insert_signals(pool, &signals).await?;

    tracing::debug!(
        lead_id,
        pages = crawl.pages_fetched,
        contacts = inserted.len(),
        signals = signals.len(),
        "crawl persisted"
    );
    Ok(())
}

/// Segments of a stored plan, for display and estimates.
///
/// # Errors
///
/// Returns [`PipelineError::Validation`] if the stored plan cannot be read.
pub fn job_segments(job: &JobRow) -> Result<Vec<GeoSegment>, PipelineError> {
    let plan: JobPlan = serde_json::from_value(job.plan.clone())
        .map_err(|e| PipelineError::Validation(format!("stored plan is unreadable: {e}")))?;
    Ok(build_geo_segments(&plan))
}
