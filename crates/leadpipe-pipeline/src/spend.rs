//! Shared driver for the spend-capped stages.
//!
//! Verification, enrichment, and ads scan all follow the same contract:
//! no-op when canceled, capped or locked; otherwise take a batch of
//! pending items and charge each one against the cap before doing it.
//! Whether a stage is done is always decided by the pending-work query,
//! so new leads, a new selection or a new ads window reopen it. The
//! stage-specific work lives behind [`SpendCappedStage`].

use leadpipe_core::{Stage, StageStatus};
use leadpipe_db::{JobRow, StageState, WorkScope};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::outcome::DoneReason;

const DEFAULT_BATCH_SIZE: u32 = 20;
const MAX_BATCH_SIZE: u32 = 200;

/// Parameters common to every spend-capped batch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageParams {
    /// Jobs whose results are in scope; empty means just the target job.
    #[serde(default)]
    pub scope_job_ids: Vec<Uuid>,
    /// Restricts the batch to these leads when present and non-empty.
    #[serde(default)]
    pub selected_lead_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub batch_size: Option<u32>,
    #[serde(default)]
    pub spend_cap: Option<Decimal>,
}

impl StageParams {
    #[must_use]
    pub fn batch_size(&self) -> u32 {
        self.batch_size
            .unwrap_or(DEFAULT_BATCH_SIZE)
            .clamp(1, MAX_BATCH_SIZE)
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] if the cap is missing or not positive.
    pub fn spend_cap(&self) -> Result<Decimal, PipelineError> {
        match self.spend_cap {
            Some(cap) if cap > Decimal::ZERO => Ok(cap),
            _ => Err(PipelineError::Validation(
                "spendCap is required and must be > 0".to_string(),
            )),
        }
    }
}

/// Running total of one batch against its cap.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpendLedger {
    spent: Decimal,
    cap: Decimal,
}

impl SpendLedger {
    pub(crate) fn new(spent: Decimal, cap: Decimal) -> Self {
        Self { spent, cap }
    }

    pub(crate) fn can_afford(&self, unit: Decimal) -> bool {
        self.spent + unit <= self.cap
    }

    /// Adds `unit` if it fits under the cap.
    pub(crate) fn try_charge(&mut self, unit: Decimal) -> bool {
        if !self.can_afford(unit) {
            return false;
        }
        self.charge(unit);
        true
    }

    /// Records spend already checked with [`SpendLedger::can_afford`].
    pub(crate) fn charge(&mut self, unit: Decimal) {
        self.spent += unit;
    }

    pub(crate) fn reached(&self) -> bool {
        self.spent >= self.cap
    }

    pub(crate) fn spent(&self) -> Decimal {
        self.spent
    }
}

pub(crate) enum ItemOutcome {
    Handled,
    /// The next charge would cross the cap; stop the batch.
    CapReached,
}

/// Borrowed state a stage sees while processing one batch.
pub(crate) struct BatchCall<'a> {
    pub ctx: &'a PipelineContext,
    pub job: &'a JobRow,
    pub scope: WorkScope<'a>,
}

pub(crate) trait SpendCappedStage {
    const STAGE: Stage;
    type Item;

    async fn pending(
        &self,
        call: &BatchCall<'_>,
        limit: i64,
    ) -> Result<Vec<Self::Item>, PipelineError>;

    async fn process(
        &mut self,
        call: &BatchCall<'_>,
        item: &Self::Item,
        ledger: &mut SpendLedger,
    ) -> Result<ItemOutcome, PipelineError>;

    /// Stage-specific counters for the batch log entry.
    fn summary(&self) -> serde_json::Value;
}

/// What the driver reports back to the stage wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StageRun {
    pub done: bool,
    pub spend_actual: Decimal,
    pub spend_cap: Decimal,
    pub reason: Option<DoneReason>,
}

impl StageRun {
    fn new(
        done: bool,
        spend_actual: Decimal,
        spend_cap: Decimal,
        reason: Option<DoneReason>,
    ) -> Self {
        Self {
            done,
            spend_actual: spend_actual.normalize(),
            spend_cap: spend_cap.normalize(),
            reason,
        }
    }

    fn noop(spend_actual: Decimal, spend_cap: Decimal, done: bool, reason: DoneReason) -> Self {
        Self::new(done, spend_actual, spend_cap, Some(reason))
    }
}

fn stage_state<S: SpendCappedStage>(job: &JobRow) -> Result<StageState, PipelineError> {
    job.stage_state(S::STAGE)
        .ok_or(PipelineError::Db(leadpipe_db::DbError::NotSpendCapped(S::STAGE)))
}

/// The no-op a job's stored state calls for before any work is selected.
fn precheck(job: &JobRow, state: &StageState, cap: Decimal) -> Option<StageRun> {
    if job.status == "failed" {
        let reason = if job.failure_reason.as_deref() == Some("canceled") {
            DoneReason::Canceled
        } else {
            DoneReason::Failed
        };
        return Some(StageRun::noop(state.spend_actual, cap, true, reason));
    }
    if state.spend_actual >= cap {
        return Some(StageRun::noop(
            state.spend_actual,
            cap,
            true,
            DoneReason::SpendCapReached,
        ));
    }
    None
}

/// Loads a job by public id with a readable not-found error.
pub(crate) async fn load_job(pool: &PgPool, job_id: Uuid) -> Result<JobRow, PipelineError> {
    leadpipe_db::get_job_by_public_id(pool, job_id)
        .await
        .map_err(|e| match e {
            leadpipe_db::DbError::NotFound => PipelineError::NotFound(format!("job {job_id}")),
            other => PipelineError::Db(other),
        })
}

/// Resolves the scope of a batch to internal ids.
pub(crate) async fn resolve_scope(
    ctx: &PipelineContext,
    job: &JobRow,
    scope_job_ids: &[Uuid],
    selected_lead_ids: Option<&[Uuid]>,
) -> Result<(Vec<i64>, Option<Vec<i64>>), PipelineError> {
    let job_ids = if scope_job_ids.is_empty() {
        vec![job.id]
    } else {
        let ids = leadpipe_db::resolve_job_ids(ctx.pool(), scope_job_ids).await?;
        if ids.is_empty() {
            return Err(PipelineError::NotFound("scope jobs".to_string()));
        }
        ids
    };

    let lead_ids = match selected_lead_ids {
        Some(selected) if !selected.is_empty() => {
            Some(leadpipe_db::resolve_lead_ids(ctx.pool(), selected).await?)
        }
        _ => None,
    };

    Ok((job_ids, lead_ids))
}

/// Runs one batch of `stage` for `job_id`.
pub(crate) async fn run_stage<S: SpendCappedStage>(
    ctx: &PipelineContext,
    job_id: Uuid,
    params: &StageParams,
    stage: &mut S,
) -> Result<StageRun, PipelineError> {
    let cap = params.spend_cap()?;
    let job = load_job(ctx.pool(), job_id).await?;
    if let Some(noop) = precheck(&job, &stage_state::<S>(&job)?, cap) {
        return Ok(noop);
    }
    run_locked_batch(ctx, &job, params, stage).await
}

/// Takes the stage lock and runs the batch from the job's current row.
///
/// `seen` is the row read before locking; only its identity and the
/// returned spend on a busy no-op come from it.
#[allow(clippy::too_many_lines)] // lock, batch loop, persistence
async fn run_locked_batch<S: SpendCappedStage>(
    ctx: &PipelineContext,
    seen: &JobRow,
    params: &StageParams,
    stage: &mut S,
) -> Result<StageRun, PipelineError> {
    let cap = params.spend_cap()?;
    let limit = i64::from(params.batch_size());
    let pool = ctx.pool();

    let (job_ids, lead_ids) = resolve_scope(
        ctx,
        seen,
        &params.scope_job_ids,
        params.selected_lead_ids.as_deref(),
    )
    .await?;

    let Some(lock) = leadpipe_db::try_lock_stage(pool, seen.id, S::STAGE).await? else {
        tracing::info!(job = %seen.public_id, stage = %S::STAGE, "batch already running; skipping");
        let spent = stage_state::<S>(seen)?.spend_actual;
        return Ok(StageRun::noop(spent, cap, false, DoneReason::Busy));
    };

    // Spend and status in `seen` may predate the last batch.
    let job = leadpipe_db::get_job(pool, seen.id).await?;
    let state = stage_state::<S>(&job)?;
    if let Some(noop) = precheck(&job, &state, cap) {
        lock.release().await?;
        return Ok(noop);
    }

    leadpipe_db::begin_stage(pool, job.id, S::STAGE, cap).await?;

    let call = BatchCall {
        ctx,
        job: &job,
        scope: WorkScope {
            job_ids: &job_ids,
            lead_ids: lead_ids.as_deref(),
        },
    };

    let items = stage.pending(&call, limit).await?;
    let mut ledger = SpendLedger::new(state.spend_actual, cap);
    let mut handled = 0usize;
    let mut cap_hit = false;

    for item in &items {
        match stage.process(&call, item, &mut ledger).await {
            Ok(ItemOutcome::Handled) => handled += 1,
            Ok(ItemOutcome::CapReached) => {
                cap_hit = true;
                break;
            }
            Err(err) => {
                tracing::error!(
                    job = %job.public_id,
                    stage = %S::STAGE,
                    error = %err,
                    "batch aborted; keeping spend so far"
                );
                if let Err(save_err) = leadpipe_db::save_stage_progress(
                    pool,
                    job.id,
                    S::STAGE,
                    ledger.spent(),
                    StageStatus::Running,
                )
                .await
                {
                    tracing::error!(error = %save_err, "failed to persist spend after abort");
                }
                return Err(err);
            }
        }
    }

    let reason = if items.is_empty() {
        Some(DoneReason::NoPendingWork)
    } else if cap_hit || ledger.reached() {
        Some(DoneReason::SpendCapReached)
    } else if handled == 0 {
        Some(DoneReason::NoPendingWork)
    } else {
        None
    };
    let done = reason.is_some();
    let status = if done {
        StageStatus::Completed
    } else {
        StageStatus::Running
    };

    leadpipe_db::save_stage_progress(pool, job.id, S::STAGE, ledger.spent(), status).await?;

    let mut payload = json!({
        "pending": items.len(),
        "handled": handled,
        "spend_actual": ledger.spent().normalize(),
        "spend_cap": cap,
        "done": done,
        "reason": reason,
    });
    if let (Some(obj), serde_json::Value::Object(extra)) = (payload.as_object_mut(), stage.summary())
    {
        obj.extend(extra);
    }
    leadpipe_db::append_run_log(pool, job.id, &format!("{}_batch", S::STAGE), &payload).await?;

    lock.release().await?;

    tracing::info!(
        job = %job.public_id,
        stage = %S::STAGE,
        handled,
        spend_actual = %ledger.spent(),
        spend_cap = %cap,
        done,
        "stage batch finished"
    );

    Ok(StageRun::new(done, ledger.spent(), cap, reason))
}
