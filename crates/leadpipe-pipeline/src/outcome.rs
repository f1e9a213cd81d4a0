use serde::Serialize;

/// Why a batch reported `done`, or why it did no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    TargetReached,
    SegmentsExhausted,
    SearchBudgetExhausted,
    SpendCapReached,
    NoPendingWork,
    AlreadyCompleted,
    Canceled,
    Failed,
    /// Another batch for the same job and stage holds the lock.
    Busy,
}

impl DoneReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DoneReason::TargetReached => "target_reached",
            DoneReason::SegmentsExhausted => "segments_exhausted",
            DoneReason::SearchBudgetExhausted => "search_budget_exhausted",
            DoneReason::SpendCapReached => "spend_cap_reached",
            DoneReason::NoPendingWork => "no_pending_work",
            DoneReason::AlreadyCompleted => "already_completed",
            DoneReason::Canceled => "canceled",
            DoneReason::Failed => "failed",
            DoneReason::Busy => "busy",
        }
    }
}

impl std::fmt::Display for DoneReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
