/// Where a single pull request ended up in the migration.
///
/// Happy path: Collected → ForkBranchPushed → NewPrOpened →
/// ReviewsReplicated → OriginalClosed. `LabelUnverified` marks a PR that
/// was left alone because its labels could not be read. The remaining
/// variants are terminal failures; nothing is rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Collected,
    LabelUnverified,
    ForkBranchPushed,
    NewPrOpened,
    ReviewsReplicated,
    OriginalClosed,
    CollectFailed,
    ForkPushFailed,
    PrOpenFailed,
    ReviewReplicationPartial,
}

impl MigrationState {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            MigrationState::CollectFailed
                | MigrationState::ForkPushFailed
                | MigrationState::PrOpenFailed
                | MigrationState::ReviewReplicationPartial
        )
    }
}

impl std::fmt::Display for MigrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MigrationState::Collected => "COLLECTED",
            MigrationState::LabelUnverified => "LABEL UNVERIFIED",
            MigrationState::ForkBranchPushed => "BRANCH PUSHED",
            MigrationState::NewPrOpened => "PR OPENED",
            MigrationState::ReviewsReplicated => "REVIEWS REPLICATED",
            MigrationState::OriginalClosed => "ORIGINAL CLOSED",
            MigrationState::CollectFailed => "COLLECT FAILED",
            MigrationState::ForkPushFailed => "FORK PUSH FAILED",
            MigrationState::PrOpenFailed => "PR OPEN FAILED",
            MigrationState::ReviewReplicationPartial => "REVIEWS PARTIAL",
        };
        write!(f, "{}", label)
    }
}

/// Counters for one PR's review thread replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadSummary {
    pub roots_total: usize,
    pub roots_replicated: usize,
    pub roots_failed: usize,
    pub replies_created: usize,
    /// Replies skipped because their new parent comment could not be resolved
    pub replies_orphaned: usize,
}

/// Result of migrating a single source pull request.
#[derive(Debug, Clone)]
pub struct PrOutcome {
    pub source_number: u64,
    pub title: String,
    pub state: MigrationState,
    /// Branch name in the fork
    pub head_ref: Option<String>,
    pub new_number: Option<u64>,
    pub new_url: Option<String>,
    pub original_closed: bool,
    pub conversation_comments: usize,
    pub threads: ThreadSummary,
    /// Recoverable errors hit along the way
    pub errors: Vec<String>,
}

impl PrOutcome {
    pub fn new(source_number: u64, title: impl Into<String>, state: MigrationState) -> Self {
        Self {
            source_number,
            title: title.into(),
            state,
            head_ref: None,
            new_number: None,
            new_url: None,
            original_closed: false,
            conversation_comments: 0,
            threads: ThreadSummary::default(),
            errors: Vec::new(),
        }
    }

    pub fn failed(
        source_number: u64,
        title: impl Into<String>,
        state: MigrationState,
        error: impl std::fmt::Display,
    ) -> Self {
        let mut outcome = Self::new(source_number, title, state);
        outcome.errors.push(error.to_string());
        outcome
    }
}

/// Complete report for one run.
#[derive(Debug)]
pub struct MigrationReport {
    pub source_repo: String,
    /// None for dry runs and runs where nothing carried the label
    pub fork_full_name: Option<String>,
    pub dry_run: bool,
    /// One entry per labelled PR, in collection order
    pub outcomes: Vec<PrOutcome>,
}

impl MigrationReport {
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| o.state.is_failure())
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.state.is_failure()).count()
    }

    pub fn count_in(&self, state: MigrationState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }
}
