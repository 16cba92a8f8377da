//! Stage descriptors and the executor capability.
//!
//! A [`Stage`] is a static description of one verification step. The real
//! work is delegated to a [`StageExecutor`], which the engine awaits and
//! whose outcome drives the run state machine.

pub mod catalog;
mod simulated;

pub use simulated::SimulatedExecutor;

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt::Debug;
use std::sync::Arc;
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::core::{DocumentHandle, DocumentType};

/// What an executor reports when it settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage's check passed.
    Success,
    /// The stage's check failed, with a reason.
    Failure(String),
}

impl StageOutcome {
    /// Creates a success outcome.
    #[must_use]
    pub fn success() -> Self {
        Self::Success
    }

    /// Creates a failure outcome.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    /// Returns true for `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl<E: std::fmt::Display> From<Result<(), E>> for StageOutcome {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(e) => Self::Failure(e.to_string()),
        }
    }
}

/// Everything an executor may look at while running one stage.
#[derive(Debug, Clone)]
pub struct StageContext {
    run_id: Uuid,
    stage_id: String,
    stage_index: usize,
    document: DocumentHandle,
    document_type: DocumentType,
    cancellation: Arc<CancellationToken>,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        stage_id: impl Into<String>,
        stage_index: usize,
        document: DocumentHandle,
        document_type: DocumentType,
        cancellation: Arc<CancellationToken>,
    ) -> Self {
        Self {
            run_id,
            stage_id: stage_id.into(),
            stage_index,
            document,
            document_type,
            cancellation,
        }
    }

    /// The run this stage belongs to.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The id of the stage being executed.
    #[must_use]
    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    /// The position of the stage being executed.
    #[must_use]
    pub fn stage_index(&self) -> usize {
        self.stage_index
    }

    /// The document under verification.
    #[must_use]
    pub fn document(&self) -> &DocumentHandle {
        &self.document
    }

    /// The document's classification.
    #[must_use]
    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    /// The run's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    /// Returns true once the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once the run has been cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }
}

/// The external operation that performs a stage's real work.
///
/// Executors should stop early once `ctx.is_cancelled()`; the engine
/// discards any result that arrives after cancellation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StageExecutor: Send + Sync + Debug {
    /// Runs the stage against the context's document.
    async fn execute(&self, ctx: &StageContext) -> StageOutcome;
}

/// Static descriptor of one verification stage.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Unique, stable id.
    pub id: String,
    /// Short display title.
    pub title: String,
    /// One-line display description.
    pub description: String,
    /// The capability that performs the stage's work.
    pub executor: Arc<dyn StageExecutor>,
}

impl Stage {
    /// Creates a new stage descriptor.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        executor: Arc<dyn StageExecutor>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            executor,
        }
    }
}

type ExecutorFn = dyn Fn(StageContext) -> BoxFuture<'static, StageOutcome> + Send + Sync;

/// An executor backed by an async closure.
pub struct FnExecutor {
    name: String,
    func: Box<ExecutorFn>,
}

impl FnExecutor {
    /// Creates a new closure-backed executor.
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(StageContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = StageOutcome> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(move |ctx| -> BoxFuture<'static, StageOutcome> { Box::pin(func(ctx)) }),
        }
    }
}

impl Debug for FnExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnExecutor").field("name", &self.name).finish()
    }
}

#[async_trait]
impl StageExecutor for FnExecutor {
    async fn execute(&self, ctx: &StageContext) -> StageOutcome {
        (self.func)(ctx.clone()).await
    }
}

#[cfg(test)]
pub(crate) fn test_stage_context(stage_id: &str) -> StageContext {
    StageContext::new(
        Uuid::new_v4(),
        stage_id,
        0,
        DocumentHandle::new("passport_scan.pdf", 1024),
        DocumentType::GovernmentId,
        Arc::new(CancellationToken::new()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_executor() {
        let executor = FnExecutor::new("doc-check", |ctx: StageContext| async move {
            if ctx.document_type() == DocumentType::GovernmentId {
                StageOutcome::success()
            } else {
                StageOutcome::failure("wrong type")
            }
        });

        let ctx = test_stage_context("analysis");
        assert!(executor.execute(&ctx).await.is_success());
        assert!(format!("{executor:?}").contains("doc-check"));
    }

    #[tokio::test]
    async fn test_mock_executor_via_mockall() {
        let mut mock = MockStageExecutor::new();
        mock.expect_execute()
            .times(1)
            .returning(|ctx| StageOutcome::failure(format!("{} rejected", ctx.stage_id())));

        let ctx = test_stage_context("authenticity_check");
        assert_eq!(
            mock.execute(&ctx).await,
            StageOutcome::Failure("authenticity_check rejected".to_string())
        );
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: StageOutcome = Ok::<(), String>(()).into();
        assert!(ok.is_success());

        let err: StageOutcome = Err::<(), _>("hash mismatch").into();
        assert_eq!(err, StageOutcome::failure("hash mismatch"));
    }

    #[test]
    fn test_context_accessors() {
        let ctx = test_stage_context("scan");
        assert_eq!(ctx.stage_id(), "scan");
        assert_eq!(ctx.stage_index(), 0);
        assert_eq!(ctx.document().name, "passport_scan.pdf");
        assert!(!ctx.is_cancelled());

        ctx.cancellation().cancel("user");
        assert!(ctx.is_cancelled());
    }
}
