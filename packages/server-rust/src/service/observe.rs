//! Tracing and metrics instrumentation for service operations.
//!
//! Every [`CrudService`](super::CrudService) operation runs inside a `crud`
//! span carrying the resource name and operation, records its duration and
//! outcome, and feeds the `metrics` facade. Without an installed recorder
//! the metrics calls are no-ops.

use std::future::Future;
use std::time::Instant;

use common_core::{CrudError, ErrorKind};
use tracing::{info_span, Instrument};

/// Service operation names used as span fields and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrudOp {
    Create,
    Get,
    List,
    Update,
    Delete,
}

impl CrudOp {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Get => "get",
            Self::List => "list",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// True for operations that write.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete)
    }
}

/// Outcome label for a finished operation.
#[must_use]
pub fn outcome_label<T>(result: &Result<T, CrudError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(err) => match err.kind() {
            Some(ErrorKind::Validation) => "validation",
            Some(ErrorKind::NotFound) => "not_found",
            Some(ErrorKind::Unauthorized) => "unauthorized",
            None => "store_error",
        },
    }
}

/// Runs `fut` inside a `crud` span and records duration and outcome.
pub async fn instrumented<T, F>(resource: &'static str, op: CrudOp, fut: F) -> Result<T, CrudError>
where
    F: Future<Output = Result<T, CrudError>>,
{
    let span = info_span!(
        "crud",
        resource,
        op = op.as_str(),
        duration_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );

    async move {
        let start = Instant::now();
        let result = fut.await;
        let elapsed = start.elapsed();
        let outcome = outcome_label(&result);

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = elapsed.as_millis() as u64;
        tracing::Span::current().record("duration_ms", duration_ms);
        tracing::Span::current().record("outcome", outcome);

        metrics::counter!(
            "crud_operations_total",
            "resource" => resource,
            "op" => op.as_str(),
            "outcome" => outcome,
        )
        .increment(1);
        metrics::histogram!(
            "crud_operation_duration_seconds",
            "resource" => resource,
            "op" => op.as_str(),
        )
        .record(elapsed.as_secs_f64());

        if let Err(CrudError::Store(err)) = &result {
            tracing::error!(resource, op = op.as_str(), error = %err, "store failure");
        } else if op.is_mutation() {
            tracing::info!(resource, op = op.as_str(), duration_ms, outcome, "operation complete");
        } else {
            tracing::debug!(resource, op = op.as_str(), duration_ms, outcome, "operation complete");
        }

        result
    }
    .instrument(span)
    .await
}
