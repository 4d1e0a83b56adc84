use tracing::warn;
use uuid::Uuid;

use crate::engine::dispatcher::DispatchJob;
use crate::error::AppError;
use crate::state::AppState;

pub fn enqueue_dispatch(state: &AppState, order_id: Uuid) -> Result<(), AppError> {
    // Counted before the send so the consumer's decrement never runs first.
    state.metrics.dispatch_jobs_in_queue.inc();

    if let Err(err) = state.dispatch_tx.try_send(DispatchJob { order_id }) {
        state.metrics.dispatch_jobs_in_queue.dec();
        state.metrics.dispatch_enqueue_failures_total.inc();
        warn!(order_id = %order_id, error = %err, "order not queued for matching");
        return Err(AppError::Internal(format!("dispatch queue unavailable: {err}")));
    }

    Ok(())
}
