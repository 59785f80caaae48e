use crate::error::{LedgerError, Result};
use std::future::Future;
use tracing::{debug, warn};

/// Runs `attempt` until it stops losing optimistic update races.
///
/// Every attempt must re-read its snapshot, so a retry re-checks all
/// preconditions against the state that won the race.
pub(crate) async fn retry_on_conflict<T, F, Fut>(
    max_retries: u32,
    operation: &'static str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(LedgerError::Conflict) if retries < max_retries => {
                retries += 1;
                debug!(operation, retries, "lost an update race, retrying");
                tokio::task::yield_now().await;
            }
            Err(LedgerError::Conflict) => {
                warn!(operation, retries, "giving up after repeated update conflicts");
                return Err(LedgerError::Conflict);
            }
            other => return other,
        }
    }
}
