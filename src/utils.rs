use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::oneshot;
use tokio::time::{timeout_at, Instant};

use crate::error::PipelineError;

/// Runs the future until the optional deadline, dropping (and so cancelling)
/// it if the deadline passes first.
pub async fn with_deadline<F: Future>(
    deadline: Option<Instant>,
    stage: &'static str,
    fut: F,
) -> Result<F::Output, PipelineError> {
    match deadline {
        Some(deadline) => timeout_at(deadline, fut)
            .await
            .map_err(|_| PipelineError::Timeout { stage }),
        None => Ok(fut.await),
    }
}

/// Runs a CPU bound closure on the rayon pool.
///
/// Returns `None` if the closure panicked, the panic is caught on the pool
/// thread and never reaches rayon's abort handler.
pub async fn run_on_pool<F, T>(func: F) -> Option<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    rayon::spawn(move || {
        let result = catch_unwind(AssertUnwindSafe(func));

        // The receiver going away means the caller was cancelled.
        let _ = tx.send(result);
    });

    rx.await.ok()?.ok()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn no_deadline_waits_for_completion() {
        let value = with_deadline(None, "testing", async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn expired_deadlines_cancel_the_future() {
        let deadline = Instant::now() + Duration::from_millis(10);
        let err = with_deadline(Some(deadline), "sleeping", tokio::time::sleep(Duration::from_secs(30)))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Timeout { stage: "sleeping" }));
    }

    #[tokio::test]
    async fn pool_work_is_returned() {
        assert_eq!(run_on_pool(|| 21 * 2).await, Some(42));
    }

    #[tokio::test]
    async fn panicking_work_yields_none() {
        let result = run_on_pool(|| -> u32 { panic!("decoder bug") }).await;
        assert_eq!(result, None);

        // The pool is still usable afterwards.
        assert_eq!(run_on_pool(|| 1 + 1).await, Some(2));
    }
}
