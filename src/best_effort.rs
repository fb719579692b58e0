use std::fmt::Display;
use std::future::Future;

use tracing::warn;

/// Await a side-channel operation whose failure must not affect the caller.
///
/// Errors are logged under `operation = label` and turned into `None`.
pub async fn best_effort<F, T, E>(label: &'static str, operation: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match operation.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(operation = label, error = %e, "Best-effort operation failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failures_become_none() {
        let ok = best_effort("ok", async { Ok::<_, String>(7) }).await;
        assert_eq!(ok, Some(7));

        let failed = best_effort("flush", async { Err::<u8, _>("sink unreachable") }).await;
        assert_eq!(failed, None);
    }
}
