//! Handle to numeric id resolution

use crate::error::{HarvestError, ProviderError, Result};
use crate::retry::RetryPolicy;
use crate::session::SessionProvider;
use crate::types::AccountRef;

/// Resolve an account reference to the numeric id the timeline API needs.
///
/// Ids pass through without touching the provider. Handles are looked up
/// under `retry`; an empty session pool or an unknown handle both count as a
/// failed attempt.
pub async fn resolve_account_id(
    provider: &dyn SessionProvider,
    account: &AccountRef,
    retry: &RetryPolicy,
) -> Result<u64> {
    let handle = match account {
        AccountRef::Id(id) => return Ok(*id),
        AccountRef::Handle(handle) => handle.as_str(),
    };

    let label = format!("Resolving @{}", handle);
    let outcome = retry
        .run(&label, |_| async move {
            let active = provider.active_sessions().await?;
            if active == 0 {
                return Err(ProviderError::Authentication(
                    "No accounts in session pool".to_string(),
                ));
            }

            match provider.user_by_login(handle).await? {
                Some(user) => Ok(user),
                None => Err(ProviderError::NotFound(format!("User @{} not found", handle))),
            }
        })
        .await;

    match outcome {
        Ok(user) => {
            tracing::info!("Resolved @{} to user id {}", handle, user.id);
            Ok(user.id)
        }
        Err(e) => {
            tracing::error!("Could not resolve @{}: {}", handle, e);
            Err(HarvestError::Resolution {
                handle: handle.to_string(),
                attempts: retry.attempts,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::{MockConfig, MockProvider};
    use std::time::Duration;

    fn quick_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_numeric_id_skips_lookup() {
        let provider = MockProvider::detached(MockConfig::default());
        let id = resolve_account_id(&provider, &AccountRef::Id(42), &quick_retry())
            .await
            .unwrap();
        assert_eq!(id, 42);
        assert_eq!(provider.config().lookup_calls(), 0);
    }

    #[tokio::test]
    async fn test_handle_resolves_after_transient_failures() {
        let provider = MockProvider::detached(
            MockConfig::default()
                .with_user("rustlang", 42)
                .with_lookup_failures(2),
        );
        let id = resolve_account_id(
            &provider,
            &AccountRef::Handle("rustlang".to_string()),
            &quick_retry(),
        )
        .await
        .unwrap();
        assert_eq!(id, 42);
        assert_eq!(provider.config().lookup_calls(), 3);
    }

    #[tokio::test]
    async fn test_unknown_handle_exhausts_retries() {
        let provider = MockProvider::detached(MockConfig::default());
        let result = resolve_account_id(
            &provider,
            &AccountRef::Handle("nobody".to_string()),
            &quick_retry(),
        )
        .await;

        match result {
            Err(HarvestError::Resolution { handle, attempts }) => {
                assert_eq!(handle, "nobody");
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected Resolution error, got {:?}", other),
        }
        assert_eq!(provider.config().lookup_calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_pool_fails_before_lookup() {
        let provider = MockProvider::detached(MockConfig {
            active_sessions: Some(0),
            ..MockConfig::default().with_user("rustlang", 42)
        });
        let result = resolve_account_id(
            &provider,
            &AccountRef::Handle("rustlang".to_string()),
            &quick_retry(),
        )
        .await;

        assert!(matches!(result, Err(HarvestError::Resolution { .. })));
        assert_eq!(provider.config().lookup_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolution_waits_between_attempts() {
        let provider = MockProvider::detached(MockConfig::default());
        let started = tokio::time::Instant::now();

        let _ = resolve_account_id(
            &provider,
            &AccountRef::Handle("nobody".to_string()),
            &RetryPolicy::from_secs(3, 5),
        )
        .await;

        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }
}
