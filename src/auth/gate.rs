use std::future::Future;
use std::sync::Arc;

use super::claims::Claims;
use super::error::AuthError;
use super::middleware::RequirePermission;
use super::permission::{check_permission, Permission};
use super::validator::CredentialValidator;
use crate::problem::NormalizedError;

/// Credential validation followed by a permission check
///
/// Cheap to clone; the validator is shared behind an `Arc`. The gate keeps no
/// per-request state, so one instance serves every protected route.
#[derive(Clone)]
pub struct AuthorizationGate {
    validator: Arc<CredentialValidator>,
}

impl AuthorizationGate {
    pub fn new(validator: CredentialValidator) -> Self {
        Self {
            validator: Arc::new(validator),
        }
    }

    pub fn validator(&self) -> &CredentialValidator {
        &self.validator
    }

    /// Validate `raw_header` and require `permission`
    ///
    /// The permission check only runs once the credential has verified.
    pub async fn authorize(
        &self,
        raw_header: Option<&str>,
        permission: &Permission,
    ) -> Result<Claims, AuthError> {
        let claims = self.validator.validate(raw_header).await?;
        check_permission(&claims, permission)?;
        Ok(claims)
    }

    /// Run `handler` with the verified claims, or deny without running it
    pub async fn admit<F, Fut, T>(
        &self,
        raw_header: Option<&str>,
        permission: &Permission,
        handler: F,
    ) -> Result<T, NormalizedError>
    where
        F: FnOnce(Claims) -> Fut,
        Fut: Future<Output = T>,
    {
        let claims = self.enforce(raw_header, permission).await?;
        Ok(handler(claims).await)
    }

    /// [`AuthorizationGate::authorize`], with denials logged and normalized
    pub(crate) async fn enforce(
        &self,
        raw_header: Option<&str>,
        permission: &Permission,
    ) -> Result<Claims, NormalizedError> {
        self.authorize(raw_header, permission).await.map_err(|err| {
            tracing::info!(permission = %permission, kind = ?err, "request denied");
            err.to_normalized()
        })
    }

    /// Middleware layer enforcing `permission` on the routes it wraps
    pub fn require(&self, permission: Permission) -> RequirePermission {
        RequirePermission::new(self.clone(), permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::validator::ValidationOptions;
    use crate::testutil::{mint, now, TokenSpec, TEST_SECRET};
    use jsonwebtoken::Algorithm;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn gate() -> AuthorizationGate {
        let validator =
            CredentialValidator::with_secret(Algorithm::HS256, TEST_SECRET, ValidationOptions::default())
                .unwrap();
        AuthorizationGate::new(validator)
    }

    fn bearer(permissions: &[&str]) -> String {
        format!("Bearer {}", mint(&TokenSpec::new(permissions)))
    }

    #[tokio::test]
    async fn test_authorize_grants_matching_permission() {
        let required = Permission::new("get:posts").unwrap();
        let claims = gate()
            .authorize(Some(&bearer(&["get:posts"])), &required)
            .await
            .unwrap();
        assert_eq!(claims.subject(), "auth0|tester");
    }

    #[tokio::test]
    async fn test_validation_precedes_permission_check() {
        // expired and under-scoped: the credential failure wins
        let mut spec = TokenSpec::new(&[]);
        spec.exp = now() - 3600;
        let header = format!("Bearer {}", mint(&spec));

        let required = Permission::new("post:post").unwrap();
        let err = gate().authorize(Some(&header), &required).await.unwrap_err();
        assert_eq!(err, AuthError::Expired);
    }

    #[tokio::test]
    async fn test_admit_runs_handler_once() {
        let calls = AtomicUsize::new(0);
        let required = Permission::new("post:post").unwrap();

        let result = gate()
            .admit(Some(&bearer(&["post:post"])), &required, |claims| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { claims.subject().to_string() }
            })
            .await;

        assert_eq!(result.unwrap(), "auth0|tester");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_admit_denies_without_running_handler() {
        let calls = AtomicUsize::new(0);
        let required = Permission::new("post:post").unwrap();

        let denied = gate()
            .admit(Some(&bearer(&["get:posts"])), &required, |_claims| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {}
            })
            .await
            .unwrap_err();

        assert_eq!(denied.code(), 403);
        assert_eq!(denied.title(), "Forbidden");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_admit_missing_header_is_401() {
        let required = Permission::new("get:posts").unwrap();
        let denied = gate()
            .admit(None, &required, |_claims| async {})
            .await
            .unwrap_err();
        assert_eq!(denied.code(), 401);
    }
}
