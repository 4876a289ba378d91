use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use tower::Layer;
use tower::Service;

use super::gate::AuthorizationGate;
use super::permission::Permission;
use crate::axum_integration::{bearer_header, Authorized};

/// Middleware layer that requires a single permission on every request
///
/// Built at route registration, one per protected operation:
///
/// ```rust,ignore
/// let app = Router::new().route(
///     "/posts/",
///     get(list_posts.layer(gate.require("get:posts".parse()?)))
///         .post(create_post.layer(gate.require("post:post".parse()?))),
/// );
/// ```
#[derive(Clone)]
pub struct RequirePermission {
    gate: AuthorizationGate,
    permission: Permission,
}

impl RequirePermission {
    pub fn new(gate: AuthorizationGate, permission: Permission) -> Self {
        Self { gate, permission }
    }

    pub fn permission(&self) -> &Permission {
        &self.permission
    }
}

impl<S> Layer<S> for RequirePermission {
    type Service = RequirePermissionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequirePermissionMiddleware {
            inner,
            gate: self.gate.clone(),
            permission: self.permission.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequirePermissionMiddleware<S> {
    inner: S,
    gate: AuthorizationGate,
    permission: Permission,
}

impl<S> Service<Request> for RequirePermissionMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        // take the service that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let gate = self.gate.clone();
        let permission = self.permission.clone();

        Box::pin(async move {
            let raw_header = match bearer_header(request.headers()) {
                Ok(value) => value.map(str::to_string),
                Err(err) => return Ok(err.into_response()),
            };

            match gate.enforce(raw_header.as_deref(), &permission).await {
                Ok(claims) => {
                    request.extensions_mut().insert(Authorized(claims));
                    inner.call(request).await
                }
                Err(denied) => Ok(denied.into_response()),
            }
        })
    }
}
