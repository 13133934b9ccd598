//! Axum integration utilities.
//!
//! [`AuthorizeLayer`] is the explicit guard for a route: it takes the
//! [`Identity`] a previous layer put in the request extensions, reads the
//! target scope node from the query string or the matched route parameters,
//! and runs [`Engine::authorize`]. Apply it with `Router::route_layer` so the
//! route parameters are already matched.

use std::collections::HashMap;
use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::context::{Identity, RequestContext};
use crate::engine::{Decision, DenyReason, Engine};
use crate::policy::{PolicyRegistry, Requirement};

use ::axum::body::Body;
use ::axum::extract::{FromRequestParts, Query, RawPathParams};
use ::axum::http::{Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::http::request::Parts;
use ::tower::{Layer, Service};
use tracing::error;

/// Builds the pipeline input from request parts.
pub async fn request_context(parts: &mut Parts) -> RequestContext {
    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(query)| query)
        .unwrap_or_default();
    let route: HashMap<String, String> = RawPathParams::from_request_parts(parts, &())
        .await
        .map(|params| {
            params
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let context = match parts.extensions.get::<Identity>() {
        Some(identity) => RequestContext::new(identity.clone()),
        None => RequestContext::anonymous(),
    };
    context.with_query_params(query).with_route_params(route)
}

/// Middleware layer that authorizes a request using [`Engine`].
#[derive(Debug)]
pub struct AuthorizeLayer<S, C> {
    engine: Arc<Engine<S, C>>,
    requirement: Requirement,
}

impl<S, C> Clone for AuthorizeLayer<S, C> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            requirement: self.requirement.clone(),
        }
    }
}

impl<S, C> AuthorizeLayer<S, C> {
    /// Creates a new authorization layer.
    pub fn new(engine: Arc<Engine<S, C>>, requirement: Requirement) -> Self {
        Self {
            engine,
            requirement,
        }
    }

    /// Creates a layer for a policy name, failing on names the registry does
    /// not know.
    pub fn from_policy(
        engine: Arc<Engine<S, C>>,
        registry: &PolicyRegistry,
        name: &str,
    ) -> crate::error::Result<Self> {
        Ok(Self::new(engine, registry.resolve(name)?))
    }
}

impl<S, C, Inner> Layer<Inner> for AuthorizeLayer<S, C>
where
    S: crate::store::Store,
    C: crate::cache::Cache,
{
    type Service = AuthorizeService<Inner, S, C>;

    fn layer(&self, inner: Inner) -> Self::Service {
        AuthorizeService {
            inner,
            engine: self.engine.clone(),
            requirement: self.requirement.clone(),
        }
    }
}

/// Middleware service that enforces a [`Requirement`].
#[derive(Debug)]
pub struct AuthorizeService<Inner, S, C> {
    inner: Inner,
    engine: Arc<Engine<S, C>>,
    requirement: Requirement,
}

impl<Inner: Clone, S, C> Clone for AuthorizeService<Inner, S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            engine: self.engine.clone(),
            requirement: self.requirement.clone(),
        }
    }
}

impl<Inner, S, C> Service<Request<Body>> for AuthorizeService<Inner, S, C>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    S: crate::store::Store + 'static,
    C: crate::cache::Cache + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let engine = self.engine.clone();
        let requirement = self.requirement.clone();

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();
            let context = request_context(&mut parts).await;

            match engine.authorize(&requirement, &context).await {
                Ok(Decision::Allow) => {
                    let req = Request::from_parts(parts, body);
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Ok(Decision::Deny(DenyReason::AuthenticationRequired)) => {
                    Ok((StatusCode::UNAUTHORIZED, "authentication required").into_response())
                }
                Ok(Decision::Deny(_)) => Ok((StatusCode::FORBIDDEN, "forbidden").into_response()),
                Err(err) => {
                    error!(error = %err, permission = %requirement, "authorization failed");
                    Ok((StatusCode::INTERNAL_SERVER_ERROR, "auth error").into_response())
                }
            }
        })
    }
}

#[cfg(feature = "axum-jwt")]
pub mod jwt {
    //! Bearer-token verification into an [`Identity`].
    //!
    //! Tokens are only verified here. Issuing them is left to the application.

    use std::fmt;
    use std::future::{Future, ready};
    use std::marker::PhantomData;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use jsonwebtoken::{DecodingKey, Validation, decode};
    use serde::de::DeserializeOwned;
    use thiserror::Error;
    use tracing::debug;

    use crate::context::Identity;
    use crate::permission::PermissionCode;
    use crate::types::{CompanyId, RoleCode, ScopeNodeId, UserId};

    use ::axum::extract::{FromRef, FromRequestParts};
    use ::axum::http::header::AUTHORIZATION;
    use ::axum::http::request::Parts;
    use ::axum::http::{HeaderMap, Request, StatusCode};
    use ::axum::response::{IntoResponse, Response};
    use ::tower::{Layer, Service};

    /// Why a bearer token did not yield an identity.
    #[derive(Debug, Error)]
    pub enum JwtError {
        #[error("missing bearer token")]
        MissingToken,
        #[error("malformed authorization header")]
        MalformedHeader,
        #[error("token rejected: {0}")]
        Rejected(#[from] jsonwebtoken::errors::Error),
        #[error("invalid claims: {0}")]
        Claims(#[from] crate::error::Error),
    }

    impl IntoResponse for JwtError {
        fn into_response(self) -> Response {
            debug!(error = %self, "bearer token rejected");
            (StatusCode::UNAUTHORIZED, "authentication required").into_response()
        }
    }

    /// Token claims that can be turned into an [`Identity`].
    pub trait IdentityClaims: DeserializeOwned + Clone {
        fn into_identity(self) -> crate::error::Result<Identity>;
    }

    /// `{ user_id, roles, permissions, scope_node_id, company_id, exp }`
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct DefaultClaims {
        pub user_id: i64,
        #[serde(default)]
        pub roles: Vec<String>,
        #[serde(default)]
        pub permissions: Vec<String>,
        #[serde(default)]
        pub scope_node_id: Option<i64>,
        #[serde(default)]
        pub company_id: Option<i64>,
        pub exp: u64,
    }

    impl IdentityClaims for DefaultClaims {
        fn into_identity(self) -> crate::error::Result<Identity> {
            let mut identity = Identity::new(UserId::new(self.user_id));
            for role in self.roles {
                identity = identity.with_role(RoleCode::new(role)?);
            }
            for code in self.permissions {
                identity = identity.with_permission(PermissionCode::new(code)?);
            }
            identity.scope_node_id = self.scope_node_id.map(ScopeNodeId::new);
            identity.company_id = self.company_id.map(CompanyId::new);
            Ok(identity)
        }
    }

    /// Verifies bearer tokens with a fixed key and validation policy.
    pub struct JwtVerifier<C = DefaultClaims> {
        key: DecodingKey,
        validation: Validation,
        claims: PhantomData<fn() -> C>,
    }

    impl<C> fmt::Debug for JwtVerifier<C> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("JwtVerifier")
                .field("key", &"<redacted>")
                .field("validation", &self.validation)
                .finish()
        }
    }

    impl JwtVerifier<DefaultClaims> {
        /// HMAC secret with the default validation (HS256, `exp` required).
        pub fn from_secret(secret: &[u8]) -> Self {
            Self::new(DecodingKey::from_secret(secret), Validation::default())
        }
    }

    impl<C: IdentityClaims> JwtVerifier<C> {
        pub fn new(key: DecodingKey, validation: Validation) -> Self {
            Self {
                key,
                validation,
                claims: PhantomData,
            }
        }

        /// Verifies a raw token.
        pub fn verify(&self, token: &str) -> Result<Identity, JwtError> {
            let data = decode::<C>(token, &self.key, &self.validation)?;
            Ok(data.claims.into_identity()?)
        }

        /// Verifies the `Authorization: Bearer` header.
        pub fn verify_headers(&self, headers: &HeaderMap) -> Result<Identity, JwtError> {
            self.verify(bearer_token(headers)?)
        }
    }

    /// Extracts the identity placed by [`JwtLayer`], or verifies the header
    /// with the [`JwtVerifier`] held in the router state.
    impl<S> FromRequestParts<S> for Identity
    where
        S: Send + Sync,
        Arc<JwtVerifier>: FromRef<S>,
    {
        type Rejection = JwtError;

        async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
            if let Some(identity) = parts.extensions.get::<Identity>() {
                return Ok(identity.clone());
            }
            let verifier = Arc::<JwtVerifier>::from_ref(state);
            let identity = verifier.verify_headers(&parts.headers)?;
            parts.extensions.insert(identity.clone());
            Ok(identity)
        }
    }

    /// Rejects requests without a valid bearer token and stores the verified
    /// [`Identity`] in the request extensions for [`super::AuthorizeLayer`].
    #[derive(Debug)]
    pub struct JwtLayer<C = DefaultClaims> {
        verifier: Arc<JwtVerifier<C>>,
    }

    impl<C> Clone for JwtLayer<C> {
        fn clone(&self) -> Self {
            Self {
                verifier: self.verifier.clone(),
            }
        }
    }

    impl<C> JwtLayer<C> {
        pub fn new(verifier: Arc<JwtVerifier<C>>) -> Self {
            Self { verifier }
        }
    }

    impl<Inner, C> Layer<Inner> for JwtLayer<C> {
        type Service = JwtService<Inner, C>;

        fn layer(&self, inner: Inner) -> Self::Service {
            JwtService {
                inner,
                verifier: self.verifier.clone(),
            }
        }
    }

    #[derive(Debug)]
    pub struct JwtService<Inner, C = DefaultClaims> {
        inner: Inner,
        verifier: Arc<JwtVerifier<C>>,
    }

    impl<Inner: Clone, C> Clone for JwtService<Inner, C> {
        fn clone(&self) -> Self {
            Self {
                inner: self.inner.clone(),
                verifier: self.verifier.clone(),
            }
        }
    }

    impl<Inner, B, C> Service<Request<B>> for JwtService<Inner, C>
    where
        Inner: Service<Request<B>, Response = Response> + Clone,
        Inner::Future: Send + 'static,
        Inner::Error: Send + 'static,
        C: IdentityClaims,
    {
        type Response = Response;
        type Error = Inner::Error;
        type Future = Pin<Box<dyn Future<Output = Result<Response, Inner::Error>> + Send>>;

        fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            self.inner.poll_ready(cx)
        }

        fn call(&mut self, mut req: Request<B>) -> Self::Future {
            match self.verifier.verify_headers(req.headers()) {
                Ok(identity) => {
                    req.extensions_mut().insert(identity);
                    // Call the instance that was driven to readiness.
                    let clone = self.inner.clone();
                    let mut inner = std::mem::replace(&mut self.inner, clone);
                    Box::pin(inner.call(req))
                }
                Err(err) => Box::pin(ready(Ok(err.into_response()))),
            }
        }
    }

    fn bearer_token(headers: &HeaderMap) -> Result<&str, JwtError> {
        let value = headers.get(AUTHORIZATION).ok_or(JwtError::MissingToken)?;
        let value = value.to_str().map_err(|_| JwtError::MalformedHeader)?;
        match value.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => Ok(token.trim()),
            _ => Err(JwtError::MalformedHeader),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ScopeNodeId, UserId};
    use futures::executor::block_on;

    #[test]
    fn request_context_should_read_query_and_identity() {
        let identity = Identity::new(UserId::new(1)).with_scope_node(ScopeNodeId::new(10));
        let (mut parts, _) = Request::builder()
            .uri("/products?scopeNodeId=55")
            .extension(identity.clone())
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let context = block_on(request_context(&mut parts));

        assert_eq!(context.identity(), Some(&identity));
        assert_eq!(context.param("scopeNodeId"), Some("55"));
    }

    #[test]
    fn request_context_should_be_anonymous_without_identity() {
        let (mut parts, _) = Request::builder()
            .uri("/products")
            .body(Body::empty())
            .unwrap()
            .into_parts();

        let context = block_on(request_context(&mut parts));

        assert!(context.identity().is_none());
        assert_eq!(context.param("scopeNodeId"), None);
    }
}
