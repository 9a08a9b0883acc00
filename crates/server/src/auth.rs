use core::convert::Infallible;
use core::task::{Context, Poll};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::future::BoxFuture;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::config::AuthConfig;
use crate::error::ApiError;

/// Hex SHA-256 of a password, the form stored in `[sync.users]`.
#[must_use]
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Rejects callers without the sync capability.
///
/// Every such caller gets 403, anonymous ones with a `WWW-Authenticate` hint.
#[derive(Clone, Debug)]
pub struct SyncAuthLayer {
    config: Arc<AuthConfig>,
}

impl SyncAuthLayer {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for SyncAuthLayer {
    type Service = SyncAuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SyncAuthMiddleware {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SyncAuthMiddleware<S> {
    inner: S,
    config: Arc<AuthConfig>,
}

impl<S> Service<Request<Body>> for SyncAuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>, Error = Infallible> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        if let Err(err) = authorize(request.headers(), &self.config) {
            let response = err.into_response();
            return Box::pin(async move { Ok(response) });
        }

        Box::pin(self.inner.call(request))
    }
}

fn authorize(headers: &HeaderMap, config: &AuthConfig) -> Result<(), ApiError> {
    if !config.require_auth {
        return Ok(());
    }

    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(ApiError::challenge(
            StatusCode::FORBIDDEN,
            "sync credentials required",
        ));
    };

    let forbidden = || ApiError::new(StatusCode::FORBIDDEN, "caller lacks the sync capability");

    let (username, password) = value
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Basic "))
        .and_then(|encoded| STANDARD.decode(encoded.trim()).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .and_then(|decoded| {
            decoded
                .split_once(':')
                .map(|(user, pass)| (user.to_owned(), pass.to_owned()))
        })
        .ok_or_else(forbidden)?;

    let Some(user) = config.users.get(&username) else {
        debug!(%username, "Unknown sync user");
        return Err(forbidden());
    };

    let Ok(expected) = hex::decode(&user.password_sha256) else {
        warn!(%username, "Stored password hash is not valid hex");
        return Err(forbidden());
    };

    let matches: bool = Sha256::digest(password.as_bytes())
        .as_slice()
        .ct_eq(&expected)
        .into();

    if !matches {
        debug!(%username, "Wrong password for sync user");
        return Err(forbidden());
    }

    Ok(())
}
