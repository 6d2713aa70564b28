//! HTTP application state: wraps `ServiceState` with HTTP-specific fields.
//!
//! `AppState` provides transparent access to all `ServiceState` methods
//! via `Deref`, and adds the parsed CORS policy.

use std::ops::Deref;
use std::sync::Arc;

use axum::http::HeaderValue;

use seon_service::ServiceState;

/// Startup failure for a configured CORS origin.
#[derive(Debug, thiserror::Error)]
#[error("invalid CORS origin '{0}'")]
pub struct InvalidOrigin(pub String);

/// Cross-origin policy derived from the configured origin list.
#[derive(Debug, Clone)]
pub enum CorsOrigins {
    /// No origins configured: no CORS headers are sent.
    Disabled,
    /// A single `*` entry.
    Any,
    List(Vec<HeaderValue>),
}

impl CorsOrigins {
    pub fn parse(origins: &[String]) -> Result<Self, InvalidOrigin> {
        match origins {
            [] => Ok(Self::Disabled),
            [only] if only == "*" => Ok(Self::Any),
            _ => origins
                .iter()
                .map(|o| HeaderValue::from_str(o).map_err(|_| InvalidOrigin(o.clone())))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
        }
    }
}

/// Shared HTTP application state, cloneable across handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppInner>,
}

struct AppInner {
    service: ServiceState,
    cors: CorsOrigins,
}

impl Deref for AppState {
    type Target = ServiceState;

    fn deref(&self) -> &ServiceState {
        &self.inner.service
    }
}

impl AppState {
    /// Creates the HTTP state, validating the CORS origins.
    pub fn new(service: ServiceState, cors_origins: &[String]) -> Result<Self, InvalidOrigin> {
        Ok(Self::with_cors(service, CorsOrigins::parse(cors_origins)?))
    }

    pub fn with_cors(service: ServiceState, cors: CorsOrigins) -> Self {
        Self {
            inner: Arc::new(AppInner { service, cors }),
        }
    }

    pub fn cors(&self) -> &CorsOrigins {
        &self.inner.cors
    }

    /// Returns a reference to the underlying service state.
    pub fn service(&self) -> &ServiceState {
        &self.inner.service
    }
}
