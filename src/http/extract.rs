//! Request extractors.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::{self, proxy, AuthInputs, Principal};
use crate::state::AppState;
use crate::AppError;

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

impl FromRequestParts<Arc<AppState>> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_owned);

        let inputs = AuthInputs {
            bearer,
            proxy_project_id: header_value(parts, proxy::PROJECT_HEADER),
            proxy_agent_id: header_value(parts, proxy::AGENT_HEADER),
            proxy_signature: header_value(parts, proxy::SIGNATURE_HEADER),
        };

        auth::authenticate(state, &inputs).await
    }
}
