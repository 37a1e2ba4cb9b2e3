//! Dashboard auth middleware: checks `X-Dashboard-Password` against the
//! configured shared secret, adapted from the teacher's bearer-token
//! `auth_middleware` (same shape, different header and scheme).

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use super::DashboardState;

pub async fn auth_middleware(
    State(state): State<DashboardState>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = headers.get("X-Dashboard-Password").and_then(|v| v.to_str().ok());

    match provided {
        Some(password) if password == state.dashboard_password.as_ref() => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
