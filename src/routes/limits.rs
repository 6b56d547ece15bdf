//! Admission middleware
//!
//! Wraps routes in the streaming or unary pool of the [`AdmissionController`].
//!
//! [`AdmissionController`]: crate::admission::AdmissionController

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::StreamExt;

use crate::state::AppState;

/// Admit into the streaming pool.
///
/// The response body of a download is produced after the handler returns, so
/// the slot moves into the body and is released when the body finishes or is
/// dropped by a disconnecting client. Bodies of known length are already
/// complete and release the slot immediately.
pub async fn admit_streaming(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let permit = match state.admission().streaming().try_acquire() {
        Ok(permit) => permit,
        Err(e) => return e.into_response(),
    };

    let response = next.run(request).await;
    if response.body().size_hint().exact().is_some() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let body = Body::from_stream(body.into_data_stream().map(move |frame| {
        let _held = &permit;
        frame
    }));
    Response::from_parts(parts, body)
}

/// Admit into the unary pool; the slot is released when the handler returns.
pub async fn admit_unary(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match state.admission().unary().try_acquire() {
        Ok(_permit) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
