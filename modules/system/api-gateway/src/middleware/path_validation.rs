//! Request path validation.
//!
//! Route authorization and upstream matching compare the raw request path.
//! A path that an upstream could resolve to a different resource (dot
//! segments, empty segments, encoded separators) is refused with 400 before
//! either of them sees it.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::problem::Problem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AmbiguousPath {
    #[error("path contains a '.' or '..' segment")]
    DotSegment,

    #[error("path contains an empty segment")]
    EmptySegment,

    #[error("path contains an encoded or alternative path separator")]
    Separator,
}

/// Check that `path` names exactly one resource without normalization.
///
/// A trailing `/` is allowed; `.` and `..` are recognised raw and
/// percent-encoded (`%2e`, any case).
///
/// # Errors
/// Returns the first [`AmbiguousPath`] reason found.
pub fn check_path(path: &str) -> Result<(), AmbiguousPath> {
    let rest = path.strip_prefix('/').unwrap_or(path);
    let mut segments = rest.split('/').peekable();

    while let Some(segment) = segments.next() {
        if segment.is_empty() {
            if segments.peek().is_some() {
                return Err(AmbiguousPath::EmptySegment);
            }
            continue;
        }

        let lowered = segment.to_ascii_lowercase();
        if lowered.contains("%2f") || lowered.contains("%5c") || lowered.contains('\\') {
            return Err(AmbiguousPath::Separator);
        }

        let decoded = lowered.replace("%2e", ".");
        if decoded == "." || decoded == ".." {
            return Err(AmbiguousPath::DotSegment);
        }
    }

    Ok(())
}

/// 400 Problem for a refused path.
#[must_use]
pub fn ambiguous_path_response(reason: AmbiguousPath, path: &str) -> Response {
    Problem::new(StatusCode::BAD_REQUEST, "Bad Request", reason.to_string())
        .with_instance(path)
        .into_response()
}

/// Path validation middleware. Runs before the security context loader.
pub async fn reject_ambiguous_path(req: Request, next: Next) -> Response {
    match check_path(req.uri().path()) {
        Ok(()) => next.run(req).await,
        Err(reason) => {
            tracing::warn!(
                method = %req.method(),
                path = %req.uri().path(),
                reason = %reason,
                "refusing request with ambiguous path"
            );
            ambiguous_path_response(reason, req.uri().path())
        }
    }
}
