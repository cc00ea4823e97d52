//! Worker identity extraction
//!
//! Authentication is handled upstream (gateway/out of scope); this core
//! receives an already-verified opaque worker id plus branch in request
//! headers and only needs them to key ledger records and order role
//! assignments.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

const WORKER_ID_HEADER: &str = "x-worker-id";
const BRANCH_ID_HEADER: &str = "x-branch-id";

/// The acting worker, extracted from trusted headers.
#[derive(Clone, Debug)]
pub struct CurrentWorker {
    pub worker_id: Uuid,
    pub branch_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentWorker
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let worker_id = header_uuid(parts, WORKER_ID_HEADER)?;
        let branch_id = header_uuid(parts, BRANCH_ID_HEADER)?;
        Ok(CurrentWorker {
            worker_id,
            branch_id,
        })
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Uuid, AppError> {
    let value = parts
        .headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::NotAuthorized(format!("missing {} header", name)))?;

    value
        .parse()
        .map_err(|_| AppError::NotAuthorized(format!("invalid {} header", name)))
}
