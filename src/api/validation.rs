use thiserror::Error;

use super::models::IngestRequest;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestValidationError {
    #[error("server_id must not be empty")]
    EmptyServerId,
    #[error("uuid must not be blank when present")]
    BlankUuid,
}

pub fn validate_ingest(request: &IngestRequest) -> Result<(), IngestValidationError> {
    if request.server_id.trim().is_empty() {
        return Err(IngestValidationError::EmptyServerId);
    }

    if request.uuid.as_deref().is_some_and(|uuid| uuid.trim().is_empty()) {
        return Err(IngestValidationError::BlankUuid);
    }

    Ok(())
}
