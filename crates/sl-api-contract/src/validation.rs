//! Validation helpers for API contract types

use crate::error::ApiContractError;
use crate::types::*;
use validator::Validate;

/// Validate a session query before issuing either backend request
pub fn validate_session_query(query: &SessionQuery) -> Result<(), ApiContractError> {
    query.validate()?;
    Ok(())
}
