//! Common validation utilities.

use validator::ValidationError;

/// Largest page a history listing may request.
pub const MAX_PAGE_LIMIT: i64 = 500;

/// Validates that a page limit is within 1..=MAX_PAGE_LIMIT.
pub fn validate_page_limit(limit: i64) -> Result<(), ValidationError> {
    if (1..=MAX_PAGE_LIMIT).contains(&limit) {
        Ok(())
    } else {
        let mut err = ValidationError::new("limit_range");
        err.message = Some(format!("Limit must be between 1 and {}", MAX_PAGE_LIMIT).into());
        Err(err)
    }
}
