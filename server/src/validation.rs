use crate::error::ApiError;

/// Validate a generation request.
///
/// Only emptiness is checked. Length, content (whitespace included) and
/// speaker range are left to the model.
pub fn validate_generate_request(text: &str) -> Result<(), ApiError> {
    if text.is_empty() {
        return Err(ApiError::invalid("text cannot be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_validate_generate_request_valid() {
        assert!(validate_generate_request("hello").is_ok());
        assert!(validate_generate_request(" a ").is_ok());
        assert!(validate_generate_request("   ").is_ok());
        assert!(validate_generate_request("\n\t").is_ok());
        // No upper bound on length
        assert!(validate_generate_request(&"a".repeat(20_000)).is_ok());
    }

    #[test]
    fn test_validate_generate_request_empty_text() {
        match validate_generate_request("") {
            Err(ApiError::InvalidInput(msg, status)) => {
                assert!(msg.contains("empty"));
                assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            }
            _ => panic!("expected InvalidInput for empty text"),
        }
    }
}
