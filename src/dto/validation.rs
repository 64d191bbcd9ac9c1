//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::players::Rgb;

/// Validates that a colour is a `#rrggbb` hex value (the leading `#` is optional).
///
/// # Examples
///
/// ```ignore
/// validate_colour("#ff8000") // Ok
/// validate_colour("ff8000")  // Ok
/// validate_colour("orange")  // Err
/// ```
pub fn validate_colour(colour: &str) -> Result<(), ValidationError> {
    colour.parse::<Rgb>().map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("colour_format");
        err.message = Some("Colour must be a #rrggbb hexadecimal value".into());
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_colour_valid() {
        assert!(validate_colour("#ff8000").is_ok());
        assert!(validate_colour("00FF00").is_ok());
    }

    #[test]
    fn test_validate_colour_invalid() {
        assert!(validate_colour("").is_err());
        assert!(validate_colour("#fff").is_err());
        assert!(validate_colour("#ff80001").is_err());
        assert!(validate_colour("orange").is_err());
    }
}
