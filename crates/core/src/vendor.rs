//! Vendor contact rules.

use validator::{ValidateEmail, ValidateUrl};

use crate::error::CoreError;

pub const MAX_VENDOR_NAME_LENGTH: usize = 255;

/// Email is the vendor's unique contact key and is stored lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_vendor_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput(
            "Vendor name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_VENDOR_NAME_LENGTH {
        return Err(CoreError::InvalidInput(format!(
            "Vendor name must be at most {MAX_VENDOR_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_vendor_email(email: &str) -> Result<(), CoreError> {
    if !normalize_email(email).validate_email() {
        return Err(CoreError::InvalidInput(format!(
            "Invalid vendor email '{email}'"
        )));
    }
    Ok(())
}

/// An absent or blank website is fine; a present one must be a URL.
pub fn validate_vendor_website(website: Option<&str>) -> Result<(), CoreError> {
    match website.map(str::trim) {
        Some(url) if !url.is_empty() && !url.validate_url() => Err(CoreError::InvalidInput(
            format!("Invalid vendor website '{url}'"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Sales@Acme.COM "), "sales@acme.com");
    }

    #[test]
    fn email_validation() {
        assert!(validate_vendor_email("sales@acme.com").is_ok());
        assert_matches!(
            validate_vendor_email("not-an-email"),
            Err(CoreError::InvalidInput(_))
        );
    }

    #[test]
    fn name_validation() {
        assert!(validate_vendor_name("Acme").is_ok());
        assert!(validate_vendor_name("  ").is_err());
        assert!(validate_vendor_name(&"x".repeat(300)).is_err());
    }

    #[test]
    fn website_validation() {
        assert!(validate_vendor_website(None).is_ok());
        assert!(validate_vendor_website(Some("")).is_ok());
        assert!(validate_vendor_website(Some("https://acme.com")).is_ok());
        assert!(validate_vendor_website(Some("acme dot com")).is_err());
    }
}
