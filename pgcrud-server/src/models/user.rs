//! User input validation
//!
//! Email shape: `local@domain.tld`, no whitespace, one `@`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::validation::{bounded_text, ValidationError};

const MAX_EMAIL_LEN: usize = 254;
const MAX_NAME_LEN: usize = 128;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid email regex")
});

/// Validated email address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    /// # Example
    /// ```
    /// use pgcrud_server::models::Email;
    ///
    /// assert!(Email::new("a@x.com").is_ok());
    /// assert!(Email::new("not-an-email").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let value = bounded_text("email", s, MAX_EMAIL_LEN)?;
        if !EMAIL_RE.is_match(&value) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                reason: "must look like name@example.com",
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserName(String);

impl UserName {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        bounded_text("name", s, MAX_NAME_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A user ready to be inserted
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub name: UserName,
}

impl NewUser {
    pub fn parse(email: &str, name: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            email: Email::new(email)?,
            name: UserName::new(name)?,
        })
    }
}
