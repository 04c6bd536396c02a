//! Author identity attached to every version

use crate::error::{Error, Result};

/// Author of a version
///
/// Name and email pair recorded on every commit. The engine treats this as
/// an opaque identity; resolving it to a display profile is the caller's
/// concern.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    name: String,
    email: String,
}

impl Author {
    pub fn new(name: String, email: String) -> Self {
        Author { name, email }
    }

    /// Format for display, `Name <email@example.com>`
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Load author identity from environment variables
    ///
    /// Reads SCRIV_AUTHOR_NAME and SCRIV_AUTHOR_EMAIL.
    pub fn load_from_env() -> Result<Self> {
        let name = std::env::var("SCRIV_AUTHOR_NAME")
            .map_err(|_| Error::Validation("SCRIV_AUTHOR_NAME not set".to_string()))?;
        let email = std::env::var("SCRIV_AUTHOR_EMAIL")
            .map_err(|_| Error::Validation("SCRIV_AUTHOR_EMAIL not set".to_string()))?;
        Ok(Author::new(name, email))
    }
}

impl TryFrom<&str> for Author {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        // Format: "name <email>"
        let email_start = value
            .find('<')
            .ok_or_else(|| Error::Corrupt(format!("invalid author format: {}", value)))?;
        let email_end = value
            .find('>')
            .ok_or_else(|| Error::Corrupt(format!("invalid author format: {}", value)))?;

        let name = value[..email_start].trim().to_string();
        let email = value[email_start + 1..email_end].to_string();

        Ok(Author { name, email })
    }
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
