//! Phone number to WhatsApp contact address normalization.
//!
//! The bridge addresses individual contacts as `<digits>@c.us`. Callers may
//! submit numbers in any human format (`+1 (555) 123-4567`), so every
//! non-digit character is dropped before the suffix is appended.

use std::fmt;

/// Suffix WhatsApp uses for individual contact JIDs.
pub const CONTACT_SUFFIX: &str = "@c.us";

/// Errors from destination normalization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DestinationError {
    /// Nothing was left after stripping non-digit characters.
    #[error("phoneNumber must contain at least one digit")]
    NoDigits,
}

/// A normalized WhatsApp contact address (`digits@c.us`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    jid: String,
}

impl Destination {
    /// The full contact JID, suffix included.
    pub fn jid(&self) -> &str {
        &self.jid
    }

    /// The digit portion of the JID.
    pub fn digits(&self) -> &str {
        self.jid
            .strip_suffix(CONTACT_SUFFIX)
            .unwrap_or(self.jid.as_str())
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.jid)
    }
}

/// Normalize a caller-supplied phone number into a contact address.
///
/// # Errors
///
/// Returns [`DestinationError::NoDigits`] when the input has no ASCII digits.
pub fn normalize(phone_number: &str) -> Result<Destination, DestinationError> {
    let digits: String = phone_number
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return Err(DestinationError::NoDigits);
    }
    Ok(Destination {
        jid: format!("{digits}{CONTACT_SUFFIX}"),
    })
}
