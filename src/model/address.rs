//! Mailbox parsing for `From:` values and Gmail sender lines.

/// A parsed mailbox: optional display name plus bare address.
///
/// # Examples
/// - `"Alice Smith <alice@example.com>"` → `display_name = "Alice Smith"`, `address = "alice@example.com"`
/// - `"alice@example.com"` → `display_name = ""`, `address = "alice@example.com"`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare address (`user@domain`), or the raw value when none was found.
    pub address: String,
}

impl EmailAddress {
    /// Parse a single mailbox.
    ///
    /// Accepts `user@host`, `<user@host>`, `Name <user@host>` and
    /// `"Quoted, Name" <user@host>`. Anything else is kept verbatim as `address`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self {
                    display_name: strip_quotes(&trimmed[..open]),
                    address: trimmed[open + 1..close].trim().to_string(),
                };
            }
        }

        Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Lower-cased address, used to group messages by sender.
    pub fn key(&self) -> String {
        self.address.to_lowercase()
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.display_name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} <{}>", self.display_name, self.address)
        }
    }
}
