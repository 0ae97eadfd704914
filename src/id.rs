//! ID generation utilities using ULID for time-ordered unique identifiers.

use ulid::Ulid;

/// ID prefix types for different entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    Conversation,
    Message,
}

impl IdPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::Conversation => "cht",
            IdPrefix::Message => "msg",
        }
    }
}

/// Generate a chronologically ordered ID with the given prefix.
pub fn generate(prefix: IdPrefix) -> String {
    let ulid = Ulid::new();
    format!("{}_{}", prefix.as_str(), ulid.to_string().to_lowercase())
}
