use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Role of a platform account.
///
/// Unknown roles are preserved in [`UserRole::Other`] instead of failing the
/// whole response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum UserRole {
    Admin,
    #[default]
    Participant,
    Other(String),
}

impl UserRole {
    pub fn as_str(&self) -> &str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Participant => "participant",
            UserRole::Other(role) => role,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl From<&str> for UserRole {
    fn from(role: &str) -> Self {
        match role.to_ascii_lowercase().as_str() {
            "admin" => UserRole::Admin,
            "participant" => UserRole::Participant,
            _ => UserRole::Other(role.to_string()),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for UserRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(UserRole::from(raw.as_str()))
    }
}
