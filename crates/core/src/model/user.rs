use serde::{Deserialize, Serialize};

use crate::model::ids::UserId;

/// The signed-in account, as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl User {
    /// Name to print on certificates and greetings.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.username.as_deref().unwrap_or("Learner")
        } else {
            &self.name
        }
    }
}
