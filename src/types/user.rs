use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile of a fully registered user, as returned by `GET /me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    /// EVM address the account was registered with, `0x`-prefixed.
    pub address: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
