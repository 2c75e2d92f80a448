use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionEntry {
    pub address: String,
    pub added_at: DateTime<Utc>,
}
