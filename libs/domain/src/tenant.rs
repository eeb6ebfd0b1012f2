//! Tenant administrative info

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Administrative record for a tenant
#[typeshare]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub email_entry_skipped: bool,
}
