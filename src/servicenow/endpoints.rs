// Typed Table API endpoint calls.
// URLs, listing filters, and response envelopes for the tables in scope.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::records::{RawRecord, RecordKind};
use crate::timefmt::DisplayFormats;

use super::client::NowClient;

/// Response envelope for a single row. The Table API nests every payload
/// under `result`.
#[derive(Debug, Deserialize)]
struct RecordResponse {
    result: RawRecord,
}

/// Response envelope for a listing.
#[derive(Debug, Deserialize)]
struct RecordListResponse {
    result: Vec<RawRecord>,
}

/// Response envelope for sys_properties rows.
#[derive(Debug, Deserialize)]
struct PropertyListResponse {
    result: Vec<SysProperty>,
}

/// Response envelope for the identity check.
#[derive(Debug, Deserialize)]
struct IdentityListResponse {
    result: Vec<IdentityRow>,
}

/// Row of the sys_properties table.
#[derive(Debug, Clone, Deserialize)]
pub struct SysProperty {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct IdentityRow {
    #[serde(default)]
    #[allow(dead_code)]
    sys_id: String,
}

impl NowClient {
    /// Check whether exactly one identity matches `username`.
    pub async fn get_identity(&self, username: &str) -> Result<bool> {
        let response = self
            .get(&format!("/sys_user?sysparm_limit=1&user_name={username}"))
            .await?;
        let wrapper: IdentityListResponse = response.json().await?;
        Ok(wrapper.result.len() == 1)
    }

    /// Display formats configured on the instance. Missing properties keep
    /// the ISO defaults.
    pub async fn get_display_formats(&self) -> Result<DisplayFormats> {
        let response = self
            .get("/sys_properties?sysparm_query=nameSTARTSWITHglide.sys")
            .await?;
        let wrapper: PropertyListResponse = response.json().await?;

        let mut formats = DisplayFormats::default();
        for property in wrapper.result {
            if property.value.is_empty() {
                continue;
            }
            match property.name.as_str() {
                "glide.sys.date_format" => formats.date_format = property.value,
                "glide.sys.time_format" => formats.time_format = property.value,
                _ => {}
            }
        }
        Ok(formats)
    }

    /// List the editable, policy-eligible rows of a kind's table.
    pub async fn list_records(&self, kind: RecordKind) -> Result<Vec<RawRecord>> {
        let filter = match kind {
            RecordKind::Widget => r#"internal=false&sys_policy="""#,
            RecordKind::ScriptInclude | RecordKind::Theme => r#"sys_policy="""#,
        };
        let response = self.get(&format!("/{}?{}", kind.table(), filter)).await?;
        let wrapper: RecordListResponse = response.json().await?;
        Ok(wrapper.result)
    }

    /// Fetch the complete row for one record. A widget keeps the listing
    /// filter so a non-editable one cannot enter the edit cycle.
    pub async fn get_record_full(&self, kind: RecordKind, sys_id: &str) -> Result<RawRecord> {
        let endpoint = match kind {
            RecordKind::Widget => {
                format!(r#"/{}/{}?internal=false&sys_policy="""#, kind.table(), sys_id)
            }
            RecordKind::ScriptInclude | RecordKind::Theme => {
                format!("/{}/{}", kind.table(), sys_id)
            }
        };
        let response = self.get(&endpoint).await?;
        let wrapper: RecordResponse = response.json().await?;
        Ok(wrapper.result)
    }

    /// Fetch the lightweight metadata projection of a record.
    pub async fn get_record_metadata(&self, sys_id: &str) -> Result<RawRecord> {
        let response = self.get(&format!("/sys_metadata/{sys_id}")).await?;
        let wrapper: RecordResponse = response.json().await?;
        Ok(wrapper.result)
    }

    /// Apply a partial payload to a record. The server returns the full
    /// authoritative post-write row.
    pub async fn patch_record(
        &self,
        kind: RecordKind,
        sys_id: &str,
        body: &Value,
    ) -> Result<RawRecord> {
        let response = self
            .patch(&format!("/{}/{}", kind.table(), sys_id), body)
            .await?;
        let wrapper: RecordResponse = response.json().await?;
        Ok(wrapper.result)
    }
}
