// Remote gateway contract.
// The synchronization controller depends on this seam, not on the HTTP
// client, so tests can substitute an in-memory record store.

use serde_json::Value;

use crate::error::Result;
use crate::records::{RawRecord, RecordKind};
use crate::timefmt::DisplayFormats;

use super::client::NowClient;

/// Read/list/patch access to the remote record store.
///
/// Implementations hold no record state and perform no retries; every call
/// either resolves or reports a failure reason.
#[allow(async_fn_in_trait)]
pub trait RecordGateway {
    /// List raw rows of a kind, filtered to policy-eligible, editable items.
    async fn list_records(&self, kind: RecordKind) -> Result<Vec<RawRecord>>;

    /// Fetch the complete row for one record.
    async fn get_record_full(&self, kind: RecordKind, sys_id: &str) -> Result<RawRecord>;

    /// Fetch the lightweight metadata projection of a record.
    async fn get_record_metadata(&self, sys_id: &str) -> Result<RawRecord>;

    /// Apply a partial payload and return the full post-write row.
    async fn patch_record(&self, kind: RecordKind, sys_id: &str, body: &Value)
    -> Result<RawRecord>;

    /// Whether exactly one identity matches the username.
    async fn get_identity(&self, username: &str) -> Result<bool>;

    /// Date/time display formats configured on the remote store.
    async fn get_display_formats(&self) -> Result<DisplayFormats>;
}

impl RecordGateway for NowClient {
    async fn list_records(&self, kind: RecordKind) -> Result<Vec<RawRecord>> {
        NowClient::list_records(self, kind).await
    }

    async fn get_record_full(&self, kind: RecordKind, sys_id: &str) -> Result<RawRecord> {
        NowClient::get_record_full(self, kind, sys_id).await
    }

    async fn get_record_metadata(&self, sys_id: &str) -> Result<RawRecord> {
        NowClient::get_record_metadata(self, sys_id).await
    }

    async fn patch_record(
        &self,
        kind: RecordKind,
        sys_id: &str,
        body: &Value,
    ) -> Result<RawRecord> {
        NowClient::patch_record(self, kind, sys_id, body).await
    }

    async fn get_identity(&self, username: &str) -> Result<bool> {
        NowClient::get_identity(self, username).await
    }

    async fn get_display_formats(&self) -> Result<DisplayFormats> {
        NowClient::get_display_formats(self).await
    }
}
