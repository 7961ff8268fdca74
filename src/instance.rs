// Synchronization controller for one connected instance.
// Owns the connection's cache and decides freshness, fetch, and write-back.

use tracing::{debug, warn};

use crate::cache::{self, CacheStore};
use crate::error::{NowSyncError, Result};
use crate::records::{Meta, Record, RecordKind};
use crate::servicenow::{NowClient, RecordGateway};
use crate::timefmt::DisplayFormats;

/// Freshness verdict for a locally held record.
///
/// Both outcomes are expected results, not errors; transport and parse
/// failures surface separately as `NowSyncError`.
#[derive(Debug, Clone, PartialEq)]
pub enum Freshness {
    /// The remote copy is strictly newer; carries the remote metadata.
    RemoteNewer(Meta),
    /// The local copy is as new as the remote one. Equal timestamps land
    /// here: the source format has no sub-second precision to break the tie.
    LocalCurrent,
}

/// Outcome of one kind's listing during a cache rebuild.
#[derive(Debug)]
pub struct RebuildOutcome {
    pub kind: RecordKind,
    /// Number of records cached, or why the kind's listing failed.
    pub result: Result<usize>,
}

/// Per-kind outcomes of a cache rebuild. Kinds fail independently; a failed
/// kind keeps its previous cache entry.
#[derive(Debug, Default)]
pub struct RebuildReport {
    pub outcomes: Vec<RebuildOutcome>,
}

impl RebuildReport {
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failed_kinds(&self) -> Vec<RecordKind> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.kind)
            .collect()
    }
}

/// A live connection to one instance.
///
/// Owning a value of this type is the connected state: `connect` validates
/// credentials before the value exists, and dropping it tears the session
/// down. The cache belongs exclusively to this value. Concurrent
/// `write_back`/`is_latest` calls for the same `sys_id` are not coalesced;
/// callers needing at-most-one-in-flight must track it themselves.
pub struct Instance<G = NowClient> {
    host: String,
    username: String,
    gateway: G,
    formats: DisplayFormats,
    cache: CacheStore,
}

impl Instance {
    /// Connect to an instance with basic-auth credentials.
    ///
    /// Validates the identity, loads the display formats, and runs the
    /// initial cache rebuild. Credential failures construct nothing and
    /// leave the cache untouched; per-kind rebuild failures are reported
    /// but not fatal.
    pub async fn connect(host: &str, username: &str, password: &str) -> Result<Self> {
        let gateway = NowClient::new(host, username, password)?;
        let cache = match cache::instance_dir(host) {
            Some(dir) => CacheStore::load(dir),
            None => CacheStore::new(),
        };
        Self::with_gateway(host, username, gateway, cache).await
    }
}

impl<G: RecordGateway> Instance<G> {
    /// Connect through an existing gateway. `connect` funnels here; tests
    /// substitute an in-memory gateway.
    pub async fn with_gateway(
        host: &str,
        username: &str,
        gateway: G,
        cache: CacheStore,
    ) -> Result<Self> {
        if !gateway.get_identity(username).await? {
            return Err(NowSyncError::IdentityNotFound(username.to_string()));
        }

        let formats = match gateway.get_display_formats().await {
            Ok(formats) => formats,
            Err(error) => {
                warn!(%error, "display formats unavailable, using ISO defaults");
                DisplayFormats::default()
            }
        };

        let mut instance = Self {
            host: host.to_string(),
            username: username.to_string(),
            gateway,
            formats,
            cache,
        };

        let report = instance.rebuild_cache().await;
        if !report.is_complete() {
            warn!(host = %instance.host, failed = ?report.failed_kinds(), "connected with incomplete cache");
        } else {
            debug!(host = %instance.host, "connected");
        }
        Ok(instance)
    }

    /// Compare a local record against the remote metadata projection.
    /// A strictly newer remote timestamp wins; equal means current.
    pub async fn is_latest(&self, local: &Meta) -> Result<Freshness> {
        let raw = self.gateway.get_record_metadata(&local.sys_id).await?;
        let remote = Meta::from_raw(&raw, &self.formats)?;

        if remote.sys_updated_on > local.sys_updated_on {
            Ok(Freshness::RemoteNewer(remote))
        } else {
            Ok(Freshness::LocalCurrent)
        }
    }

    /// Fetch the complete record behind a metadata projection. Unrecognized
    /// kinds are rejected before any remote call.
    pub async fn fetch_full(&self, record: &Meta) -> Result<Record> {
        let kind = record
            .kind()
            .ok_or_else(|| NowSyncError::UnknownKind(record.sys_class_name.clone()))?;

        let raw = self.gateway.get_record_full(kind, &record.sys_id).await?;
        Record::from_raw(raw, &self.formats)
    }

    /// Write locally edited fields back as a minimal patch and return the
    /// server's authoritative post-write record.
    pub async fn write_back(&self, record: &Record) -> Result<Record> {
        let kind = record
            .kind()
            .ok_or_else(|| NowSyncError::UnknownKind(record.meta.sys_class_name.clone()))?;
        let body = record
            .patch_body()
            .ok_or_else(|| NowSyncError::UnknownKind(record.meta.sys_class_name.clone()))?;

        debug!(%kind, sys_id = %record.meta.sys_id, "writing back");
        let raw = self
            .gateway
            .patch_record(kind, &record.meta.sys_id, &body)
            .await?;
        Record::from_raw(raw, &self.formats)
    }

    /// Re-fetch the full listing of every kind and replace the cache
    /// wholesale. Kinds are fetched concurrently and fail independently; a
    /// failing kind leaves its previous cache entry in place.
    pub async fn rebuild_cache(&mut self) -> RebuildReport {
        let (script_includes, widgets, themes) = tokio::join!(
            self.fetch_listing(RecordKind::ScriptInclude),
            self.fetch_listing(RecordKind::Widget),
            self.fetch_listing(RecordKind::Theme),
        );

        let mut report = RebuildReport::default();
        for (kind, result) in [
            (RecordKind::ScriptInclude, script_includes),
            (RecordKind::Widget, widgets),
            (RecordKind::Theme, themes),
        ] {
            let result = match result {
                Ok(items) => {
                    let count = items.len();
                    self.cache.set(kind, items);
                    debug!(%kind, count, "cache entry replaced");
                    Ok(count)
                }
                Err(error) => {
                    warn!(%kind, %error, "listing failed, keeping previous cache entry");
                    Err(error)
                }
            };
            report.outcomes.push(RebuildOutcome { kind, result });
        }
        report
    }

    async fn fetch_listing(&self, kind: RecordKind) -> Result<Vec<Record>> {
        let raw = self.gateway.list_records(kind).await?;
        raw.into_iter()
            .map(|row| Record::from_raw(row, &self.formats))
            .collect()
    }

    /// Cached listing for a kind. `None` means never populated (fetch it);
    /// an empty slice means the instance legitimately has no such records.
    pub fn cached(&self, kind: RecordKind) -> Option<&[Record]> {
        self.cache.get(kind)
    }

    /// Drop every cached listing (disconnect / credential purge).
    pub fn clear_cache(&mut self) {
        self.cache.clear_all();
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn display_formats(&self) -> &DisplayFormats {
        &self.formats
    }
}
