// Remote record synchronization for ServiceNow instances.
// Normalizes Table API rows into typed records, keeps a per-connection cache
// of listings, and reconciles local edits through minimal patch payloads.

pub mod cache;
pub mod error;
pub mod instance;
pub mod records;
pub mod servicenow;
pub mod timefmt;

pub use cache::CacheStore;
pub use error::{NowSyncError, Result};
pub use instance::{Freshness, Instance, RebuildOutcome, RebuildReport};
pub use records::{Meta, Payload, Record, RecordKind, Reference};
pub use servicenow::{NowClient, RecordGateway};
pub use timefmt::DisplayFormats;
