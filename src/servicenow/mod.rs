// ServiceNow Table API module.
// Provides the HTTP client, typed endpoint calls, and the gateway seam the
// synchronization controller depends on.

pub mod client;
pub mod endpoints;
pub mod gateway;

pub use client::NowClient;
pub use endpoints::SysProperty;
pub use gateway::RecordGateway;
