//! Receiver discovery over SSDP.
//!
//! - [`ssdp`]: wire format, interface enumeration, socket setup
//! - [`transport`]: UDP seam ([`SsdpTransport`])
//! - [`description`]: friendly-name lookup from device descriptions
//! - [`cache_store`]: durable cache ([`CacheStore`])
//! - [`tracker`]: the cache, passive listening and single-flight scans

pub mod cache_store;
pub mod description;
pub mod ssdp;
pub mod tracker;
pub mod transport;
mod types;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use cache_store::{CacheError, CacheStore, JsonFileCacheStore};
pub use description::{parse_friendly_name, DescriptionFetcher, HttpDescriptionFetcher};
pub use ssdp::identity_from_usn;
pub use tracker::DiscoveryTracker;
pub use transport::{Datagram, SsdpTransport, UdpTransport};
pub use types::{
    is_virtual_interface, DiscoveredReceiver, DiscoveryError, DiscoveryResult, TrackerEvent,
};
