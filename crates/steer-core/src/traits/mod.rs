//! Core traits for the steering system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpFeed`]: Fetch the optimal-IP candidate snapshot
//! - [`RecordStore`]: List/create/delete authoritative DNS records
//! - [`Prober`]: Advisory reachability checks for candidate addresses

pub mod ip_feed;
pub mod record_store;
pub mod prober;

pub use ip_feed::{IpFeed, IpFeedFactory, FeedSnapshot, Candidate, IpVersion, Line};
pub use record_store::{
    RecordStore, RecordStoreFactory, AuthoritativeRecord, RecordKind, RecordSpec,
};
pub use prober::Prober;
