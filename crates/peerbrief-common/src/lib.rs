//! peerbrief-common: shared error type, collection configuration and the
//! allowlisted HTTP client used by every PeerBrief crate.

pub mod error;
pub mod collection_config;
pub mod sandbox;

// Re-export commonly used types
pub use collection_config::{
    CollectionConfig, CollectionFilters, HttpSettings, OutputSettings, Preset, SourceToggles,
    ValidationSettings,
};
pub use error::{PeerBriefError, Result};
pub use sandbox::{FetchedPage, SandboxClient};
