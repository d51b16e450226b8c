//! Consentgate Core - consent types, normalization, host protocol and site configuration

pub mod config;
pub mod error;
pub mod normalize;
pub mod protocol;
pub mod types;

pub use config::{AnalyticsRule, GatePolicy, SiteConfig, TagManagerRule};
pub use error::{Error, Result};
pub use normalize::{has_valid_consent, normalize, normalize_str};
pub use protocol::*;
pub use types::*;
