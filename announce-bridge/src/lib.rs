//! HUB75 Announce Bridge Library
//!
//! Glues the broker, the speech synthesizer and the artifact server together.
//!
//! - [`bridge`] - MQTT subscription, per-message handling and URL publishing
//! - [`server`] - HTTP file server over the artifact directory
//! - [`identity`] - the advertised host used in published URLs

pub mod bridge;
pub mod identity;
pub mod server;

pub use bridge::{
    AnnouncementHandler, BridgeAction, ConnectionState, ConnectionTracker, MessageBridge,
    Outcome, Publisher,
};
pub use identity::ServerIdentity;
pub use server::{ArtifactServer, BoundArtifactServer};
