//! Wire models for both sides of the bridge.
//!
//! `UpstreamCommand` and `UpstreamEvent` describe the realtime service protocol;
//! `client` holds the browser-facing vocabulary.

pub mod audio;
pub mod client;
mod content;
pub mod events;
pub mod session;
pub mod tools;

pub use client::{ControlAction, InboundMessage, OutboundMessage};
pub use content::items::{FunctionCallOutputItem, Item, ItemStatus};
pub use content::message::*;
pub use events::{UpstreamCommand, UpstreamEvent};
pub use session::Session;
