//! page.host_event.v1 schema
//!
//! Recorded host events with their virtual timestamps. Event logs are what
//! the `engage` CLI replays and what hosts without a live page feed in.

mod adapter;
mod host_event;

pub use adapter::*;
pub use host_event::*;
