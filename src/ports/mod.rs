//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - The durable channel (raw signals in, decisions out)
//! - The persistence store
//! - The decision oracle
//! - Social keyword search

pub mod channel;
pub mod store;
pub mod oracle;
pub mod social;

pub use channel::{
    publish_decision, publish_signal, Acknowledger, ChannelError, Delivery, SignalChannel, Topic,
};
pub use store::{InsertOutcome, RawEvent, SignalStore, StoreError};
pub use oracle::{DecisionOracle, OracleError};
pub use social::{SearchError, SocialPost, SocialSearchPort};
