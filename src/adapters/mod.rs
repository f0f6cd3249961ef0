//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits and the sources:
//! - RabbitMQ: durable channel
//! - Postgres: decision and raw event store
//! - OpenAI: decision oracle
//! - Pump.fun, Raydium, Social: signal sources
//! - Memory: in-process channel and store
//! - CLI: command-line interface

pub mod cli;
pub mod memory;
pub mod openai;
pub mod postgres;
pub mod pump_fun;
pub mod rabbitmq;
pub mod raydium;
pub mod social;
pub mod source;

pub use cli::CliApp;
pub use memory::{MemoryChannel, MemoryStore};
pub use openai::OpenAiOracle;
pub use postgres::PostgresStore;
pub use pump_fun::PumpFunStream;
pub use rabbitmq::RabbitChannel;
pub use raydium::RaydiumPoller;
pub use social::{HttpSocialSearch, SocialMetricsPoller};
pub use source::{SignalEmitter, SourceError};
