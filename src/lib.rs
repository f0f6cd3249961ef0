//! signal-brain - Signal Ingestion and Windowed Decision Pipeline
//!
//! Collects market and social signals for a Solana trading agent, batches
//! them into time windows and turns each window into one trade decision.
//!
//! # Modules
//!
//! - `domain`: Signals, windows, decisions, risk constraints, sentiment scoring
//! - `ports`: Trait abstractions (SignalChannel, SignalStore, DecisionOracle, SocialSearchPort)
//! - `adapters`: External implementations (RabbitMQ, Postgres, OpenAI, sources, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Window aggregator, decision sink, pipeline lifecycle

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
