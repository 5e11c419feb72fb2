//! Wayfarer Engine Library
//!
//! This library provides the core functionality of the Wayfarer recommender.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Engine event hook and correlation ids
pub mod events;

/// LLM provider abstraction layer
pub mod llm;

/// Conversation agent: intent parsing and the session orchestrator
pub mod agent;

/// Planning, scoring and feedback memory
pub mod conductor;

/// Travel data gateway over geocoding, weather, places and flight time
pub mod tools;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
