//! Chat relay - a deduplicating bridge between a clan-chat webhook and a Discord sink.
//!
//! The upstream plugin may post the same chat line more than once (retries,
//! multiple in-game listeners). This crate fingerprints each event, records the
//! fingerprint durably, and forwards only the first submission downstream.

pub mod config;
pub mod relay;
pub mod server;
pub mod store;
