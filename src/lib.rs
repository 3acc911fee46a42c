//! NeuroLoom - A cached news feed aggregator
//!
//! This crate fetches a fixed set of RSS/Atom feeds concurrently, normalizes
//! their items into uniform articles, and serves the merged, newest-first list
//! as JSON from a short-lived in-memory cache. It also proxies article
//! summaries to an LLM API.

pub mod aggregator;
pub mod article;
pub mod cache;
pub mod clock;
pub mod config;
pub mod fetcher;
pub mod normalize;
pub mod routes;
pub mod summarizer;
