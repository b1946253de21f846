//! adcraft: quota-gated Google Ads campaign generation
//!
//! A signed-in user describes their business in a prompt; the server checks
//! their plan's monthly allowance, asks a structured-output LLM for a complete
//! campaign draft and only then counts the generation against their quota.
//!
//! Storage is sled (users and usage profiles), the API is axum with JWT bearer
//! auth, and generation goes through Gemini's `generateContent` with a response
//! schema.

pub mod auth;
pub mod config;
pub mod draft;
pub mod error;
pub mod export;
pub mod generation;
pub mod logging;
pub mod models;
// Request state machine: auth, quota, generate, record usage
pub mod orchestrator;
pub mod quota;
pub mod reconcile;
// REST API module: Axum HTTP handlers on port 11111
pub mod rest;
pub mod schema;
pub mod storage;

#[cfg(test)]
mod test_support;
