//! Integration tests for trailmark-pipeline
//!
//! Drives a fully wired tracker through a recording transport or a
//! wiremock ingestion API and checks batching, consent gating and
//! plugin-to-queue flow.

mod common;

mod test_batching;
mod test_consent_flow;
mod test_delivery;
mod test_plugin_flow;
