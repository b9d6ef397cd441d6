//! Integration tests for trailmark-transport
//!
//! Uses wiremock to simulate the ingestion API and verifies status
//! classification, retry counts, timeouts and beacon delivery.

mod common;

mod test_beacon;
mod test_events;
mod test_identify;
