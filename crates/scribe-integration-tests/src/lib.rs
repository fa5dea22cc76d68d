//! Integration test crate for the Scribe pipeline.
//!
//! This crate has no library code. It only contains integration tests
//! that drive ingestion, storage and anchoring end to end against the
//! simulated backends.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p scribe-integration-tests
//! ```
