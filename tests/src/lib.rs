//! End-to-End Integration Tests for the Redash gateway
//!
//! These tests call a deployed gateway in front of a real Redash instance:
//! - service health and metrics (health module)
//! - query execution, auto parameters and partition fan-out (gateway module)
//!
//! They are ignored by default. Point `GATEWAY_BASE_URL`, `GATEWAY_TEST_QUERY_ID`
//! and `GATEWAY_TEST_API_KEY` at a live environment and run with `--ignored`.

pub mod common;
pub mod gateway;
pub mod health;
