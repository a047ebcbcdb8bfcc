//! Integration tests against a mock registry
//!
//! These tests use wiremock to stand in for the registry API and drive the
//! gateway, the crawl controller and the query modes end-to-end.

mod crawl_tests;
mod mode_tests;
