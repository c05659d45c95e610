//! Integration tests for Spec-Weaver
//!
//! These tests use wiremock to stand up documentation sites and run the
//! probe, crawl and pipeline against them end-to-end.

mod common;
mod crawl_tests;
mod job_tests;
mod pipeline_tests;
