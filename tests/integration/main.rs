//! Integration tests for Patchwise
//!
//! These tests use wiremock servers in place of vendor sites and APIs and
//! drive the pipeline, the batch coordinator and the report store end-to-end.

mod batch_tests;
mod common;
mod fetch_tests;
mod pipeline_tests;
mod report_tests;
