//! Integration tests for the report service
//!
//! These tests drive the API endpoints with real HTTP requests against a
//! temporary database and all middleware in place.

mod api_tests;
mod render_tests;
mod report_api_tests;
