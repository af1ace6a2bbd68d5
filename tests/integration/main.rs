//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for recipe sites and drive the
//! coordinator end-to-end through each mode.

mod common;
mod crawl_tests;
mod sitemap_tests;
