//! Integration tests for streamchart.
//!
//! These tests drive the full pipeline: files in, rows streamed through a
//! processor, finalized charts out.

mod snapshot_tests;
mod streaming_tests;
