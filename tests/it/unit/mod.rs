//! Unit tests for streamchart.

mod perf_tests;
