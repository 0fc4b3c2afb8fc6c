//! Integration tests driving the public API

mod engine_test;
mod feed_test;
mod support;
