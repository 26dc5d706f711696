//! Integration tests for the udptrace workspace
//!
//! See the `tests/` directory.
