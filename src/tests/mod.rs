//! Crate-level tests: shared data types and end-to-end HTTP scenarios.
