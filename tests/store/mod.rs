//! Shared object store contract tests.
//!
//! Every `ObjectStore` backend runs these through `run_object_store_tests!`.

pub mod object_store_tests;
