//! Integration test suite modules

mod generation;
mod task;
