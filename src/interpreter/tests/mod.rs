//! Tests for the interpreter
//!
//! Organized by feature area; every test drives scripts end to end through
//! `Context::evaluate`.

mod basic_tests;
mod class_tests;
mod control_tests;
mod environment_tests;
mod helpers;
mod loop_tests;
