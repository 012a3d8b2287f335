//! Type definitions for the interpreter
//!
//! This module contains the core types shared by every component:
//! - AST nodes (Node, NodeKind)
//! - Runtime values (Value and its shared handles)
//! - Control flow (Signal, Exception)

pub mod ast;
pub mod control;
pub mod values;

// Re-export all types for convenient access
pub use ast::{Node, NodeKind, Position, SourceLocation};
pub use control::{Exception, HostError, Signal};
pub use values::{ArrayRef, FunctionKind, FunctionRef, ObjectRef, Value};
