pub mod cli;
pub mod config;
pub mod interpreter;

// Re-export main types
pub use config::Settings;
pub use interpreter::{
    metaes_eval, Bindings, Context, Environment, EvaluationConfig, Exception, Signal, Source, Value,
};
