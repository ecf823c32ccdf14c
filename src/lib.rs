#![warn(clippy::all, rust_2018_idioms)]

pub mod branches;
pub mod collections;
pub mod config;
pub mod cuts;
pub mod error;
pub mod event_table;
pub mod exporter;
pub mod flattener;
pub mod histoer;
pub mod kinematics;
pub mod loader;
pub mod met;
pub mod processor;
pub mod sink;

pub use config::PipelineConfig;
pub use error::{NetMetError, Result};
pub use processor::Processor;
