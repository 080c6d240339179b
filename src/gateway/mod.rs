//! Orchestrator construction and entry point

mod builder;
mod orchestrator;

pub use builder::{Summarizerrrr, SummarizerrrrBuilder};
pub use orchestrator::Orchestrator;
