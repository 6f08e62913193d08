// FlowCompare — Contact-flow comparison pipeline setup
// License: Apache-2.0

pub mod aws;
pub mod config;
pub mod fetch;
pub mod flow;
pub mod git;
pub mod github;
pub mod logger;
pub mod prompt;
pub mod scaffold;
pub mod status;
pub mod workflow;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
