pub mod client;
pub mod execution;
pub mod models;

pub use client::RedashClient;
pub use execution::{ExecutionApi, ExecutionEngine, PollSettings};
