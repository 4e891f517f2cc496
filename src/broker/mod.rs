//! Access to broker state through its command line tools.

pub mod client;
pub mod executor;
#[cfg(test)]
pub mod scripted;

pub use client::BrokerClient;
pub use executor::{CommandOutput, ProcessExecutor};
