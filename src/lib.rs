pub mod chat_fsm;
pub mod client;
pub mod config;
pub mod cors;
pub mod domains;
pub mod error;
pub mod interfaces;
pub mod logging;
pub mod provisioning;
pub mod providers;
pub mod relay;
pub mod server;
pub mod sse;
pub mod transcript;

pub type Result<T> = std::result::Result<T, error::NayaError>;
