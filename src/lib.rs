pub mod brain;
pub mod codegen;
pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod platform;
pub mod queue;
pub mod server;
pub mod services;
pub mod shutdown;
pub mod webhook;
pub mod workspace;
