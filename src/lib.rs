pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod pipeline;
pub mod shutdown;
