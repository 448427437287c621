//! wechat-inbox — webhook message ingestion with idempotent CSV persistence.

pub mod config;
pub mod error;
pub mod message;
pub mod normalize;
pub mod push;
pub mod reply;
pub mod server;
pub mod signature;
pub mod store;
