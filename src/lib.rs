pub mod api;
pub mod channel;
pub mod config;
pub mod error;
pub mod fulfillment;
pub mod models;
pub mod observability;
pub mod session;
pub mod state;
pub mod storage;
pub mod sync;
pub mod wallet;
