pub mod chat;
pub mod order;
pub mod request;
pub mod runner;
pub mod transaction;
