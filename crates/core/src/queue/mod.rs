//! Asynchronous delivery of webhook and resource-refresh messages

pub mod ports;

pub use ports::MessageQueue;
