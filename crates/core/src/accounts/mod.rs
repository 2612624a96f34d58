//! Connected seller accounts and their stored credentials

pub mod ports;
