//! Adapters for the domain ports: ledger stores and the Telegram client.

pub mod in_memory;
pub mod json_file;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod telegram;
