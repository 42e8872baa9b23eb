//! I/O helpers: documents on disk, engine sessions, and the bridge process.

pub mod bridge;
pub mod config;
pub mod engine;
pub mod init;
pub mod mapping;
