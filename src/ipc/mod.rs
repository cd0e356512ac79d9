//! IPC module for streaming intervals to a timeline viewer

mod protocol;
mod server;

pub use server::Server;
