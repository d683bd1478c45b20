//! mc-bridge - relay a Minecraft server's chat to a chat channel.

pub mod allowlist;
pub mod bridge;
pub mod chat;
pub mod config;
pub mod server;
pub mod transport;
