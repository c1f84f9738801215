//! Local IPC transport: wire protocol, server (component F), client (component G).

mod client;
mod protocol;
mod server;

pub use client::{probe_daemon, SocketClient};
pub use protocol::{Request, Response, MAX_LINE_BYTES};
pub use server::IpcServer;
