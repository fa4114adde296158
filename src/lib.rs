/*!
ztnet - join a ZeroTier virtual network and talk TCP/UDP over it

This library wraps the libzt native library, including:
- Joining a virtual network and querying the assigned addresses
- Stream connections and listeners over virtual sockets
- Datagram sockets over virtual sockets
- Socket address marshalling across the C ABI
- Home directory management for libzt state
*/

pub mod backend;
pub mod error;
pub mod ffi;
pub mod home;
pub mod network;
pub mod protocol;
pub mod sockaddr;
pub mod socket;

pub use backend::Backend;
pub use error::{Result, ZtError};
pub use ffi::Libzt;
pub use home::HomeDir;
pub use network::*;
pub use protocol::*;
pub use socket::{Connection, Incoming, Listener, PacketConn};

/// ztnet version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default backlog for listening sockets
pub const DEFAULT_BACKLOG: i32 = 1;

/// Receive buffer size used by the demo programs
pub const DEFAULT_BUFFER_SIZE: usize = 1024;
