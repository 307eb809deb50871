//! GATT host interface service
//!
//! The command/response channel between the peer and the application:
//! - Inbound command writes, stored then buffered one at a time
//! - Delivery mode configuration of the response characteristic
//! - Outbound responses by notification or indication, cut to the MTU

pub mod command;
pub mod service;
pub mod types;


pub use command::CommandBuffer;
pub use service::{truncate_to_mtu, CommandCallback, HostInterface};
pub use types::{ClientConfig, ServiceHandles, WriteKind, WriteOutcome, DEFAULT_COMMAND_CAPACITY};
