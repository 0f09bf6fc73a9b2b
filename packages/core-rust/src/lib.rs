//! Gatehouse core: backend service names and the RPC wire packets.

pub mod messages;
pub mod service;

pub use messages::{ReplyPacket, RequestPacket};
pub use service::ServiceName;
