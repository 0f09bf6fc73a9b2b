//! Backend transport: `<len>#<json>` framing and the multiplexed TCP client.

pub mod codec;
pub mod tcp;

pub use codec::{CodecError, JsonSocketCodec};
pub use tcp::TcpBackendClient;
