//! Wire protocol
//!
//! Raw byte streams, cut into messages by a configurable framing policy.

pub mod framing;

pub use framing::{FrameDecoder, Framing};
