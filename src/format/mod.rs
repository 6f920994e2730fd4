use crate::av::Packet;
use crate::Result;

pub mod ts;

/// Common trait for format muxers
#[async_trait::async_trait]
pub trait Muxer: Send {
    /// Write stream header information
    async fn write_header(&mut self) -> Result<()>;

    /// Write a packet to the stream
    async fn write_packet(&mut self, packet: Packet) -> Result<()>;

    /// Write stream trailer information
    async fn write_trailer(&mut self) -> Result<()>;
}

pub use self::ts::{DiscontinuityRepairer, Encoder};
