//! # MPEG Transport Stream (TS) Implementation
//!
//! This module writes and reads MPEG transport streams that carry one
//! program with a single elementary stream and key/value metadata in the
//! PMT:
//!
//! - TS packet encoding and decoding
//! - PAT/PMT tables with in-place descriptor editing
//! - PES headers with presentation timestamps
//! - An encoder with packet, time or key frame driven table insertion
//! - Clip extraction with timestamp and metadata range queries
//! - Discontinuity flagging for clips sent one at a time
//!
//! ## Example Usage
//!
//! ### Encoding access units
//!
//! ```rust
//! use std::sync::Arc;
//! use tsmeta::config;
//! use tsmeta::format::ts::{Encoder, Meta, TS_PACKET_SIZE};
//!
//! # #[tokio::main]
//! # async fn main() -> tsmeta::Result<()> {
//! let meta = Arc::new(Meta::with_pairs([("loc", "-34.9,138.6")]));
//! let mut enc = Encoder::new(Vec::<u8>::new(), meta, vec![config::packet_based_psi(7)])?;
//! enc.write(&[0u8; 400]).await?;
//!
//! let out = enc.into_inner();
//! assert_eq!(out.len() % TS_PACKET_SIZE, 0);
//! # Ok(())
//! # }
//! ```
//!
//! ### Trimming a recording
//!
//! ```rust,no_run
//! use tsmeta::format::ts::clip;
//!
//! # fn main() -> tsmeta::Result<()> {
//! let data = std::fs::read("recording.ts")?;
//! let c = clip::extract(&data)?;
//! let first_minute = c.trim_to_pts_range(0, 60 * 90_000)?;
//! std::fs::write("first_minute.h264", first_minute.bytes())?;
//! # Ok(())
//! # }
//! ```

/// Frame-indexed clips and range queries
pub mod clip;

/// Discontinuity flagging between clips
pub mod discontinuity;

/// Key/value metadata carried in the PMT
pub mod meta;

/// TS encoder
pub mod muxer;

/// Single packet encoding and decoding
pub mod packet;

/// Low-level TS decoding and buffer scanning
pub mod parser;

/// PES header handling
pub mod pes;

/// PAT/PMT tables and descriptors
pub mod psi;

/// Core TS types and constants
pub mod types;

// Re-export commonly used types and constants
pub use clip::{extract, Clip, Frame};
pub use discontinuity::DiscontinuityRepairer;
pub use meta::Meta;
pub use muxer::Encoder;
pub use packet::TsPacket;
pub use parser::{find_psi, get_pts_range, PsiInfo};
pub use pes::{PESHeader, PESPacket};
pub use psi::{Psi, PsiBytes};
pub use types::{
    TSHeader,
    METADATA_TAG,
    PID_AUDIO,
    PID_PAT,
    PID_PMT,
    PID_VIDEO,
    STREAM_TYPE_H264,
    STREAM_TYPE_H265,
    TS_PACKET_SIZE,
};
