#![doc(html_root_url = "https://docs.rs/tsmeta/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tsmeta - MPEG-TS with in-band metadata
//!
//! `tsmeta` packetizes audio and video access units into an MPEG transport
//! stream, embeds key/value metadata in the stream's program map table, and
//! reads recordings back for trimming and segmenting by timestamp or
//! metadata value.
//!
//! ## Features
//!
//! - H.264, H.265, MJPEG, JPEG, PCM and ADPCM packetisation
//! - PAT/PMT insertion every N packets, every N seconds or before key units
//! - Drift-free PTS/PCR derived from the nominal access unit rate
//! - Ordered metadata descriptor updated in place on every PMT
//! - Zero-copy clip extraction and range queries
//! - Discontinuity flagging for clips that are resent after a failure
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tsmeta::av::CodecType;
//! use tsmeta::config;
//! use tsmeta::format::ts::{clip, Encoder, Meta};
//!
//! # #[tokio::main]
//! # async fn main() -> tsmeta::Result<()> {
//! let meta = Arc::new(Meta::new());
//! meta.add("loc", "-34.9,138.6");
//!
//! let mut enc = Encoder::new(
//!     Vec::<u8>::new(),
//!     Arc::clone(&meta),
//!     vec![config::media_type(CodecType::H264), config::rate(25.0)],
//! )?;
//! enc.write(&[0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1f]).await?;
//!
//! let c = clip::extract(&enc.into_inner())?;
//! assert_eq!(c.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: codec identifiers and the access unit type
//! - `codec`: key unit probes for the supported codecs
//! - `format`: the transport stream implementation and the muxer trait
//! - `config`: encoder options
//! - `error`: error type and result alias
//! - `utils`: bit packing, CRC, buffer editing and the wall clock

/// Audio/Video base types
pub mod av;

/// Key unit detection for video and audio formats
pub mod codec;

/// Error types and utilities
pub mod error;

/// Media format implementations
pub mod format;

/// Common utilities and helper functions
pub mod utils;

/// Configuration module
pub mod config;

pub use error::{Result, TsError};
