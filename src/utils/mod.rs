//! # Utility Functions and Types
//!
//! Common helpers used by the transport stream code:
//!
//! - Named bit-packing helpers for header fields
//! - MPEG-2 CRC32 calculation for PSI sections
//! - Range editing for in-place buffer resizing
//! - A settable wall clock for timestamp metadata
//!
//! ## CRC Calculation
//!
//! ```rust
//! use tsmeta::utils::Crc32Mpeg2;
//!
//! # fn main() {
//! let data = b"Hello, world!";
//! let crc = Crc32Mpeg2::new().calculate(data);
//! println!("CRC32: {:08x}", crc);
//! # }
//! ```

/// Bit-packing helpers for header fields
pub mod bits;

/// Insert/delete primitives over byte buffers
pub mod buffer;

/// CRC calculation implementations
pub mod crc;

/// Live wall clock anchored from an outside time source
pub mod realtime;

// Re-export commonly used types
pub use buffer::RangeEdit;
pub use crc::Crc32Mpeg2;
pub use realtime::RealTime;
