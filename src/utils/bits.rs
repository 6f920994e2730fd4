//! Named bit-packing helpers for the fixed-layout fields of MPEG-TS headers.
//!
//! Transport stream headers pack several fields into byte pairs (a 13-bit PID
//! behind three flag bits, 12-bit section lengths, 10-bit program info
//! lengths) and spread 33-bit timestamps across marker-delimited chunks. The
//! helpers here keep those masks in one place so the framer and table code
//! never carry bare magic numbers.

/// Mask of a 13-bit packet identifier within its byte pair.
pub const PID_MASK: u16 = 0x1fff;

/// Mask of the 12-bit PSI section length within its byte pair.
pub const SECTION_LEN_MASK: u16 = 0x0fff;

/// Mask of the 10-bit program info / ES info length within its byte pair.
pub const PROGRAM_INFO_LEN_MASK: u16 = 0x03ff;

/// Largest value representable by a 33-bit PTS/DTS/PCR base.
pub const MAX_TIMESTAMP: u64 = (1 << 33) - 1;

/// Marker nibble written in front of a lone PTS.
pub const PTS_ONLY_MARKER: u8 = 0x20;
/// Marker nibble written in front of a PTS that is followed by a DTS.
pub const PTS_WITH_DTS_MARKER: u8 = 0x30;
/// Marker nibble written in front of a DTS.
pub const DTS_MARKER: u8 = 0x10;

/// Reads the masked big-endian field held by `b[0..2]`.
pub fn read_masked(b: &[u8], mask: u16) -> u16 {
    u16::from_be_bytes([b[0], b[1]]) & mask
}

/// Writes `value` into the masked bits of `b[0..2]`, leaving bits outside
/// `mask` untouched.
pub fn write_masked(b: &mut [u8], mask: u16, value: u16) {
    let cur = u16::from_be_bytes([b[0], b[1]]);
    let next = (cur & !mask) | (value & mask);
    b[..2].copy_from_slice(&next.to_be_bytes());
}

/// Decodes a PID from the two header bytes that carry it.
pub fn read_pid(b: &[u8]) -> u16 {
    read_masked(b, PID_MASK)
}

/// Returns the byte pair for a 13-bit field whose top three bits are
/// reserved and set to one (PMT PIDs, PCR PIDs, elementary PIDs).
pub fn reserved_pid_bytes(pid: u16) -> [u8; 2] {
    (0xe000 | (pid & PID_MASK)).to_be_bytes()
}

/// Returns the byte pair holding the section syntax indicator, private bit,
/// two reserved bits (set) and a 12-bit section length.
pub fn section_header_bytes(syntax: bool, private: bool, len: u16) -> [u8; 2] {
    let mut v = 0x3000 | (len & SECTION_LEN_MASK);
    if syntax {
        v |= 0x8000;
    }
    if private {
        v |= 0x4000;
    }
    v.to_be_bytes()
}

/// Returns the byte pair for a 10-bit info length preceded by reserved bits.
pub fn info_len_bytes(len: u16) -> [u8; 2] {
    (0xf000 | (len & PROGRAM_INFO_LEN_MASK)).to_be_bytes()
}

/// Packs a 33-bit timestamp into the 5-byte PES layout: the marker nibble
/// and bits 32..30, then two 15-bit chunks, each chunk followed by a
/// mandatory marker bit.
pub fn encode_timestamp(marker: u8, ts: u64) -> [u8; 5] {
    let ts = ts & MAX_TIMESTAMP;
    let hi = ((ts >> 29) & 0x0e) as u8;
    let mid = (((ts >> 14) & 0xfffe) | 0x01) as u16;
    let lo = (((ts << 1) & 0xfffe) | 0x01) as u16;
    let mid = mid.to_be_bytes();
    let lo = lo.to_be_bytes();
    [marker | hi | 0x01, mid[0], mid[1], lo[0], lo[1]]
}

/// Unpacks a timestamp written by [`encode_timestamp`].
pub fn decode_timestamp(d: &[u8]) -> u64 {
    (((d[0] as u64 >> 1) & 0x07) << 30)
        | ((d[1] as u64) << 22)
        | (((d[2] as u64 >> 1) & 0x7f) << 15)
        | ((d[3] as u64) << 7)
        | ((d[4] as u64 >> 1) & 0x7f)
}

/// Packs a 90 kHz clock reference base into the 6-byte adaptation field
/// layout: 33 bits of base, 6 reserved bits set to one, 9-bit extension.
pub fn encode_pcr(base: u64) -> [u8; 6] {
    let v = ((base & MAX_TIMESTAMP) << 15) | (0x3f << 9);
    let b = v.to_be_bytes();
    [b[2], b[3], b[4], b[5], b[6], b[7]]
}

/// Unpacks the 33-bit base of a clock reference written by [`encode_pcr`].
pub fn decode_pcr(d: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b[2..].copy_from_slice(&d[..6]);
    u64::from_be_bytes(b) >> 15
}
