/// CRC32 implementation specifically for MPEG-2 TS PSI tables
/// Based on ITU-T H.222.0 / ISO/IEC 13818-1
/// Polynomial: x32 + x26 + x23 + x22 + x16 + x12 + x11 + x10 + x8 + x7 + x5 + x4 + x2 + x + 1
/// Initial value: 0xFFFFFFFF, no final XOR, big-endian digest.
use std::sync::OnceLock;

const CRC32_MPEG2: u32 = 0x04C11DB7;

/// Size of the CRC trailing every PSI section.
pub const CRC_SIZE: usize = 4;

/// MPEG-2 CRC32 calculator used for Transport Stream PSI table validation
///
/// Implements the CRC32 algorithm specified in ITU-T H.222.0 / ISO/IEC 13818-1
/// for validating Program Specific Information (PSI) tables in MPEG-2 Transport Streams.
pub struct Crc32Mpeg2 {
    /// Lookup table for fast CRC calculation
    table: [u32; 256],
}

impl Crc32Mpeg2 {
    /// Creates a new CRC32 calculator with pre-computed lookup table
    pub fn new() -> Self {
        let mut table = [0u32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let mut crc = (i as u32) << 24;
            for _ in 0..8 {
                crc = if (crc & 0x80000000) != 0 {
                    (crc << 1) ^ CRC32_MPEG2
                } else {
                    crc << 1
                };
            }
            *entry = crc;
        }
        Self { table }
    }

    /// Returns a process-wide calculator so callers don't rebuild the table.
    pub fn shared() -> &'static Crc32Mpeg2 {
        static CRC: OnceLock<Crc32Mpeg2> = OnceLock::new();
        CRC.get_or_init(Crc32Mpeg2::new)
    }

    /// Calculates the CRC32 checksum for the given data using the MPEG-2 algorithm
    ///
    /// # Examples
    ///
    /// ```
    /// use tsmeta::utils::Crc32Mpeg2;
    ///
    /// let crc = Crc32Mpeg2::new();
    /// assert_eq!(crc.calculate(b"123456789"), 0x0376E6E7);
    /// ```
    pub fn calculate(&self, data: &[u8]) -> u32 {
        let mut crc = 0xFFFFFFFF;
        for &byte in data {
            let index = ((crc >> 24) ^ (byte as u32)) & 0xFF;
            crc = (crc << 8) ^ self.table[index as usize];
        }
        crc
    }
}

impl Default for Crc32Mpeg2 {
    fn default() -> Self {
        Self::new()
    }
}

/// Recomputes the CRC over `section` (table id through the end of the
/// syntax section) and writes it into the trailing four bytes.
///
/// `section` must already include room for the CRC.
pub fn update_crc(section: &mut [u8]) {
    let end = section.len() - CRC_SIZE;
    let crc = Crc32Mpeg2::shared().calculate(&section[..end]);
    section[end..].copy_from_slice(&crc.to_be_bytes());
}

/// Reports whether the trailing CRC of `section` matches its contents.
pub fn check_crc(section: &[u8]) -> bool {
    if section.len() < CRC_SIZE {
        return false;
    }
    let end = section.len() - CRC_SIZE;
    let crc = Crc32Mpeg2::shared().calculate(&section[..end]);
    section[end..] == crc.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_mpeg2() {
        let crc = Crc32Mpeg2::new();

        // Standard check value for CRC-32/MPEG-2.
        assert_eq!(crc.calculate(b"123456789"), 0x0376E6E7);

        // Single-program PAT pointing at PMT PID 0x1000, as emitted by most muxers.
        let pat_data = [
            0x00, // Table ID (PAT)
            0xB0, 0x0D, // Section syntax indicator, reserved, section length = 13
            0x00, 0x01, // Transport stream ID
            0xC1, // Reserved = 3, Version = 0, Current/Next = 1
            0x00, 0x00, // Section number = 0, Last section number = 0
            0x00, 0x01, // Program number
            0xF0, 0x00, // Program map PID
        ];
        assert_eq!(crc.calculate(&pat_data), 0x2AB104B2);
    }

    #[test]
    fn test_update_and_check() {
        let mut section = vec![0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00, 0x00, 0x01, 0xF0, 0x00];
        section.extend_from_slice(&[0; CRC_SIZE]);
        assert!(!check_crc(&section));
        update_crc(&mut section);
        assert_eq!(&section[12..], &[0x2A, 0xB1, 0x04, 0xB2]);
        assert!(check_crc(&section));
        section[4] ^= 0xff;
        assert!(!check_crc(&section));
    }
}
