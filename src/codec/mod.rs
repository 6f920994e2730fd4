//! Key-unit probes for the codecs the encoder packetises.
//!
//! The transport stream encoder does not parse codec bitstreams. The only
//! thing it needs to know is whether an access unit opens a new key or
//! parameter-set group, so the key-frame PSI policy can put tables in
//! front of it.

use crate::av::CodecType;

pub mod h264;
pub mod h265;

/// Returns true if an access unit is a key/parameter-set unit.
pub type KeyUnitProbe = fn(&[u8]) -> bool;

/// Returns the default probe for `codec`.
///
/// Intra-only and audio codecs have no dependent units, so every access
/// unit counts as a key unit.
pub fn probe_for(codec: CodecType) -> KeyUnitProbe {
    match codec {
        CodecType::H264 => h264::is_key_unit,
        CodecType::H265 => h265::is_key_unit,
        _ => always_key,
    }
}

fn always_key(_: &[u8]) -> bool {
    true
}

/// Returns the offset just past the first Annex B start code in `data`.
pub(crate) fn after_start_code(data: &[u8]) -> Option<usize> {
    data.windows(3)
        .position(|w| w == [0x00, 0x00, 0x01])
        .map(|i| i + 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_code_offsets() {
        assert_eq!(after_start_code(&[0, 0, 1, 0x67]), Some(3));
        assert_eq!(after_start_code(&[0, 0, 0, 1, 0x67]), Some(4));
        assert_eq!(after_start_code(&[0x67, 0x42]), None);
    }

    #[test]
    fn test_probe_selection() {
        let sps = [0, 0, 0, 1, 0x67, 0x42];
        let slice = [0, 0, 0, 1, 0x41, 0x9a];
        let h264 = probe_for(CodecType::H264);
        assert!(h264(&sps));
        assert!(!h264(&slice));
        assert!(probe_for(CodecType::PCM)(&slice));
        assert!(probe_for(CodecType::MJPEG)(&[0xff, 0xd8]));
    }
}
