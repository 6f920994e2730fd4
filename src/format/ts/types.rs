use crate::av::CodecType;
use crate::error::{Result, TsError};
use std::time::Duration;

// PES stream IDs
pub const STREAM_ID_VIDEO: u8 = 0xe0;
pub const STREAM_ID_AUDIO: u8 = 0xc0;

// PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_AUDIO: u16 = 210;
pub const PID_VIDEO: u16 = 0x0100;
pub const PID_PMT: u16 = 0x1000;

// Table IDs
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;

// Elementary stream types carried in the PMT
pub const STREAM_TYPE_H264: u8 = 27;
pub const STREAM_TYPE_H265: u8 = 36;
pub const STREAM_TYPE_MJPEG: u8 = 136;
pub const STREAM_TYPE_JPEG: u8 = 137;
pub const STREAM_TYPE_PCM: u8 = 192;
pub const STREAM_TYPE_ADPCM: u8 = 193;

// Descriptor tag of the metadata descriptor in the PMT program info loop
pub const METADATA_TAG: u8 = 0x26;

// Constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_PAYLOAD_SIZE: usize = TS_PACKET_SIZE - TS_HEADER_SIZE;
pub const SYNC_BYTE: u8 = 0x47;
pub const PTS_HZ: u64 = 90_000;

// Adaptation field control values (bits 5..4 of header byte 3)
pub const AFC_PAYLOAD_ONLY: u8 = 0x1;
pub const AFC_ADAPTATION_ONLY: u8 = 0x2;
pub const AFC_ADAPTATION_AND_PAYLOAD: u8 = 0x3;

/// PID, PMT stream type and PES stream id used for one codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaParams {
    pub pid: u16,
    pub stream_type: u8,
    pub stream_id: u8,
}

impl MediaParams {
    /// Looks up the fixed codec table: video codecs go on [`PID_VIDEO`],
    /// audio codecs on [`PID_AUDIO`].
    pub fn for_codec(codec: CodecType) -> Result<Self> {
        let stream_type = match codec {
            CodecType::H264 => STREAM_TYPE_H264,
            CodecType::H265 => STREAM_TYPE_H265,
            CodecType::MJPEG => STREAM_TYPE_MJPEG,
            CodecType::JPEG => STREAM_TYPE_JPEG,
            CodecType::PCM => STREAM_TYPE_PCM,
            CodecType::ADPCM => STREAM_TYPE_ADPCM,
            CodecType::AAC => return Err(TsError::UnsupportedMedia),
        };
        let (pid, stream_id) = if codec.is_video() {
            (PID_VIDEO, STREAM_ID_VIDEO)
        } else {
            (PID_AUDIO, STREAM_ID_AUDIO)
        };
        Ok(Self {
            pid,
            stream_type,
            stream_id,
        })
    }
}

/// Returns the MIME type for a PMT stream type.
pub fn sid_to_mime_type(stream_type: u8) -> Result<&'static str> {
    match stream_type {
        STREAM_TYPE_H264 => Ok("video/h264"),
        STREAM_TYPE_H265 => Ok("video/h265"),
        STREAM_TYPE_MJPEG => Ok("video/x-motion-jpeg"),
        STREAM_TYPE_JPEG => Ok("image/jpeg"),
        STREAM_TYPE_PCM => Ok("audio/pcm"),
        STREAM_TYPE_ADPCM => Ok("audio/adpcm"),
        _ => Err(TsError::InvalidData(format!(
            "unknown stream type {}",
            stream_type
        ))),
    }
}

/// Decoded 4-byte transport packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TSHeader {
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
}

impl TSHeader {
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control & AFC_ADAPTATION_ONLY != 0
    }

    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control & AFC_PAYLOAD_ONLY != 0
    }
}

/// Decoded adaptation field. Only the fields the framer can produce are
/// kept; the remaining flags are exposed so callers can detect them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptationField {
    pub length: usize,
    pub discontinuity: bool,
    pub random_access: bool,
    pub es_priority: bool,
    pub pcr_flag: bool,
    pub opcr_flag: bool,
    pub splicing_point_flag: bool,
    pub private_data_flag: bool,
    pub extension_flag: bool,
    pub pcr: Option<u64>,
}

// Time conversion utilities
pub fn pts_to_time(pts: u64) -> Duration {
    // Split into whole seconds first so no input overflows.
    let nanos = (pts % PTS_HZ) * 1_000_000_000 / PTS_HZ;
    Duration::new(pts / PTS_HZ, nanos as u32)
}

pub fn time_to_pts(time: Duration) -> u64 {
    (time.as_nanos() * PTS_HZ as u128 / 1_000_000_000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_table() {
        let p = MediaParams::for_codec(CodecType::H265).unwrap();
        assert_eq!(p.pid, PID_VIDEO);
        assert_eq!(p.stream_type, STREAM_TYPE_H265);
        assert_eq!(p.stream_id, STREAM_ID_VIDEO);

        let p = MediaParams::for_codec(CodecType::ADPCM).unwrap();
        assert_eq!(p.pid, PID_AUDIO);
        assert_eq!(p.stream_id, STREAM_ID_AUDIO);

        assert!(matches!(
            MediaParams::for_codec(CodecType::AAC),
            Err(TsError::UnsupportedMedia)
        ));
    }

    #[test]
    fn test_time_conversion() {
        assert_eq!(time_to_pts(Duration::from_millis(40)), 3600);
        assert_eq!(time_to_pts(Duration::from_millis(700)), 63_000);
        assert_eq!(pts_to_time(90_000), Duration::from_secs(1));
    }

    #[test]
    fn test_pts_to_time_large_values() {
        assert_eq!(pts_to_time(90_000_000_000), Duration::from_secs(1_000_000));
        assert_eq!(pts_to_time(90_000 * 86_400 * 365), Duration::from_secs(86_400 * 365));
        assert_eq!(pts_to_time(u64::MAX).as_secs(), u64::MAX / PTS_HZ);
        assert_eq!(pts_to_time(45), Duration::from_micros(500));
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(sid_to_mime_type(STREAM_TYPE_H264).unwrap(), "video/h264");
        assert_eq!(sid_to_mime_type(STREAM_TYPE_PCM).unwrap(), "audio/pcm");
        assert!(sid_to_mime_type(0x99).is_err());
    }
}
