/// Media codecs the library knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecType {
    H264,
    H265,
    MJPEG,
    JPEG,
    PCM,
    ADPCM,
    AAC, // recognised, but not packetised by the TS encoder
}

impl CodecType {
    pub fn is_video(&self) -> bool {
        matches!(
            self,
            CodecType::H264 | CodecType::H265 | CodecType::MJPEG | CodecType::JPEG
        )
    }
}

mod packet;
pub use packet::*;
