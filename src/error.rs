use std::fmt;
use thiserror::Error;

/// Adaptation field features that the packet framer refuses to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptationFeature {
    /// Original program clock reference (OPCR).
    OriginalPcr,
    /// Splice countdown.
    SpliceCountdown,
    /// Transport private data.
    PrivateData,
    /// Adaptation field extension.
    Extension,
}

impl fmt::Display for AdaptationFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdaptationFeature::OriginalPcr => "original program clock reference",
            AdaptationFeature::SpliceCountdown => "splice countdown",
            AdaptationFeature::PrivateData => "transport private data",
            AdaptationFeature::Extension => "adaptation field extension",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum TsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MPEG-TS data of length {0} is not a whole number of packets")]
    InvalidSize(usize),

    #[error("could not find packet with PID {0}")]
    PidNotFound(u16),

    #[error("more than one program not supported")]
    MultiplePrograms,

    #[error("PAT and PMT are not in consecutive packets")]
    NotConsecutive,

    #[error("no programs in PAT")]
    NoPrograms,

    #[error("could not find PTS")]
    NoPts,

    #[error("invalid metadata header")]
    InvalidMetadata,

    #[error("unexpected metadata format")]
    UnexpectedMetaFormat,

    #[error("metadata key {0:?} does not exist")]
    MetaKeyAbsent(String),

    #[error("PMT does not contain metadata")]
    NoMeta,

    #[error("not enough space in PSI: section would be {needed} bytes, max {max}")]
    CapacityExceeded { needed: usize, max: usize },

    #[error("unsupported adaptation feature: {0}")]
    UnsupportedAdaptation(AdaptationFeature),

    #[error("invalid range: 'from' must precede 'to'")]
    InvalidRange,

    #[error("range lower bound cannot be found")]
    LowerBoundNotFound,

    #[error("range upper bound cannot be found")]
    UpperBoundNotFound,

    #[error("no payload")]
    NoPayload,

    #[error("descriptor with tag {0:#04x} not found")]
    DescriptorNotFound(u8),

    #[error("table is not a PMT")]
    NotPmt,

    #[error("first packet is not a PAT")]
    NotPat,

    #[error("payload of {len} bytes exceeds packet capacity of {capacity}")]
    PayloadOverflow { len: usize, capacity: usize },

    #[error("invalid PES: {0}")]
    InvalidPes(&'static str),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("unsupported media type")]
    UnsupportedMedia,

    #[error("invalid access unit rate {0}")]
    InvalidRate(f64),

    #[error("stream map is empty")]
    EmptyStreamMap,
}

pub type Result<T> = std::result::Result<T, TsError>;
