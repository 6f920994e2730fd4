use bytes::Bytes;

/// One access unit handed to a [`Muxer`](crate::format::Muxer).
#[derive(Debug, Clone)]
pub struct Packet {
    pub data: Bytes,
    /// Caller hint that this unit starts a key/parameter-set group.
    pub is_key: bool,
}

impl Packet {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            is_key: false,
        }
    }

    pub fn with_key_flag(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }
}
