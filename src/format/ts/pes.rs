use crate::error::{Result, TsError};
use crate::utils::bits::{
    decode_timestamp, encode_timestamp, DTS_MARKER, PTS_ONLY_MARKER, PTS_WITH_DTS_MARKER,
};
use bytes::{BufMut, BytesMut};

/// Start code prefix of every PES packet.
pub const START_CODE_PREFIX: u32 = 0x000001;

/// Size of the fixed part of a PES header, up to and including the header
/// data length byte.
pub const PES_FIXED_HEADER_SIZE: usize = 9;

const TIMESTAMP_SIZE: usize = 5;

/// Value of the two PTS/DTS indicator bits.
const PTS_ONLY: u8 = 0b10;
const PTS_AND_DTS: u8 = 0b11;

/// Packetized Elementary Stream (PES) header structure
///
/// Contains fields defined in the MPEG-TS specification for PES headers,
/// including timing information and various control flags. Timestamps are
/// in 90 kHz ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PESHeader {
    /// Stream identifier indicating content type (video/audio/etc.)
    pub stream_id: u8,
    /// Length of everything after this field; 0 means unbounded
    pub packet_length: u16,
    /// Control field for scrambling mode
    pub scrambling_control: u8,
    /// Priority flag for the packet
    pub priority: bool,
    /// Data alignment indicator
    pub data_alignment: bool,
    /// Copyright indicator
    pub copyright: bool,
    /// Original/copy indicator
    pub original: bool,
    /// ESCR (Extended System Clock Reference) flag
    pub escr_flag: bool,
    /// Elementary Stream rate flag
    pub es_rate_flag: bool,
    /// DSM trick mode flag
    pub dsm_trick_mode_flag: bool,
    /// Additional copy info flag
    pub additional_copy_info_flag: bool,
    /// CRC flag
    pub crc_flag: bool,
    /// Extension flag
    pub extension_flag: bool,
    /// Presentation Time Stamp (33 bits)
    pub pts: Option<u64>,
    /// Decoding Time Stamp (33 bits), only written alongside a PTS
    pub dts: Option<u64>,
    /// Stuffing bytes placed after the optional fields
    pub stuffing: usize,
}

impl PESHeader {
    /// Creates a new PES header with a specific stream ID.
    pub fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            ..Default::default()
        }
    }

    pub fn with_pts(mut self, pts: u64) -> Self {
        self.pts = Some(pts);
        self
    }

    pub fn with_dts(mut self, dts: u64) -> Self {
        self.dts = Some(dts);
        self
    }

    fn pts_dts_flags(&self) -> u8 {
        match (self.pts, self.dts) {
            (Some(_), Some(_)) => PTS_AND_DTS,
            (Some(_), None) => PTS_ONLY,
            _ => 0,
        }
    }

    /// Length of the optional fields plus stuffing, as written to the
    /// header data length byte.
    pub fn header_data_length(&self) -> usize {
        let ts = match self.pts_dts_flags() {
            PTS_AND_DTS => 2 * TIMESTAMP_SIZE,
            PTS_ONLY => TIMESTAMP_SIZE,
            _ => 0,
        };
        ts + self.stuffing
    }

    /// Total encoded header size.
    pub fn len(&self) -> usize {
        PES_FIXED_HEADER_SIZE + self.header_data_length()
    }

    /// Writes the PES header to a BytesMut buffer.
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        let header_len = self.header_data_length();
        if header_len > u8::MAX as usize {
            return Err(TsError::InvalidPes("header data too long"));
        }

        buf.put_u8((START_CODE_PREFIX >> 16) as u8);
        buf.put_u8((START_CODE_PREFIX >> 8) as u8);
        buf.put_u8(START_CODE_PREFIX as u8);
        buf.put_u8(self.stream_id);
        buf.put_u16(self.packet_length);

        // '10' marker, then scrambling and the four indicator bits
        let mut flags = 0x80 | (self.scrambling_control & 0x03) << 4;
        if self.priority {
            flags |= 0x08;
        }
        if self.data_alignment {
            flags |= 0x04;
        }
        if self.copyright {
            flags |= 0x02;
        }
        if self.original {
            flags |= 0x01;
        }
        buf.put_u8(flags);

        let mut flags2 = self.pts_dts_flags() << 6;
        if self.escr_flag {
            flags2 |= 0x20;
        }
        if self.es_rate_flag {
            flags2 |= 0x10;
        }
        if self.dsm_trick_mode_flag {
            flags2 |= 0x08;
        }
        if self.additional_copy_info_flag {
            flags2 |= 0x04;
        }
        if self.crc_flag {
            flags2 |= 0x02;
        }
        if self.extension_flag {
            flags2 |= 0x01;
        }
        buf.put_u8(flags2);
        buf.put_u8(header_len as u8);

        match (self.pts, self.dts) {
            (Some(pts), Some(dts)) => {
                buf.put_slice(&encode_timestamp(PTS_WITH_DTS_MARKER, pts));
                buf.put_slice(&encode_timestamp(DTS_MARKER, dts));
            }
            (Some(pts), None) => buf.put_slice(&encode_timestamp(PTS_ONLY_MARKER, pts)),
            _ => {}
        }
        buf.put_bytes(0xff, self.stuffing);
        Ok(())
    }

    /// Decodes a header from the start of `data`, returning it with the
    /// bytes that follow it.
    ///
    /// Optional fields other than PTS/DTS are skipped using the header data
    /// length; whatever they occupy beyond the timestamps is reported as
    /// stuffing.
    pub fn parse(data: &[u8]) -> Result<(PESHeader, &[u8])> {
        if data.len() < PES_FIXED_HEADER_SIZE {
            return Err(TsError::InvalidPes("header truncated"));
        }
        if data[0..3] != [0x00, 0x00, 0x01] {
            return Err(TsError::InvalidPes("bad start code prefix"));
        }
        let flags = data[6];
        let flags2 = data[7];
        let header_len = data[8] as usize;
        let end = PES_FIXED_HEADER_SIZE + header_len;
        if data.len() < end {
            return Err(TsError::InvalidPes("optional fields truncated"));
        }

        let mut h = PESHeader {
            stream_id: data[3],
            packet_length: u16::from_be_bytes([data[4], data[5]]),
            scrambling_control: (flags >> 4) & 0x03,
            priority: flags & 0x08 != 0,
            data_alignment: flags & 0x04 != 0,
            copyright: flags & 0x02 != 0,
            original: flags & 0x01 != 0,
            escr_flag: flags2 & 0x20 != 0,
            es_rate_flag: flags2 & 0x10 != 0,
            dsm_trick_mode_flag: flags2 & 0x08 != 0,
            additional_copy_info_flag: flags2 & 0x04 != 0,
            crc_flag: flags2 & 0x02 != 0,
            extension_flag: flags2 & 0x01 != 0,
            ..Default::default()
        };

        let opt = &data[PES_FIXED_HEADER_SIZE..end];
        let ts_len = match flags2 >> 6 {
            PTS_AND_DTS => 2 * TIMESTAMP_SIZE,
            PTS_ONLY => TIMESTAMP_SIZE,
            _ => 0,
        };
        if opt.len() < ts_len {
            return Err(TsError::InvalidPes("timestamp truncated"));
        }
        if ts_len >= TIMESTAMP_SIZE {
            h.pts = Some(decode_timestamp(&opt[..TIMESTAMP_SIZE]));
        }
        if ts_len == 2 * TIMESTAMP_SIZE {
            h.dts = Some(decode_timestamp(&opt[TIMESTAMP_SIZE..]));
        }
        h.stuffing = opt.len() - ts_len;

        Ok((h, &data[end..]))
    }
}

/// Represents a complete Packetized Elementary Stream (PES) packet.
#[derive(Debug)]
pub struct PESPacket<'a> {
    /// PES header containing metadata and flags
    pub header: PESHeader,
    /// Access unit carried by the packet
    pub payload: &'a [u8],
}

impl<'a> PESPacket<'a> {
    pub fn new(stream_id: u8, payload: &'a [u8]) -> Self {
        Self {
            header: PESHeader::new(stream_id),
            payload,
        }
    }

    pub fn with_pts(mut self, pts: u64) -> Self {
        self.header = self.header.with_pts(pts);
        self
    }

    pub fn with_dts(mut self, dts: u64) -> Self {
        self.header = self.header.with_dts(dts);
        self
    }

    /// Writes the complete PES packet to a BytesMut buffer.
    ///
    /// The packet length field is filled in when the packet fits in 16
    /// bits and left at zero (unbounded) otherwise.
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        let mut header = self.header.clone();
        let after_len = self.len() - 6;
        header.packet_length = u16::try_from(after_len).unwrap_or(0);
        buf.reserve(self.len());
        header.write_to(buf)?;
        buf.extend_from_slice(self.payload);
        Ok(())
    }

    /// Returns the total length of the PES packet in bytes.
    pub fn len(&self) -> usize {
        self.header.len() + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::types::STREAM_ID_VIDEO;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pes_packet_writing() {
        let mut buf = BytesMut::new();
        let payload = [0u8; 10];
        let packet = PESPacket::new(STREAM_ID_VIDEO, &payload).with_pts(90_000);

        packet.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 9 + 5 + 10);

        // Verify start code prefix
        assert_eq!(&buf[0..3], &[0x00, 0x00, 0x01]);
        assert_eq!(buf[3], STREAM_ID_VIDEO);
        assert_eq!(u16::from_be_bytes([buf[4], buf[5]]), 18);
        assert_eq!(buf[6], 0x80);
        assert_eq!(buf[7], 0x80);
        assert_eq!(buf[8], 5);
        assert_eq!(buf[9] & 0xf0, PTS_ONLY_MARKER);
    }

    #[test]
    fn test_pts_and_dts() {
        let mut buf = BytesMut::new();
        let packet = PESPacket::new(STREAM_ID_VIDEO, b"au")
            .with_pts(63_000)
            .with_dts(60_000);
        packet.write_to(&mut buf).unwrap();
        assert_eq!(buf[7], 0xc0);
        assert_eq!(buf[8], 10);
        assert_eq!(buf[9] & 0xf0, PTS_WITH_DTS_MARKER);
        assert_eq!(buf[14] & 0xf0, DTS_MARKER);

        let (h, data) = PESHeader::parse(&buf).unwrap();
        assert_eq!(h.pts, Some(63_000));
        assert_eq!(h.dts, Some(60_000));
        assert_eq!(data, b"au");
    }

    #[test]
    fn test_parse_with_stuffing() {
        let mut header = PESHeader::new(0xc0).with_pts(12_345);
        header.stuffing = 3;
        header.data_alignment = true;
        let mut buf = BytesMut::new();
        header.write_to(&mut buf).unwrap();
        buf.extend_from_slice(&[1, 2, 3]);

        let (got, data) = PESHeader::parse(&buf).unwrap();
        assert_eq!(got, header);
        assert_eq!(data, &[1, 2, 3]);
    }

    #[test]
    fn test_unbounded_length() {
        let payload = vec![0u8; 70_000];
        let mut buf = BytesMut::new();
        PESPacket::new(STREAM_ID_VIDEO, &payload)
            .with_pts(0)
            .write_to(&mut buf)
            .unwrap();
        assert_eq!(&buf[4..6], &[0, 0]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            PESHeader::parse(&[0x47, 0, 1, 0xe0, 0, 0, 0x80, 0x80, 5]),
            Err(TsError::InvalidPes(_))
        ));
        assert!(matches!(
            PESHeader::parse(&[0, 0, 1, 0xe0, 0, 0, 0x80, 0x80, 5, 0x21]),
            Err(TsError::InvalidPes(_))
        ));
    }
}
