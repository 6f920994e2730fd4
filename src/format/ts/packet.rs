//! Encoding and decoding of individual 188-byte transport packets.
//!
//! ```text
//! | octet 0  | sync byte (0x47)                                      |
//! | octet 1  | TEI | PUSI | Prior | PID (bits 12..8)                 |
//! | octet 2  | PID (bits 7..0)                                       |
//! | octet 3  | TSC (2) | AFC (2) | CC (4)                            |
//! | octet 4  | adaptation field length                               |
//! | octet 5  | DI | RAI | ESPI | PCRF | OPCRF | SPF | TPDF | AFEF    |
//! | optional | PCR (6 bytes)                                         |
//! | optional | stuffing (0xFF)                                       |
//! | optional | payload                                               |
//! ```

use super::parser::parse_adaptation_field;
use super::parser::parse_header;
use super::types::*;
use crate::error::{AdaptationFeature, Result, TsError};
use crate::utils::bits::{self, PID_MASK};
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the adaptation field length byte plus its flags byte.
const ADAPTATION_HEADER_SIZE: usize = 2;
/// Size of an encoded PCR.
const PCR_SIZE: usize = 6;

const DISCONTINUITY_MASK: u8 = 0x80;
const AFC_MASK: u8 = 0x30;

/// A transport packet whose payload borrows from the caller's buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TsPacket<'a> {
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
    pub discontinuity: bool,
    pub random_access: bool,
    pub es_priority: bool,
    pub pcr_flag: bool,
    pub opcr_flag: bool,
    pub splicing_point_flag: bool,
    pub private_data_flag: bool,
    pub extension_flag: bool,
    /// 90 kHz clock reference base, written when `pcr_flag` is set.
    pub pcr: u64,
    pub payload: &'a [u8],
}

impl<'a> TsPacket<'a> {
    fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control & AFC_ADAPTATION_ONLY != 0
    }

    /// Number of payload bytes this packet can carry given its adaptation
    /// field settings.
    pub fn payload_capacity(&self) -> usize {
        if !self.has_adaptation_field() {
            return TS_PAYLOAD_SIZE;
        }
        let pcr = if self.pcr_flag { PCR_SIZE } else { 0 };
        TS_PAYLOAD_SIZE - ADAPTATION_HEADER_SIZE - pcr
    }

    /// Takes as much of `data` as fits in the packet and returns how many
    /// bytes were taken, so the caller can continue with the remainder.
    pub fn fill_payload(&mut self, data: &'a [u8]) -> usize {
        let n = data.len().min(self.payload_capacity());
        self.payload = &data[..n];
        n
    }

    fn check_supported(&self) -> Result<()> {
        let unsupported = [
            (self.opcr_flag, AdaptationFeature::OriginalPcr),
            (self.splicing_point_flag, AdaptationFeature::SpliceCountdown),
            (self.private_data_flag, AdaptationFeature::PrivateData),
            (self.extension_flag, AdaptationFeature::Extension),
        ];
        match unsupported.iter().find(|(set, _)| *set) {
            Some((_, feature)) => Err(TsError::UnsupportedAdaptation(*feature)),
            None => Ok(()),
        }
    }

    /// Writes exactly [`TS_PACKET_SIZE`] bytes to `buf`.
    ///
    /// With an adaptation field, stuffing is placed inside it so the payload
    /// ends the packet exactly. Without one, a short payload is padded with
    /// 0xFF after it, which is only meaningful for PSI payloads.
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        self.check_supported()?;

        let capacity = if self.adaptation_field_control & AFC_PAYLOAD_ONLY != 0 {
            self.payload_capacity()
        } else {
            0
        };
        if self.payload.len() > capacity {
            return Err(TsError::PayloadOverflow {
                len: self.payload.len(),
                capacity,
            });
        }

        let start = buf.len();
        buf.reserve(TS_PACKET_SIZE);
        buf.put_u8(SYNC_BYTE);

        let mut b1 = ((self.pid & PID_MASK) >> 8) as u8;
        if self.transport_error {
            b1 |= 0x80;
        }
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        if self.priority {
            b1 |= 0x20;
        }
        buf.put_u8(b1);
        buf.put_u8((self.pid & 0xff) as u8);
        buf.put_u8(
            (self.scrambling_control & 0x03) << 6
                | (self.adaptation_field_control & 0x03) << 4
                | (self.continuity_counter & 0x0f),
        );

        if self.has_adaptation_field() {
            let max_payload = TS_PAYLOAD_SIZE
                - ADAPTATION_HEADER_SIZE
                - if self.pcr_flag { PCR_SIZE } else { 0 };
            let stuffing = max_payload - self.payload.len();
            let pcr_len = if self.pcr_flag { PCR_SIZE } else { 0 };
            buf.put_u8((1 + pcr_len + stuffing) as u8);

            let mut flags = 0u8;
            if self.discontinuity {
                flags |= DISCONTINUITY_MASK;
            }
            if self.random_access {
                flags |= 0x40;
            }
            if self.es_priority {
                flags |= 0x20;
            }
            if self.pcr_flag {
                flags |= 0x10;
            }
            buf.put_u8(flags);

            if self.pcr_flag {
                buf.put_slice(&bits::encode_pcr(self.pcr));
            }
            buf.put_bytes(0xff, stuffing);
            buf.put_slice(self.payload);
        } else {
            buf.put_slice(self.payload);
            let written = buf.len() - start;
            buf.put_bytes(0xff, TS_PACKET_SIZE - written);
        }

        debug_assert_eq!(buf.len() - start, TS_PACKET_SIZE);
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(TS_PACKET_SIZE);
        self.write_to(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decodes a packet, borrowing its payload from `data`.
    pub fn parse(data: &'a [u8]) -> Result<TsPacket<'a>> {
        let header = parse_header(data)?;
        let mut pkt = TsPacket {
            transport_error: header.transport_error,
            payload_unit_start: header.payload_unit_start,
            priority: header.transport_priority,
            pid: header.pid,
            scrambling_control: header.scrambling_control,
            adaptation_field_control: header.adaptation_field_control,
            continuity_counter: header.continuity_counter,
            ..Default::default()
        };
        if let Some(af) = parse_adaptation_field(data)? {
            pkt.discontinuity = af.discontinuity;
            pkt.random_access = af.random_access;
            pkt.es_priority = af.es_priority;
            pkt.pcr_flag = af.pcr_flag;
            pkt.opcr_flag = af.opcr_flag;
            pkt.splicing_point_flag = af.splicing_point_flag;
            pkt.private_data_flag = af.private_data_flag;
            pkt.extension_flag = af.extension_flag;
            pkt.pcr = af.pcr.unwrap_or(0);
        }
        if header.has_payload() {
            pkt.payload = payload(data)?;
        }
        Ok(pkt)
    }
}

fn check_len(p: &[u8]) -> Result<()> {
    if p.len() < TS_PACKET_SIZE {
        return Err(TsError::InvalidSize(p.len()));
    }
    Ok(())
}

/// Returns the PID of the packet starting at `p`.
pub fn pid(p: &[u8]) -> Result<u16> {
    check_len(p)?;
    Ok(bits::read_pid(&p[1..3]))
}

/// Returns the continuity counter of the packet starting at `p`.
pub fn continuity_counter(p: &[u8]) -> Result<u8> {
    check_len(p)?;
    Ok(p[3] & 0x0f)
}

/// Returns the payload of the packet starting at `p`, skipping any
/// adaptation field. This is a view, not a copy.
pub fn payload(p: &[u8]) -> Result<&[u8]> {
    check_len(p)?;
    let afc = (p[3] & AFC_MASK) >> 4;
    if afc == AFC_ADAPTATION_ONLY {
        return Err(TsError::NoPayload);
    }
    let off = if afc & AFC_ADAPTATION_ONLY != 0 {
        TS_HEADER_SIZE + 1 + p[4] as usize
    } else {
        TS_HEADER_SIZE
    };
    if off > TS_PACKET_SIZE {
        return Err(TsError::InvalidData(format!(
            "adaptation field length {} overruns packet",
            p[4]
        )));
    }
    Ok(&p[off..TS_PACKET_SIZE])
}

/// Gives the packet at `p` an empty adaptation field (length 1, no flags).
///
/// The payload is shifted along by two bytes and its last two bytes are
/// dropped, so this is only lossless for stuffed packets such as PSI.
pub fn add_adaptation_field(p: &mut [u8]) -> Result<()> {
    check_len(p)?;
    if p[3] & (AFC_ADAPTATION_ONLY << 4) != 0 {
        return Err(TsError::InvalidData(
            "adaptation field is already present in packet".into(),
        ));
    }
    p.copy_within(
        TS_HEADER_SIZE..TS_PACKET_SIZE - ADAPTATION_HEADER_SIZE,
        TS_HEADER_SIZE + ADAPTATION_HEADER_SIZE,
    );
    p[3] |= AFC_MASK;
    p[4] = 1;
    p[5] = 0x00;
    Ok(())
}

/// Sets or clears the discontinuity indicator of the packet at `p`,
/// creating an adaptation field if it has none.
pub fn set_discontinuity(p: &mut [u8], on: bool) -> Result<()> {
    check_len(p)?;
    if p[3] & (AFC_ADAPTATION_ONLY << 4) == 0 {
        add_adaptation_field(p)?;
    } else if p[4] == 0 {
        // A zero-length field has no flags byte; make room for one.
        p.copy_within(TS_HEADER_SIZE + 1..TS_PACKET_SIZE - 1, TS_HEADER_SIZE + 2);
        p[4] = 1;
        p[5] = 0x00;
    }
    if on {
        p[5] |= DISCONTINUITY_MASK;
    } else {
        p[5] &= !DISCONTINUITY_MASK;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quickcheck_macros::quickcheck;

    fn media_packet(payload: &[u8]) -> TsPacket<'_> {
        TsPacket {
            payload_unit_start: true,
            pid: PID_VIDEO,
            random_access: true,
            pcr_flag: true,
            pcr: 63_000,
            continuity_counter: 3,
            adaptation_field_control: AFC_ADAPTATION_AND_PAYLOAD,
            payload,
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_layout() {
        let data = [0xaa; 10];
        let b = media_packet(&data).to_bytes().unwrap();
        assert_eq!(b.len(), TS_PACKET_SIZE);
        assert_eq!(b[0], SYNC_BYTE);
        assert_eq!(b[1], 0x41);
        assert_eq!(b[2], 0x00);
        assert_eq!(b[3], 0x33);
        // Length covers flags, PCR and stuffing.
        assert_eq!(b[4] as usize, TS_PACKET_SIZE - 5 - data.len());
        assert_eq!(b[5], 0x50);
        assert_eq!(&b[TS_PACKET_SIZE - 10..], &data);
        assert_eq!(b[12], 0xff);
    }

    #[test]
    fn test_fill_payload_fragments() {
        let data = vec![1u8; 400];
        let mut first = media_packet(&[]);
        let n = first.fill_payload(&data);
        assert_eq!(n, TS_PACKET_SIZE - 12);

        let mut next = TsPacket {
            pid: PID_VIDEO,
            adaptation_field_control: AFC_ADAPTATION_AND_PAYLOAD,
            ..Default::default()
        };
        let m = next.fill_payload(&data[n..]);
        assert_eq!(m, TS_PACKET_SIZE - 6);

        let mut plain = TsPacket {
            adaptation_field_control: AFC_PAYLOAD_ONLY,
            ..Default::default()
        };
        assert_eq!(plain.fill_payload(&data), TS_PAYLOAD_SIZE);
    }

    #[test]
    fn test_unsupported_adaptation_features() {
        let mut pkt = media_packet(&[]);
        pkt.opcr_flag = true;
        assert!(matches!(
            pkt.to_bytes(),
            Err(TsError::UnsupportedAdaptation(AdaptationFeature::OriginalPcr))
        ));
        pkt.opcr_flag = false;
        pkt.extension_flag = true;
        assert!(matches!(
            pkt.to_bytes(),
            Err(TsError::UnsupportedAdaptation(AdaptationFeature::Extension))
        ));
    }

    #[test]
    fn test_payload_overflow() {
        let data = [0u8; 180];
        assert!(matches!(
            media_packet(&data).to_bytes(),
            Err(TsError::PayloadOverflow { len: 180, capacity: 176 })
        ));
    }

    #[test]
    fn test_adaptation_only_has_no_payload() {
        let pkt = TsPacket {
            pid: PID_VIDEO,
            adaptation_field_control: AFC_ADAPTATION_ONLY,
            discontinuity: true,
            ..Default::default()
        };
        let b = pkt.to_bytes().unwrap();
        assert_eq!(b[4], 183);
        assert!(matches!(payload(&b), Err(TsError::NoPayload)));
    }

    #[test]
    fn test_set_discontinuity_on_plain_packet() {
        let mut p = TsPacket {
            payload_unit_start: true,
            adaptation_field_control: AFC_PAYLOAD_ONLY,
            payload: &[0x00, 0x00, 0xb0],
            ..Default::default()
        }
        .to_bytes()
        .unwrap()
        .to_vec();
        set_discontinuity(&mut p, true).unwrap();
        assert_eq!(p[3] & AFC_MASK, AFC_MASK);
        assert_eq!(p[4], 1);
        assert_eq!(p[5], DISCONTINUITY_MASK);
        assert_eq!(&payload(&p).unwrap()[..3], &[0x00, 0x00, 0xb0]);

        let parsed = TsPacket::parse(&p).unwrap();
        assert!(parsed.discontinuity);
        assert!(parsed.payload_unit_start);
    }

    #[quickcheck]
    fn prop_round_trip(pid: u16, pcr: u64, cc: u8, data: Vec<u8>) -> bool {
        let mut pkt = media_packet(&[]);
        pkt.pid = pid & PID_MASK;
        pkt.pcr = pcr & bits::MAX_TIMESTAMP;
        pkt.continuity_counter = cc & 0x0f;
        pkt.fill_payload(&data);

        let b = match pkt.to_bytes() {
            Ok(b) => b,
            Err(_) => return false,
        };
        let got = match TsPacket::parse(&b) {
            Ok(p) => p,
            Err(_) => return false,
        };
        b.len() == TS_PACKET_SIZE
            && got.pid == pkt.pid
            && got.payload_unit_start
            && got.random_access
            && got.pcr == pkt.pcr
            && got.continuity_counter == pkt.continuity_counter
            && got.payload == pkt.payload
    }
}
