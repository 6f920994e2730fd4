//! Program Specific Information: PAT and PMT encoding, decoding and
//! in-place descriptor editing.
//!
//! Encoded tables carry a leading pointer field, so every index below is
//! relative to the pointer field rather than the table id:
//!
//! ```text
//! 0      pointer field
//! 1      table id
//! 2..4   syntax indicator | private | reserved | section length (12 bits)
//! 4..9   table id extension, version, section numbers
//! 9..11  PCR PID                       (PMT only)
//! 11..13 program info length (10 bits) (PMT only)
//! 13..   descriptors, stream entries, CRC32
//! ```

use super::types::*;
use crate::error::{Result, TsError};
use crate::utils::bits::{
    self, info_len_bytes, read_masked, reserved_pid_bytes, section_header_bytes, write_masked,
    PROGRAM_INFO_LEN_MASK, SECTION_LEN_MASK,
};
use crate::utils::crc::{self, CRC_SIZE};
use crate::utils::RangeEdit;
use bytes::{BufMut, Bytes, BytesMut};
use std::ops::Range;

/// Largest syntax section (everything after the section length field) that
/// a table may grow to when descriptors are added.
pub const MAX_SECTION_LEN: usize = 180;

pub const SECTION_LEN_IDX: usize = 2;
pub const PROGRAM_INFO_LEN_IDX: usize = 11;
pub const DESCRIPTORS_IDX: usize = 13;

/// Bytes of the syntax section preceding the table data.
const SYNTAX_HEADER_SIZE: usize = 5;
const DESCRIPTOR_HEADER_SIZE: usize = 2;
const STREAM_HEADER_SIZE: usize = 5;

const PROGRAM_NUMBER: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub tag: u8,
    pub data: Bytes,
}

impl Descriptor {
    pub fn new(tag: u8, data: impl Into<Bytes>) -> Self {
        Self {
            tag,
            data: data.into(),
        }
    }

    fn encoded_len(&self) -> usize {
        DESCRIPTOR_HEADER_SIZE + self.data.len()
    }

    fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        if self.data.len() > u8::MAX as usize {
            return Err(TsError::InvalidData(format!(
                "descriptor data of {} bytes does not fit a length byte",
                self.data.len()
            )));
        }
        buf.put_u8(self.tag);
        buf.put_u8(self.data.len() as u8);
        buf.put_slice(&self.data);
        Ok(())
    }
}

/// Program association data: the one program and the PID of its map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pat {
    pub program: u16,
    pub program_map_pid: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementaryStream {
    pub stream_type: u8,
    pub pid: u16,
    pub descriptors: Vec<Descriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pmt {
    pub program_clock_pid: u16,
    pub descriptors: Vec<Descriptor>,
    pub streams: Vec<ElementaryStream>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableData {
    Pat(Pat),
    Pmt(Pmt),
}

impl TableData {
    fn encoded_len(&self) -> usize {
        match self {
            TableData::Pat(_) => 4,
            TableData::Pmt(pmt) => {
                4 + descriptors_len(&pmt.descriptors)
                    + pmt
                        .streams
                        .iter()
                        .map(|s| STREAM_HEADER_SIZE + descriptors_len(&s.descriptors))
                        .sum::<usize>()
            }
        }
    }

    fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            TableData::Pat(pat) => {
                buf.put_u16(pat.program);
                buf.put_slice(&reserved_pid_bytes(pat.program_map_pid));
            }
            TableData::Pmt(pmt) => {
                buf.put_slice(&reserved_pid_bytes(pmt.program_clock_pid));
                write_descriptor_loop(&pmt.descriptors, buf)?;
                for s in &pmt.streams {
                    buf.put_u8(s.stream_type);
                    buf.put_slice(&reserved_pid_bytes(s.pid));
                    write_descriptor_loop(&s.descriptors, buf)?;
                }
            }
        }
        Ok(())
    }
}

fn descriptors_len(descs: &[Descriptor]) -> usize {
    descs.iter().map(Descriptor::encoded_len).sum()
}

fn write_descriptor_loop(descs: &[Descriptor], buf: &mut BytesMut) -> Result<()> {
    let len = descriptors_len(descs);
    if len > PROGRAM_INFO_LEN_MASK as usize {
        return Err(TsError::CapacityExceeded {
            needed: len,
            max: PROGRAM_INFO_LEN_MASK as usize,
        });
    }
    buf.put_slice(&info_len_bytes(len as u16));
    for d in descs {
        d.write_to(buf)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxSection {
    pub table_id_extension: u16,
    pub version: u8,
    pub current_next: bool,
    pub section_number: u8,
    pub last_section_number: u8,
    pub data: TableData,
}

/// A complete program table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Psi {
    pub pointer_field: u8,
    pub table_id: u8,
    pub syntax_indicator: bool,
    pub private: bool,
    pub syntax_section: SyntaxSection,
}

impl Psi {
    /// PAT announcing program 1 with its map on [`PID_PMT`].
    pub fn standard_pat() -> Self {
        Self {
            pointer_field: 0,
            table_id: TABLE_ID_PAT,
            syntax_indicator: true,
            private: false,
            syntax_section: SyntaxSection {
                table_id_extension: 1,
                version: 0,
                current_next: true,
                section_number: 0,
                last_section_number: 0,
                data: TableData::Pat(Pat {
                    program: PROGRAM_NUMBER,
                    program_map_pid: PID_PMT,
                }),
            },
        }
    }

    /// PMT for program 1 with a single elementary stream. The clock
    /// reference is carried on [`PID_VIDEO`].
    pub fn standard_pmt(stream_type: u8, pid: u16) -> Self {
        Self {
            pointer_field: 0,
            table_id: TABLE_ID_PMT,
            syntax_indicator: true,
            private: false,
            syntax_section: SyntaxSection {
                table_id_extension: PROGRAM_NUMBER,
                version: 0,
                current_next: true,
                section_number: 0,
                last_section_number: 0,
                data: TableData::Pmt(Pmt {
                    program_clock_pid: PID_VIDEO,
                    descriptors: Vec::new(),
                    streams: vec![ElementaryStream {
                        stream_type,
                        pid,
                        descriptors: Vec::new(),
                    }],
                }),
            },
        }
    }

    /// Encodes the table with its pointer field and CRC. The result is not
    /// padded; see [`add_padding`].
    pub fn to_bytes(&self) -> Result<PsiBytes> {
        let ss = &self.syntax_section;
        let section_len = SYNTAX_HEADER_SIZE + ss.data.encoded_len() + CRC_SIZE;
        if section_len > SECTION_LEN_MASK as usize {
            return Err(TsError::CapacityExceeded {
                needed: section_len,
                max: SECTION_LEN_MASK as usize,
            });
        }

        let pointer = self.pointer_field as usize;
        let mut buf = BytesMut::with_capacity(1 + pointer + 3 + section_len);
        buf.put_u8(self.pointer_field);
        buf.put_bytes(0xff, pointer);
        buf.put_u8(self.table_id);
        buf.put_slice(&section_header_bytes(
            self.syntax_indicator,
            self.private,
            section_len as u16,
        ));
        buf.put_u16(ss.table_id_extension);
        buf.put_u8(0xc0 | (ss.version & 0x1f) << 1 | ss.current_next as u8);
        buf.put_u8(ss.section_number);
        buf.put_u8(ss.last_section_number);
        ss.data.write_to(&mut buf)?;
        buf.put_bytes(0, CRC_SIZE);
        crc::update_crc(&mut buf[1 + pointer..]);
        Ok(PsiBytes(buf))
    }
}

/// An encoded table (pointer field first) that can be edited in place.
///
/// Editing assumes a zero pointer field, which is what [`Psi::to_bytes`]
/// produces for the standard tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsiBytes(BytesMut);

impl PsiBytes {
    pub fn new(b: impl Into<BytesMut>) -> Self {
        Self(b.into())
    }

    pub fn table_id(&self) -> u8 {
        self.0[1]
    }

    pub fn section_len(&self) -> usize {
        read_masked(&self.0[SECTION_LEN_IDX..], SECTION_LEN_MASK) as usize
    }

    pub fn program_info_len(&self) -> usize {
        read_masked(&self.0[PROGRAM_INFO_LEN_IDX..], PROGRAM_INFO_LEN_MASK) as usize
    }

    fn set_section_len(&mut self, len: usize) {
        write_masked(&mut self.0[SECTION_LEN_IDX..], SECTION_LEN_MASK, len as u16);
    }

    fn set_program_info_len(&mut self, len: usize) {
        write_masked(
            &mut self.0[PROGRAM_INFO_LEN_IDX..],
            PROGRAM_INFO_LEN_MASK,
            len as u16,
        );
    }

    /// Byte range of the section the CRC covers, plus the CRC itself.
    fn section_range(&self) -> Range<usize> {
        1..SECTION_LEN_IDX + 2 + self.section_len()
    }

    fn update_crc(&mut self) {
        let r = self.section_range();
        crc::update_crc(&mut self.0[r]);
    }

    /// Checks that this is a PMT whose declared lengths fit the buffer, so
    /// the edits below can slice by them.
    fn check_pmt(&self) -> Result<()> {
        if self.0.len() < DESCRIPTORS_IDX || self.table_id() != TABLE_ID_PMT {
            return Err(TsError::NotPmt);
        }
        let section_end = self.section_range().end;
        if section_end > self.0.len() {
            return Err(TsError::InvalidData(format!(
                "section length {} runs past the {} byte table",
                self.section_len(),
                self.0.len()
            )));
        }
        if DESCRIPTORS_IDX + self.program_info_len() + CRC_SIZE > section_end {
            return Err(TsError::InvalidData(format!(
                "program info length {} runs past the section",
                self.program_info_len()
            )));
        }
        Ok(())
    }

    /// Finds the descriptor with `tag` in the program info loop and returns
    /// the range of the whole descriptor (tag and length included).
    pub fn has_descriptor(&self, tag: u8) -> Result<Range<usize>> {
        self.check_pmt()?;
        let end = (DESCRIPTORS_IDX + self.program_info_len()).min(self.0.len());
        let mut i = DESCRIPTORS_IDX;
        while i + DESCRIPTOR_HEADER_SIZE <= end {
            let next = i + DESCRIPTOR_HEADER_SIZE + self.0[i + 1] as usize;
            if self.0[i] == tag {
                if next > end {
                    break;
                }
                return Ok(i..next);
            }
            i = next;
        }
        Err(TsError::DescriptorNotFound(tag))
    }

    /// Returns the data of the descriptor with `tag`.
    pub fn descriptor_data(&self, tag: u8) -> Result<&[u8]> {
        let r = self.has_descriptor(tag)?;
        Ok(&self.0[r.start + DESCRIPTOR_HEADER_SIZE..r.end])
    }

    /// Adds a descriptor to the program info loop, or replaces the data of
    /// the existing one with the same tag. Length fields and the CRC are
    /// kept consistent with the new contents.
    pub fn add_descriptor(&mut self, tag: u8, data: &[u8]) -> Result<()> {
        self.check_pmt()?;
        if data.len() > u8::MAX as usize {
            return Err(TsError::InvalidData(format!(
                "descriptor data of {} bytes does not fit a length byte",
                data.len()
            )));
        }

        let (range, old_len) = match self.has_descriptor(tag) {
            Ok(r) => {
                let len = r.len();
                (r, len)
            }
            Err(TsError::DescriptorNotFound(_)) => {
                let at = DESCRIPTORS_IDX + self.program_info_len();
                (at..at, 0)
            }
            Err(e) => return Err(e),
        };
        let new_len = DESCRIPTOR_HEADER_SIZE + data.len();

        if new_len == old_len {
            self.0[range.start + DESCRIPTOR_HEADER_SIZE..range.end].copy_from_slice(data);
            self.update_crc();
            return Ok(());
        }

        let section_len = self.section_len() + new_len - old_len;
        if section_len > MAX_SECTION_LEN {
            return Err(TsError::CapacityExceeded {
                needed: section_len,
                max: MAX_SECTION_LEN,
            });
        }
        let info_len = self.program_info_len() + new_len - old_len;

        let mut desc = Vec::with_capacity(new_len);
        desc.push(tag);
        desc.push(data.len() as u8);
        desc.extend_from_slice(data);

        // Anything after the CRC (padding) is dropped; the caller re-pads.
        let section_end = self.section_range().end;
        self.0.truncate(section_end);
        self.0.replace_range(range, &desc);

        self.set_program_info_len(info_len);
        self.set_section_len(section_len);
        self.update_crc();
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn freeze(self) -> Bytes {
        self.0.freeze()
    }
}

impl AsRef<[u8]> for PsiBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Pads an encoded table to a full packet payload with 0xFF.
pub fn add_padding(psi: &mut BytesMut) {
    if psi.len() < TS_PAYLOAD_SIZE {
        let n = TS_PAYLOAD_SIZE - psi.len();
        psi.put_bytes(0xff, n);
    }
}

/// Finds the data of the descriptor with `tag` in the PMT carried by a
/// packet payload.
pub fn find_descriptor(payload: &[u8], tag: u8) -> Result<&[u8]> {
    let section = table_section(payload)?;
    if section[0] != TABLE_ID_PMT || section.len() < DESCRIPTORS_IDX - 1 {
        return Err(TsError::NotPmt);
    }
    let descs = program_info(section)?;
    let mut i = 0;
    while i + DESCRIPTOR_HEADER_SIZE <= descs.len() {
        let next = i + DESCRIPTOR_HEADER_SIZE + descs[i + 1] as usize;
        if next > descs.len() {
            break;
        }
        if descs[i] == tag {
            return Ok(&descs[i + DESCRIPTOR_HEADER_SIZE..next]);
        }
        i = next;
    }
    Err(TsError::DescriptorNotFound(tag))
}

/// Returns the section of the table that starts a packet payload, from the
/// table id through the CRC, honouring the pointer field.
pub fn table_section(payload: &[u8]) -> Result<&[u8]> {
    let start = 1 + *payload.first().ok_or(TsError::NoPayload)? as usize;
    if payload.len() < start + 3 {
        return Err(TsError::InvalidData("table header truncated".into()));
    }
    let end = start + 3 + read_masked(&payload[start + 1..], SECTION_LEN_MASK) as usize;
    if end > payload.len() {
        return Err(TsError::InvalidData(format!(
            "section length runs {} bytes past the payload",
            end - payload.len()
        )));
    }
    Ok(&payload[start..end])
}

fn program_info(section: &[u8]) -> Result<&[u8]> {
    let start = DESCRIPTORS_IDX - 1;
    let end = start + read_masked(&section[PROGRAM_INFO_LEN_IDX - 1..], PROGRAM_INFO_LEN_MASK) as usize;
    if end > section.len() {
        return Err(TsError::InvalidData("program info overruns section".into()));
    }
    Ok(&section[start..end])
}

/// Decodes a descriptor loop.
pub fn parse_descriptors(mut d: &[u8]) -> Result<Vec<Descriptor>> {
    let mut out = Vec::new();
    while !d.is_empty() {
        if d.len() < DESCRIPTOR_HEADER_SIZE {
            return Err(TsError::InvalidData("truncated descriptor".into()));
        }
        let end = DESCRIPTOR_HEADER_SIZE + d[1] as usize;
        if end > d.len() {
            return Err(TsError::InvalidData("descriptor overruns loop".into()));
        }
        out.push(Descriptor::new(
            d[0],
            Bytes::copy_from_slice(&d[DESCRIPTOR_HEADER_SIZE..end]),
        ));
        d = &d[end..];
    }
    Ok(out)
}

fn parse_syntax_header(section: &[u8], table_id: u8) -> Result<&[u8]> {
    if section.len() < 3 + SYNTAX_HEADER_SIZE + CRC_SIZE {
        return Err(TsError::InvalidData("section too short".into()));
    }
    if section[0] != table_id {
        return Err(match table_id {
            TABLE_ID_PAT => TsError::NotPat,
            _ => TsError::NotPmt,
        });
    }
    if !crc::check_crc(section) {
        return Err(TsError::InvalidData("section CRC mismatch".into()));
    }
    Ok(&section[3 + SYNTAX_HEADER_SIZE..section.len() - CRC_SIZE])
}

/// Decodes the program entries of a PAT section (program number and map
/// PID per entry).
pub fn parse_pat(section: &[u8]) -> Result<Vec<Pat>> {
    let data = parse_syntax_header(section, TABLE_ID_PAT)?;
    Ok(data
        .chunks_exact(4)
        .map(|c| Pat {
            program: u16::from_be_bytes([c[0], c[1]]),
            program_map_pid: bits::read_pid(&c[2..4]),
        })
        .collect())
}

/// Decodes a PMT section.
pub fn parse_pmt(section: &[u8]) -> Result<Pmt> {
    let data = parse_syntax_header(section, TABLE_ID_PMT)?;
    if data.len() < 4 {
        return Err(TsError::InvalidData("PMT data truncated".into()));
    }
    let program_clock_pid = bits::read_pid(&data[0..2]);
    let info_len = read_masked(&data[2..], PROGRAM_INFO_LEN_MASK) as usize;
    if 4 + info_len > data.len() {
        return Err(TsError::InvalidData("program info overruns section".into()));
    }
    let descriptors = parse_descriptors(&data[4..4 + info_len])?;

    let mut rest = &data[4 + info_len..];
    let mut streams = Vec::new();
    while !rest.is_empty() {
        if rest.len() < STREAM_HEADER_SIZE {
            return Err(TsError::InvalidData("stream entry truncated".into()));
        }
        let es_len = read_masked(&rest[3..], PROGRAM_INFO_LEN_MASK) as usize;
        let end = STREAM_HEADER_SIZE + es_len;
        if end > rest.len() {
            return Err(TsError::InvalidData("stream entry overruns section".into()));
        }
        streams.push(ElementaryStream {
            stream_type: rest[0],
            pid: bits::read_pid(&rest[1..3]),
            descriptors: parse_descriptors(&rest[STREAM_HEADER_SIZE..end])?,
        });
        rest = &rest[end..];
    }

    Ok(Pmt {
        program_clock_pid,
        descriptors,
        streams,
    })
}
