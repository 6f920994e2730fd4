//! Decoding and scanning of packet-aligned transport stream buffers.
//!
//! Everything here reads streams written by this crate's encoder: one
//! program, PAT immediately followed by its PMT, metadata in the PMT's
//! program info loop.

use super::meta;
use super::packet::payload;
use super::pes::PESHeader;
use super::psi::{self, ElementaryStream};
use super::types::*;
use crate::error::{Result, TsError};
use crate::utils::bits::{self, PID_MASK};
use std::collections::{BTreeMap, HashMap};

pub fn parse_header(data: &[u8]) -> Result<TSHeader> {
    if data.len() < TS_HEADER_SIZE {
        return Err(TsError::InvalidData("TS packet too short".into()));
    }

    if data[0] != SYNC_BYTE {
        return Err(TsError::InvalidData("Invalid sync byte".into()));
    }

    Ok(TSHeader {
        transport_error: (data[1] & 0x80) != 0,
        payload_unit_start: (data[1] & 0x40) != 0,
        transport_priority: (data[1] & 0x20) != 0,
        pid: u16::from_be_bytes([data[1], data[2]]) & PID_MASK,
        scrambling_control: (data[3] >> 6) & 0x03,
        adaptation_field_control: (data[3] >> 4) & 0x03,
        continuity_counter: data[3] & 0x0f,
    })
}

/// Decodes the adaptation field of a packet, if it has one.
///
/// Only the clock reference is decoded; the presence of the other optional
/// fields is reported through their flags.
pub fn parse_adaptation_field(data: &[u8]) -> Result<Option<AdaptationField>> {
    let header = parse_header(data)?;
    if !header.has_adaptation_field() {
        return Ok(None);
    }

    let offset = TS_HEADER_SIZE;
    let length = *data
        .get(offset)
        .ok_or_else(|| TsError::InvalidData("Adaptation field missing".into()))?
        as usize;
    if length == 0 {
        return Ok(Some(AdaptationField::default()));
    }
    if data.len() < offset + length + 1 {
        return Err(TsError::InvalidData("Adaptation field too short".into()));
    }

    let flags = data[offset + 1];
    let mut field = AdaptationField {
        length,
        discontinuity: (flags & 0x80) != 0,
        random_access: (flags & 0x40) != 0,
        es_priority: (flags & 0x20) != 0,
        pcr_flag: (flags & 0x10) != 0,
        opcr_flag: (flags & 0x08) != 0,
        splicing_point_flag: (flags & 0x04) != 0,
        private_data_flag: (flags & 0x02) != 0,
        extension_flag: (flags & 0x01) != 0,
        pcr: None,
    };

    if field.pcr_flag {
        let pos = offset + 2;
        if length < 7 {
            return Err(TsError::InvalidData("PCR data too short".into()));
        }
        field.pcr = Some(bits::decode_pcr(&data[pos..pos + 6]));
    }

    Ok(Some(field))
}

fn check_aligned(d: &[u8]) -> Result<()> {
    if d.is_empty() || d.len() % TS_PACKET_SIZE != 0 {
        return Err(TsError::InvalidSize(d.len()));
    }
    Ok(())
}

fn packet_pid(p: &[u8]) -> u16 {
    bits::read_pid(&p[1..3])
}

/// Finds the first packet with `pid`, returning it and its byte offset.
pub fn find_pid(d: &[u8], pid: u16) -> Result<(&[u8], usize)> {
    check_aligned(d)?;
    d.chunks_exact(TS_PACKET_SIZE)
        .position(|p| packet_pid(p) == pid)
        .map(|i| {
            let off = i * TS_PACKET_SIZE;
            (&d[off..off + TS_PACKET_SIZE], off)
        })
        .ok_or(TsError::PidNotFound(pid))
}

/// Finds the last packet with `pid`, returning it and its byte offset.
pub fn last_pid(d: &[u8], pid: u16) -> Result<(&[u8], usize)> {
    check_aligned(d)?;
    d.chunks_exact(TS_PACKET_SIZE)
        .rposition(|p| packet_pid(p) == pid)
        .map(|i| {
            let off = i * TS_PACKET_SIZE;
            (&d[off..off + TS_PACKET_SIZE], off)
        })
        .ok_or(TsError::PidNotFound(pid))
}

pub fn find_pat(d: &[u8]) -> Result<(&[u8], usize)> {
    find_pid(d, PID_PAT)
}

pub fn find_pmt(d: &[u8]) -> Result<(&[u8], usize)> {
    find_pid(d, PID_PMT)
}

/// What [`find_psi`] learns from the first PAT/PMT pair of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsiInfo {
    /// Byte offset of the PAT.
    pub pat_offset: usize,
    /// Elementary PID to stream type.
    pub streams: BTreeMap<u16, u8>,
    /// Metadata carried by the PMT, if any could be decoded.
    pub meta: Option<HashMap<String, String>>,
}

/// Locates the PAT, checks that it announces exactly one program, and reads
/// that program's PMT from the packet straight after it.
pub fn find_psi(d: &[u8]) -> Result<PsiInfo> {
    let (pat, pat_offset) = find_pat(d)?;
    let pmt_pid = single_program(pat)?;

    let rest = &d[pat_offset + TS_PACKET_SIZE..];
    if rest.is_empty() {
        return Err(TsError::PidNotFound(pmt_pid));
    }
    let (pmt, idx) = find_pid(rest, pmt_pid)?;
    if idx != 0 {
        return Err(TsError::NotConsecutive);
    }

    let meta = meta_from_pmt(pmt).ok();
    let streams = streams(pmt)?
        .into_iter()
        .map(|s| (s.pid, s.stream_type))
        .collect();

    Ok(PsiInfo {
        pat_offset,
        streams,
        meta,
    })
}

fn single_program(pat: &[u8]) -> Result<u16> {
    let progs = programs(pat)?;
    if progs.len() > 1 {
        return Err(TsError::MultiplePrograms);
    }
    progs
        .into_values()
        .next()
        .ok_or(TsError::NoPrograms)
}

/// Returns the lowest PID of a stream map with its stream type.
pub fn first_media_pid(streams: &BTreeMap<u16, u8>) -> Result<(u16, u8)> {
    streams
        .iter()
        .next()
        .map(|(p, t)| (*p, *t))
        .ok_or(TsError::EmptyStreamMap)
}

/// Returns program number to PMT PID for a PAT packet. The network PID
/// entry (program 0) is left out.
pub fn programs(pat: &[u8]) -> Result<BTreeMap<u16, u16>> {
    let section = psi::table_section(payload(pat)?)?;
    Ok(psi::parse_pat(section)?
        .into_iter()
        .filter(|p| p.program != 0)
        .map(|p| (p.program, p.program_map_pid))
        .collect())
}

/// Returns the elementary streams described by a PMT packet.
pub fn streams(pmt: &[u8]) -> Result<Vec<ElementaryStream>> {
    let section = psi::table_section(payload(pmt)?)?;
    Ok(psi::parse_pmt(section)?.streams)
}

/// Reads the elementary streams from a PSI pair: a PAT packet followed by
/// the PMT packet of its one program.
pub fn media_streams(p: &[u8]) -> Result<Vec<ElementaryStream>> {
    if p.len() < 2 * TS_PACKET_SIZE {
        return Err(TsError::InvalidSize(p.len()));
    }
    let pat = &p[..TS_PACKET_SIZE];
    let pmt = &p[TS_PACKET_SIZE..2 * TS_PACKET_SIZE];

    if packet_pid(pat) != PID_PAT {
        return Err(TsError::NotPat);
    }
    let pmt_pid = single_program(pat)?;
    if packet_pid(pmt) != pmt_pid {
        return Err(TsError::NotPmt);
    }
    streams(pmt)
}

/// Returns the PTS of a packet that starts a PES packet.
pub fn get_pts(pkt: &[u8]) -> Result<u64> {
    let header = parse_header(pkt)?;
    if !header.payload_unit_start {
        return Err(TsError::NoPayload);
    }
    let (pes, _) = PESHeader::parse(payload(pkt)?)?;
    pes.pts.ok_or(TsError::NoPts)
}

/// Returns the first and last PTS found on `pid`. With a single PTS in the
/// buffer both ends are the same.
pub fn get_pts_range(clip: &[u8], pid: u16) -> Result<[u64; 2]> {
    check_aligned(clip)?;
    let (first_idx, first) = clip
        .chunks_exact(TS_PACKET_SIZE)
        .enumerate()
        .filter(|(_, p)| packet_pid(p) == pid)
        .find_map(|(i, p)| get_pts(p).ok().map(|pts| (i, pts)))
        .ok_or(TsError::NoPts)?;

    let last = clip
        .chunks_exact(TS_PACKET_SIZE)
        .enumerate()
        .rev()
        .take_while(|(i, _)| *i > first_idx)
        .filter(|(_, p)| packet_pid(p) == pid)
        .find_map(|(_, p)| get_pts(p).ok())
        .unwrap_or(first);

    Ok([first, last])
}

/// Decodes the metadata descriptor of a PMT packet.
pub fn meta_from_pmt(pmt: &[u8]) -> Result<HashMap<String, String>> {
    let desc = match psi::find_descriptor(payload(pmt)?, METADATA_TAG) {
        Ok(d) => d,
        Err(TsError::DescriptorNotFound(_)) => return Err(TsError::NoMeta),
        Err(e) => return Err(e),
    };
    meta::get_all_as_map(desc)
}

/// Returns the metadata of the first PMT in `d`.
pub fn extract_meta(d: &[u8]) -> Result<HashMap<String, String>> {
    let (pmt, _) = find_pmt(d)?;
    meta_from_pmt(pmt)
}

fn is_malformed_meta(e: &TsError) -> bool {
    matches!(
        e,
        TsError::NoMeta | TsError::UnexpectedMetaFormat | TsError::InvalidMetadata
    )
}

/// Returns the part of `d` from the PMT whose metadata has `key == from`
/// through the end of the first later PMT whose metadata has `key == to`.
///
/// Works at PMT granularity on raw packets; nothing is copied.
pub fn trim_to_meta_range<'a>(d: &'a [u8], key: &str, from: &str, to: &str) -> Result<&'a [u8]> {
    check_aligned(d)?;
    if from == to {
        return Err(TsError::InvalidRange);
    }

    let mut start = None;
    for (i, pkt) in d.chunks_exact(TS_PACKET_SIZE).enumerate() {
        if packet_pid(pkt) != PID_PMT {
            continue;
        }
        let m = match meta_from_pmt(pkt) {
            Ok(m) => m,
            Err(TsError::NoMeta) => continue,
            Err(e) => return Err(e),
        };
        let val = m.get(key).map(String::as_str);
        let off = i * TS_PACKET_SIZE;
        match start {
            None if val == Some(from) => start = Some(off),
            Some(s) if val == Some(to) => return Ok(&d[s..off + TS_PACKET_SIZE]),
            _ => {}
        }
    }

    Err(match start {
        None => TsError::LowerBoundNotFound,
        Some(_) => TsError::UpperBoundNotFound,
    })
}

/// Splits `d` into the maximal runs whose PMT metadata has `key == val`.
///
/// A run starts at the PMT where the value is first seen and ends just
/// before the next PMT that lacks it, carries a different value or has
/// malformed metadata.
pub fn segment_for_meta<'a>(d: &'a [u8], key: &str, val: &str) -> Result<Vec<&'a [u8]>> {
    check_aligned(d)?;
    let mut res = Vec::new();
    let mut start: Option<usize> = None;

    for (i, pkt) in d.chunks_exact(TS_PACKET_SIZE).enumerate() {
        if packet_pid(pkt) != PID_PMT {
            continue;
        }
        let off = i * TS_PACKET_SIZE;
        let matches = match meta_from_pmt(pkt) {
            Ok(m) => m.get(key).map(String::as_str) == Some(val),
            Err(e) if is_malformed_meta(&e) => false,
            Err(e) => return Err(e),
        };
        match (start, matches) {
            (None, true) => start = Some(off),
            (Some(s), false) => {
                res.push(&d[s..off]);
                start = None;
            }
            _ => {}
        }
    }

    if let Some(s) = start {
        res.push(&d[s..]);
    }
    Ok(res)
}
