//! Frame-indexed view of encoded transport stream data.
//!
//! [`extract`] strips the tables and stream headers from a buffer written
//! by the encoder and keeps the media in one contiguous buffer, indexed by
//! frame. Clips produced by the range queries share that buffer; nothing is
//! copied after extraction.

use super::packet::payload;
use super::parser::{meta_from_pmt, parse_header};
use super::pes::PESHeader;
use super::types::*;
use crate::error::{Result, TsError};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

/// Metadata in force when a frame was decoded.
pub type FrameMeta = Arc<HashMap<String, String>>;

const PID_NULL: u16 = 0x1fff;

/// One access unit within a [`Clip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub pts: u64,
    pub stream_id: u8,
    /// Metadata of the last PMT seen before this frame, if it had any.
    pub meta: Option<FrameMeta>,
    media: Bytes,
    offset: usize,
}

impl Frame {
    /// The access unit's bytes.
    pub fn media(&self) -> &[u8] {
        &self.media
    }

    fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta.as_ref()?.get(key).map(String::as_str)
    }
}

/// A run of frames over a shared media buffer.
#[derive(Debug, Clone)]
pub struct Clip {
    backing: Bytes,
    frames: Arc<[Frame]>,
    range: Range<usize>,
}

impl Clip {
    pub fn frames(&self) -> &[Frame] {
        &self.frames[self.range.clone()]
    }

    /// The media of every frame in the clip, back to back.
    pub fn bytes(&self) -> Bytes {
        match (self.frames().first(), self.frames().last()) {
            (Some(first), Some(last)) => self
                .backing
                .slice(first.offset..last.offset + last.media.len()),
            _ => Bytes::new(),
        }
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Sub-clip over `frames` relative to this clip.
    fn sub(&self, frames: Range<usize>) -> Clip {
        Clip {
            backing: self.backing.clone(),
            frames: Arc::clone(&self.frames),
            range: self.range.start + frames.start..self.range.start + frames.end,
        }
    }

    /// Returns the frames from the first with `pts >= from` up to, but not
    /// including, the first frame with `pts >= to`. That frame must exist
    /// and must not be the first frame of the range.
    ///
    /// Frames must be in non-decreasing PTS order, which holds for anything
    /// written by one encoder.
    pub fn trim_to_pts_range(&self, from: u64, to: u64) -> Result<Clip> {
        if from >= to {
            return Err(TsError::InvalidRange);
        }
        let frames = self.frames();
        debug_assert!(frames.windows(2).all(|w| w[0].pts <= w[1].pts));

        let start = frames.partition_point(|f| f.pts < from);
        if start == frames.len() {
            return Err(TsError::LowerBoundNotFound);
        }

        // The frame at `start` may already be at or past `to`, leaving
        // nothing in range.
        let tail = &frames[start..];
        let end = tail.partition_point(|f| f.pts < to);
        if end == 0 || end == tail.len() {
            return Err(TsError::UpperBoundNotFound);
        }

        Ok(self.sub(start..start + end))
    }

    /// Returns the frames from the first whose metadata has `key == from`
    /// through the first later frame whose metadata has `key == to`.
    pub fn trim_to_meta_range(&self, key: &str, from: &str, to: &str) -> Result<Clip> {
        if from == to {
            return Err(TsError::InvalidRange);
        }
        let frames = self.frames();
        let start = frames
            .iter()
            .position(|f| f.meta_value(key) == Some(from))
            .ok_or(TsError::LowerBoundNotFound)?;
        let end = frames[start..]
            .iter()
            .position(|f| f.meta_value(key) == Some(to))
            .ok_or(TsError::UpperBoundNotFound)?;
        Ok(self.sub(start..start + end + 1))
    }

    /// Splits the clip into the maximal runs of frames whose metadata has
    /// `key == val`. A frame without metadata ends any open run.
    pub fn segment_for_meta(&self, key: &str, val: &str) -> Vec<Clip> {
        let mut res = Vec::new();
        let mut start = None;
        for (i, f) in self.frames().iter().enumerate() {
            match (start, f.meta_value(key) == Some(val)) {
                (None, true) => start = Some(i),
                (Some(s), false) => {
                    res.push(self.sub(s..i));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            res.push(self.sub(s..self.len()));
        }
        res
    }
}

/// Builds a [`Clip`] from packet-aligned transport stream data.
///
/// PAT packets are skipped and PMT packets update the metadata attached to
/// the frames that follow. Every other PID is taken as media: a payload
/// unit start opens a frame, and later packets extend it.
pub fn extract(d: &[u8]) -> Result<Clip> {
    if d.len() % TS_PACKET_SIZE != 0 {
        return Err(TsError::InvalidSize(d.len()));
    }

    struct Pending {
        pts: u64,
        stream_id: u8,
        meta: Option<FrameMeta>,
        start: usize,
    }

    let mut backing = BytesMut::with_capacity(d.len());
    let mut pending: Vec<Pending> = Vec::new();
    let mut meta: Option<FrameMeta> = None;

    for pkt in d.chunks_exact(TS_PACKET_SIZE) {
        let header = parse_header(pkt)?;
        match header.pid {
            PID_PAT | PID_NULL => {}
            PID_PMT => {
                meta = match meta_from_pmt(pkt) {
                    Ok(m) => Some(Arc::new(m)),
                    Err(TsError::NoMeta) => None,
                    Err(e) => {
                        log::warn!("ignoring unreadable PMT metadata: {}", e);
                        None
                    }
                };
            }
            _ if !header.has_payload() => {}
            _ => {
                let data = payload(pkt)?;
                if header.payload_unit_start {
                    let (pes, media) = PESHeader::parse(data)?;
                    pending.push(Pending {
                        pts: pes.pts.unwrap_or(0),
                        stream_id: pes.stream_id,
                        meta: meta.clone(),
                        start: backing.len(),
                    });
                    backing.extend_from_slice(media);
                } else if pending.is_empty() {
                    log::debug!(
                        "skipping {} payload bytes on PID {} before first unit start",
                        data.len(),
                        header.pid
                    );
                } else {
                    backing.extend_from_slice(data);
                }
            }
        }
    }

    let backing = backing.freeze();
    let ends: Vec<usize> = pending
        .iter()
        .skip(1)
        .map(|p| p.start)
        .chain(std::iter::once(backing.len()))
        .collect();
    let frames: Arc<[Frame]> = pending
        .into_iter()
        .zip(ends)
        .map(|(p, end)| Frame {
            pts: p.pts,
            stream_id: p.stream_id,
            meta: p.meta,
            media: backing.slice(p.start..end),
            offset: p.start,
        })
        .collect();

    let range = 0..frames.len();
    Ok(Clip {
        backing,
        frames,
        range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(pts: u64, meta: Option<&[(&str, &str)]>, media: &Bytes, offset: usize, len: usize) -> Frame {
        Frame {
            pts,
            stream_id: STREAM_ID_VIDEO,
            meta: meta.map(|m| {
                Arc::new(
                    m.iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                )
            }),
            media: media.slice(offset..offset + len),
            offset,
        }
    }

    /// Clip of one-byte frames with the given timestamps and metadata.
    fn clip(frames: &[(u64, Option<&[(&str, &str)]>)]) -> Clip {
        let backing: Bytes = (0..frames.len() as u8).collect::<Vec<_>>().into();
        let frames: Arc<[Frame]> = frames
            .iter()
            .enumerate()
            .map(|(i, (pts, meta))| frame(*pts, *meta, &backing, i, 1))
            .collect();
        let range = 0..frames.len();
        Clip {
            backing,
            frames,
            range,
        }
    }

    fn pts_of(c: &Clip) -> Vec<u64> {
        c.frames().iter().map(|f| f.pts).collect()
    }

    #[test]
    fn test_trim_to_pts_range() {
        let c = clip(&[(0, None), (10, None), (20, None), (30, None), (40, None)]);

        let t = c.trim_to_pts_range(5, 30).unwrap();
        assert_eq!(pts_of(&t), vec![10, 20]);
        assert_eq!(&t.bytes()[..], &[1, 2]);

        let t = c.trim_to_pts_range(10, 31).unwrap();
        assert_eq!(pts_of(&t), vec![10, 20, 30]);

        assert!(matches!(c.trim_to_pts_range(30, 30), Err(TsError::InvalidRange)));
        assert!(matches!(c.trim_to_pts_range(41, 50), Err(TsError::LowerBoundNotFound)));
        assert!(matches!(c.trim_to_pts_range(10, 45), Err(TsError::UpperBoundNotFound)));
    }

    #[test]
    fn test_trim_with_no_frame_in_range() {
        let c = clip(&[(0, None), (10, None), (20, None)]);
        assert!(matches!(c.trim_to_pts_range(5, 8), Err(TsError::UpperBoundNotFound)));
        assert!(matches!(c.trim_to_pts_range(10, 10), Err(TsError::InvalidRange)));

        let t = c.trim_to_pts_range(5, 11).unwrap();
        assert_eq!(pts_of(&t), vec![10]);
    }

    #[test]
    fn test_trim_of_trim() {
        let c = clip(&[(0, None), (10, None), (20, None), (30, None), (40, None)]);
        let outer = c.trim_to_pts_range(10, 40).unwrap();
        let inner = outer.trim_to_pts_range(15, 30).unwrap();
        assert_eq!(pts_of(&inner), vec![20]);
        assert_eq!(&inner.bytes()[..], &[2]);
    }

    #[test]
    fn test_trim_to_meta_range() {
        let a: &[(&str, &str)] = &[("n", "a")];
        let b: &[(&str, &str)] = &[("n", "b")];
        let z: &[(&str, &str)] = &[("n", "z")];
        let c = clip(&[(0, None), (1, Some(a)), (2, Some(b)), (3, Some(z)), (4, Some(z))]);

        let t = c.trim_to_meta_range("n", "a", "z").unwrap();
        assert_eq!(pts_of(&t), vec![1, 2, 3]);
        assert_eq!(t.len(), 3);

        assert!(matches!(c.trim_to_meta_range("n", "a", "a"), Err(TsError::InvalidRange)));
        assert!(matches!(
            c.trim_to_meta_range("n", "q", "z"),
            Err(TsError::LowerBoundNotFound)
        ));
        assert!(matches!(
            c.trim_to_meta_range("n", "b", "a"),
            Err(TsError::UpperBoundNotFound)
        ));
    }

    #[test]
    fn test_segment_for_meta() {
        let on: &[(&str, &str)] = &[("rec", "on")];
        let off: &[(&str, &str)] = &[("rec", "off")];
        let c = clip(&[
            (0, Some(on)),
            (1, Some(on)),
            (2, None),
            (3, Some(on)),
            (4, Some(off)),
            (5, Some(on)),
        ]);
        let segs = c.segment_for_meta("rec", "on");
        let got: Vec<Vec<u64>> = segs.iter().map(pts_of).collect();
        assert_eq!(got, vec![vec![0, 1], vec![3], vec![5]]);
        assert_eq!(&segs[0].bytes()[..], &[0, 1]);

        assert!(c.segment_for_meta("rec", "paused").is_empty());
    }

    #[test]
    fn test_extract_rejects_partial_packets() {
        assert!(matches!(extract(&[0x47; 100]), Err(TsError::InvalidSize(100))));
        assert!(extract(&[]).unwrap().is_empty());
    }
}
