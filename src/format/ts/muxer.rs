//! Transport stream encoder: turns access units into PSI and media packets.
//!
//! The encoder keeps its own clock. Each access unit advances it by one
//! nominal frame interval, so timestamps depend only on the configured
//! rate and the number of units written, never on when `write` is called.

use super::meta::{Meta, TIMESTAMP_KEY, WRITE_RATE_KEY};
use super::packet::TsPacket;
use super::pes::PESPacket;
use super::psi::{add_padding, Psi, PsiBytes};
use super::types::*;
use crate::av::Packet;
use crate::codec::{self, KeyUnitProbe};
use crate::config::{EncoderConfig, EncoderOption, PsiPolicy};
use crate::error::Result;
use crate::format::Muxer;
use crate::utils::RealTime;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

/// Writes access units to `W` as an MPEG transport stream with metadata in
/// the PMT.
///
/// An encoder is driven by one task at a time; it does no locking of its
/// own. Sink errors are returned as they happen and nothing already written
/// is rolled back.
pub struct Encoder<W: AsyncWrite + Unpin + Send> {
    dst: W,
    meta: Arc<Meta>,
    real_time: Option<Arc<RealTime>>,

    media: MediaParams,
    psi: PsiPolicy,
    probe: KeyUnitProbe,

    write_period: Duration,
    pts_offset: Duration,
    clock: Duration,

    continuity: HashMap<u16, u8>,
    /// Packets written since the last PSI pair.
    pkt_count: usize,
    /// When the last PSI pair was written under the time policy.
    last_psi: Option<Instant>,

    pat: Bytes,
    pmt: PsiBytes,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin + Send> Encoder<W> {
    /// Creates an encoder writing to `dst`, with `meta` as the metadata
    /// embedded in every PMT.
    ///
    /// The nominal rate is recorded in `meta` under `writeRate`.
    pub fn new(
        dst: W,
        meta: Arc<Meta>,
        options: impl IntoIterator<Item = EncoderOption>,
    ) -> Result<Self> {
        let cfg = EncoderConfig::from_options(options)?;
        log::debug!("encoder options applied");
        Self::with_config(dst, meta, cfg)
    }

    pub fn with_config(dst: W, meta: Arc<Meta>, cfg: EncoderConfig) -> Result<Self> {
        let media = MediaParams::for_codec(cfg.codec)?;
        meta.add(WRITE_RATE_KEY, format!("{:.6}", cfg.rate()));

        let pat = Psi::standard_pat().to_bytes()?.freeze();
        let pmt = Psi::standard_pmt(media.stream_type, media.pid).to_bytes()?;

        let pkt_count = match cfg.psi {
            // Due straight away, so the stream opens with tables.
            PsiPolicy::PacketCount(n) => n,
            _ => 0,
        };

        Ok(Self {
            dst,
            meta,
            real_time: cfg.real_time,
            media,
            psi: cfg.psi,
            probe: cfg.key_unit_probe.unwrap_or_else(|| codec::probe_for(cfg.codec)),
            write_period: cfg.write_period,
            pts_offset: cfg.pts_offset,
            clock: Duration::ZERO,
            continuity: HashMap::from([(PID_PAT, 0), (PID_PMT, 0), (media.pid, 0)]),
            pkt_count,
            last_psi: None,
            pat,
            pmt,
            buf: BytesMut::with_capacity(TS_PACKET_SIZE),
        })
    }

    pub fn media_pid(&self) -> u16 {
        self.media.pid
    }

    /// Encodes one access unit, preceded by a PSI pair when the insertion
    /// policy says one is due. Returns the length of `data`.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.write_unit(data, false).await
    }

    async fn write_unit(&mut self, data: &[u8], key_hint: bool) -> Result<usize> {
        log::debug!("writing access unit of {} bytes", data.len());
        if self.psi_due(data, key_hint) {
            self.write_psi().await?;
        }

        let pts = time_to_pts(self.clock + self.pts_offset);
        let pcr = time_to_pts(self.clock);
        let mut pes = BytesMut::with_capacity(data.len() + 14);
        PESPacket::new(self.media.stream_id, data)
            .with_pts(pts)
            .write_to(&mut pes)?;

        let mut rest: &[u8] = &pes;
        let mut first = true;
        while !rest.is_empty() {
            let mut pkt = TsPacket {
                payload_unit_start: first,
                pid: self.media.pid,
                random_access: first,
                pcr_flag: first,
                pcr: if first { pcr } else { 0 },
                continuity_counter: self.cc_for(self.media.pid),
                adaptation_field_control: AFC_ADAPTATION_AND_PAYLOAD,
                ..Default::default()
            };
            let n = pkt.fill_payload(rest);
            rest = &rest[n..];
            if first {
                log::debug!("new access unit: pts {} pcr {}", pts, pcr);
                first = false;
            }
            self.write_packet_bytes(&pkt).await?;
        }

        self.clock += self.write_period;
        Ok(data.len())
    }

    fn psi_due(&mut self, data: &[u8], key_hint: bool) -> bool {
        match self.psi {
            PsiPolicy::PacketCount(n) => {
                if self.pkt_count >= n {
                    self.pkt_count = 0;
                    return true;
                }
                false
            }
            PsiPolicy::Time(period) => {
                let now = Instant::now();
                match self.last_psi {
                    Some(t) if now.duration_since(t) < period => false,
                    _ => {
                        self.last_psi = Some(now);
                        true
                    }
                }
            }
            PsiPolicy::KeyFrame => key_hint || (self.probe)(data),
        }
    }

    /// Writes a PAT/PMT pair, refreshing the PMT's metadata first.
    pub async fn write_psi(&mut self) -> Result<()> {
        let pat = self.pat.clone();
        let pat_cc = self.write_table(PID_PAT, &pat).await?;

        self.update_meta()?;
        let pmt = Bytes::copy_from_slice(self.pmt.as_bytes());
        let pmt_cc = self.write_table(PID_PMT, &pmt).await?;

        log::debug!("PSI written: PAT cc {} PMT cc {}", pat_cc, pmt_cc);
        Ok(())
    }

    async fn write_table(&mut self, pid: u16, table: &[u8]) -> Result<u8> {
        let mut payload = BytesMut::from(table);
        add_padding(&mut payload);
        let cc = self.cc_for(pid);
        let pkt = TsPacket {
            payload_unit_start: true,
            pid,
            continuity_counter: cc,
            adaptation_field_control: AFC_PAYLOAD_ONLY,
            payload: &payload,
            ..Default::default()
        };
        self.write_packet_bytes(&pkt).await?;
        Ok(cc)
    }

    fn update_meta(&mut self) -> Result<()> {
        if let Some(now) = self.real_time.as_ref().and_then(|rt| rt.get()) {
            let t = now.timestamp().to_string();
            log::debug!("latest time added to meta: {}", t);
            self.meta.add(TIMESTAMP_KEY, t);
        }
        self.pmt.add_descriptor(METADATA_TAG, &self.meta.encode()?)
    }

    async fn write_packet_bytes(&mut self, pkt: &TsPacket<'_>) -> Result<()> {
        self.buf.clear();
        pkt.write_to(&mut self.buf)?;
        self.dst.write_all(&self.buf).await?;
        self.pkt_count += 1;
        Ok(())
    }

    /// Returns the counter for the next packet on `pid` and advances it.
    fn cc_for(&mut self, pid: u16) -> u8 {
        let cc = self.continuity.entry(pid).or_insert(0);
        let cur = *cc;
        *cc = (cur + 1) & 0x0f;
        cur
    }

    /// Shuts down the sink.
    pub async fn close(&mut self) -> Result<()> {
        log::debug!("closing encoder");
        self.dst.shutdown().await?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.dst
    }

    pub fn into_inner(self) -> W {
        self.dst
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Muxer for Encoder<W> {
    async fn write_header(&mut self) -> Result<()> {
        self.write_psi().await
    }

    async fn write_packet(&mut self, packet: Packet) -> Result<()> {
        self.write_unit(&packet.data, packet.is_key).await?;
        Ok(())
    }

    async fn write_trailer(&mut self) -> Result<()> {
        self.close().await
    }
}
