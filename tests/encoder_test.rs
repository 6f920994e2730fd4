#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::fs::File;
    use tokio::io::BufWriter;
    use tsmeta::av::{CodecType, Packet};
    use tsmeta::config;
    use tsmeta::error::{Result, TsError};
    use tsmeta::format::ts::packet;
    use tsmeta::format::ts::parser::{find_psi, get_pts, get_pts_range, media_streams};
    use tsmeta::format::ts::{
        clip, DiscontinuityRepairer, Encoder, Meta, TsPacket, PID_PAT, PID_PMT, PID_VIDEO,
        STREAM_TYPE_H264, TS_PACKET_SIZE,
    };
    use tsmeta::format::Muxer;

    const RATE: f64 = 25.0;
    const FRAME_TICKS: u64 = 90_000 / 25;

    /// Access units larger than one packet's payload, each tagged with its
    /// index so fragments can be told apart.
    fn frames(n: usize) -> Vec<Vec<u8>> {
        (0..n)
            .map(|i| (0..450 + 37 * i).map(|j| (i * 31 + j) as u8).collect())
            .collect()
    }

    async fn encode(units: &[Vec<u8>], options: Vec<config::EncoderOption>) -> Result<Vec<u8>> {
        let mut e = Encoder::new(Vec::<u8>::new(), Arc::new(Meta::new()), options)?;
        for u in units {
            e.write(u).await?;
        }
        Ok(e.into_inner())
    }

    #[tokio::test]
    async fn test_three_frame_scenario() -> Result<()> {
        let units = frames(3);
        let out = encode(
            &units,
            vec![config::rate(RATE), config::packet_based_psi(7)],
        )
        .await?;
        assert_eq!(out.len() % TS_PACKET_SIZE, 0);

        let pkts: Vec<&[u8]> = out.chunks(TS_PACKET_SIZE).collect();
        let pids: Vec<u16> = pkts.iter().map(|p| packet::pid(p).unwrap()).collect();

        // Tables come before the 7th packet.
        let pat_at = pids.iter().position(|&p| p == PID_PAT).unwrap();
        assert!(pat_at < 6);
        assert_eq!(pids[pat_at + 1], PID_PMT);

        // Counters step by one per packet on each PID.
        let mut last: HashMap<u16, u8> = HashMap::new();
        for p in &pkts {
            let pid = packet::pid(p)?;
            let cc = packet::continuity_counter(p)?;
            if let Some(prev) = last.insert(pid, cc) {
                assert_eq!(cc, (prev + 1) % 16, "pid {}", pid);
            }
        }

        // PTS advances by one frame interval per access unit.
        let pts: Vec<u64> = pkts
            .iter()
            .filter(|p| packet::pid(p).unwrap() == PID_VIDEO)
            .filter_map(|p| get_pts(p).ok())
            .collect();
        assert_eq!(pts.len(), 3);
        assert_eq!(pts[1] - pts[0], FRAME_TICKS);
        assert_eq!(pts[2] - pts[1], FRAME_TICKS);
        assert_eq!(get_pts_range(&out, PID_VIDEO)?, [pts[0], pts[2]]);
        Ok(())
    }

    #[tokio::test]
    async fn test_packet_policy_spacing() -> Result<()> {
        let out = encode(&frames(12), vec![config::packet_based_psi(5)]).await?;
        let pids: Vec<u16> = out
            .chunks(TS_PACKET_SIZE)
            .map(|p| packet::pid(p).unwrap())
            .collect();
        let pats: Vec<usize> = pids
            .iter()
            .enumerate()
            .filter(|(_, &p)| p == PID_PAT)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(pats[0], 0);
        // A pair is written at the first unit boundary once 5 packets have
        // gone out. No unit here spans more than 5 packets.
        assert!(pats.len() > 2);
        for w in pats.windows(2) {
            assert!(w[1] - w[0] >= 5);
            assert!(w[1] - w[0] < 5 + 5);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_extraction_fidelity() -> Result<()> {
        let units = frames(5);
        let out = encode(&units, vec![config::packet_based_psi(7)]).await?;

        let c = clip::extract(&out)?;
        assert_eq!(c.len(), units.len());
        assert_eq!(&c.bytes()[..], &units.concat()[..]);
        for (f, u) in c.frames().iter().zip(&units) {
            assert_eq!(f.media(), &u[..]);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_trim_encoded_clip() -> Result<()> {
        let units = frames(6);
        let out = encode(&units, vec![config::packet_based_psi(7)]).await?;
        let c = clip::extract(&out)?;
        let first = c.frames()[0].pts;

        let t = c.trim_to_pts_range(first + FRAME_TICKS, first + 4 * FRAME_TICKS)?;
        assert_eq!(t.len(), 3);
        assert_eq!(&t.bytes()[..], &units[1..4].concat()[..]);

        assert!(matches!(
            c.trim_to_pts_range(first + FRAME_TICKS, first + FRAME_TICKS),
            Err(TsError::InvalidRange)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_meta_segments_through_muxer() -> Result<()> {
        let meta = Arc::new(Meta::new());
        let mut e = Encoder::new(
            Vec::<u8>::new(),
            Arc::clone(&meta),
            vec![config::media_type(CodecType::MJPEG)],
        )?;
        let units = frames(5);
        for (i, u) in units.iter().enumerate() {
            let state = if i == 2 { "idle" } else { "active" };
            meta.add("state", state);
            e.write_packet(Packet::new(u.clone())).await?;
        }
        let out = e.into_inner();

        let info = find_psi(&out)?;
        assert_eq!(info.meta.unwrap()["state"], "active");

        let c = clip::extract(&out)?;
        let segs = c.segment_for_meta("state", "active");
        assert_eq!(segs.len(), 2);
        assert_eq!(&segs[0].bytes()[..], &units[..2].concat()[..]);
        assert_eq!(&segs[1].bytes()[..], &units[3..].concat()[..]);

        let ranged = c.trim_to_meta_range("state", "idle", "active")?;
        assert_eq!(ranged.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_psi_pair_decodes() -> Result<()> {
        let out = encode(&frames(1), vec![config::packet_based_psi(7)]).await?;
        let streams = media_streams(&out)?;
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].stream_type, STREAM_TYPE_H264);
        assert_eq!(streams[0].pid, PID_VIDEO);
        Ok(())
    }

    #[tokio::test]
    async fn test_repair_between_clips() -> Result<()> {
        let meta = Arc::new(Meta::new());
        let mut e = Encoder::new(
            Vec::<u8>::new(),
            meta,
            vec![config::media_type(CodecType::JPEG)],
        )?;
        let mut clips = Vec::new();
        for u in frames(4) {
            e.write(&u).await?;
        }
        let out = e.into_inner();

        // Every JPEG unit is a key unit, so each starts with its own PSI.
        let mut start = 0;
        for (i, p) in out.chunks(TS_PACKET_SIZE).enumerate().skip(1) {
            if packet::pid(p)? == PID_PAT {
                clips.push(out[start * TS_PACKET_SIZE..i * TS_PACKET_SIZE].to_vec());
                start = i;
            }
        }
        clips.push(out[start * TS_PACKET_SIZE..].to_vec());
        assert_eq!(clips.len(), 4);

        let mut dr = DiscontinuityRepairer::new();
        dr.repair(&mut clips[0])?;
        assert!(TsPacket::parse(&clips[0][..TS_PACKET_SIZE])?.discontinuity);
        // Clip 1 is lost.
        dr.repair(&mut clips[2])?;
        assert!(TsPacket::parse(&clips[2][..TS_PACKET_SIZE])?.discontinuity);

        dr.repair(&mut clips[3])?;
        dr.failed();
        let mut retry = clips[3].clone();
        dr.repair(&mut retry)?;
        assert!(!TsPacket::parse(&retry[..TS_PACKET_SIZE])?.discontinuity);
        Ok(())
    }

    #[tokio::test]
    async fn test_write_to_file() -> Result<()> {
        let path = std::env::temp_dir().join(format!("tsmeta_{}.ts", std::process::id()));
        let file = File::create(&path).await?;
        let mut e = Encoder::new(
            BufWriter::new(file),
            Arc::new(Meta::with_pairs([("loc", "lab")])),
            vec![config::packet_based_psi(7)],
        )?;
        e.write_header().await?;
        for u in frames(2) {
            e.write(&u).await?;
        }
        e.write_trailer().await?;

        let data = tokio::fs::read(&path).await?;
        tokio::fs::remove_file(&path).await?;
        assert_eq!(clip::extract(&data)?.len(), 2);
        assert_eq!(find_psi(&data)?.meta.unwrap()["loc"], "lab");
        Ok(())
    }
}
