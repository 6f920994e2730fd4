//! Encoder configuration.
//!
//! An [`Encoder`](crate::format::ts::Encoder) is configured by applying an
//! ordered list of options to an [`EncoderConfig`] that starts from the
//! defaults. Later options override earlier ones.
//!
//! ```rust
//! use tsmeta::av::CodecType;
//! use tsmeta::config::{self, EncoderConfig, PsiPolicy};
//!
//! # fn main() -> tsmeta::Result<()> {
//! let cfg = EncoderConfig::from_options(vec![
//!     config::media_type(CodecType::H265),
//!     config::rate(30.0),
//!     config::packet_based_psi(7),
//! ])?;
//! assert_eq!(cfg.psi, PsiPolicy::PacketCount(7));
//! # Ok(())
//! # }
//! ```
//!
//! Options can also be read from the environment (`TSMETA_RATE`,
//! `TSMETA_PSI_PACKETS`, `TSMETA_PSI_SECS`) or from a `key = value` file
//! (`rate`, `psi_packets`, `psi_secs`).

use crate::av::CodecType;
use crate::codec::KeyUnitProbe;
use crate::error::{Result, TsError};
use crate::format::ts::types::MediaParams;
use crate::utils::RealTime;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_RATE: f64 = 25.0;
pub const MIN_RATE: f64 = 1.0;
pub const MAX_RATE: f64 = 60.0;

/// Default presentation offset, covering the buffering delay downstream.
pub const DEFAULT_PTS_OFFSET: Duration = Duration::from_millis(700);

/// When the encoder writes a PAT/PMT pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsiPolicy {
    /// After this many packets (tables included) since the last pair.
    PacketCount(usize),
    /// After this much time since the last pair.
    Time(Duration),
    /// In front of every key/parameter-set access unit.
    KeyFrame,
}

#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub codec: CodecType,
    /// Nominal interval between access units.
    pub write_period: Duration,
    pub psi: PsiPolicy,
    pub pts_offset: Duration,
    /// Overrides the codec's default key unit probe.
    pub key_unit_probe: Option<KeyUnitProbe>,
    /// Wall clock used to stamp each PMT with the time it was written.
    pub real_time: Option<Arc<RealTime>>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            codec: CodecType::H264,
            write_period: Duration::from_secs_f64(1.0 / DEFAULT_RATE),
            psi: PsiPolicy::KeyFrame,
            pts_offset: DEFAULT_PTS_OFFSET,
            key_unit_probe: None,
            real_time: None,
        }
    }
}

impl EncoderConfig {
    /// Applies `options` in order on top of the defaults.
    pub fn from_options(options: impl IntoIterator<Item = EncoderOption>) -> Result<Self> {
        let mut cfg = Self::default();
        for option in options {
            option(&mut cfg)?;
        }
        Ok(cfg)
    }

    /// Nominal access unit rate per second.
    pub fn rate(&self) -> f64 {
        1.0 / self.write_period.as_secs_f64()
    }
}

pub type EncoderOption = Box<dyn FnOnce(&mut EncoderConfig) -> Result<()> + Send>;

/// Selects the codec, and with it the media PID and stream type.
pub fn media_type(codec: CodecType) -> EncoderOption {
    Box::new(move |c| {
        MediaParams::for_codec(codec)?;
        c.codec = codec;
        log::debug!("configured for {:?} packetisation", codec);
        Ok(())
    })
}

/// Sets the nominal access unit rate, which drives the encoder's clock.
pub fn rate(r: f64) -> EncoderOption {
    Box::new(move |c| {
        if !(MIN_RATE..=MAX_RATE).contains(&r) {
            return Err(TsError::InvalidRate(r));
        }
        c.write_period = Duration::from_secs_f64(1.0 / r);
        log::debug!("configured for {} access units per second", r);
        Ok(())
    })
}

pub fn packet_based_psi(count: usize) -> EncoderOption {
    Box::new(move |c| {
        if count == 0 {
            return Err(TsError::InvalidData("PSI packet count must be positive".into()));
        }
        c.psi = PsiPolicy::PacketCount(count);
        log::debug!("configured for packet based PSI insertion every {} packets", count);
        Ok(())
    })
}

pub fn time_based_psi(period: Duration) -> EncoderOption {
    Box::new(move |c| {
        c.psi = PsiPolicy::Time(period);
        log::debug!("configured for time based PSI insertion every {:?}", period);
        Ok(())
    })
}

pub fn key_frame_based_psi() -> EncoderOption {
    Box::new(|c| {
        c.psi = PsiPolicy::KeyFrame;
        log::debug!("configured for key frame based PSI insertion");
        Ok(())
    })
}

pub fn pts_offset(offset: Duration) -> EncoderOption {
    Box::new(move |c| {
        c.pts_offset = offset;
        Ok(())
    })
}

pub fn key_unit_probe(probe: KeyUnitProbe) -> EncoderOption {
    Box::new(move |c| {
        c.key_unit_probe = Some(probe);
        Ok(())
    })
}

pub fn real_time(clock: Arc<RealTime>) -> EncoderOption {
    Box::new(move |c| {
        c.real_time = Some(clock);
        Ok(())
    })
}

/// Reads options from `TSMETA_RATE`, `TSMETA_PSI_PACKETS` and
/// `TSMETA_PSI_SECS`.
pub fn options_from_env() -> Result<Vec<EncoderOption>> {
    options_from_lookup(|k| env::var(k).ok())
}

/// Builds options from whatever `lookup` returns for the environment keys.
/// When both PSI keys are present the packet count wins.
pub fn options_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Vec<EncoderOption>> {
    let mut opts = Vec::new();

    if let Some(v) = lookup("TSMETA_RATE") {
        opts.push(rate(parse_value("TSMETA_RATE", &v)?));
    }
    if let Some(v) = lookup("TSMETA_PSI_SECS") {
        let secs: f64 = parse_value("TSMETA_PSI_SECS", &v)?;
        let period = Duration::try_from_secs_f64(secs)
            .map_err(|_| TsError::InvalidData(format!("bad TSMETA_PSI_SECS {:?}", v)))?;
        opts.push(time_based_psi(period));
    }
    if let Some(v) = lookup("TSMETA_PSI_PACKETS") {
        opts.push(packet_based_psi(parse_value("TSMETA_PSI_PACKETS", &v)?));
    }
    Ok(opts)
}

/// Reads options from a file of `key = value` lines. `#` starts a comment;
/// unknown keys are ignored.
pub fn options_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<EncoderOption>> {
    let content = fs::read_to_string(path)?;
    let values: Vec<(String, String)> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| {
            let (k, v) = l.split_once('=')?;
            let v = v.trim().trim_matches('"').trim_matches('\'');
            Some((k.trim().to_string(), v.to_string()))
        })
        .collect();

    options_from_lookup(|key| {
        let file_key = key.trim_start_matches("TSMETA_").to_ascii_lowercase();
        values
            .iter()
            .find(|(k, _)| *k == file_key)
            .map(|(_, v)| v.clone())
    })
}

fn parse_value<T: std::str::FromStr>(key: &str, v: &str) -> Result<T> {
    v.trim()
        .parse()
        .map_err(|_| TsError::InvalidData(format!("bad {} value {:?}", key, v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let cfg = EncoderConfig::default();
        assert_eq!(cfg.codec, CodecType::H264);
        assert_eq!(cfg.psi, PsiPolicy::KeyFrame);
        assert_eq!(cfg.pts_offset, Duration::from_millis(700));
        assert_eq!(cfg.write_period, Duration::from_millis(40));
    }

    #[test]
    fn test_options_apply_in_order() {
        let cfg = EncoderConfig::from_options(vec![
            packet_based_psi(7),
            time_based_psi(Duration::from_secs(2)),
            rate(10.0),
        ])
        .unwrap();
        assert_eq!(cfg.psi, PsiPolicy::Time(Duration::from_secs(2)));
        assert_eq!(cfg.write_period, Duration::from_millis(100));
        assert!((cfg.rate() - 10.0).abs() < 1e-9);

        let cfg =
            EncoderConfig::from_options(vec![packet_based_psi(3), key_frame_based_psi()]).unwrap();
        assert_eq!(cfg.psi, PsiPolicy::KeyFrame);
    }

    #[test]
    fn test_invalid_options() {
        assert!(matches!(
            EncoderConfig::from_options(vec![rate(0.5)]),
            Err(TsError::InvalidRate(_))
        ));
        assert!(matches!(
            EncoderConfig::from_options(vec![rate(61.0)]),
            Err(TsError::InvalidRate(_))
        ));
        assert!(matches!(
            EncoderConfig::from_options(vec![media_type(CodecType::AAC)]),
            Err(TsError::UnsupportedMedia)
        ));
        assert!(EncoderConfig::from_options(vec![packet_based_psi(0)]).is_err());
    }

    #[test]
    fn test_options_from_lookup() {
        let env: HashMap<&str, &str> =
            HashMap::from([("TSMETA_RATE", "30"), ("TSMETA_PSI_PACKETS", "9")]);
        let opts = options_from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        let cfg = EncoderConfig::from_options(opts).unwrap();
        assert_eq!(cfg.psi, PsiPolicy::PacketCount(9));
        assert!((cfg.rate() - 30.0).abs() < 1e-9);

        let env: HashMap<&str, &str> = HashMap::from([("TSMETA_PSI_SECS", "1.5")]);
        let opts = options_from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        let cfg = EncoderConfig::from_options(opts).unwrap();
        assert_eq!(cfg.psi, PsiPolicy::Time(Duration::from_millis(1500)));

        assert!(options_from_lookup(|_| Some("abc".to_string())).is_err());
    }

    #[test]
    fn test_options_from_file() {
        let path = env::temp_dir().join(format!("tsmeta_config_{}.toml", std::process::id()));
        fs::write(&path, "# encoder\nrate = \"50\"\npsi_packets = 12\nother = 1\n").unwrap();
        let opts = options_from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let cfg = EncoderConfig::from_options(opts).unwrap();
        assert_eq!(cfg.psi, PsiPolicy::PacketCount(12));
        assert_eq!(cfg.write_period, Duration::from_millis(20));
    }
}
