//! Flags gaps between clips that were sent one at a time.
//!
//! Each clip handed to [`DiscontinuityRepairer::repair`] must start with a
//! PAT. When the PAT's continuity counter is not the one that follows the
//! previous clip's, something was lost in between, so the packet's
//! discontinuity indicator is set before the clip goes out.

use super::packet::{self, set_discontinuity};
use super::types::*;
use crate::error::{Result, TsError};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct DiscontinuityRepairer {
    /// Expected counter per PID. `None` until the first clip is seen.
    expected: HashMap<u16, Option<u8>>,
}

impl Default for DiscontinuityRepairer {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscontinuityRepairer {
    /// Tracks the table PIDs and the video PID.
    pub fn new() -> Self {
        Self::with_pids(&[PID_PAT, PID_PMT, PID_VIDEO])
    }

    pub fn with_pids(pids: &[u16]) -> Self {
        Self {
            expected: pids.iter().map(|&p| (p, None)).collect(),
        }
    }

    /// Checks the PAT leading `clip`, flagging it if its counter is not the
    /// expected one, and moves the expectation on by one.
    ///
    /// Before the first clip nothing is expected, so the first clip is
    /// always flagged and its counter becomes the baseline.
    pub fn repair(&mut self, clip: &mut [u8]) -> Result<()> {
        if packet::pid(clip)? != PID_PAT {
            return Err(TsError::NotPat);
        }
        let cc = packet::continuity_counter(clip)?;
        let want = self.expected_cc(PID_PAT);
        if want != Some(cc) {
            match want {
                Some(want) => log::info!(
                    "discontinuity before clip: PAT cc {} where {} was expected",
                    cc,
                    want
                ),
                None => log::info!("flagging first clip: PAT cc {}", cc),
            }
            set_discontinuity(&mut clip[..TS_PACKET_SIZE], true)?;
            self.set_expected_cc(PID_PAT, cc);
        }
        self.inc_expected_cc(PID_PAT);
        Ok(())
    }

    /// Records that the last repaired clip was not delivered, so a retry
    /// of it is not taken as a gap.
    ///
    /// With nothing expected yet the expectation wraps to 15.
    pub fn failed(&mut self) {
        let cc = self.expected.entry(PID_PAT).or_insert(None);
        *cc = Some(cc.map_or(0x0f, |c| c.wrapping_sub(1) & 0x0f));
    }

    pub fn expected_cc(&self, pid: u16) -> Option<u8> {
        self.expected.get(&pid).copied().flatten()
    }

    pub fn set_expected_cc(&mut self, pid: u16, cc: u8) {
        self.expected.insert(pid, Some(cc & 0x0f));
    }

    pub fn inc_expected_cc(&mut self, pid: u16) {
        if let Some(Some(cc)) = self.expected.get_mut(&pid) {
            *cc = (*cc + 1) & 0x0f;
        }
    }
}
