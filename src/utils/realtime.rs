use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Instant;

/// A wall clock that becomes available once some outside source (an NTP
/// reply, a server response) has told us the time.
///
/// After [`set`](RealTime::set) the clock advances with the local monotonic
/// clock, so [`get`](RealTime::get) keeps returning a live time.
#[derive(Debug, Default)]
pub struct RealTime {
    anchor: RwLock<Option<(DateTime<Utc>, Instant)>>,
}

impl RealTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchors the clock at `t` as of now.
    pub fn set(&self, t: DateTime<Utc>) {
        *self.anchor.write() = Some((t, Instant::now()));
    }

    pub fn is_set(&self) -> bool {
        self.anchor.read().is_some()
    }

    /// Returns the current time, or `None` if the clock was never set.
    pub fn get(&self) -> Option<DateTime<Utc>> {
        let (t, at) = (*self.anchor.read())?;
        let elapsed = chrono::Duration::from_std(at.elapsed()).ok()?;
        Some(t + elapsed)
    }
}
