//! Wall clock for retention, grace and backoff arithmetic - NOT for ordering.

use serde::{Deserialize, Serialize};

/// Wall-clock instant in milliseconds since the Unix epoch.
///
/// `WallClock(0)` doubles as "never" for `last_access`. Copy is fine here -
/// it's a measurement, not causality.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WallClock(pub u64);

impl WallClock {
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        Self(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        )
    }

    pub fn saturating_add_ms(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }

    pub fn saturating_sub_ms(self, ms: u64) -> Self {
        Self(self.0.saturating_sub(ms))
    }

    /// Zero means "never observed".
    pub fn is_never(self) -> bool {
        self.0 == 0
    }
}
