use derive_more::{From, Into};
use serde::{Deserialize, Serialize};

/// Ticks per millisecond on the HSS wire (100ns ticks).
pub const TICKS_PER_MS: i64 = 10_000;

/// A duration or instant expressed in milliseconds, the unit used
/// throughout source metadata (`Meta`, `Track`, `Key`, `Part`).
#[derive(From, Into, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Millis(pub i64);

/// A duration or instant expressed in 100ns ticks, the unit used on the
/// HSS wire (manifest `t=`/`d=` attributes, fragment request URLs).
#[derive(From, Into, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Ticks(pub i64);

impl Millis {
    pub fn to_ticks(self) -> Ticks {
        Ticks(self.0 * TICKS_PER_MS)
    }
}

impl Ticks {
    /// Floor-divides down to whole milliseconds, matching the original
    /// connector's `requestedTime / 10000` integer division.
    pub fn to_millis(self) -> Millis {
        Millis(self.0 / TICKS_PER_MS)
    }
}
