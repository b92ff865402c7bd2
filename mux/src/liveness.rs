//! Classifies a requested fragment time against a track's key window.

use crate::model::Track;

pub const TOO_OLD_BODY: &str =
    "The requested fragment is no longer kept in memory on the server and cannot be served.\n";
pub const NOT_YET_AVAILABLE_BODY: &str = "Proxy, re-request this in a second or two.\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// HTTP 412.
    TooOld,
    /// HTTP 208.
    NotYetAvailable,
    /// Index into `track.keys`.
    Servable(usize),
}

/// Gates a live fragment request. `requested_ms` is the caller's
/// fragment time already converted from wire ticks.
pub fn gate_live(track: &Track, requested_ms: i64) -> Disposition {
    let keys = &track.keys;

    let window_lo = keys.first().map(|k| k.time.0).unwrap_or(0);
    let window_hi = keys.last().map(|k| k.time.0).unwrap_or(0);

    if requested_ms < window_lo {
        return Disposition::TooOld;
    }

    if requested_ms > window_hi {
        return Disposition::NotYetAvailable;
    }

    let matched = keys.iter().position(|k| k.time.0 >= requested_ms);

    let matched = match matched {
        Some(index) => index,
        None => {
            if requested_ms > 1 {
                return Disposition::TooOld;
            }
            return Disposition::NotYetAvailable;
        }
    };

    // penultimate (or last) key: the next-next fragment has not arrived yet.
    if matched + 2 >= keys.len() {
        return Disposition::NotYetAvailable;
    }

    Disposition::Servable(matched)
}

/// Gates a VOD fragment request: a pure lookup, `None` on miss (404-class).
pub fn gate_vod(track: &Track, requested_ms: i64) -> Option<usize> {
    track.keys.iter().position(|k| k.time.0 >= requested_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Codec, Key, Kind, Track};
    use hss_util::time::Millis;

    fn track_with_keys(times: &[i64]) -> Track {
        Track {
            track_id: 1,
            kind: Kind::Video,
            codec: Codec::H264,
            width: 0,
            height: 0,
            rate: 0,
            bps: 0,
            init: vec![],
            keys: times.iter().enumerate().map(|(i, &t)| Key {
                time: Millis(t),
                length: Millis(1000),
                number: (i + 1) as u32,
                parts: 1,
            }).collect(),
            parts: vec![],
        }
    }

    #[test]
    fn requests_before_the_window_are_too_old() {
        let track = track_with_keys(&[10_000, 20_000, 30_000]);
        assert_eq!(gate_live(&track, 5_000), Disposition::TooOld);
    }

    #[test]
    fn requests_past_the_window_are_not_yet_available() {
        let track = track_with_keys(&[10_000, 20_000, 30_000]);
        assert_eq!(gate_live(&track, 40_000), Disposition::NotYetAvailable);
    }

    #[test]
    fn the_penultimate_key_is_not_yet_available() {
        let track = track_with_keys(&[10_000, 20_000, 30_000]);
        // matching key index 1 (20_000) is the penultimate key (index len-2)
        assert_eq!(gate_live(&track, 15_000), Disposition::NotYetAvailable);
    }

    #[test]
    fn an_exact_match_with_a_following_fragment_is_servable() {
        let track = track_with_keys(&[10_000, 20_000, 30_000, 40_000]);
        assert_eq!(gate_live(&track, 15_000), Disposition::Servable(1));
    }

    #[test]
    fn vod_lookup_returns_the_first_key_at_or_after_the_request() {
        let track = track_with_keys(&[0, 4_000, 8_000]);
        assert_eq!(gate_vod(&track, 4_000), Some(1));
        assert_eq!(gate_vod(&track, 4_001), Some(2));
        assert_eq!(gate_vod(&track, 9_000), None);
    }
}
