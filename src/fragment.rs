//! Ties a matched key to the upstream commands that will make it play,
//! and the MOOF+mdat-header bytes that precede the payload on the wire.

use hss_mux::boxes::Fragment;
use hss_mux::model::Track;

pub struct FragmentPlan {
    /// `t <trackID>`, `s <ms>`, `p [<ms>]`, in order, newline-terminated
    /// by the caller when writing them upstream.
    pub commands: Vec<String>,
    pub fragment: Fragment,
}

/// Builds the assembler's output for `track.keys[key_index]`.
///
/// `requested_ms` is the originally requested fragment time, used only
/// to seed the live `TfrfBox` forward scan — playback always starts at
/// the matched key's own time, not the raw request.
pub fn plan(track: &Track, key_index: usize, requested_ms: i64, live: bool) -> FragmentPlan {
    let key = track.keys[key_index];

    let key_dur = track.keys.get(key_index + 1).map(|next| next.time.0 - key.time.0);

    let play_command = match key_dur {
        Some(dur) => format!("p {}", key.time.0 + dur),
        None => "p".to_owned(),
    };

    let commands = vec![
        format!("t {}", track.track_id),
        format!("s {}", key.time.0),
        play_command,
    ];

    let fragment = Fragment::build(track, key_index, requested_ms, live);

    FragmentPlan { commands, fragment }
}
