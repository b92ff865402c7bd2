//! Read-only view of the upstream source's media metadata.
//!
//! These mirror `DTSC::Meta` / `DTSC::Track` / `DTSC::Key` / `DTSC::Part`
//! from the original connector: a per-stream metadata document owned by
//! the upstream source, handed to us once per connection and re-read on
//! every request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hss_util::time::Millis;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub live: bool,
    pub vod: bool,
    pub buffer_window: Millis,
    pub tracks: BTreeMap<u32, Track>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Codec {
    H264,
    Aac,
    Other(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub track_id: u32,
    pub kind: Kind,
    pub codec: Codec,
    /// Video only.
    pub width: u32,
    /// Video only.
    pub height: u32,
    /// Audio only: sample rate in Hz.
    pub rate: u32,
    /// Byte rate; HSS `Bitrate` is `bps * 8`.
    pub bps: u32,
    /// AVCC (video) or AudioSpecificConfig (audio).
    pub init: Vec<u8>,
    pub keys: Vec<Key>,
    pub parts: Vec<Part>,
}

impl Track {
    /// First part index belonging to `keys[key_index]`.
    pub fn part_offset(&self, key_index: usize) -> usize {
        self.keys[..key_index].iter().map(|k| k.parts).sum()
    }

    pub fn parts_for_key(&self, key_index: usize) -> &[Part] {
        let offset = self.part_offset(key_index);
        let count = self.keys[key_index].parts;
        &self.parts[offset..offset + count]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Key {
    pub time: Millis,
    pub length: Millis,
    /// 1-based.
    pub number: u32,
    pub parts: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Part {
    pub size: u32,
    pub duration: Millis,
    /// Video composition offset; always 0 for audio.
    pub offset: Millis,
}
