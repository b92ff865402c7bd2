//! fMP4 box construction: MOOF/MDAT layout for a single HSS fragment.
//!
//! Boxes are value-owning (no `new`-and-link pointer trees): each
//! `FmpBox` variant holds everything it needs to serialize itself, and
//! parent boxes (`Traf`, `Moof`) own their children by value. `TRUN`'s
//! `data_offset` can only be known once the whole `MOOF` has been sized,
//! so fragment assembly is a two-pass emit: build once with a
//! placeholder offset to learn `moof`'s size, patch, then rebuild — see
//! [`Fragment::build`].

use uuid::Uuid;

use crate::model::{Kind, Track};

fn write_box(out: &mut Vec<u8>, fourcc: &[u8; 4], body: &[u8]) {
    out.extend_from_slice(&((body.len() + 8) as u32).to_be_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(body);
}

pub const TFHD_DEFAULT_SAMPLE_FLAGS_PRESENT: u32 = 0x00_00_20;

pub const VIDEO_DEFAULT_SAMPLE_FLAGS: u32 = 0x0000_4001;
pub const AUDIO_DEFAULT_SAMPLE_FLAGS: u32 = 0x0000_8002;
pub const VIDEO_FIRST_SAMPLE_FLAGS: u32 = 0x0000_4002;

const TRUN_DATA_OFFSET_PRESENT: u32 = 0x00_00_01;
const TRUN_FIRST_SAMPLE_FLAGS_PRESENT: u32 = 0x00_00_04;
const TRUN_SAMPLE_DURATION_PRESENT: u32 = 0x00_01_00;
const TRUN_SAMPLE_SIZE_PRESENT: u32 = 0x00_02_00;
const TRUN_SAMPLE_COMPOSITION_OFFSET_PRESENT: u32 = 0x00_08_00;

const VIDEO_TRUN_FLAGS: u32 = TRUN_DATA_OFFSET_PRESENT
    | TRUN_FIRST_SAMPLE_FLAGS_PRESENT
    | TRUN_SAMPLE_DURATION_PRESENT
    | TRUN_SAMPLE_SIZE_PRESENT
    | TRUN_SAMPLE_COMPOSITION_OFFSET_PRESENT;

const AUDIO_TRUN_FLAGS: u32 =
    TRUN_DATA_OFFSET_PRESENT | TRUN_SAMPLE_DURATION_PRESENT | TRUN_SAMPLE_SIZE_PRESENT;

/// The MS Smooth Streaming `TfrfBox` extended type:
/// `6D1D9B05-42D5-44E6-80E2-141DAFF757B2`.
fn tfrf_uuid_bytes() -> [u8; 16] {
    *Uuid::parse_str("6D1D9B05-42D5-44E6-80E2-141DAFF757B2")
        .expect("valid uuid literal")
        .as_bytes()
}

#[derive(Debug, Clone, Copy)]
pub struct TrunEntry {
    pub duration: u32,
    pub size: u32,
    /// Video only.
    pub composition_offset: Option<i32>,
}

#[derive(Debug, Clone)]
pub enum FmpBox {
    Mfhd {
        sequence_number: u32,
    },
    Tfhd {
        track_id: u32,
        default_sample_flags: u32,
    },
    Trun {
        video: bool,
        data_offset: i32,
        first_sample_flags: u32,
        entries: Vec<TrunEntry>,
    },
    Sdtp {
        video: bool,
        sample_count: usize,
    },
    UuidTfrf {
        /// `(time_ticks, duration_ticks)`, at most 2 entries.
        entries: Vec<(u64, u64)>,
    },
    Traf(Vec<FmpBox>),
    Moof(Vec<FmpBox>),
}

impl FmpBox {
    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            FmpBox::Mfhd { sequence_number } => {
                let mut body = Vec::with_capacity(8);
                body.extend_from_slice(&[0, 0, 0, 0]); // version + flags
                body.extend_from_slice(&sequence_number.to_be_bytes());
                write_box(out, b"mfhd", &body);
            }

            FmpBox::Tfhd {
                track_id,
                default_sample_flags,
            } => {
                let mut body = Vec::with_capacity(12);
                body.push(0); // version
                body.extend_from_slice(&TFHD_DEFAULT_SAMPLE_FLAGS_PRESENT.to_be_bytes()[1..]);
                body.extend_from_slice(&track_id.to_be_bytes());
                body.extend_from_slice(&default_sample_flags.to_be_bytes());
                write_box(out, b"tfhd", &body);
            }

            FmpBox::Trun {
                video,
                data_offset,
                first_sample_flags,
                entries,
            } => {
                let flags = if *video { VIDEO_TRUN_FLAGS } else { AUDIO_TRUN_FLAGS };

                let mut body = Vec::new();
                body.push(0); // version
                body.extend_from_slice(&flags.to_be_bytes()[1..]);
                body.extend_from_slice(&(entries.len() as u32).to_be_bytes());
                body.extend_from_slice(&data_offset.to_be_bytes());

                if *video {
                    body.extend_from_slice(&first_sample_flags.to_be_bytes());
                }

                for entry in entries {
                    body.extend_from_slice(&entry.duration.to_be_bytes());
                    body.extend_from_slice(&entry.size.to_be_bytes());

                    if *video {
                        let offset = entry.composition_offset.unwrap_or(0);
                        body.extend_from_slice(&offset.to_be_bytes());
                    }
                }

                write_box(out, b"trun", &body);
            }

            FmpBox::Sdtp { video, sample_count } => {
                let mut body = vec![0u8, 0, 0, 0]; // version 0 + flags

                for i in 0..*sample_count {
                    let dependency = if *video {
                        if i == 0 { 36 } else { 20 }
                    } else {
                        40
                    };
                    body.push(dependency);
                }

                write_box(out, b"sdtp", &body);
            }

            FmpBox::UuidTfrf { entries } => {
                let mut body = Vec::new();
                body.extend_from_slice(&tfrf_uuid_bytes());
                body.push(1); // version 1: 64-bit time/duration fields
                body.extend_from_slice(&[0, 0, 0]); // flags
                body.push(entries.len() as u8);

                for (time, duration) in entries {
                    body.extend_from_slice(&time.to_be_bytes());
                    body.extend_from_slice(&duration.to_be_bytes());
                }

                write_box(out, b"uuid", &body);
            }

            FmpBox::Traf(children) => {
                let mut body = Vec::new();
                for child in children {
                    child.serialize(&mut body);
                }
                write_box(out, b"traf", &body);
            }

            FmpBox::Moof(children) => {
                let mut body = Vec::new();
                for child in children {
                    child.serialize(&mut body);
                }
                write_box(out, b"moof", &body);
            }
        }
    }

    pub fn boxed_size(&self) -> usize {
        let mut scratch = Vec::new();
        self.serialize(&mut scratch);
        scratch.len()
    }
}

/// A fully assembled fragment response body minus the sample payload:
/// the MOOF box followed by the `mdat` box header (length + fourcc).
/// The caller streams the `key_size` bytes of sample payload after this.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub moof: Vec<u8>,
    pub mdat_header: [u8; 8],
    pub key_size: u32,
}

impl Fragment {
    /// Builds the MOOF + empty-mdat-header for `track.keys[key_index]`,
    /// given the originally requested time (used to scan forward for
    /// live `TfrfBox` entries).
    pub fn build(track: &Track, key_index: usize, requested_ms: i64, live: bool) -> Self {
        let key = track.keys[key_index];
        let video = matches!(track.kind, Kind::Video);

        let parts = track.parts_for_key(key_index);
        let key_size: u32 = parts.iter().map(|p| p.size).sum();

        let sequence_number = (key.number - 1) * 2 + track.track_id;

        let entries: Vec<TrunEntry> = parts
            .iter()
            .map(|part| TrunEntry {
                duration: (part.duration.0 * 10_000) as u32,
                size: part.size,
                composition_offset: if video {
                    Some((part.offset.0 * 10_000) as i32)
                } else {
                    None
                },
            })
            .collect();

        let build_traf = |data_offset: i32| {
            let mut children = vec![
                FmpBox::Tfhd {
                    track_id: track.track_id,
                    default_sample_flags: if video {
                        VIDEO_DEFAULT_SAMPLE_FLAGS
                    } else {
                        AUDIO_DEFAULT_SAMPLE_FLAGS
                    },
                },
                FmpBox::Trun {
                    video,
                    data_offset,
                    first_sample_flags: VIDEO_FIRST_SAMPLE_FLAGS,
                    entries: entries.clone(),
                },
                FmpBox::Sdtp {
                    video,
                    sample_count: parts.len(),
                },
            ];

            if live {
                children.push(FmpBox::UuidTfrf {
                    entries: forward_fragment_refs(track, key_index, requested_ms),
                });
            }

            FmpBox::Traf(children)
        };

        let moof_pass1 = FmpBox::Moof(vec![
            FmpBox::Mfhd { sequence_number },
            build_traf(0),
        ]);

        let moof_size = moof_pass1.boxed_size();
        let data_offset = moof_size as i32 + 8;

        let moof_pass2 = FmpBox::Moof(vec![
            FmpBox::Mfhd { sequence_number },
            build_traf(data_offset),
        ]);

        let mut moof = Vec::with_capacity(moof_size);
        moof_pass2.serialize(&mut moof);

        let mut mdat_header = [0u8; 8];
        mdat_header[0..4].copy_from_slice(&(key_size + 8).to_be_bytes());
        mdat_header[4..8].copy_from_slice(b"mdat");

        Fragment {
            moof,
            mdat_header,
            key_size,
        }
    }
}

/// Up to 2 upcoming fragments (by request time) for the live `TfrfBox`.
fn forward_fragment_refs(track: &Track, key_index: usize, requested_ms: i64) -> Vec<(u64, u64)> {
    track.keys[key_index..]
        .iter()
        .filter(|key| key.time.0 > requested_ms)
        .take(2)
        .map(|key| ((key.time.0 * 10_000) as u64, (key.length.0 * 10_000) as u64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Kind, Part, Track};
    use hss_util::time::Millis;
    use pretty_hex::pretty_hex;

    fn video_track() -> Track {
        Track {
            track_id: 1,
            kind: Kind::Video,
            codec: crate::model::Codec::H264,
            width: 1280,
            height: 720,
            rate: 0,
            bps: 125_000,
            init: vec![],
            keys: vec![
                crate::model::Key {
                    time: Millis(4000),
                    length: Millis(120),
                    number: 2,
                    parts: 3,
                },
                crate::model::Key {
                    time: Millis(4120),
                    length: Millis(40),
                    number: 3,
                    parts: 1,
                },
            ],
            parts: vec![
                Part { size: 500, duration: Millis(40), offset: Millis(0) },
                Part { size: 300, duration: Millis(40), offset: Millis(0) },
                Part { size: 200, duration: Millis(40), offset: Millis(0) },
                Part { size: 100, duration: Millis(40), offset: Millis(0) },
            ],
        }
    }

    #[test]
    fn mfhd_sequence_number_matches_the_documented_formula() {
        let track = video_track();
        let fragment = Fragment::build(&track, 0, 4000, false);
        // (key.number - 1) * 2 + trackID == (2-1)*2 + 1 == 3
        let mut expected_mfhd = Vec::new();
        FmpBox::Mfhd { sequence_number: 3 }.serialize(&mut expected_mfhd);
        assert!(
            fragment.moof.windows(expected_mfhd.len()).any(|w| w == &expected_mfhd[..]),
            "moof does not contain expected mfhd bytes: {}",
            pretty_hex(&fragment.moof)
        );
    }

    #[test]
    fn mdat_header_length_is_key_size_plus_8() {
        let track = video_track();
        let fragment = Fragment::build(&track, 0, 4000, false);
        assert_eq!(fragment.key_size, 1000);
        assert_eq!(u32::from_be_bytes(fragment.mdat_header[0..4].try_into().unwrap()), 1008);
        assert_eq!(&fragment.mdat_header[4..8], b"mdat");
    }

    #[test]
    fn trun_data_offset_equals_moof_size_plus_8() {
        let track = video_track();
        let fragment = Fragment::build(&track, 0, 4000, false);

        // trun data_offset is a 4-byte big-endian i32 immediately following
        // the sample_count field; locate it by scanning for the trun fourcc.
        let trun_pos = fragment.moof.windows(4).position(|w| w == b"trun").unwrap();
        let data_offset_pos = trun_pos + 4 + 4 + 4; // fourcc, version/flags, sample_count
        let data_offset = i32::from_be_bytes(
            fragment.moof[data_offset_pos..data_offset_pos + 4].try_into().unwrap(),
        );

        assert_eq!(data_offset as usize, fragment.moof.len() + 8);
    }

    #[test]
    fn live_uuid_tfrf_scans_up_to_two_upcoming_keys() {
        let track = video_track();
        let fragment = Fragment::build(&track, 0, 4000, true);
        assert!(fragment.moof.windows(4).any(|w| w == b"uuid"));
    }

    #[test]
    fn live_uuid_tfrf_carries_the_documented_extended_type_and_entries() {
        let track = video_track();
        // only one key (index 1, time 4120) lies strictly after requested_ms.
        let refs = forward_fragment_refs(&track, 0, 4000);
        assert_eq!(refs, vec![(41_200_000, 400_000)]);

        let tfrf = FmpBox::UuidTfrf { entries: refs };
        let mut out = Vec::new();
        tfrf.serialize(&mut out);

        // size(4) + "uuid"(4) + extended type(16) + version/flags(4) + count(1) + one (time,dur) pair(16)
        assert_eq!(out.len(), 4 + 4 + 16 + 4 + 1 + 16);
        assert_eq!(&out[8..24], &tfrf_uuid_bytes());
        assert_eq!(out[24], 1); // version 1
        assert_eq!(out[28], 1); // fragment_count
    }

    #[test]
    fn sdtp_marks_only_the_first_video_sample_as_key() {
        let sdtp = FmpBox::Sdtp { video: true, sample_count: 3 };
        let mut out = Vec::new();
        sdtp.serialize(&mut out);
        // box header(8) + version/flags(4) + 3 dependency bytes
        assert_eq!(&out[8..], &[36, 20, 20]);
    }

    #[test]
    fn sdtp_marks_all_audio_samples_uniformly() {
        let sdtp = FmpBox::Sdtp { video: false, sample_count: 3 };
        let mut out = Vec::new();
        sdtp.serialize(&mut out);
        assert_eq!(&out[8..], &[40, 40, 40]);
    }
}
