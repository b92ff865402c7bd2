//! Cross-module scenarios from the concrete acceptance examples: a VOD
//! manifest, both liveness-gate rejections, fragment assembly, the XAP
//! route, and keep-alive request parsing.

use std::collections::BTreeMap;

use hss_mux::liveness::{self, Disposition};
use hss_mux::manifest;
use hss_mux::model::{Codec, Key, Kind, Meta, Part, Track};
use hss_util::time::Millis;

use hss_origin::url::{self, Kind as UrlKind, Route};

fn vod_meta() -> Meta {
    let video = Track {
        track_id: 1,
        kind: Kind::Video,
        codec: Codec::H264,
        width: 1280,
        height: 720,
        rate: 0,
        bps: 1_000_000,
        init: vec![0x01, 0x64, 0x00, 0x16, 0xff, 0xe0, 0x00],
        keys: vec![
            Key { time: Millis(0), length: Millis(4000), number: 1, parts: 0 },
            Key { time: Millis(4000), length: Millis(4000), number: 2, parts: 0 },
            Key { time: Millis(8000), length: Millis(0), number: 3, parts: 0 },
        ],
        parts: vec![],
    };

    let audio = Track {
        track_id: 2,
        kind: Kind::Audio,
        codec: Codec::Aac,
        width: 0,
        height: 0,
        rate: 48_000,
        bps: 16_000,
        init: vec![0x11, 0x90],
        keys: vec![
            Key { time: Millis(0), length: Millis(4000), number: 1, parts: 0 },
            Key { time: Millis(4000), length: Millis(4000), number: 2, parts: 0 },
        ],
        parts: vec![],
    };

    let mut tracks = BTreeMap::new();
    tracks.insert(1, video);
    tracks.insert(2, audio);

    Meta { live: false, vod: true, buffer_window: Millis(0), tracks }
}

#[test]
fn vod_manifest_matches_the_documented_acceptance_values() {
    let body = manifest::build(&vod_meta());

    assert_eq!(&body[0..2], &[0xFF, 0xFE]);

    let utf16_units: Vec<u16> = body[2..]
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect();
    let xml = String::from_utf16(&utf16_units).expect("valid utf-16");

    assert!(xml.contains("Duration=\"80000000\""));
    assert_eq!(xml.matches("<StreamIndex").count(), 2);
    assert!(xml.contains("Bitrate=\"8000000\""));
    assert!(xml.contains("<c t=\"0\" d=\"40000000\"/>"));
}

fn live_track(key_times: &[i64]) -> Track {
    Track {
        track_id: 1,
        kind: Kind::Video,
        codec: Codec::H264,
        width: 0,
        height: 0,
        rate: 0,
        bps: 0,
        init: vec![],
        keys: key_times.iter().enumerate().map(|(i, &t)| Key {
            time: Millis(t),
            length: Millis(1000),
            number: (i + 1) as u32,
            parts: 1,
        }).collect(),
        parts: vec![],
    }
}

#[test]
fn live_request_before_the_window_is_too_old() {
    let track = live_track(&[10_000, 20_000, 30_000]);
    // ticks = 50_000_000 -> 5000 ms, front key at 10_000 ms
    let requested_ms = 50_000_000i64 / 10_000;
    assert_eq!(liveness::gate_live(&track, requested_ms), Disposition::TooOld);
}

#[test]
fn live_request_past_the_window_is_not_yet_available() {
    let track = live_track(&[10_000, 20_000, 30_000]);
    // ticks = 400_000_000 -> 40_000 ms, back key at 30_000 ms
    let requested_ms = 400_000_000i64 / 10_000;
    assert_eq!(liveness::gate_live(&track, requested_ms), Disposition::NotYetAvailable);
}

#[test]
fn fragment_assembly_matches_the_documented_byte_layout() {
    let track = Track {
        track_id: 1,
        kind: Kind::Video,
        codec: Codec::H264,
        width: 1280,
        height: 720,
        rate: 0,
        bps: 125_000,
        init: vec![],
        keys: vec![
            Key { time: Millis(4000), length: Millis(120), number: 2, parts: 3 },
            Key { time: Millis(4120), length: Millis(40), number: 3, parts: 1 },
        ],
        parts: vec![
            Part { size: 500, duration: Millis(40), offset: Millis(0) },
            Part { size: 300, duration: Millis(40), offset: Millis(0) },
            Part { size: 200, duration: Millis(40), offset: Millis(0) },
            Part { size: 100, duration: Millis(40), offset: Millis(0) },
        ],
    };

    let plan = hss_origin::fragment::plan(&track, 0, 4000, false);

    assert_eq!(plan.commands, vec!["t 1", "s 4000", "p 4120"]);
    assert_eq!(
        u32::from_be_bytes(plan.fragment.mdat_header[0..4].try_into().unwrap()),
        1008
    );
}

#[test]
fn the_xap_route_is_recognized_regardless_of_path_prefix() {
    assert_eq!(url::parse("/some/deep/path/client.xap"), Ok(Route::Xap));
}

#[test]
fn fragment_route_parses_audio_and_video_kinds() {
    let video = url::parse("/s.ism/QualityLevels(800000,TrackID=1)/Fragments(V(0))").unwrap();
    let audio = url::parse("/s.ism/QualityLevels(128000,TrackID=2)/Fragments(A(0))").unwrap();

    assert_eq!(video, Route::Fragment { track_id: 1, kind: UrlKind::Video, start_ticks: 0 });
    assert_eq!(audio, Route::Fragment { track_id: 2, kind: UrlKind::Audio, start_ticks: 0 });
}

#[tokio::test]
async fn keep_alive_connections_parse_both_pipelined_requests() {
    let two_requests = b"GET /a.ism/Manifest HTTP/1.1\r\nX-Stream: a\r\n\r\n\
                          GET /b.ism/Manifest HTTP/1.1\r\nX-Stream: b\r\n\r\n";

    let mut cursor = std::io::Cursor::new(two_requests.to_vec());
    let mut buf = Vec::new();

    let first = hss_origin::http::read_request(&mut cursor, &mut buf).await.unwrap();
    assert_eq!(first.path, "/a.ism/Manifest");
    assert!(first.keep_alive);

    let second = hss_origin::http::read_request(&mut cursor, &mut buf).await.unwrap();
    assert_eq!(second.path, "/b.ism/Manifest");
}
