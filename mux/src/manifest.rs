//! Renders the `SmoothStreamingMedia` XML manifest and wraps it in
//! UTF-16LE with a BOM, as HSS clients expect.

use std::fmt::Write as _;

use crate::avc::avcc_to_annex_b;
use crate::model::{Codec, Kind, Meta, Track};

/// Builds the full `Manifest` response body: UTF-16LE-with-BOM bytes of
/// the `SmoothStreamingMedia` XML document.
pub fn build(meta: &Meta) -> Vec<u8> {
    let xml = render_xml(meta);
    wrap_utf16le_bom(&xml)
}

fn render_xml(meta: &Meta) -> String {
    let mut xml = String::new();

    xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str("<SmoothStreamingMedia MajorVersion=\"2\" MinorVersion=\"0\" TimeScale=\"10000000\"");

    if meta.live {
        write!(
            xml,
            " Duration=\"0\" IsLive=\"TRUE\" LookAheadFragmentCount=\"2\" DVRWindowLength=\"{}0000\" CanSeek=\"TRUE\" CanPause=\"TRUE\"",
            meta.buffer_window.0
        ).unwrap();
    } else {
        write!(xml, " Duration=\"{}0000\"", vod_duration_ms(meta)).unwrap();
    }

    xml.push_str(">\n");

    for kind in &[Kind::Video, Kind::Audio] {
        render_stream_index(&mut xml, meta, *kind);
    }

    xml.push_str("</SmoothStreamingMedia>");
    xml
}

/// VOD `Duration` comes from the first video track's last key alone, not
/// the maximum across every track: `conn_http_smooth.cpp` reads
/// `(*videoIters.begin())->second.lastms` and never consults audio at
/// all. Falls back to any track's last key only when no video track is
/// present (the original dereferences `videoIters.begin()` unconditionally
/// and would crash on an audio-only VOD stream; this is a deliberate
/// deviation to avoid replicating that).
fn vod_duration_ms(meta: &Meta) -> i64 {
    let video_tracks = included_tracks(meta, Kind::Video);

    let lastms_of = |tracks: &[&Track]| {
        tracks.first()
            .and_then(|t| t.keys.last())
            .map(|k| k.time.0)
    };

    lastms_of(&video_tracks)
        .or_else(|| lastms_of(&included_tracks(meta, Kind::Audio)))
        .unwrap_or(0)
}

fn included_tracks(meta: &Meta, kind: Kind) -> Vec<&Track> {
    let wanted_codec: fn(&Codec) -> bool = match kind {
        Kind::Video => |c| matches!(c, Codec::H264),
        Kind::Audio => |c| matches!(c, Codec::Aac),
    };

    meta.tracks.values()
        .filter(|t| t.kind == kind && wanted_codec(&t.codec))
        .collect()
}

fn render_stream_index(xml: &mut String, meta: &Meta, kind: Kind) {
    let tracks = included_tracks(meta, kind);
    if tracks.is_empty() {
        return;
    }

    let first = tracks[0];
    let type_name = match kind {
        Kind::Video => "video",
        Kind::Audio => "audio",
    };

    let url_template = match kind {
        Kind::Video => "Q({bitrate},{CustomAttributes})/V({start time})",
        Kind::Audio => "Q({bitrate},{CustomAttributes})/A({start time})",
    };

    write!(
        xml,
        "  <StreamIndex Type=\"{}\" QualityLevels=\"{}\" Chunks=\"{}\" Url=\"{}\"",
        type_name, tracks.len(), first.keys.len(), url_template
    ).unwrap();

    if kind == Kind::Video {
        let max_width = tracks.iter().map(|t| t.width).max().unwrap_or(0);
        let max_height = tracks.iter().map(|t| t.height).max().unwrap_or(0);
        write!(
            xml,
            " MaxWidth=\"{0}\" MaxHeight=\"{1}\" DisplayWidth=\"{0}\" DisplayHeight=\"{1}\"",
            max_width, max_height
        ).unwrap();
    }

    xml.push_str(">\n");

    for (index, track) in tracks.iter().enumerate() {
        render_quality_level(xml, index, track, kind);
    }

    render_chunks(xml, first);

    xml.push_str("  </StreamIndex>\n");
}

fn render_quality_level(xml: &mut String, index: usize, track: &Track, kind: Kind) {
    let codec_private_data = match kind {
        Kind::Video => {
            match avcc_to_annex_b(&track.init) {
                Ok(annex_b) => hex::encode(&annex_b),
                Err(_) => String::new(),
            }
        }
        Kind::Audio => hex::encode(&track.init),
    };

    write!(
        xml,
        "    <QualityLevel Index=\"{}\" Bitrate=\"{}\" CodecPrivateData=\"{}\"",
        index, track.bps * 8, codec_private_data
    ).unwrap();

    match kind {
        Kind::Video => {
            write!(
                xml,
                " FourCC=\"AVC1\" MaxWidth=\"{}\" MaxHeight=\"{}\"",
                track.width, track.height
            ).unwrap();
        }
        Kind::Audio => {
            write!(
                xml,
                " SamplingRate=\"{}\" Channels=\"2\" BitsPerSample=\"16\" PacketSize=\"4\" AudioTag=\"255\" FourCC=\"AACL\"",
                track.rate
            ).unwrap();
        }
    }

    xml.push_str(">\n");
    write!(
        xml,
        "      <CustomAttributes><Attribute Name=\"TrackID\" Value=\"{}\"/></CustomAttributes>\n",
        track.track_id
    ).unwrap();
    xml.push_str("    </QualityLevel>\n");
}

fn render_chunks(xml: &mut String, track: &Track) {
    for (i, key) in track.keys.iter().enumerate() {
        if i + 1 == track.keys.len() {
            // live tail is unpublished; VOD's final key has no following
            // fragment either, so it is excluded uniformly.
            break;
        }

        if i == 0 {
            write!(xml, "    <c t=\"{}\" d=\"{}\"/>\n", key.time.0 * 10_000, key.length.0 * 10_000).unwrap();
        } else {
            write!(xml, "    <c d=\"{}\"/>\n", key.length.0 * 10_000).unwrap();
        }
    }
}

/// UTF-16LE with a byte-order-mark, the encoding HSS clients expect for
/// the manifest body. The XML is restricted to ASCII so each code unit
/// is a single input byte followed by a zero byte.
fn wrap_utf16le_bom(xml: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + xml.len() * 2);
    out.extend_from_slice(&[0xFF, 0xFE]);

    for unit in xml.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }

    out
}
