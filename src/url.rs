//! Recognizes the three URL shapes an HSS origin serves: the manifest,
//! a fragment request, and the embedded Silverlight client binary.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Audio,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Manifest,
    Fragment { track_id: u32, kind: Kind, start_ticks: u64 },
    Xap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlError;

impl fmt::Display for UrlError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "malformed HSS request path")
    }
}

/// Parses an HTTP request path into a [`Route`]. Case-sensitive, as the
/// protocol requires.
///
/// Only `TrackID=<id>` and the fragment's kind letter and start-time
/// integer are consumed out of the `QualityLevels(...)/Fragments(...)`
/// shape; the bitrate field is redundant with the track ID and is
/// ignored for routing.
pub fn parse(path: &str) -> Result<Route, UrlError> {
    if path.ends_with(".xap") {
        return Ok(Route::Xap);
    }

    if path.ends_with("/Manifest") {
        return Ok(Route::Manifest);
    }

    parse_fragment(path).ok_or(UrlError)
}

fn parse_fragment(path: &str) -> Option<Route> {
    let track_id_pos = path.find("TrackID=")?;
    let after_track_id = &path[track_id_pos + "TrackID=".len()..];
    let track_id_end = after_track_id.find(')')?;
    let track_id: u32 = after_track_id[..track_id_end].parse().ok()?;

    let fragments_pos = path.find("Fragments(")?;
    let after_fragments = &path[fragments_pos + "Fragments(".len()..];

    let mut chars = after_fragments.chars();
    let kind = match chars.next()? {
        'A' => Kind::Audio,
        'V' => Kind::Video,
        _ => return None,
    };

    let after_kind = &after_fragments[1..];
    let open_paren = after_kind.find('(')?;
    let rest = &after_kind[open_paren + 1..];
    let close_paren = rest.find(')')?;
    let start_ticks: u64 = rest[..close_paren].parse().ok()?;

    Some(Route::Fragment { track_id, kind, start_ticks })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_the_manifest_route() {
        assert_eq!(parse("/smooth/stream.ism/Manifest"), Ok(Route::Manifest));
    }

    #[test]
    fn recognizes_the_xap_route_regardless_of_prefix() {
        assert_eq!(parse("/anything/client.xap"), Ok(Route::Xap));
    }

    #[test]
    fn extracts_track_id_kind_and_start_ticks_from_a_fragment_request() {
        let path = "/smooth/stream.ism/QualityLevels(800000,TrackID=1)/Fragments(V(4000000))";
        assert_eq!(
            parse(path),
            Ok(Route::Fragment { track_id: 1, kind: Kind::Video, start_ticks: 4_000_000 })
        );
    }

    #[test]
    fn ignores_the_bitrate_field() {
        let cheap = "/s.ism/QualityLevels(1,TrackID=2)/Fragments(A(0))";
        let expensive = "/s.ism/QualityLevels(9999999,TrackID=2)/Fragments(A(0))";
        assert_eq!(parse(cheap), parse(expensive));
    }

    #[test]
    fn rejects_a_bare_slash() {
        assert_eq!(parse("/"), Err(UrlError));
    }

    #[test]
    fn rejects_malformed_fragment_urls() {
        assert_eq!(parse("/s.ism/QualityLevels(1,TrackID=x)/Fragments(A(0))"), Err(UrlError));
    }
}
