//! Per-client event loop: parses requests, routes them, streams
//! fragment bodies in chunked form, and keeps the upstream source
//! informed of client progress.
//!
//! States named in the design (`Reading`, `Dispatching`, `Streaming`,
//! `Terminated`) are not reified as a literal enum driving control flow —
//! the async task's own suspension points at `.await` already give the
//! cooperative, one-thing-at-a-time scheduling the original's
//! poll-and-sleep loop achieved by hand. They're logged as `State` below
//! so the correspondence stays visible.

use std::net::SocketAddr;
use std::time::Duration;

use hss_mux::liveness::{self, Disposition};
use hss_mux::model::{Kind as TrackKind, Track};
use hss_util::time::Ticks;
use tokio::net::TcpStream;

use crate::error::ConnectionError;
use crate::fragment;
use crate::http;
use crate::source::{Connector, PacketKind, Upstream};
use crate::url::{self, Kind as UrlKind, Route};
use crate::xap::XAP_BYTES;

#[derive(Debug, Clone, Copy)]
enum State {
    Reading,
    Dispatching,
    Streaming,
    Terminated,
}

const NOT_FOUND_BODY: &str = "No such stream is available on the system. Please try again.\n";

pub async fn run<C: Connector>(mut stream: TcpStream, peer_addr: SocketAddr, registry: C) {
    let mut buf = Vec::with_capacity(4096);
    let mut conn = State::Reading;
    let mut upstream: Option<Box<dyn Upstream>> = None;
    let mut origin_host = peer_addr.to_string();

    loop {
        conn = State::Reading;
        log::trace!("{:?}: awaiting request from {}", conn, peer_addr);

        let request = match http::read_request(&mut stream, &mut buf).await {
            Ok(request) => request,
            Err(_) => break,
        };

        if let Some(origin) = &request.x_origin {
            origin_host = origin.clone();
        }

        conn = State::Dispatching;
        log::trace!("{:?}: routing {}", conn, request.path);

        let route = match url::parse(&request.path) {
            Ok(route) => route,
            Err(_) => {
                let _ = http::write_buffered(&mut stream, "400 Bad Request", "text/plain", &[], b"").await;
                if !request.keep_alive { break; }
                continue;
            }
        };

        if let Route::Xap = route {
            let _ = http::write_buffered(
                &mut stream, "200 OK", "application/silverlight",
                &[("Cache-Control", "cache")], XAP_BYTES,
            ).await;
            if !request.keep_alive { break; }
            continue;
        }

        if upstream.is_none() {
            let stream_name = match &request.x_stream {
                Some(name) => name.clone(),
                None => {
                    let _ = http::write_buffered(&mut stream, "404 Not found", "text/plain", &[], NOT_FOUND_BODY.as_bytes()).await;
                    if !request.keep_alive { break; }
                    continue;
                }
            };

            upstream = match registry.connect(&stream_name).await {
                Ok(u) => Some(u),
                Err(e) => {
                    log::warn!("could not reach upstream {}: {:?}", stream_name, e);
                    let _ = http::write_buffered(&mut stream, "404 Not found", "text/plain", &[], NOT_FOUND_BODY.as_bytes()).await;
                    if !request.keep_alive { break; }
                    continue;
                }
            };
        }

        let up = upstream.as_mut().expect("connected above");

        let outcome = match route {
            Route::Manifest => serve_manifest(&mut stream, up).await,
            Route::Fragment { track_id, kind, start_ticks } => {
                conn = State::Streaming;
                log::trace!("{:?}: track {} from {} ticks", conn, track_id, start_ticks);
                serve_fragment(&mut stream, up, track_id, kind, start_ticks).await
            }
            Route::Xap => unreachable!("handled above"),
        };

        match outcome {
            Ok(()) => {}
            Err(_) => break,
        }

        if !request.keep_alive {
            break;
        }
    }

    conn = State::Terminated;
    log::trace!("{:?}: closing connection to {} (origin {})", conn, peer_addr, origin_host);

    if let Some(up) = upstream.as_mut() {
        let _ = up.send_stats(&format!("client_stats {} final", origin_host)).await;
    }
}

async fn serve_manifest(stream: &mut TcpStream, upstream: &mut dyn Upstream) -> Result<(), ConnectionError> {
    let body = hss_mux::manifest::build(upstream.meta());
    http::write_buffered(
        stream, "200 OK", "text/xml",
        &[("Cache-Control", "no-cache")],
        &body,
    ).await
}

async fn serve_fragment(
    stream: &mut TcpStream,
    upstream: &mut dyn Upstream,
    track_id: u32,
    kind: UrlKind,
    start_ticks: u64,
) -> Result<(), ConnectionError> {
    let meta = upstream.meta().clone();

    let track = match meta.tracks.get(&track_id) {
        Some(track) if track_kind_matches(track, kind) => track,
        _ => {
            return http::write_buffered(stream, "404 Not found", "text/plain", &[], NOT_FOUND_BODY.as_bytes()).await;
        }
    };

    if !meta.live && !meta.vod {
        // Neither flag set: the upstream hasn't published a servable
        // presentation yet (mid-handshake, or a misconfigured source).
        // Falling through to the VOD gate would silently treat an
        // unpublished stream as a finished one instead of reporting it
        // as unavailable.
        return http::write_buffered(stream, "404 Not found", "text/plain", &[], NOT_FOUND_BODY.as_bytes()).await;
    }

    let requested_ms = Ticks(start_ticks as i64).to_millis().0;

    let key_index = if meta.live {
        match liveness::gate_live(track, requested_ms) {
            Disposition::TooOld => {
                return http::write_buffered(stream, "412 Fragment out of range", "text/plain", &[], liveness::TOO_OLD_BODY.as_bytes()).await;
            }
            Disposition::NotYetAvailable => {
                return http::write_buffered(stream, "208 Ask again later", "text/plain", &[], liveness::NOT_YET_AVAILABLE_BODY.as_bytes()).await;
            }
            Disposition::Servable(index) => index,
        }
    } else {
        match liveness::gate_vod(track, requested_ms) {
            Some(index) => index,
            None => {
                return http::write_buffered(stream, "404 Not found", "text/plain", &[], NOT_FOUND_BODY.as_bytes()).await;
            }
        }
    };

    let plan = fragment::plan(track, key_index, requested_ms, meta.live);

    for command in &plan.commands {
        upstream.send_command(command).await?;
    }

    http::write_fragment_head(stream).await?;
    http::write_chunk(stream, &plan.fragment.moof).await?;
    http::write_chunk(stream, &plan.fragment.mdat_header).await?;

    pump_fragment_payload(stream, upstream).await
}

async fn pump_fragment_payload(stream: &mut TcpStream, upstream: &mut dyn Upstream) -> Result<(), ConnectionError> {
    let mut stats_interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            packet = upstream.recv_packet() => {
                match packet? {
                    None => return Err(ConnectionError::PeerClosed),
                    Some(packet) => match packet.kind {
                        PacketKind::PauseMark => {
                            http::write_chunk(stream, &[]).await?;
                            return Ok(());
                        }
                        PacketKind::Metadata => continue,
                        PacketKind::Audio | PacketKind::Video => {
                            http::write_chunk(stream, &packet.payload).await?;
                        }
                    }
                }
            }
            _ = stats_interval.tick() => {
                let _ = upstream.send_stats("client_stats streaming").await;
            }
        }
    }
}

fn track_kind_matches(track: &Track, kind: UrlKind) -> bool {
    match (track.kind, kind) {
        (TrackKind::Video, UrlKind::Video) => true,
        (TrackKind::Audio, UrlKind::Audio) => true,
        _ => false,
    }
}
