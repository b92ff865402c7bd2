//! Process-start configuration. The original connector reads a global
//! configuration singleton; here it is a value constructed once from
//! CLI flags and threaded explicitly into the driver.

use std::path::PathBuf;

use serde::Serialize;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "hss-origin", about = "HTTP Smooth Streaming origin connector")]
pub struct Config {
    /// Print the capability descriptor as JSON and exit.
    #[structopt(long)]
    pub json: bool,

    /// Directory holding per-stream upstream sockets (`stream_<name>`).
    #[structopt(long, default_value = "/tmp/mist")]
    pub socket_dir: PathBuf,

    /// TCP address this origin listens on for client connections.
    #[structopt(long, default_value = "0.0.0.0:8080")]
    pub listen_addr: std::net::SocketAddr,

    /// Verbosity: 0 = warnings only, higher is noisier.
    #[structopt(long, default_value = "0")]
    pub debug_level: u8,
}

impl Config {
    pub fn from_args() -> Self {
        StructOpt::from_args()
    }
}

#[derive(Debug, Serialize)]
pub struct Method {
    pub handler: &'static str,
    #[serde(rename = "type")]
    pub method_type: &'static str,
    pub priority: i64,
    pub nolive: u8,
}

#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub desc: &'static str,
    pub deps: &'static str,
    pub url_rel: &'static str,
    pub url_prefix: &'static str,
    pub socket: &'static str,
    pub codecs: [[&'static str; 2]; 1],
    pub methods: [Method; 2],
}

pub fn capabilities() -> Capabilities {
    Capabilities {
        desc: "Enables HTTP protocol Microsoft-specific smooth streaming through silverlight (also known as HSS).",
        deps: "HTTP",
        url_rel: "/smooth/$.ism/Manifest",
        url_prefix: "/smooth/$.ism/",
        socket: "http_smooth",
        codecs: [["H264", "AAC"]],
        methods: [
            Method { handler: "http", method_type: "html5/application/vnd.ms-ss", priority: 9, nolive: 1 },
            Method { handler: "http", method_type: "silverlight", priority: 1, nolive: 1 },
        ],
    }
}
