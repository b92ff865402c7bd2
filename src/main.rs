use hss_origin::config::{self, Config};
use hss_origin::{connection, source};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_args();

    if config.json {
        let json = serde_json::to_string(&config::capabilities())?;
        println!("{}", json);
        return Ok(());
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(match config.debug_level {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    })).init();

    let registry = source::Registry::new(config.socket_dir.clone());
    let mut listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;

    log::info!("hss-origin listening on {}", config.listen_addr);

    loop {
        let (stream, peer_addr) = listener.accept().await?;

        if stream.set_nodelay(true).is_err() {
            continue;
        }

        let registry = registry.clone();

        tokio::spawn(async move {
            connection::run(stream, peer_addr, registry).await;
        });
    }
}
