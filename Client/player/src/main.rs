use std::path::Path;
use std::time::Duration;

use abr_heuristics::HeuristicsConfig;
use smooth_manifest::parse_manifest;
use smooth_player::args::{get_log_level_filter, parse_args};
use smooth_player::player::SmoothPlayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[tokio::main]
async fn main() {
    let args = parse_args();

    // Build the FmtSubscriber layer
    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_filter(get_log_level_filter(&args));
    let subscriber = tracing_subscriber::registry().with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default subscriber");

    info!("Starting smooth player (headless)");
    info!("{:?}", args);

    let xml = match std::fs::read_to_string(&args.manifest) {
        Ok(xml) => xml,
        Err(error) => {
            error!(path = %args.manifest.display(), %error, "cannot read manifest");
            std::process::exit(1);
        }
    };
    let manifest = match parse_manifest(&xml, &args.manifest_url) {
        Ok(manifest) => manifest,
        Err(error) => {
            error!(%error, "manifest rejected");
            std::process::exit(1);
        }
    };
    info!(
        streams = manifest.streams.len(),
        markers = manifest.markers.len(),
        duration = manifest.duration().unwrap_or(0),
        "manifest parsed"
    );
    for stream in &manifest.streams {
        info!(
            stream = stream.stream_index,
            kind = %stream.media_type,
            chunks = stream.chunk_count,
            ladder = stream.bitrate_ladder().len(),
            "stream"
        );
    }

    let config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(message) => {
                error!(path = %path.display(), %message, "cannot load heuristics config");
                std::process::exit(1);
            }
        },
        None => HeuristicsConfig::default(),
    };

    let player = SmoothPlayer::new(
        &manifest,
        config,
        args.chunk_dir.clone(),
        args.pipe,
        args.degrade_after.map(Duration::from_secs),
    );
    player.start().await;
    info!("Player started");

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.duration)) => info!("run complete"),
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }
    player.stop().await;
}

fn load_config(path: &Path) -> Result<HeuristicsConfig, String> {
    let text = std::fs::read_to_string(path).map_err(|error| error.to_string())?;
    serde_json::from_str(&text).map_err(|error| error.to_string())
}
