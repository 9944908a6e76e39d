mod controller;
mod detect;
mod display;
mod keys;
mod render;

use controller::live::EffectsLoop;
use controller::MotionLoop;
use detect::MotionDetector;
use display::AnySink;
use keys::TerminalKeys;
use motion_watch_capture::AnySource;
use motion_watch_common::config::Config;
use std::path::PathBuf;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        mode = config.pipeline.mode,
        source = config.capture.source,
        width = config.capture.width,
        height = config.capture.height,
        fps = config.capture.fps,
        sink = config.display.sink,
        surfaces = %config.display.path.display(),
        "starting motion-watch"
    );

    let source = match AnySource::from_config(&config.capture) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to set up capture source");
            std::process::exit(1);
        }
    };

    let sink = match AnySink::from_config(&config.display) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to set up display sink");
            std::process::exit(1);
        }
    };

    let keys = TerminalKeys::spawn();

    match config.pipeline.mode.as_str() {
        "motion" => {
            let detector = MotionDetector::from_config(&config.detection);
            info!(
                blur_kernel = detector.normalizer().kernel_size(),
                threshold = config.detection.threshold,
                min_area = config.detection.min_area,
                "detector ready, press q then Enter to quit"
            );
            MotionLoop::new(detector, source, sink, keys).run().await;
        }
        "effects" => {
            EffectsLoop::new(source, sink, keys).run().await;
        }
        other => {
            error!(mode = other, "unknown pipeline mode, expected motion or effects");
            std::process::exit(1);
        }
    }

    info!("motion-watch shut down");
}
