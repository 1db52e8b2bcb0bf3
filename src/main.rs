//! colorcast: prominent colors of a live preview stream

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use colorcast::capture::ReplaySource;
use colorcast::{AnalysisPipeline, ColorReport, Config, SourceKind};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("colorcast=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("colorcast launching...");

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    let (tx, rx) = config.report_channel()?;
    let pipeline = AnalysisPipeline::new(
        config.analysis_settings()?,
        config.decoder()?,
        Arc::new(config.generator()?),
        tx,
        tokio::runtime::Handle::current(),
    );

    let running = Arc::new(AtomicBool::new(true));
    let producer = match config.capture.source {
        SourceKind::Replay => spawn_replay(&config, pipeline.clone(), running.clone())?,
        SourceKind::Camera => spawn_camera(&config, pipeline.clone(), running.clone())?,
    };

    let consumer = tokio::spawn(async move {
        while let Ok(report) = rx.recv_async().await {
            log_report(&report);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    running.store(false, Ordering::Relaxed);

    tokio::task::spawn_blocking(move || producer.join())
        .await?
        .map_err(|_| eyre!("Producer thread panicked"))?;

    let stats = pipeline.stats();
    // Last sender goes once in-flight analyses finish
    drop(pipeline);
    consumer.await?;

    info!(?stats, "colorcast shutting down");
    Ok(())
}

fn frame_period(config: &Config) -> Duration {
    Duration::from_secs(1) / config.capture.fps.max(1)
}

fn spawn_replay(
    config: &Config,
    pipeline: AnalysisPipeline,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let mut source = ReplaySource::open(&config.capture.replay_dir)?;
    let period = frame_period(config);

    let handle = std::thread::Builder::new()
        .name("replay".into())
        .spawn(move || {
            while running.load(Ordering::Relaxed) {
                match source.next_frame() {
                    Ok(frame) => {
                        pipeline.submit(frame);
                    }
                    Err(e) => warn!("Replay error: {}", e),
                }
                std::thread::sleep(period);
            }
        })?;
    Ok(handle)
}

#[cfg(feature = "v4l2")]
fn spawn_camera(
    config: &Config,
    pipeline: AnalysisPipeline,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    use colorcast::capture::V4l2Capture;
    use tracing::error;

    let mut capture_config = config.capture.clone();
    if capture_config.device.path.is_empty() {
        capture_config.device = colorcast::utils::auto_detect_device()?;
    }
    info!("Using capture device: {:?}", capture_config.device);

    // The capture handle stays on its thread; only startup status crosses back
    let (ready_tx, ready_rx) = flume::bounded::<Result<()>>(1);
    let handle = std::thread::Builder::new()
        .name("v4l2-capture".into())
        .spawn(move || {
            let mut capture = match V4l2Capture::new(&capture_config).and_then(|mut capture| {
                capture.start_stream()?;
                Ok(capture)
            }) {
                Ok(capture) => {
                    let _ = ready_tx.send(Ok(()));
                    capture
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            while running.load(Ordering::Relaxed) {
                match capture.next_frame() {
                    Ok(frame) => {
                        pipeline.submit(frame);
                    }
                    Err(e) => {
                        error!("Capture error: {}", e);
                        std::thread::sleep(Duration::from_millis(10));
                    }
                }
            }
        })?;

    ready_rx
        .recv()
        .map_err(|_| eyre!("Capture thread exited during startup"))??;
    Ok(handle)
}

#[cfg(not(feature = "v4l2"))]
fn spawn_camera(
    _config: &Config,
    _pipeline: AnalysisPipeline,
    _running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    Err(eyre!("Camera capture requires building with `--features v4l2`"))
}

fn log_report(report: &ColorReport) {
    let ranked: Vec<String> = report
        .filled()
        .map(|(argb, pct)| format!("#{:06X} {}", argb & 0x00FF_FFFF, pct))
        .collect();
    info!(
        sequence = report.sequence,
        elapsed = ?report.elapsed,
        device_ts = ?report.device_timestamp,
        "{}",
        ranked.join("  ")
    );
}
