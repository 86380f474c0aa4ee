//! overlayd - live detection overlay daemon
//!
//! This daemon:
//! 1. Opens the configured camera source and detector backend
//! 2. Refreshes the overlay at the camera frame rate
//! 3. Runs the detection loop on demand (stdin commands, `--autostart`)
//! 4. Re-renders the detection table and chart after every completed cycle
//! 5. Writes the final table, chart and overlay into the output directory on exit

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use live_overlay::render::{Chart, ChartHandle, DetectionConsumer};
use live_overlay::ui::{Ui, UiMode};
use live_overlay::{
    share_source, AsyncDetector, BackendRegistry, CameraSource, ChartRenderer, CommandSurface,
    ControlCommand, CpuBackend, DetectionLogSink, DetectionLoop, Display, MarkupSlot,
    OverlayConfig, OverlayRenderer, RawDetection, ScriptedBackend, Session, TableRenderer,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "LIVE_OVERLAY_CONFIG")]
    config: Option<PathBuf>,
    /// Exit after this many seconds (runs until Ctrl-C or `quit` otherwise).
    #[arg(long)]
    seconds: Option<u64>,
    /// Output directory for table.html, chart.json and overlay.svg.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Detector backend (cpu, scripted, tract).
    #[arg(long)]
    backend: Option<String>,
    /// Start detecting immediately instead of waiting for `start`.
    #[arg(long)]
    autostart: bool,
    /// Terminal output: auto, plain or pretty.
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::new(
        UiMode::parse(Some(args.ui.as_str())),
        std::io::stderr().is_terminal(),
    );

    let cfg = {
        let _stage = ui.stage("Load configuration");
        OverlayConfig::load(args.config.as_deref())?
    };
    let out_dir = args.out.clone().unwrap_or_else(|| cfg.out_dir.clone());

    let source = {
        let _stage = ui.stage("Open camera");
        share_source(CameraSource::new(cfg.camera.clone())?)
    };

    let backend = {
        let _stage = ui.stage("Select detector backend");
        let registry = build_registry(&cfg)?;
        let name = args.backend.as_deref().unwrap_or(&cfg.detector.backend);
        registry.select(Some(name))?
    };

    let session = std::sync::Arc::new(Session::new());
    let table_slot = MarkupSlot::new();
    let chart = ChartHandle::new(Chart::new());
    let consumers: Vec<Box<dyn DetectionConsumer>> = vec![
        Box::new(TableRenderer::new(table_slot.clone())),
        Box::new(ChartRenderer::new(chart.clone())),
        Box::new(DetectionLogSink),
    ];
    let detection = DetectionLoop::new(
        session.clone(),
        source.clone(),
        AsyncDetector::new(backend),
        consumers,
    )?;
    let display = Display::new(
        source,
        session.clone(),
        OverlayRenderer::new(cfg.overlay.clone()),
    );

    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .context("error setting Ctrl-C handler")?;

    if args.autostart {
        detection.start();
    }
    log::info!(
        "overlayd running ({} @ {} fps); commands: start, stop, toggle, reset, quit",
        cfg.camera.url,
        cfg.camera.target_fps
    );

    let mut surface = CommandSurface::new();
    let mut status = ui.status();
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(
        1.0 / f64::from(cfg.camera.target_fps),
    ));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let deadline = async {
        match args.seconds {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut commands = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                surface.clear();
                if let Err(e) = display.refresh(&mut surface) {
                    log::warn!("display refresh failed: {:#}", e);
                }
                status.update(detection.state(), session.current().len(), &detection.stats());
            }
            line = commands.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => match line.parse::<ControlCommand>() {
                        Ok(command) => {
                            let state = command.apply(&detection);
                            log::info!("{:?}: button now reads '{}'", command, state.toggle_label());
                            if command == ControlCommand::Quit {
                                break;
                            }
                        }
                        Err(e) => log::warn!("{}", e),
                    },
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        log::warn!("stdin closed: {}", e);
                        stdin_open = false;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                log::info!("shutdown signal received, stopping detection...");
                break;
            }
            _ = &mut deadline => {
                log::info!("run time elapsed, stopping detection...");
                break;
            }
        }
    }

    let overlay = display.freeze(&detection).unwrap_or_else(|e| {
        log::warn!("final overlay refresh failed, keeping the last frame: {:#}", e);
        surface
    });
    detection.settled().await;
    status.finish();

    if let Some(err) = detection.last_error() {
        log::warn!("detection halted by: {}", err);
    }
    let stats = detection.stats();
    log::info!(
        "cycles={} requests={} detector_failures={} malformed_dropped={} render_failures={}",
        stats.cycles_completed,
        stats.requests_issued,
        stats.detector_failures,
        stats.malformed_dropped,
        stats.render_failures
    );

    let _stage = ui.stage("Write outputs");
    write_outputs(&out_dir, &table_slot, &chart, &overlay)?;
    log::info!("outputs written to {}", out_dir.display());
    Ok(())
}

fn build_registry(cfg: &OverlayConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    registry.register(CpuBackend::new().with_min_confidence(cfg.detector.threshold));
    registry.register(ScriptedBackend::new().then_detect(vec![RawDetection::new(
        "cat", 0.92, 10.0, 20.0, 100.0, 50.0,
    )]));

    #[cfg(feature = "backend-tract")]
    {
        let detector = &cfg.detector;
        if let (Some(model), Some(labels)) = (&detector.model_path, &detector.labels_path) {
            let backend = live_overlay::TractBackend::new(
                model,
                labels,
                cfg.camera.width,
                cfg.camera.height,
            )?
            .with_threshold(detector.threshold);
            registry.register(backend);
        }
    }

    log::info!("detector backends: {}", registry.list().join(", "));
    Ok(registry)
}

fn write_outputs(
    out_dir: &Path,
    table: &MarkupSlot,
    chart: &ChartHandle,
    overlay: &CommandSurface,
) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    fs::write(out_dir.join("table.html"), table.contents())?;
    fs::write(out_dir.join("chart.json"), chart.to_json()?)?;
    fs::write(out_dir.join("overlay.svg"), overlay.to_svg())?;
    Ok(())
}
