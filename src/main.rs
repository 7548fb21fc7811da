// src/main.rs

mod color_analysis;
mod config;
mod geometry;
mod occupancy;
mod overlay;
mod pipeline;
mod preprocessing;
mod smoother;
mod types;
mod video_processor;

use anyhow::{Context, Result};
use opencv::{core::Vector, highgui, imgcodecs, videoio::VideoWriterTrait};
use std::fs::OpenOptions;
use std::io::Write;
use tracing::{debug, info};
use video_processor::{create_writer, LoopingSource, VideoReader};

const WINDOW_NAME: &str = "Parking Lot Monitor";
const KEY_ESC: i32 = 27;
const KEY_SNAPSHOT: i32 = 's' as i32;
const KEY_RESET: i32 = 'r' as i32;

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = types::Config::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!("parking_detection={}", config.logging.level))
        .init();

    info!("🅿️  Parking occupancy monitor starting");
    info!("✓ Configuration loaded from {config_path}");

    let spaces = geometry::spaces_from_config(&config.spaces)?;
    let reader = VideoReader::open(&config.video.source)?;
    let (width, height, fps) = (reader.width(), reader.height(), reader.fps());

    let mut state = pipeline::PipelineState::new(
        spaces,
        width,
        height,
        config.detection.clone(),
        config.color.clone(),
    )?;
    info!("✓ Monitoring {} spaces", state.total());

    let mut writer = create_writer(&config.video, width, height, fps)?;
    let mut event_log = match &config.logging.event_log {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open event log '{path}'"))?,
        ),
        None => None,
    };

    if config.video.display {
        highgui::named_window(WINDOW_NAME, highgui::WINDOW_AUTOSIZE)?;
    }

    let mut source = LoopingSource::new(reader);
    loop {
        let frame = source.next_frame()?;
        let summary = state.process_frame(&frame);
        debug!(
            free = summary.free_count,
            total = summary.total,
            "frame processed"
        );

        for event in state.drain_events() {
            if let Some(log) = event_log.as_mut() {
                serde_json::to_writer(&mut *log, &event)?;
                log.write_all(b"\n")?;
            }
        }

        if writer.is_none() && !config.video.display {
            continue;
        }
        let annotated = overlay::render(&frame, state.spaces(), &summary)?;

        if let Some(writer) = writer.as_mut() {
            writer.write(&annotated)?;
        }

        if config.video.display {
            highgui::imshow(WINDOW_NAME, &annotated)?;
            match highgui::wait_key(30)? {
                KEY_ESC => break,
                key if key == KEY_SNAPSHOT => {
                    // Clean frame for the offline mapping tool, no overlay.
                    let clean = overlay::frame_to_bgr(&frame)?;
                    imgcodecs::imwrite(&config.video.snapshot_path, &clean, &Vector::new())?;
                    info!("Reference frame saved to {}", config.video.snapshot_path);
                }
                key if key == KEY_RESET => {
                    state.reset();
                    info!("Smoothing history reset");
                }
                _ => {}
            }
        }
    }

    if let Some(mut writer) = writer {
        writer.release()?;
    }
    if config.video.display {
        highgui::destroy_all_windows()?;
    }
    info!("Monitor stopped");
    Ok(())
}
