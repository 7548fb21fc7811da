// src/pipeline.rs
//
// Per-frame orchestration. PipelineState owns everything that persists
// across frames (the spaces, their precomputed masks, the per-space
// occupancy smoothers) and is itself owned by the host loop. No globals.

use crate::color_analysis;
use crate::geometry::{Space, SpaceMask};
use crate::occupancy;
use crate::preprocessing::{self, erode};
use crate::smoother::OccupancySmoother;
use crate::types::{
    ColorConfig, DetectionConfig, Frame, FrameSummary, GrayMap, OccupancyEvent, SpaceResult,
};
use anyhow::{bail, Result};
use tracing::{debug, info, warn};

pub struct PipelineState {
    spaces: Vec<Space>,
    masks: Vec<SpaceMask>,
    /// Eroded color-sampling masks; empty for polygons smaller than the
    /// erosion kernel.
    color_masks: Vec<GrayMap>,
    smoothers: Vec<OccupancySmoother>,
    last_state: Vec<Option<bool>>,
    pending_events: Vec<OccupancyEvent>,
    detection: DetectionConfig,
}

impl PipelineState {
    /// Validates geometry against the source resolution and precomputes the
    /// per-space masks. Fails before any frame is processed.
    pub fn new(
        spaces: Vec<Space>,
        frame_width: usize,
        frame_height: usize,
        detection: DetectionConfig,
        color: ColorConfig,
    ) -> Result<Self> {
        if spaces.is_empty() {
            bail!("no parking spaces configured; run the mapping tool first");
        }
        let mut masks = Vec::with_capacity(spaces.len());
        let mut color_masks = Vec::with_capacity(spaces.len());
        for space in &spaces {
            space.polygon.validate_bounds(frame_width, frame_height)?;
            let mask = SpaceMask::build(&space.polygon, frame_width, frame_height);
            let eroded = erode(&mask.mask, color.erosion_kernel_size);
            if eroded.count_nonzero() == 0 {
                warn!(
                    space = space.index,
                    kernel = color.erosion_kernel_size,
                    "polygon smaller than color erosion kernel; color will be undetermined"
                );
            }
            debug!(
                space = space.index,
                area = mask.pixel_area,
                "space mask rasterized"
            );
            masks.push(mask);
            color_masks.push(eroded);
        }
        info!(
            spaces = spaces.len(),
            window = detection.smoothing_window_size,
            "pipeline ready"
        );
        let smoothers = spaces
            .iter()
            .map(|_| OccupancySmoother::new(detection.smoothing_window_size))
            .collect();
        let last_state = vec![None; spaces.len()];
        Ok(Self {
            spaces,
            masks,
            color_masks,
            smoothers,
            last_state,
            pending_events: Vec::new(),
            detection,
        })
    }

    pub fn spaces(&self) -> &[Space] {
        &self.spaces
    }

    pub fn total(&self) -> usize {
        self.spaces.len()
    }

    /// Run the full pipeline for one frame. Spaces are processed in
    /// ascending index order; each smoother is advanced exactly once.
    pub fn process_frame(&mut self, frame: &Frame) -> FrameSummary {
        let foreground = preprocessing::preprocess(frame, &self.detection);

        let mut results = Vec::with_capacity(self.spaces.len());
        let mut free_count = 0;

        for i in 0..self.spaces.len() {
            let raw = occupancy::classify(&foreground, &self.masks[i], &self.detection);
            let occupied = self.smoothers[i].smooth(raw);

            let color = if occupied {
                let analysis = color_analysis::classify_masked(frame, &self.color_masks[i]);
                debug!(
                    space = i,
                    hue = analysis.dominant_hue,
                    saturation = analysis.mean_saturation,
                    value = analysis.mean_value,
                    samples = analysis.samples,
                    label = analysis.color.as_str(),
                    "color analysis"
                );
                Some(analysis.color)
            } else {
                free_count += 1;
                None
            };

            if let Some(previous) = self.last_state[i] {
                if previous != occupied {
                    info!(
                        space = i,
                        occupied,
                        color = color.map(|c| c.as_str()).unwrap_or("-"),
                        "space state changed"
                    );
                    self.pending_events.push(OccupancyEvent {
                        timestamp_ms: frame.timestamp_ms,
                        space: i,
                        occupied,
                        color,
                    });
                }
            }
            self.last_state[i] = Some(occupied);

            results.push(SpaceResult {
                index: i,
                occupied,
                color,
            });
        }

        FrameSummary {
            free_count,
            total: results.len(),
            results,
        }
    }

    /// Occupancy flips accumulated since the last call.
    pub fn drain_events(&mut self) -> Vec<OccupancyEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Operator reset: forget all smoothing history and prior states.
    pub fn reset(&mut self) {
        for smoother in &mut self.smoothers {
            smoother.reset();
        }
        self.last_state.fill(None);
        self.pending_events.clear();
    }
}
