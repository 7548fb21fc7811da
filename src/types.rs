use crate::color_analysis::VehicleColor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub video: VideoConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub color: ColorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// One entry per parking space: four corner points in capture order,
    /// produced offline by the mapping tool.
    pub spaces: Vec<[[i32; 2]; 4]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Video file path, or a bare camera index such as "0".
    pub source: String,
    #[serde(default = "default_true")]
    pub display: bool,
    #[serde(default)]
    pub save_annotated: bool,
    #[serde(default = "default_output_path")]
    pub output_path: String,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdStrategy {
    /// Inverted local adaptive threshold. Responds to anything darker than
    /// its neighborhood, which works well on bright, uniform pavement.
    Adaptive,
    /// Canny edges bridged by a morphological closing and one dilation.
    Edges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyStrategy {
    /// Raw foreground pixel count against `occupied_pixel_threshold`.
    PixelCount,
    /// Blob extraction with per-blob and total area gates. More robust to
    /// speckle noise and full-frame artifacts.
    Contour,
}

/// Every threshold here is camera- and resolution-dependent. The values below
/// are starting points for tuning, not universal constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub threshold_strategy: ThresholdStrategy,
    pub occupancy_strategy: OccupancyStrategy,
    pub blur_kernel_size: usize,
    pub adaptive_threshold_block_size: usize,
    pub adaptive_threshold_bias: i32,
    pub canny_low: f32,
    pub canny_high: f32,
    pub morph_kernel_size: usize,
    pub min_contour_area: usize,
    pub max_contour_area: usize,
    pub total_area_threshold: usize,
    pub occupied_pixel_threshold: usize,
    pub smoothing_window_size: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold_strategy: ThresholdStrategy::Adaptive,
            occupancy_strategy: OccupancyStrategy::Contour,
            blur_kernel_size: 5,
            adaptive_threshold_block_size: 25,
            adaptive_threshold_bias: 16,
            canny_low: 50.0,
            canny_high: 150.0,
            morph_kernel_size: 3,
            min_contour_area: 400,
            max_contour_area: 50_000,
            total_area_threshold: 1000,
            occupied_pixel_threshold: 850,
            smoothing_window_size: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    /// Square kernel used to shrink the sampling region away from the
    /// polygon boundary before color estimation.
    pub erosion_kernel_size: usize,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            erosion_kernel_size: 45,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Optional JSON-lines file receiving one record per occupancy change.
    pub event_log: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            event_log: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_output_path() -> String {
    "annotated.mp4".to_string()
}

fn default_snapshot_path() -> String {
    "reference_frame.jpg".to_string()
}

/// One decoded video frame, interleaved RGB.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

impl Frame {
    /// RGB triple at (x, y). Callers guarantee in-bounds coordinates.
    #[inline]
    pub fn rgb(&self, x: usize, y: usize) -> (u8, u8, u8) {
        let idx = (y * self.width + x) * 3;
        (self.data[idx], self.data[idx + 1], self.data[idx + 2])
    }
}

/// Single-channel byte raster. Doubles as luminance image, binary foreground
/// map and polygon mask (binary maps use 0 / 255).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayMap {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl GrayMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: vec![0; width * height],
            width,
            height,
        }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

/// Per-space, per-frame outcome. `color` is only present for occupied spaces.
#[derive(Debug, Clone, Serialize)]
pub struct SpaceResult {
    pub index: usize,
    pub occupied: bool,
    pub color: Option<VehicleColor>,
}

/// Frame-level aggregate handed to the overlay and the event log.
#[derive(Debug, Clone, Serialize)]
pub struct FrameSummary {
    pub free_count: usize,
    pub total: usize,
    pub results: Vec<SpaceResult>,
}

/// Emitted whenever a space's smoothed occupancy flips.
#[derive(Debug, Clone, Serialize)]
pub struct OccupancyEvent {
    pub timestamp_ms: f64,
    pub space: usize,
    pub occupied: bool,
    pub color: Option<VehicleColor>,
}
