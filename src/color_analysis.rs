// src/color_analysis.rs
//
// HSV-based vehicle color estimation for occupied spaces.
//
// The sampling region is the space polygon eroded toward its interior, so
// pavement and stall markings visible at the polygon edges do not contaminate
// the estimate. The hue decision uses the histogram mode rather than the
// mean: a bimodal distribution (windshield glare against body color) skews a
// mean badly but leaves the mode on the body color.

use crate::geometry::SpacePolygon;
use crate::preprocessing::erode;
use crate::types::{Frame, GrayMap};
use serde::Serialize;

// ============================================================================
// PUBLIC TYPES
// ============================================================================

/// Dominant color of an occupying vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleColor {
    Black,
    White,
    Gray,
    Red,
    Yellow,
    Green,
    Blue,
    Other,
    /// Sentinel for spaces whose eroded sampling region is empty.
    Undetermined,
}

impl VehicleColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleColor::Black => "black",
            VehicleColor::White => "white",
            VehicleColor::Gray => "gray",
            VehicleColor::Red => "red",
            VehicleColor::Yellow => "yellow",
            VehicleColor::Green => "green",
            VehicleColor::Blue => "blue",
            VehicleColor::Other => "other",
            VehicleColor::Undetermined => "undetermined",
        }
    }
}

/// Result of color analysis on one space, with HSV diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct ColorAnalysis {
    pub color: VehicleColor,
    /// Histogram mode over the sampled pixels, OpenCV hue range [0, 180).
    pub dominant_hue: u8,
    pub mean_saturation: f32,
    pub mean_value: f32,
    pub samples: u32,
}

impl ColorAnalysis {
    fn undetermined() -> Self {
        Self {
            color: VehicleColor::Undetermined,
            dominant_hue: 0,
            mean_saturation: 0.0,
            mean_value: 0.0,
            samples: 0,
        }
    }
}

// ============================================================================
// HSV CONVERSION
// ============================================================================

/// Convert RGB to HSV in OpenCV 8-bit conventions:
/// H in [0, 180), S in [0, 255], V in [0, 255].
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r_n = r as f32 / 255.0;
    let g_n = g as f32 / 255.0;
    let b_n = b as f32 / 255.0;

    let max = r_n.max(g_n).max(b_n);
    let min = r_n.min(g_n).min(b_n);
    let delta = max - min;

    let h_deg = if delta < 1e-6 {
        0.0
    } else if (max - r_n).abs() < 1e-6 {
        60.0 * (((g_n - b_n) / delta) % 6.0)
    } else if (max - g_n).abs() < 1e-6 {
        60.0 * (((b_n - r_n) / delta) + 2.0)
    } else {
        60.0 * (((r_n - g_n) / delta) + 4.0)
    };
    let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };

    let s = if max < 1e-6 { 0.0 } else { delta / max };

    let h = ((h_deg / 2.0).round() as u16 % 180) as u8;
    (h, (s * 255.0).round() as u8, (max * 255.0).round() as u8)
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Fixed classification rule over the region statistics.
///
/// Achromatic checks come first: at low saturation or value the hue channel
/// is numerically meaningless. Thresholds assume the 8-bit OpenCV color
/// model (hue [0, 180)).
pub fn label_from_stats(dominant_hue: u8, mean_saturation: f32, mean_value: f32) -> VehicleColor {
    if mean_value < 50.0 {
        return VehicleColor::Black;
    }
    if mean_value > 200.0 && mean_saturation < 50.0 {
        return VehicleColor::White;
    }
    if mean_saturation < 50.0 {
        return VehicleColor::Gray;
    }
    match dominant_hue {
        0..=9 | 161..=179 => VehicleColor::Red,
        11..=25 => VehicleColor::Yellow,
        26..=85 => VehicleColor::Green,
        86..=135 => VehicleColor::Blue,
        _ => VehicleColor::Other,
    }
}

/// Estimate the dominant color over the pixels under `mask`.
pub fn classify_masked(frame: &Frame, mask: &GrayMap) -> ColorAnalysis {
    let mut histogram = [0u32; 180];
    let mut sum_s = 0f64;
    let mut sum_v = 0f64;
    let mut samples = 0u32;

    for y in 0..frame.height.min(mask.height) {
        for x in 0..frame.width.min(mask.width) {
            if mask.at(x, y) == 0 {
                continue;
            }
            let (r, g, b) = frame.rgb(x, y);
            let (h, s, v) = rgb_to_hsv(r, g, b);
            histogram[h as usize] += 1;
            sum_s += s as f64;
            sum_v += v as f64;
            samples += 1;
        }
    }

    if samples == 0 {
        return ColorAnalysis::undetermined();
    }

    let dominant_hue = histogram
        .iter()
        .enumerate()
        .max_by_key(|(_, &count)| count)
        .map(|(h, _)| h as u8)
        .unwrap_or(0);
    let mean_saturation = (sum_s / samples as f64) as f32;
    let mean_value = (sum_v / samples as f64) as f32;

    ColorAnalysis {
        color: label_from_stats(dominant_hue, mean_saturation, mean_value),
        dominant_hue,
        mean_saturation,
        mean_value,
        samples,
    }
}

/// Estimate the dominant vehicle color inside a space polygon.
///
/// The polygon mask is eroded by `erosion_kernel_size` first; a polygon too
/// small for the kernel yields `VehicleColor::Undetermined`.
pub fn classify_vehicle_color(
    frame: &Frame,
    polygon: &SpacePolygon,
    erosion_kernel_size: usize,
) -> ColorAnalysis {
    let mask = polygon.fill_mask(frame.width, frame.height);
    let eroded = erode(&mask, erosion_kernel_size);
    classify_masked(frame, &eroded)
}

// ============================================================================
// TESTS
// ============================================================================
