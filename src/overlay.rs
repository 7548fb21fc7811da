// src/overlay.rs
//
// Annotated-frame rendering: stall outlines colored by occupancy, the
// vehicle color label over occupied stalls, and the free-space counter.
// Pure presentation; all decisions are made upstream by the pipeline.

use crate::geometry::Space;
use crate::types::{Frame, FrameSummary};
use anyhow::Result;
use opencv::{
    core::{self, Mat, Scalar, Vector},
    imgproc,
    prelude::*,
};

const FREE_GREEN: Scalar = Scalar::new(0.0, 255.0, 0.0, 0.0);
const OCCUPIED_RED: Scalar = Scalar::new(0.0, 0.0, 255.0, 0.0);
const TEXT_WHITE: Scalar = Scalar::new(255.0, 255.0, 255.0, 0.0);
const BOX_BLACK: Scalar = Scalar::new(0.0, 0.0, 0.0, 0.0);

/// Convert an RGB frame into a BGR Mat for OpenCV drawing and encoding.
pub fn frame_to_bgr(frame: &Frame) -> Result<Mat> {
    let mat = Mat::from_slice(&frame.data)?;
    let mat = mat.reshape(3, frame.height as i32)?;
    let mut bgr = Mat::default();
    imgproc::cvt_color(&mat, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}

/// Draw the per-space overlay and the availability counter onto a copy of
/// the frame.
pub fn render(frame: &Frame, spaces: &[Space], summary: &FrameSummary) -> Result<Mat> {
    let mut output = frame_to_bgr(frame)?;

    for (space, result) in spaces.iter().zip(&summary.results) {
        let outline = if result.occupied {
            OCCUPIED_RED
        } else {
            FREE_GREEN
        };

        let mut points = Vector::<core::Point>::new();
        for corner in space.polygon.corners() {
            points.push(core::Point::new(corner.x, corner.y));
        }
        let mut polygons = Vector::<Vector<core::Point>>::new();
        polygons.push(points);
        imgproc::polylines(&mut output, &polygons, true, outline, 2, imgproc::LINE_8, 0)?;

        if let Some(color) = result.color {
            let anchor = space.polygon.corners()[0];
            imgproc::put_text(
                &mut output,
                color.as_str(),
                core::Point::new(anchor.x, anchor.y - 10),
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.5,
                TEXT_WHITE,
                2,
                imgproc::LINE_8,
                false,
            )?;
        }
    }

    imgproc::rectangle(
        &mut output,
        core::Rect::new(10, 5, 310, 35),
        BOX_BLACK,
        -1,
        imgproc::LINE_8,
        0,
    )?;
    imgproc::put_text(
        &mut output,
        &format!("Available: {} / {}", summary.free_count, summary.total),
        core::Point::new(15, 30),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.9,
        TEXT_WHITE,
        2,
        imgproc::LINE_8,
        false,
    )?;

    Ok(output)
}
