// src/video_processor.rs

use crate::types::{Frame, VideoConfig};
use anyhow::{bail, Context, Result};
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTraitConst, VideoWriter},
};
use tracing::info;

/// Blocking frame supplier. `Ok(None)` signals end of stream, which the
/// looping wrapper treats as a replay point, never as an error.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
    fn rewind(&mut self) -> Result<()>;
}

/// Fixed-camera feed backed by an OpenCV capture: a video file, or a live
/// camera when the source string is a bare device index.
pub struct VideoReader {
    cap: VideoCapture,
    fps: f64,
    width: usize,
    height: usize,
    current_frame: i64,
}

impl VideoReader {
    pub fn open(source: &str) -> Result<Self> {
        info!("Opening video source: {source}");

        let cap = match source.parse::<i32>() {
            Ok(camera_index) => VideoCapture::new(camera_index, videoio::CAP_ANY),
            Err(_) => VideoCapture::from_file(source, videoio::CAP_ANY),
        }
        .with_context(|| format!("failed to open video source '{source}'"))?;

        if !cap.is_opened()? {
            bail!("failed to open video source '{source}'");
        }

        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        let fps = if fps > 0.0 { fps } else { 30.0 };
        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)? as usize;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)? as usize;

        info!("Video properties: {width}x{height} @ {fps:.1} FPS");

        Ok(Self {
            cap,
            fps,
            width,
            height,
            current_frame: 0,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl FrameSource for VideoReader {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use opencv::videoio::VideoCaptureTrait;

        let mut mat = Mat::default();
        if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
            return Ok(None);
        }

        let timestamp_ms = (self.current_frame as f64 / self.fps) * 1000.0;
        self.current_frame += 1;

        let mut rgb_mat = Mat::default();
        imgproc::cvt_color(&mat, &mut rgb_mat, imgproc::COLOR_BGR2RGB, 0)?;
        let data = rgb_mat.data_bytes()?.to_vec();

        Ok(Some(Frame {
            data,
            width: self.width,
            height: self.height,
            timestamp_ms,
        }))
    }

    fn rewind(&mut self) -> Result<()> {
        use opencv::videoio::VideoCaptureTrait;

        VideoCaptureTrait::set(&mut self.cap, videoio::CAP_PROP_POS_FRAMES, 0.0)?;
        self.current_frame = 0;
        Ok(())
    }
}

/// Replays the underlying source forever: end-of-stream rewinds and
/// continues from the first frame.
pub struct LoopingSource<S: FrameSource> {
    inner: S,
}

impl<S: FrameSource> LoopingSource<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn next_frame(&mut self) -> Result<Frame> {
        if let Some(frame) = self.inner.next_frame()? {
            return Ok(frame);
        }
        info!("End of stream. Restarting playback");
        self.inner.rewind()?;
        match self.inner.next_frame()? {
            Some(frame) => Ok(frame),
            None => bail!("video source produced no frames after rewind"),
        }
    }
}

/// Annotated-output writer, enabled by configuration.
pub fn create_writer(
    config: &VideoConfig,
    width: usize,
    height: usize,
    fps: f64,
) -> Result<Option<VideoWriter>> {
    if !config.save_annotated {
        return Ok(None);
    }

    info!("Annotated output: {}", config.output_path);

    let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
    let writer = VideoWriter::new(
        &config.output_path,
        fourcc,
        fps,
        core::Size::new(width as i32, height as i32),
        true,
    )?;
    Ok(Some(writer))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory source standing in for a short video file.
    struct VecSource {
        frames: Vec<Frame>,
        position: usize,
    }

    impl VecSource {
        fn new(count: usize) -> Self {
            let frames = (0..count)
                .map(|i| Frame {
                    data: vec![i as u8; 4 * 4 * 3],
                    width: 4,
                    height: 4,
                    timestamp_ms: i as f64 * 33.0,
                })
                .collect();
            Self {
                frames,
                position: 0,
            }
        }
    }

    impl FrameSource for VecSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            let frame = self.frames.get(self.position).cloned();
            if frame.is_some() {
                self.position += 1;
            }
            Ok(frame)
        }

        fn rewind(&mut self) -> Result<()> {
            self.position = 0;
            Ok(())
        }
    }

    #[test]
    fn test_looping_source_replays_from_start() {
        let mut source = LoopingSource::new(VecSource::new(3));
        let first = source.next_frame().unwrap();
        source.next_frame().unwrap();
        source.next_frame().unwrap();

        // Source is now exhausted; the next read must wrap to frame 0,
        // bit-identical to the original first frame.
        let wrapped = source.next_frame().unwrap();
        assert_eq!(wrapped.data, first.data);
        assert_eq!(wrapped.timestamp_ms, first.timestamp_ms);
    }

    #[test]
    fn test_looping_source_wraps_repeatedly() {
        let mut source = LoopingSource::new(VecSource::new(2));
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(source.next_frame().unwrap().data[0]);
        }
        assert_eq!(seen, vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_empty_source_is_an_error_not_a_spin() {
        let mut source = LoopingSource::new(VecSource::new(0));
        assert!(source.next_frame().is_err());
    }
}
