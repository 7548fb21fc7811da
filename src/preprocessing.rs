// src/preprocessing.rs
//
// Turns a color frame into a binary foreground map suitable for per-space
// presence testing. Two interchangeable strategies:
//
//   - adaptive: inverted local adaptive threshold (anything darker than its
//     Gaussian-weighted neighborhood becomes foreground)
//   - edges: Canny edges, closed and dilated into contour-friendly blobs
//
// All operations are pure functions over byte rasters; the input frame is
// never mutated.

use crate::types::{DetectionConfig, Frame, GrayMap, ThresholdStrategy};

/// Produce the binary foreground map for one frame.
pub fn preprocess(frame: &Frame, config: &DetectionConfig) -> GrayMap {
    let gray = grayscale(frame);
    let blurred = gaussian_blur(&gray, config.blur_kernel_size);
    match config.threshold_strategy {
        ThresholdStrategy::Adaptive => {
            adaptive_threshold(
                &blurred,
                config.adaptive_threshold_block_size,
                config.adaptive_threshold_bias,
            )
        }
        ThresholdStrategy::Edges => {
            let edges = canny(&blurred, config.canny_low, config.canny_high);
            // Closing bridges disconnected fragments; the extra dilation
            // thickens them into blobs the area gates can see.
            let closed = erode(
                &dilate(&edges, config.morph_kernel_size),
                config.morph_kernel_size,
            );
            dilate(&closed, config.morph_kernel_size)
        }
    }
}

/// Rec.601 luminance, integer arithmetic (weights sum to 256).
pub fn grayscale(frame: &Frame) -> GrayMap {
    let mut out = GrayMap::new(frame.width, frame.height);
    for (i, px) in frame.data.chunks_exact(3).enumerate() {
        let luma = 77 * px[0] as u32 + 150 * px[1] as u32 + 29 * px[2] as u32;
        out.data[i] = ((luma + 128) >> 8) as u8;
    }
    out
}

fn gaussian_kernel(kernel_size: usize) -> Vec<f32> {
    // Same sigma-from-kernel-size rule OpenCV applies when sigma is omitted.
    let sigma = 0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let r = (kernel_size / 2) as isize;
    let mut kernel: Vec<f32> = (-r..=r)
        .map(|i| (-(i * i) as f32 / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

/// Separable Gaussian blur with replicated borders. Even kernel sizes are
/// rounded up to the next odd size.
pub fn gaussian_blur(src: &GrayMap, kernel_size: usize) -> GrayMap {
    let k = kernel_size.max(1) | 1;
    if k == 1 {
        return src.clone();
    }
    let kernel = gaussian_kernel(k);
    let r = (k / 2) as isize;
    let (w, h) = (src.width, src.height);

    let mut tmp = vec![0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f32;
            for (i, &weight) in kernel.iter().enumerate() {
                let sx = (x as isize + i as isize - r).clamp(0, w as isize - 1) as usize;
                acc += src.data[y * w + sx] as f32 * weight;
            }
            tmp[y * w + x] = acc;
        }
    }

    let mut out = GrayMap::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f32;
            for (i, &weight) in kernel.iter().enumerate() {
                let sy = (y as isize + i as isize - r).clamp(0, h as isize - 1) as usize;
                acc += tmp[sy * w + x] * weight;
            }
            out.data[y * w + x] = acc.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Inverted adaptive threshold: foreground (255) where the pixel is more than
/// `bias` darker than its Gaussian-weighted neighborhood mean.
pub fn adaptive_threshold(src: &GrayMap, block_size: usize, bias: i32) -> GrayMap {
    let local_mean = gaussian_blur(src, block_size);
    let mut out = GrayMap::new(src.width, src.height);
    for i in 0..src.data.len() {
        if (src.data[i] as i32) < local_mean.data[i] as i32 - bias {
            out.data[i] = 255;
        }
    }
    out
}

/// Canny edge detector: Sobel gradients, non-maximum suppression, double
/// threshold with hysteresis. Gradient magnitude uses the L1 norm.
pub fn canny(src: &GrayMap, low: f32, high: f32) -> GrayMap {
    let (w, h) = (src.width, src.height);
    let mut out = GrayMap::new(w, h);
    if w < 3 || h < 3 {
        return out;
    }

    let mut mag = vec![0f32; w * h];
    let mut sector = vec![0u8; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let p = |dx: isize, dy: isize| {
                src.data[(y as isize + dy) as usize * w + (x as isize + dx) as usize] as i32
            };
            let gx = (p(1, -1) + 2 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2 * p(-1, 0) + p(-1, 1));
            let gy = (p(-1, 1) + 2 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2 * p(0, -1) + p(1, -1));
            mag[y * w + x] = (gx.abs() + gy.abs()) as f32;

            let mut angle = (gy as f32).atan2(gx as f32).to_degrees();
            if angle < 0.0 {
                angle += 180.0;
            }
            sector[y * w + x] = if !(22.5..157.5).contains(&angle) {
                0 // horizontal gradient
            } else if angle < 67.5 {
                1 // down-right diagonal
            } else if angle < 112.5 {
                2 // vertical
            } else {
                3 // down-left diagonal
            };
        }
    }

    // Non-maximum suppression plus double threshold: 2 = strong, 1 = weak.
    let mut strength = vec![0u8; w * h];
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let idx = y * w + x;
            let m = mag[idx];
            if m < low {
                continue;
            }
            let (n1, n2) = match sector[idx] {
                0 => (mag[idx - 1], mag[idx + 1]),
                1 => (mag[idx - w - 1], mag[idx + w + 1]),
                2 => (mag[idx - w], mag[idx + w]),
                _ => (mag[idx - w + 1], mag[idx + w - 1]),
            };
            if m >= n1 && m >= n2 {
                strength[idx] = if m >= high { 2 } else { 1 };
            }
        }
    }

    // Hysteresis: weak edges survive only when connected to a strong one.
    let mut stack: Vec<usize> = Vec::new();
    for (idx, &s) in strength.iter().enumerate() {
        if s == 2 {
            out.data[idx] = 255;
            stack.push(idx);
        }
    }
    while let Some(idx) = stack.pop() {
        let x = idx % w;
        let y = idx / w;
        for dy in -1isize..=1 {
            for dx in -1isize..=1 {
                let nx = x as isize + dx;
                let ny = y as isize + dy;
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let nidx = ny as usize * w + nx as usize;
                if strength[nidx] >= 1 && out.data[nidx] == 0 {
                    out.data[nidx] = 255;
                    stack.push(nidx);
                }
            }
        }
    }
    out
}

/// Binary dilation with a square element, separable into two axis passes.
pub fn dilate(src: &GrayMap, kernel_size: usize) -> GrayMap {
    morph_pass(src, kernel_size, Morph::Dilate)
}

/// Binary erosion with a square element. Pixels outside the frame count as
/// background, so regions touching the border erode inward from it.
pub fn erode(src: &GrayMap, kernel_size: usize) -> GrayMap {
    morph_pass(src, kernel_size, Morph::Erode)
}

#[derive(Clone, Copy, PartialEq)]
enum Morph {
    Dilate,
    Erode,
}

fn morph_pass(src: &GrayMap, kernel_size: usize, op: Morph) -> GrayMap {
    let r = kernel_size.max(1) / 2;
    if r == 0 {
        return src.clone();
    }
    let (w, h) = (src.width, src.height);

    let axis_pass = |input: &GrayMap, horizontal: bool| -> GrayMap {
        let mut out = GrayMap::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let (pos, len) = if horizontal { (x, w) } else { (y, h) };
                let lo = pos.saturating_sub(r);
                let hi = (pos + r).min(len - 1);
                // Erosion treats out-of-frame pixels as background.
                let clipped = pos < r || pos + r > len - 1;
                let mut value = match op {
                    Morph::Dilate => 0u8,
                    Morph::Erode => {
                        if clipped {
                            0
                        } else {
                            255
                        }
                    }
                };
                for s in lo..=hi {
                    let v = if horizontal {
                        input.at(s, y)
                    } else {
                        input.at(x, s)
                    };
                    match op {
                        Morph::Dilate if v != 0 => {
                            value = 255;
                            break;
                        }
                        Morph::Erode if v == 0 => {
                            value = 0;
                            break;
                        }
                        _ => {}
                    }
                }
                out.set(x, y, value);
            }
        }
        out
    };

    let tmp = axis_pass(src, true);
    axis_pass(&tmp, false)
}
