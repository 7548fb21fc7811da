// src/occupancy.rs
//
// Raw (single-frame) occupancy decision for one space: isolate the
// foreground map inside the space's polygon mask, then gate on either a
// plain pixel count or on filtered blob areas.

use crate::geometry::SpaceMask;
use crate::types::{DetectionConfig, GrayMap, OccupancyStrategy};

/// Count foreground pixels inside the mask. Bounded by the mask's
/// rasterized pixel area.
pub fn masked_pixel_count(foreground: &GrayMap, space: &SpaceMask) -> usize {
    let w = foreground.width;
    let mut count = 0;
    for y in space.y0..=space.y1.min(foreground.height.saturating_sub(1)) {
        for x in space.x0..=space.x1.min(w.saturating_sub(1)) {
            if space.mask.data[y * w + x] != 0 && foreground.data[y * w + x] != 0 {
                count += 1;
            }
        }
    }
    count
}

/// Areas of 8-connected foreground blobs inside the mask, unfiltered.
pub fn blob_areas(foreground: &GrayMap, space: &SpaceMask) -> Vec<usize> {
    let w = foreground.width;
    let h = foreground.height;
    let mut visited = vec![false; w * h];
    let mut areas = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    let y1 = space.y1.min(h.saturating_sub(1));
    let x1 = space.x1.min(w.saturating_sub(1));

    let active = |x: usize, y: usize| {
        space.mask.data[y * w + x] != 0 && foreground.data[y * w + x] != 0
    };

    for sy in space.y0..=y1 {
        for sx in space.x0..=x1 {
            if visited[sy * w + sx] || !active(sx, sy) {
                continue;
            }
            // Flood-fill one blob.
            let mut area = 0usize;
            visited[sy * w + sx] = true;
            stack.push((sx, sy));
            while let Some((x, y)) = stack.pop() {
                area += 1;
                for dy in -1isize..=1 {
                    for dx in -1isize..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = x as isize + dx;
                        let ny = y as isize + dy;
                        if nx < space.x0 as isize
                            || ny < space.y0 as isize
                            || nx > x1 as isize
                            || ny > y1 as isize
                        {
                            continue;
                        }
                        let (nx, ny) = (nx as usize, ny as usize);
                        if !visited[ny * w + nx] && active(nx, ny) {
                            visited[ny * w + nx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }
            areas.push(area);
        }
    }
    areas
}

/// Single-frame occupied/free decision for one space.
///
/// An empty isolated region is always free; zero surviving blobs is a valid
/// free result, never an error.
pub fn classify(foreground: &GrayMap, space: &SpaceMask, config: &DetectionConfig) -> bool {
    match config.occupancy_strategy {
        OccupancyStrategy::PixelCount => {
            masked_pixel_count(foreground, space) > config.occupied_pixel_threshold
        }
        OccupancyStrategy::Contour => {
            let mut survivors = 0usize;
            let mut total_area = 0usize;
            for area in blob_areas(foreground, space) {
                if (config.min_contour_area..=config.max_contour_area).contains(&area) {
                    survivors += 1;
                    total_area += area;
                }
            }
            survivors > 0 && total_area > config.total_area_threshold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{SpaceMask, SpacePolygon};
    use crate::types::DetectionConfig;

    fn square_mask(x0: i32, y0: i32, size: i32, w: usize, h: usize) -> SpaceMask {
        let polygon = SpacePolygon::from_config(&[
            [x0, y0],
            [x0 + size, y0],
            [x0 + size, y0 + size],
            [x0, y0 + size],
        ])
        .unwrap();
        SpaceMask::build(&polygon, w, h)
    }

    fn filled_map(w: usize, h: usize, value: u8) -> GrayMap {
        let mut map = GrayMap::new(w, h);
        map.data.fill(value);
        map
    }

    #[test]
    fn test_masked_count_bounded_by_rasterized_area() {
        let space = square_mask(10, 10, 20, 64, 64);
        let full = filled_map(64, 64, 255);
        let empty = GrayMap::new(64, 64);
        assert_eq!(masked_pixel_count(&full, &space), space.pixel_area);
        assert_eq!(masked_pixel_count(&empty, &space), 0);
    }

    #[test]
    fn test_count_ignores_foreground_outside_mask() {
        let space = square_mask(10, 10, 10, 64, 64);
        let mut map = GrayMap::new(64, 64);
        for y in 40..60 {
            for x in 40..60 {
                map.set(x, y, 255);
            }
        }
        assert_eq!(masked_pixel_count(&map, &space), 0);
    }

    #[test]
    fn test_blob_areas_separates_components() {
        let space = square_mask(0, 0, 40, 64, 64);
        let mut map = GrayMap::new(64, 64);
        for y in 5..10 {
            for x in 5..10 {
                map.set(x, y, 255);
            }
        }
        for y in 20..30 {
            for x in 20..30 {
                map.set(x, y, 255);
            }
        }
        let mut areas = blob_areas(&map, &space);
        areas.sort_unstable();
        assert_eq!(areas, vec![25, 100]);
    }

    #[test]
    fn test_diagonal_pixels_form_one_blob() {
        let space = square_mask(0, 0, 20, 32, 32);
        let mut map = GrayMap::new(32, 32);
        map.set(5, 5, 255);
        map.set(6, 6, 255);
        map.set(7, 7, 255);
        assert_eq!(blob_areas(&map, &space), vec![3]);
    }

    #[test]
    fn test_pixel_count_strategy_threshold() {
        let space = square_mask(0, 0, 40, 64, 64);
        let config = DetectionConfig {
            occupancy_strategy: OccupancyStrategy::PixelCount,
            occupied_pixel_threshold: 850,
            ..DetectionConfig::default()
        };
        let full = filled_map(64, 64, 255);
        assert!(classify(&full, &space, &config));
        assert!(!classify(&GrayMap::new(64, 64), &space, &config));
    }

    #[test]
    fn test_contour_strategy_rejects_specks_and_empty() {
        let space = square_mask(0, 0, 60, 64, 64);
        let config = DetectionConfig {
            occupancy_strategy: OccupancyStrategy::Contour,
            min_contour_area: 400,
            max_contour_area: 50_000,
            total_area_threshold: 1000,
            ..DetectionConfig::default()
        };

        // Empty region: free, no error.
        assert!(!classify(&GrayMap::new(64, 64), &space, &config));

        // A 5x5 speck is below min_contour_area.
        let mut speck = GrayMap::new(64, 64);
        for y in 10..15 {
            for x in 10..15 {
                speck.set(x, y, 255);
            }
        }
        assert!(!classify(&speck, &space, &config));

        // A 40x40 blob survives the area gates.
        let mut blob = GrayMap::new(64, 64);
        for y in 10..50 {
            for x in 10..50 {
                blob.set(x, y, 255);
            }
        }
        assert!(classify(&blob, &space, &config));
    }

    #[test]
    fn test_contour_strategy_needs_total_area() {
        // Two surviving blobs whose summed area still misses the total gate.
        let space = square_mask(0, 0, 60, 64, 64);
        let config = DetectionConfig {
            occupancy_strategy: OccupancyStrategy::Contour,
            min_contour_area: 100,
            max_contour_area: 50_000,
            total_area_threshold: 1000,
            ..DetectionConfig::default()
        };
        let mut map = GrayMap::new(64, 64);
        for y in 5..20 {
            for x in 5..20 {
                map.set(x, y, 255); // 225 px
            }
        }
        for y in 30..45 {
            for x in 30..45 {
                map.set(x, y, 255); // 225 px
            }
        }
        assert!(!classify(&map, &space, &config));
    }
}
