use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{path}'"))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file '{path}'"))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{Config, OccupancyStrategy, ThresholdStrategy};

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
video:
  source: "lot.mp4"
spaces:
  - [[259, 71], [199, 421], [407, 427], [399, 68]]
  - [[423, 70], [434, 431], [746, 421], [601, 76]]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.spaces.len(), 2);
        assert_eq!(config.detection.smoothing_window_size, 7);
        assert_eq!(config.color.erosion_kernel_size, 45);
        assert!(config.video.display);
    }

    #[test]
    fn test_parse_strategy_overrides() {
        let yaml = r#"
video:
  source: "0"
detection:
  threshold_strategy: edges
  occupancy_strategy: pixel_count
  occupied_pixel_threshold: 1200
spaces: []
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.detection.threshold_strategy,
            ThresholdStrategy::Edges
        );
        assert_eq!(
            config.detection.occupancy_strategy,
            OccupancyStrategy::PixelCount
        );
        assert_eq!(config.detection.occupied_pixel_threshold, 1200);
    }
}
