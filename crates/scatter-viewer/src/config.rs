use clap::Parser;
use pointstream::config::{MAX_BATCH_SIZE, MAX_TOTAL_POINTS};
use pointstream::{RenderStyle, StreamConfig, WorldExtent};

/// `scatter-viewer` - interactive viewer for streamed 2-D point clouds.
///
/// Points are synthesised on a background thread and streamed into the GPU while
/// the view stays interactive. Drag to pan, scroll to zoom.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Capacity of the full point set.
    #[arg(long, env = "SCATTER_MAX_POINTS", default_value_t = MAX_TOTAL_POINTS)]
    pub max_points: usize,

    /// Points generated at startup. Zero starts with an empty scene.
    #[arg(long, env = "SCATTER_INITIAL_POINTS", default_value_t = 200_000)]
    pub initial_points: usize,

    /// Points per generator batch (1..=1000).
    #[arg(long, env = "SCATTER_BATCH_SIZE", default_value_t = MAX_BATCH_SIZE)]
    pub batch_size: usize,

    /// Keep one coarse point per this many generated points.
    #[arg(long, env = "SCATTER_COARSE_RATE", default_value_t = 100)]
    pub coarse_rate: usize,

    /// World width in world units.
    #[arg(long, env = "SCATTER_WORLD_WIDTH", default_value_t = 2000.0)]
    pub world_width: f32,

    /// World height in world units.
    #[arg(long, env = "SCATTER_WORLD_HEIGHT", default_value_t = 2000.0)]
    pub world_height: f32,

    /// Generator seed.
    #[arg(long, env = "SCATTER_SEED", default_value_t = StreamConfig::default().seed)]
    pub seed: u64,

    /// Point diameter in logical pixels (2..=20).
    #[arg(long, env = "SCATTER_POINT_SIZE", default_value_t = 4.0)]
    pub point_size: f32,
}

impl Config {
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            max_total_points: self.max_points,
            batch_size: self.batch_size,
            coarse_rate: self.coarse_rate,
            world: WorldExtent::new(self.world_width, self.world_height),
            seed: self.seed,
            ..Default::default()
        }
        .validated()
    }

    pub fn render_style(&self) -> RenderStyle {
        RenderStyle {
            point_size: RenderStyle::clamp_point_size(self.point_size),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_stream_defaults() {
        let cfg = Config::try_parse_from(["scatter-viewer"]).unwrap();
        let stream = cfg.stream_config();
        assert_eq!(stream.max_total_points, MAX_TOTAL_POINTS);
        assert_eq!(stream.batch_size, MAX_BATCH_SIZE);
        assert_eq!(stream.coarse_rate, 100);
        assert_eq!(stream.world, WorldExtent::default());
        assert_eq!(cfg.render_style().point_size, 4.0);
    }

    #[test]
    fn out_of_range_flags_are_clamped() {
        let cfg = Config::try_parse_from([
            "scatter-viewer",
            "--batch-size",
            "99999",
            "--coarse-rate",
            "0",
            "--point-size",
            "100",
        ])
        .unwrap();
        assert_eq!(cfg.stream_config().batch_size, MAX_BATCH_SIZE);
        assert_eq!(cfg.stream_config().coarse_rate, 1);
        assert_eq!(cfg.render_style().point_size, 20.0);
    }
}
