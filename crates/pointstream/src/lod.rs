/*!
# Level of Detail

Two tiers: the coarse every-Nth sample for overview zoom levels and the full point
set for close inspection. The choice is a pure function of the draw mode, the auto
toggle and the current scale. There is no hysteresis, so zooming back and forth
across the threshold may switch tiers on consecutive frames.
*/

/// Which point set a frame draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LodLevel {
    /// Sub-sampled preview set.
    Coarse,
    /// Full-resolution set.
    Full,
}

impl LodLevel {
    pub fn label(self) -> &'static str {
        match self {
            LodLevel::Coarse => "COARSE",
            LodLevel::Full => "FULL",
        }
    }
}

/// User-selected draw mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    /// Let the zoom level pick (only when auto-LOD is enabled).
    #[default]
    Auto,
    /// Always draw the coarse set.
    Coarse,
    /// Always draw the full set.
    Full,
}

impl std::fmt::Display for DrawMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DrawMode::Auto => "Auto",
            DrawMode::Coarse => "Coarse only",
            DrawMode::Full => "Full points",
        };

        f.write_str(s)
    }
}

/// Coarse when forced, or when auto-LOD is on and `scale < threshold` (strict).
#[inline]
pub fn decide_lod(mode: DrawMode, auto_lod: bool, scale: f32, threshold: f32) -> LodLevel {
    match mode {
        DrawMode::Coarse => LodLevel::Coarse,
        DrawMode::Full => LodLevel::Full,
        DrawMode::Auto if auto_lod && scale < threshold => LodLevel::Coarse,
        DrawMode::Auto => LodLevel::Full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LOD_THRESHOLD;

    #[test]
    fn auto_switches_strictly_below_threshold() {
        assert_eq!(decide_lod(DrawMode::Auto, true, 0.59, LOD_THRESHOLD), LodLevel::Coarse);
        assert_eq!(decide_lod(DrawMode::Auto, true, 0.60, LOD_THRESHOLD), LodLevel::Full);
        assert_eq!(decide_lod(DrawMode::Auto, true, 5.0, LOD_THRESHOLD), LodLevel::Full);
    }

    #[test]
    fn auto_without_toggle_is_full() {
        assert_eq!(decide_lod(DrawMode::Auto, false, 0.01, LOD_THRESHOLD), LodLevel::Full);
    }

    #[test]
    fn forced_modes_ignore_scale() {
        for scale in [1e-4, 0.59, 0.6, 1e4] {
            assert_eq!(decide_lod(DrawMode::Coarse, false, scale, LOD_THRESHOLD), LodLevel::Coarse);
            assert_eq!(decide_lod(DrawMode::Full, true, scale, LOD_THRESHOLD), LodLevel::Full);
        }
    }

    #[test]
    fn decision_is_repeatable() {
        let a = decide_lod(DrawMode::Auto, true, 0.599_999, LOD_THRESHOLD);
        let b = decide_lod(DrawMode::Auto, true, 0.599_999, LOD_THRESHOLD);
        assert_eq!(a, b);
    }
}
