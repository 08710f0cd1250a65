//! Edge/motion complexity scoring.

use crate::core::settings::AnalysisSettings;
use crate::core::{ComplexityScore, CoreError, CoreResult};

use super::GrayFrame;

/// Scores a sequence of frames sampled uniformly from one video.
#[derive(Debug, Clone)]
pub struct ComplexityAnalyzer {
    settings: AnalysisSettings,
}

impl ComplexityAnalyzer {
    pub fn new(mut settings: AnalysisSettings) -> Self {
        settings.normalize();
        Self { settings }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Scores the frames.
    ///
    /// Edge density is averaged over every frame; motion over every
    /// consecutive pair, so a single frame has zero motion. All frames must
    /// share one size.
    pub fn analyze(&self, frames: &[GrayFrame]) -> CoreResult<ComplexityScore> {
        let Some(first) = frames.first() else {
            return Err(CoreError::InvalidInput(
                "no frames to analyze".to_string(),
            ));
        };
        if let Some(odd) = frames.iter().find(|f| !f.same_dimensions(first)) {
            return Err(CoreError::InvalidInput(format!(
                "frame size {}x{} differs from {}x{}",
                odd.width(),
                odd.height(),
                first.width(),
                first.height()
            )));
        }

        let edge_sum: f64 = frames
            .iter()
            .map(|f| edge_density(f, self.settings.edge_threshold))
            .sum();
        let avg_edge = edge_sum / frames.len() as f64;

        let avg_motion = if frames.len() > 1 {
            let motion_sum: f64 = frames
                .windows(2)
                .map(|pair| motion_ratio(&pair[0], &pair[1]))
                .sum();
            motion_sum / (frames.len() - 1) as f64
        } else {
            0.0
        };

        let edge_component = avg_edge / self.settings.edge_full_scale * 10.0;
        let motion_component = avg_motion / self.settings.motion_full_scale * 10.0;

        let score = ComplexityScore::from_components(
            edge_component,
            motion_component,
            self.settings.edge_weight,
            self.settings.motion_weight,
        )
        .with_raw(avg_edge, avg_motion);

        tracing::debug!(
            "Complexity over {} frame(s): edge={:.4} motion={:.4} combined={:.2}",
            frames.len(),
            avg_edge,
            avg_motion,
            score.combined
        );

        Ok(score)
    }
}

/// Fraction of interior pixels whose 3x3 Sobel gradient magnitude exceeds
/// `threshold`. Frames smaller than 3x3 have no interior and score 0.
pub fn edge_density(frame: &GrayFrame, threshold: f64) -> f64 {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    if width < 3 || height < 3 {
        return 0.0;
    }

    let threshold_sq = threshold * threshold;
    let mut edges: u64 = 0;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let p = |dx: isize, dy: isize| -> i32 {
                frame.pixel((x as isize + dx) as usize, (y as isize + dy) as usize) as i32
            };

            let gx = (p(1, -1) + 2 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2 * p(-1, 0) + p(-1, 1));
            let gy = (p(-1, 1) + 2 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2 * p(0, -1) + p(1, -1));

            if ((gx * gx + gy * gy) as f64) > threshold_sq {
                edges += 1;
            }
        }
    }

    edges as f64 / ((width - 2) * (height - 2)) as f64
}

/// Mean absolute per-pixel difference between two equally sized frames,
/// normalized to [0, 1].
pub fn motion_ratio(prev: &GrayFrame, curr: &GrayFrame) -> f64 {
    let len = prev.data().len().min(curr.data().len());
    if len == 0 {
        return 0.0;
    }

    let diff_sum: u64 = prev
        .data()
        .iter()
        .zip(curr.data())
        .map(|(a, b)| u64::from(a.abs_diff(*b)))
        .sum();

    diff_sum as f64 / len as f64 / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(size: u32, cell: u32) -> GrayFrame {
        let mut data = Vec::with_capacity((size * size) as usize);
        for y in 0..size {
            for x in 0..size {
                let on = ((x / cell) + (y / cell)) % 2 == 0;
                data.push(if on { 255 } else { 0 });
            }
        }
        GrayFrame::new(size, size, data).unwrap()
    }

    fn analyzer() -> ComplexityAnalyzer {
        ComplexityAnalyzer::new(AnalysisSettings::default())
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            analyzer().analyze(&[]),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn mismatched_frame_sizes_are_rejected() {
        let frames = vec![GrayFrame::filled(8, 8, 0), GrayFrame::filled(8, 6, 0)];
        assert!(matches!(
            analyzer().analyze(&frames),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn static_video_has_zero_motion() {
        let frame = checkerboard(32, 4);
        let frames = vec![frame.clone(), frame.clone(), frame];
        let score = analyzer().analyze(&frames).unwrap();
        assert_eq!(score.motion_component, 0.0);
        assert_eq!(score.motion_ratio, 0.0);
        assert!(score.edge_component > 0.0);
    }

    #[test]
    fn single_frame_has_zero_motion() {
        let score = analyzer().analyze(&[checkerboard(16, 2)]).unwrap();
        assert_eq!(score.motion_component, 0.0);
    }

    #[test]
    fn flat_frames_score_zero() {
        let frames = vec![GrayFrame::filled(16, 16, 128); 4];
        let score = analyzer().analyze(&frames).unwrap();
        assert_eq!(score.combined, 0.0);
    }

    #[test]
    fn busy_texture_saturates_the_edge_component() {
        let score = analyzer().analyze(&[checkerboard(32, 2)]).unwrap();
        assert!(score.edge_density > 0.9);
        assert_eq!(score.edge_component, 10.0);
        // Combined is the weighted blend with zero motion
        assert!((score.combined - 6.0).abs() < 1e-9);
    }

    #[test]
    fn alternating_frames_saturate_motion() {
        let frames = vec![
            GrayFrame::filled(8, 8, 0),
            GrayFrame::filled(8, 8, 255),
            GrayFrame::filled(8, 8, 0),
        ];
        let score = analyzer().analyze(&frames).unwrap();
        assert!((score.motion_ratio - 1.0).abs() < 1e-12);
        assert_eq!(score.motion_component, 10.0);
        assert!((score.combined - 4.0).abs() < 1e-9);
    }

    #[test]
    fn scores_stay_within_range() {
        let frames = vec![checkerboard(24, 1), checkerboard(24, 3), checkerboard(24, 1)];
        let score = analyzer().analyze(&frames).unwrap();
        for value in [score.edge_component, score.motion_component, score.combined] {
            assert!((0.0..=10.0).contains(&value));
        }
    }

    #[test]
    fn tiny_frames_have_no_edges() {
        assert_eq!(edge_density(&GrayFrame::filled(2, 2, 255), 10.0), 0.0);
    }

    #[test]
    fn motion_ratio_is_normalized() {
        let a = GrayFrame::filled(4, 4, 0);
        let b = GrayFrame::filled(4, 4, 51);
        assert!((motion_ratio(&a, &b) - 0.2).abs() < 1e-12);
    }
}
