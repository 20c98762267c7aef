//! Zoom-pan slideshow filter graphs.
//!
//! Each staged image becomes one [`FilterStageDescriptor`]; [`FilterGraph::render`] turns the
//! descriptors into ffmpeg `-filter_complex` syntax, ending in a concat of every stage.

use crate::config::MediaConfig;
use crate::error::{ReelError, Result};

/// Label of the concatenated video stream.
pub const OUTPUT_LABEL: &str = "outv";

#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub background: String,
}

/// Zoom starting at 1.0, growing by `step` per frame, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomMotion {
    pub step: f64,
    pub max: f64,
}

impl ZoomMotion {
    pub fn zoom_at(&self, frame: u64) -> f64 {
        (1.0 + self.step * frame as f64).min(self.max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterStageDescriptor {
    pub input_index: usize,
    pub target_width: u32,
    pub target_height: u32,
    pub duration_seconds: f64,
    /// Frames this stage emits; the per-image share of the narration's total frames.
    pub frame_count: u64,
    pub output_label: String,
}

pub struct MotionClipBuilder {
    canvas: Canvas,
    motion: ZoomMotion,
}

impl MotionClipBuilder {
    pub fn new(canvas: Canvas, motion: ZoomMotion) -> Self {
        Self { canvas, motion }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(
            Canvas {
                width: config.width,
                height: config.height,
                fps: config.fps,
                background: config.background.clone(),
            },
            ZoomMotion {
                step: config.zoom_step,
                max: config.zoom_max,
            },
        )
    }

    /// Split the narration evenly across `image_count` clips.
    ///
    /// Frame boundaries are rounded cumulatively, so the clips add up to the narration's
    /// frame count rather than accumulating one rounding error per image.
    pub fn build(&self, image_count: usize, narration_seconds: f64) -> Result<FilterGraph> {
        if image_count == 0 {
            return Err(ReelError::Compose("no images to compose".to_string()));
        }
        if !narration_seconds.is_finite() || narration_seconds <= 0.0 {
            return Err(ReelError::Compose(format!(
                "narration duration must be positive, got {}",
                narration_seconds
            )));
        }

        let fps = self.canvas.fps as f64;
        let total_frames = (narration_seconds * fps).round() as u64;
        let n = image_count as u64;
        if total_frames < n {
            return Err(ReelError::Compose(format!(
                "{}s of narration is {} frames at {} fps, too short for {} images",
                narration_seconds, total_frames, self.canvas.fps, image_count
            )));
        }
        let boundary = |i: u64| (2 * i * total_frames + n) / (2 * n);
        let duration_seconds = narration_seconds / image_count as f64;

        let stages = (0..image_count)
            .map(|i| {
                let frames = boundary(i as u64 + 1) - boundary(i as u64);
                FilterStageDescriptor {
                    input_index: i,
                    target_width: self.canvas.width,
                    target_height: self.canvas.height,
                    duration_seconds,
                    frame_count: frames,
                    output_label: format!("v{}", i),
                }
            })
            .collect();

        Ok(FilterGraph {
            canvas: self.canvas.clone(),
            motion: self.motion,
            stages,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    canvas: Canvas,
    motion: ZoomMotion,
    stages: Vec<FilterStageDescriptor>,
}

impl FilterGraph {
    pub fn stages(&self) -> &[FilterStageDescriptor] {
        &self.stages
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn motion(&self) -> ZoomMotion {
        self.motion
    }

    pub fn total_frames(&self) -> u64 {
        self.stages.iter().map(|s| s.frame_count).sum()
    }

    /// Fit, pad, then zoom one input.
    pub fn render_stage(&self, stage: &FilterStageDescriptor) -> String {
        let (w, h) = (stage.target_width, stage.target_height);
        format!(
            "[{idx}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color={bg},setsar=1,\
             zoompan=z='min(zoom+{step},{max})':d={frames}:s={w}x{h}:fps={fps}[{label}]",
            idx = stage.input_index,
            w = w,
            h = h,
            bg = self.canvas.background,
            step = self.motion.step,
            max = self.motion.max,
            frames = stage.frame_count,
            fps = self.canvas.fps,
            label = stage.output_label,
        )
    }

    pub fn render(&self) -> String {
        let mut parts: Vec<String> = self.stages.iter().map(|s| self.render_stage(s)).collect();

        let concat_inputs: String = self
            .stages
            .iter()
            .map(|s| format!("[{}]", s.output_label))
            .collect();
        parts.push(format!(
            "{}concat=n={}:v=1:a=0[{}]",
            concat_inputs,
            self.stages.len(),
            OUTPUT_LABEL
        ));

        parts.join(";")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> MotionClipBuilder {
        MotionClipBuilder::from_config(&MediaConfig::default())
    }

    #[test]
    fn test_two_image_graph_text() {
        let graph = builder().build(2, 4.0).unwrap();

        assert_eq!(
            graph.render(),
            "[0:v]scale=1080:1920:force_original_aspect_ratio=decrease,\
             pad=1080:1920:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,\
             zoompan=z='min(zoom+0.0001,1.2)':d=60:s=1080x1920:fps=30[v0];\
             [1:v]scale=1080:1920:force_original_aspect_ratio=decrease,\
             pad=1080:1920:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,\
             zoompan=z='min(zoom+0.0001,1.2)':d=60:s=1080x1920:fps=30[v1];\
             [v0][v1]concat=n=2:v=1:a=0[outv]"
        );
    }

    #[test]
    fn test_durations_sum_to_narration() {
        let fps = 30.0;
        for (images, seconds) in [(4, 17.3), (3, 10.0), (7, 61.217), (1, 0.5), (5, 33.333)] {
            let graph = builder().build(images, seconds).unwrap();

            assert_eq!(graph.stages().len(), images);
            let total_seconds = graph.total_frames() as f64 / fps;
            assert!(
                (total_seconds - seconds).abs() <= 1.0 / fps,
                "{} images over {}s gave {}s",
                images,
                seconds,
                total_seconds
            );

            let per_image: f64 = graph.stages().iter().map(|s| s.duration_seconds).sum();
            assert!((per_image - seconds).abs() < 1e-9);
        }
    }

    #[test]
    fn test_stages_get_equal_share() {
        let graph = builder().build(4, 10.0).unwrap();
        let frames: Vec<u64> = graph.stages().iter().map(|s| s.frame_count).collect();

        assert_eq!(frames.iter().sum::<u64>(), 300);
        assert!(frames.iter().all(|f| *f == 75));
        assert!(graph.stages().iter().all(|s| (s.duration_seconds - 2.5).abs() < 1e-9));
    }

    #[test]
    fn test_zoom_is_bounded_and_non_decreasing() {
        let graph = builder().build(2, 120.0).unwrap();
        let motion = graph.motion();

        for stage in graph.stages() {
            let mut previous = motion.zoom_at(0);
            assert_eq!(previous, 1.0);
            for frame in 1..=stage.frame_count {
                let zoom = motion.zoom_at(frame);
                assert!(zoom >= previous);
                assert!(zoom <= 1.2);
                previous = zoom;
            }
            // 1800 frames at 0.0001 never reaches the cap
            assert!(previous < 1.2);
        }

        let fast = ZoomMotion { step: 0.01, max: 1.2 };
        assert_eq!(fast.zoom_at(1_000), 1.2);
    }

    #[test]
    fn test_invalid_inputs_are_compose_errors() {
        assert!(matches!(builder().build(0, 10.0), Err(ReelError::Compose(_))));
        assert!(matches!(builder().build(3, 0.0), Err(ReelError::Compose(_))));
        assert!(matches!(builder().build(3, f64::NAN), Err(ReelError::Compose(_))));
    }

    #[test]
    fn test_more_images_than_frames_is_rejected() {
        // 0.1s at 30 fps is 3 frames
        assert!(matches!(builder().build(10, 0.1), Err(ReelError::Compose(_))));

        let graph = builder().build(3, 0.1).unwrap();
        assert_eq!(graph.total_frames(), 3);
        assert!(graph.stages().iter().all(|s| s.frame_count == 1));
    }
}
