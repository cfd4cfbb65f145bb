use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::Config,
    error::{CompositionError, Result},
    video::{
        filters::FilterChain,
        types::{Clip, Rgb, Size},
    },
};

/// Which group of clips plays first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    #[default]
    ImagesFirst,
    VideosFirst,
}

/// The ordered clips of the final montage
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub clips: Vec<Clip>,

    /// Color behind clips smaller than the canvas
    pub background: Rgb,
}

impl Timeline {
    /// Sum of clip durations
    pub fn duration(&self) -> f64 {
        self.clips.iter().map(|clip| clip.duration).sum()
    }

    /// Frame size every clip is centered on: the largest width and height, rounded up to even
    pub fn canvas(&self) -> Size {
        let width = self.clips.iter().map(|c| c.size.width).max().unwrap_or(0);
        let height = self.clips.iter().map(|c| c.size.height).max().unwrap_or(0);
        Size::new(width, height).even()
    }

    pub fn names(&self) -> Vec<&str> {
        self.clips.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn image_count(&self) -> usize {
        self.clips.iter().filter(|c| c.is_image()).count()
    }

    pub fn video_count(&self) -> usize {
        self.clips.len() - self.image_count()
    }
}

/// Largest width and largest height across the processed videos
pub fn video_bounds(videos: &[Clip]) -> Option<Size> {
    let width = videos.iter().map(|c| c.size.width).max()?;
    let height = videos.iter().map(|c| c.size.height).max()?;
    Some(Size::new(width, height))
}

/// Orders clips and prepares images to fit alongside the videos
pub struct Sequencer<'a> {
    config: &'a Config,
}

impl<'a> Sequencer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Build the timeline from processed videos and raw images
    ///
    /// Images go through their own chain, sized against the video bounds, and
    /// both groups keep their sorted order.
    pub fn sequence(&self, videos: Vec<Clip>, images: Vec<Clip>) -> Result<Timeline> {
        if videos.is_empty() && images.is_empty() {
            return Err(CompositionError::NoClipsFound {
                path: self.config.paths.media_dir.display().to_string(),
            }
            .into());
        }

        let bounds = video_bounds(&videos);
        match bounds {
            Some(bounds) => debug!("Image bounds from videos: {}", bounds),
            None => debug!("No videos, images keep their size"),
        }

        let chain = FilterChain::for_images(self.config, bounds);
        let images = images
            .into_iter()
            .map(|image| chain.apply(image))
            .collect::<Result<Vec<_>>>()?;

        let clips = match self.config.composition.ordering {
            OrderingPolicy::ImagesFirst => images.into_iter().chain(videos).collect(),
            OrderingPolicy::VideosFirst => videos.into_iter().chain(images).collect(),
        };

        let timeline = Timeline {
            clips,
            background: self.config.composition.background_color,
        };
        info!(
            "   Timeline: {} clip(s), {:.2}s, canvas {}",
            timeline.clips.len(),
            timeline.duration(),
            timeline.canvas()
        );
        Ok(timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::types::Rotation;

    fn video(name: &str, duration: f64, size: Size) -> Clip {
        Clip::video(name, name, duration, size, Rotation::None, true)
    }

    #[test]
    fn test_images_first_order_and_duration() {
        let config = Config::default();
        let videos = vec![
            video("a.mp4", 4.0, Size::new(1280, 720)),
            video("b.mp4", 6.5, Size::new(640, 480)),
        ];
        let images = vec![
            Clip::image("x.jpeg", "x.jpeg", Size::new(400, 300)),
            Clip::image("y.jpeg", "y.jpeg", Size::new(400, 300)),
        ];

        let timeline = Sequencer::new(&config).sequence(videos, images).unwrap();
        assert_eq!(timeline.names(), vec!["x.jpeg", "y.jpeg", "a.mp4", "b.mp4"]);
        assert!((timeline.duration() - (5.0 + 5.0 + 4.0 + 6.5)).abs() < 1e-9);
        assert_eq!(timeline.image_count(), 2);
        assert_eq!(timeline.video_count(), 2);
    }

    #[test]
    fn test_videos_first_policy() {
        let mut config = Config::default();
        config.composition.ordering = OrderingPolicy::VideosFirst;
        let timeline = Sequencer::new(&config)
            .sequence(
                vec![video("a.mp4", 1.0, Size::new(10, 10))],
                vec![Clip::image("x.jpeg", "x.jpeg", Size::new(4, 4))],
            )
            .unwrap();
        assert_eq!(timeline.names(), vec!["a.mp4", "x.jpeg"]);
    }

    #[test]
    fn test_wide_image_scaled_to_video_width() {
        let config = Config::default();
        let videos = vec![video("a.mp4", 1.0, Size::new(1000, 2000))];
        let images = vec![
            Clip::image("wide.jpeg", "wide.jpeg", Size::new(3000, 1500)),
            Clip::image("small.jpeg", "small.jpeg", Size::new(100, 100)),
        ];

        let timeline = Sequencer::new(&config).sequence(videos, images).unwrap();
        assert_eq!(timeline.clips[0].size.width, 1000);
        // margin only, never upscaled
        assert_eq!(timeline.clips[1].size, Size::new(140, 140));
    }

    #[test]
    fn test_bounds_use_true_height() {
        let videos = vec![
            video("a.mp4", 1.0, Size::new(1920, 100)),
            video("b.mp4", 1.0, Size::new(100, 1080)),
        ];
        assert_eq!(video_bounds(&videos), Some(Size::new(1920, 1080)));
        assert_eq!(video_bounds(&[]), None);
    }

    #[test]
    fn test_images_only_keep_size() {
        let config = Config::default();
        let timeline = Sequencer::new(&config)
            .sequence(Vec::new(), vec![Clip::image("x.jpeg", "x.jpeg", Size::new(4001, 3000))])
            .unwrap();
        assert_eq!(timeline.clips[0].size, Size::new(4041, 3040));
        assert_eq!(timeline.canvas(), Size::new(4042, 3040));
    }

    #[test]
    fn test_no_clips() {
        let config = Config::default();
        assert!(Sequencer::new(&config).sequence(Vec::new(), Vec::new()).is_err());
    }
}
