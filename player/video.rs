use mediaplay_traits::{Pipeline, VideoSink};

/// Supplies the pipeline with somewhere to draw video.
///
/// Called once on the player thread, before the pipeline is used.
/// Renderers that draw through the pipeline's own sink (for instance by
/// binding a window handle) return `None`.
pub trait VideoRenderer: Send {
    fn create_video_sink(&self, pipeline: &dyn Pipeline) -> Option<VideoSink>;
}
