use glib::prelude::*;
use gst_video::prelude::*;

use mediaplay_player::video::VideoRenderer;
use mediaplay_traits::{Pipeline, VideoSink};

/// Renders into a native window through the `GstVideoOverlay` interface.
pub struct VideoOverlayRenderer {
    window_handle: usize,
    sink_factory: String,
    render_rectangle: Option<(i32, i32, i32, i32)>,
}

impl VideoOverlayRenderer {
    /// `window_handle` is the platform window id (an XID, HWND or NSView).
    pub fn new(window_handle: usize) -> Self {
        VideoOverlayRenderer {
            window_handle,
            sink_factory: "glimagesink".to_owned(),
            render_rectangle: None,
        }
    }

    /// Uses `factory` instead of `glimagesink`. The element must implement
    /// `GstVideoOverlay`.
    pub fn with_sink_factory(mut self, factory: &str) -> Self {
        self.sink_factory = factory.to_owned();
        self
    }

    /// Limits rendering to a part of the window.
    pub fn with_render_rectangle(mut self, x: i32, y: i32, width: i32, height: i32) -> Self {
        self.render_rectangle = Some((x, y, width, height));
        self
    }
}

impl VideoRenderer for VideoOverlayRenderer {
    fn create_video_sink(&self, _pipeline: &dyn Pipeline) -> Option<VideoSink> {
        let sink = match gst::ElementFactory::make(&self.sink_factory).build() {
            Ok(sink) => sink,
            Err(error) => {
                warn!("{} creation failed: {:?}", self.sink_factory, error);
                return None;
            }
        };

        let overlay = match sink.dynamic_cast_ref::<gst_video::VideoOverlay>() {
            Some(overlay) => overlay,
            None => {
                warn!("{} does not implement GstVideoOverlay", self.sink_factory);
                return None;
            }
        };
        unsafe {
            overlay.set_window_handle(self.window_handle);
        }
        if let Some((x, y, width, height)) = self.render_rectangle {
            if overlay.set_render_rectangle(x, y, width, height).is_err() {
                warn!("Could not set render rectangle");
            }
        }

        Some(Box::new(sink))
    }
}
