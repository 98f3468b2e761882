#[macro_use]
extern crate log;

extern crate mediaplay_player;
extern crate mediaplay_traits;

pub mod dispatcher;
pub mod pipeline;
mod registry_scanner;
pub mod render;
mod tags;

use std::sync::Arc;

use once_cell::sync::OnceCell;

use mediaplay_player::list_visualizations;
use mediaplay_traits::{
    BackendInit, BusSender, Pipeline, PipelineError, PipelineFactory, PluginRegistry,
    Visualization,
};

pub use dispatcher::MainContextDispatcher;
pub use pipeline::GStreamerPipeline;
pub use registry_scanner::GStreamerRegistry;
pub use render::VideoOverlayRenderer;

static GST_INIT: OnceCell<Result<(), String>> = OnceCell::new();

fn ensure_initialized() -> Result<(), PipelineError> {
    GST_INIT
        .get_or_init(|| gst::init().map_err(|e| e.to_string()))
        .clone()
        .map_err(|e| PipelineError::new(format!("GStreamer initialization failed: {}", e)))
}

/// Visualization plugins installed in the GStreamer registry.
pub fn visualizations() -> Result<Vec<Visualization>, PipelineError> {
    ensure_initialized()?;
    Ok(list_visualizations(&GStreamerRegistry))
}

pub struct GStreamerBackend {
    registry: Arc<GStreamerRegistry>,
}

impl BackendInit for GStreamerBackend {
    fn init() -> Result<GStreamerBackend, PipelineError> {
        ensure_initialized()?;
        Ok(GStreamerBackend {
            registry: Arc::new(GStreamerRegistry),
        })
    }

    fn registry(&self) -> Arc<dyn PluginRegistry> {
        self.registry.clone()
    }
}

impl PipelineFactory for GStreamerBackend {
    fn create_pipeline(&self, bus: BusSender) -> Result<Arc<dyn Pipeline>, PipelineError> {
        // Check that we actually have the elements that we
        // need to make this work.
        for element in ["playbin"] {
            if gst::ElementFactory::find(element).is_none() {
                return Err(PipelineError::new(format!(
                    "Missing dependency: {}",
                    element
                )));
            }
        }
        Ok(Arc::new(GStreamerPipeline::new(bus)?))
    }
}
