use gst::prelude::*;

use mediaplay_traits::{PluginRegistry, Visualization};

// The GStreamer registry holds the metadata of the set of plugins available in the host.
// Its feature list cookie changes whenever plugins are added or removed, which lets the
// player cache what it derives from the registry.
pub struct GStreamerRegistry;

impl PluginRegistry for GStreamerRegistry {
    fn feature_list_cookie(&self) -> u32 {
        gst::Registry::get().feature_list_cookie()
    }

    fn visualizations(&self) -> Vec<Visualization> {
        let factories = gst::ElementFactory::factories_with_type(
            gst::ElementFactoryType::VISUALIZATION,
            gst::Rank::NONE,
        );
        factories
            .iter()
            .filter(|factory| is_visualization(factory))
            .map(|factory| Visualization {
                name: factory.name().to_string(),
                description: factory
                    .metadata(gst::ELEMENT_METADATA_DESCRIPTION)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect()
    }
}

fn is_visualization(factory: &gst::ElementFactory) -> bool {
    factory
        .metadata(gst::ELEMENT_METADATA_KLASS)
        .map_or(false, |klass| klass.contains("Visualization"))
}
