use std::sync::Mutex;

use once_cell::sync::Lazy;

use mediaplay_traits::{PluginRegistry, Visualization};

struct CachedList {
    cookie: u32,
    visualizations: Vec<Visualization>,
}

/// Visualization plugins, rescanned only when the registry reports a
/// change in its feature list.
pub struct VisualizationCache {
    cached: Mutex<Option<CachedList>>,
}

impl VisualizationCache {
    pub fn new() -> VisualizationCache {
        VisualizationCache {
            cached: Mutex::new(None),
        }
    }

    pub fn get(&self, registry: &dyn PluginRegistry) -> Vec<Visualization> {
        let cookie = registry.feature_list_cookie();
        let mut cached = self.cached.lock().unwrap();
        match cached.as_ref() {
            Some(list) if list.cookie == cookie => {}
            _ => {
                debug!("Rescanning visualizations (registry cookie {})", cookie);
                *cached = Some(CachedList {
                    cookie,
                    visualizations: registry.visualizations(),
                });
            }
        }
        cached
            .as_ref()
            .map(|list| list.visualizations.clone())
            .unwrap_or_default()
    }
}

static VISUALIZATIONS: Lazy<VisualizationCache> = Lazy::new(VisualizationCache::new);

/// Visualization plugins available in `registry`, served from a
/// process-wide cache.
pub fn list_visualizations(registry: &dyn PluginRegistry) -> Vec<Visualization> {
    VISUALIZATIONS.get(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    struct CountingRegistry {
        cookie: AtomicU32,
        scans: AtomicUsize,
    }

    impl PluginRegistry for CountingRegistry {
        fn feature_list_cookie(&self) -> u32 {
            self.cookie.load(Ordering::SeqCst)
        }

        fn visualizations(&self) -> Vec<Visualization> {
            let scan = self.scans.fetch_add(1, Ordering::SeqCst);
            vec![Visualization {
                name: format!("goom{}", scan),
                description: "Takes frames of data and draws pretty pictures".into(),
            }]
        }
    }

    #[test]
    fn rescans_only_when_cookie_changes() {
        let registry = CountingRegistry {
            cookie: AtomicU32::new(7),
            scans: AtomicUsize::new(0),
        };
        let cache = VisualizationCache::new();

        assert_eq!(cache.get(&registry)[0].name, "goom0");
        assert_eq!(cache.get(&registry)[0].name, "goom0");
        assert_eq!(registry.scans.load(Ordering::SeqCst), 1);

        registry.cookie.store(8, Ordering::SeqCst);
        assert_eq!(cache.get(&registry)[0].name, "goom1");
        assert_eq!(registry.scans.load(Ordering::SeqCst), 2);
    }
}
