/// A visualization plugin available to the pipeline.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Visualization {
    pub name: String,
    pub description: String,
}

/// The set of plugins installed in the host.
pub trait PluginRegistry: Send + Sync {
    /// Changes whenever plugins are added or removed.
    fn feature_list_cookie(&self) -> u32;
    fn visualizations(&self) -> Vec<Visualization>;
}
