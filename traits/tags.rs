use std::collections::BTreeMap;

pub const TITLE: &str = "title";
pub const TITLE_SORTNAME: &str = "title-sortname";
pub const CONTAINER_FORMAT: &str = "container-format";
pub const IMAGE: &str = "image";
pub const PREVIEW_IMAGE: &str = "preview-image";
pub const BITRATE: &str = "bitrate";
pub const MAXIMUM_BITRATE: &str = "maximum-bitrate";
pub const NOMINAL_BITRATE: &str = "nominal-bitrate";
pub const LANGUAGE_NAME: &str = "language-name";
pub const LANGUAGE_CODE: &str = "language-code";
pub const VIDEO_CODEC: &str = "video-codec";
pub const AUDIO_CODEC: &str = "audio-codec";
pub const SUBTITLE_CODEC: &str = "subtitle-codec";
pub const CODEC: &str = "codec";

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TagScope {
    Stream,
    Global,
}

/// Encoded media payload carried by a tag, such as cover art.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Sample {
    pub mime: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum TagValue {
    Str(String),
    UInt(u32),
    Sample(Sample),
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TagList {
    scope: TagScope,
    entries: BTreeMap<String, TagValue>,
}

impl Default for TagList {
    fn default() -> Self {
        TagList::new(TagScope::Stream)
    }
}

impl TagList {
    pub fn new(scope: TagScope) -> TagList {
        TagList {
            scope,
            entries: BTreeMap::new(),
        }
    }

    pub fn scope(&self) -> TagScope {
        self.scope
    }

    pub fn set_scope(&mut self, scope: TagScope) {
        self.scope = scope;
    }

    pub fn insert<S: Into<String>>(&mut self, name: S, value: TagValue) {
        self.entries.insert(name.into(), value);
    }

    /// Builder flavour of [`TagList::insert`].
    pub fn with<S: Into<String>>(mut self, name: S, value: TagValue) -> TagList {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TagValue> {
        self.entries.get(name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.entries.get(name) {
            Some(TagValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn uint(&self, name: &str) -> Option<u32> {
        match self.entries.get(name) {
            Some(TagValue::UInt(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn sample(&self, name: &str) -> Option<&Sample> {
        match self.entries.get(name) {
            Some(TagValue::Sample(s)) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
