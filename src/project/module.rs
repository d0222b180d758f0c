//! Content module variant set.
//!
//! An idea's document is an ordered list of [`IdeaModule`]s. Every variant owns
//! an opaque payload (text or a media handle the core never interprets) and is
//! immutable-by-replacement: edits produce a new module via `with_payload`.

use std::fmt;

use automerge::{ScalarValue, Value as AmValue};
use autosurgeon::reconcile::{MapReconciler, NoKey};
use autosurgeon::{Hydrate, HydrateError, ReadDoc, Reconcile, Reconciler};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::document::{read_payload, warn_unknown_fields};
use crate::error::{CreativeError, CreativeResult};

// =============================================================================
// DOCUMENT KEYS
// =============================================================================

pub(crate) const KIND_KEY: &str = "kind";
pub(crate) const TEXT_KEY: &str = "text";
pub(crate) const IMAGE_REF_KEY: &str = "imageRef";
pub(crate) const CAPTION_KEY: &str = "caption";
pub(crate) const VIDEO_REF_KEY: &str = "videoRef";
pub(crate) const AUDIO_REF_KEY: &str = "audioRef";
pub(crate) const SHEET_REF_KEY: &str = "sheetRef";

/// Every payload key any variant may write. Used to clear stale keys when a
/// list slot changes variant in the replica.
const PAYLOAD_KEYS: [&str; 6] = [
    TEXT_KEY,
    IMAGE_REF_KEY,
    CAPTION_KEY,
    VIDEO_REF_KEY,
    AUDIO_REF_KEY,
    SHEET_REF_KEY,
];

// Older documents used these names before the `*Ref` convention.
const LEGACY_TEXT_KEY: &str = "desc";
const LEGACY_IMAGE_KEY: &str = "image";
const LEGACY_SHEET_KEY: &str = "sheet";
const LEGACY_URI_KEY: &str = "uri";

// =============================================================================
// MODULE KIND
// =============================================================================

/// Discriminant carried through serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Text,
    Image,
    Video,
    Audio,
    SheetMusic,
}

impl ModuleKind {
    /// All kinds, in the order the app offers them.
    pub const ALL: [ModuleKind; 5] = [
        ModuleKind::Text,
        ModuleKind::Image,
        ModuleKind::Video,
        ModuleKind::Audio,
        ModuleKind::SheetMusic,
    ];

    /// The wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Text => "text",
            ModuleKind::Image => "image",
            ModuleKind::Video => "video",
            ModuleKind::Audio => "audio",
            ModuleKind::SheetMusic => "sheetmusic",
        }
    }

    /// Parses a wire tag. Unknown tags return `None`; callers turn that into a
    /// decode error rather than picking a default.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(ModuleKind::Text),
            "image" => Some(ModuleKind::Image),
            "video" => Some(ModuleKind::Video),
            "audio" => Some(ModuleKind::Audio),
            "sheetmusic" => Some(ModuleKind::SheetMusic),
            _ => None,
        }
    }

    fn known_keys(&self) -> &'static [&'static str] {
        match self {
            ModuleKind::Text => &[KIND_KEY, TEXT_KEY, LEGACY_TEXT_KEY],
            ModuleKind::Image => &[KIND_KEY, IMAGE_REF_KEY, CAPTION_KEY, LEGACY_IMAGE_KEY],
            ModuleKind::Video => &[KIND_KEY, VIDEO_REF_KEY, LEGACY_URI_KEY],
            ModuleKind::Audio => &[KIND_KEY, AUDIO_REF_KEY, LEGACY_URI_KEY],
            ModuleKind::SheetMusic => &[KIND_KEY, SHEET_REF_KEY, LEGACY_SHEET_KEY],
        }
    }

    /// Keys that identify this kind in an untagged legacy document.
    fn marker_keys(&self) -> &'static [&'static str] {
        match self {
            ModuleKind::Text => &[TEXT_KEY, LEGACY_TEXT_KEY],
            ModuleKind::Image => &[IMAGE_REF_KEY, LEGACY_IMAGE_KEY],
            ModuleKind::Video => &[VIDEO_REF_KEY],
            ModuleKind::Audio => &[AUDIO_REF_KEY],
            ModuleKind::SheetMusic => &[SHEET_REF_KEY, LEGACY_SHEET_KEY],
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// VARIANT PAYLOADS
// =============================================================================

/// Free-form text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextModule {
    text: String,
}

impl TextModule {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// An image handle plus its caption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageModule {
    image_ref: String,
    caption: String,
}

impl ImageModule {
    pub fn new(image_ref: impl Into<String>) -> Self {
        Self {
            image_ref: image_ref.into(),
            caption: String::new(),
        }
    }

    /// Builder: Set caption.
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn image_ref(&self) -> &str {
        &self.image_ref
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }
}

/// A video handle (filesystem URI or remote blob reference).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoModule {
    video_ref: String,
}

impl VideoModule {
    pub fn new(video_ref: impl Into<String>) -> Self {
        Self {
            video_ref: video_ref.into(),
        }
    }

    pub fn video_ref(&self) -> &str {
        &self.video_ref
    }
}

/// A recorded audio handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioModule {
    audio_ref: String,
}

impl AudioModule {
    pub fn new(audio_ref: impl Into<String>) -> Self {
        Self {
            audio_ref: audio_ref.into(),
        }
    }

    pub fn audio_ref(&self) -> &str {
        &self.audio_ref
    }
}

/// A sheet-music handle (MusicXML asset).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetMusicModule {
    sheet_ref: String,
}

impl SheetMusicModule {
    pub fn new(sheet_ref: impl Into<String>) -> Self {
        Self {
            sheet_ref: sheet_ref.into(),
        }
    }

    pub fn sheet_ref(&self) -> &str {
        &self.sheet_ref
    }
}

// =============================================================================
// IDEA MODULE
// =============================================================================

/// One content block inside an idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub enum IdeaModule {
    Text(TextModule),
    Image(ImageModule),
    Video(VideoModule),
    Audio(AudioModule),
    SheetMusic(SheetMusicModule),
}

impl Default for IdeaModule {
    /// A blank text block, the app's "new module" placeholder.
    fn default() -> Self {
        IdeaModule::Text(TextModule::default())
    }
}

impl IdeaModule {
    pub fn text(text: impl Into<String>) -> Self {
        IdeaModule::Text(TextModule::new(text))
    }

    pub fn image(image_ref: impl Into<String>, caption: impl Into<String>) -> Self {
        IdeaModule::Image(ImageModule::new(image_ref).with_caption(caption))
    }

    pub fn video(video_ref: impl Into<String>) -> Self {
        IdeaModule::Video(VideoModule::new(video_ref))
    }

    pub fn audio(audio_ref: impl Into<String>) -> Self {
        IdeaModule::Audio(AudioModule::new(audio_ref))
    }

    pub fn sheet_music(sheet_ref: impl Into<String>) -> Self {
        IdeaModule::SheetMusic(SheetMusicModule::new(sheet_ref))
    }

    /// An empty module of the given kind.
    pub fn empty(kind: ModuleKind) -> Self {
        match kind {
            ModuleKind::Text => IdeaModule::Text(TextModule::default()),
            ModuleKind::Image => IdeaModule::Image(ImageModule::default()),
            ModuleKind::Video => IdeaModule::Video(VideoModule::default()),
            ModuleKind::Audio => IdeaModule::Audio(AudioModule::default()),
            ModuleKind::SheetMusic => IdeaModule::SheetMusic(SheetMusicModule::default()),
        }
    }

    pub fn kind(&self) -> ModuleKind {
        match self {
            IdeaModule::Text(_) => ModuleKind::Text,
            IdeaModule::Image(_) => ModuleKind::Image,
            IdeaModule::Video(_) => ModuleKind::Video,
            IdeaModule::Audio(_) => ModuleKind::Audio,
            IdeaModule::SheetMusic(_) => ModuleKind::SheetMusic,
        }
    }

    /// The primary payload: the text, or the media handle.
    pub fn payload(&self) -> &str {
        match self {
            IdeaModule::Text(m) => m.text(),
            IdeaModule::Image(m) => m.image_ref(),
            IdeaModule::Video(m) => m.video_ref(),
            IdeaModule::Audio(m) => m.audio_ref(),
            IdeaModule::SheetMusic(m) => m.sheet_ref(),
        }
    }

    /// Returns a new module of the same kind with the primary payload replaced.
    /// An image keeps its caption.
    pub fn with_payload(&self, payload: impl Into<String>) -> Self {
        let payload = payload.into();
        match self {
            IdeaModule::Text(_) => IdeaModule::Text(TextModule::new(payload)),
            IdeaModule::Image(m) => {
                IdeaModule::Image(ImageModule::new(payload).with_caption(m.caption()))
            }
            IdeaModule::Video(_) => IdeaModule::Video(VideoModule::new(payload)),
            IdeaModule::Audio(_) => IdeaModule::Audio(AudioModule::new(payload)),
            IdeaModule::SheetMusic(_) => IdeaModule::SheetMusic(SheetMusicModule::new(payload)),
        }
    }

    /// Encodes as `{kind, ...kind-specific fields}`.
    pub fn to_document(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(KIND_KEY.to_string(), Value::from(self.kind().as_str()));
        match self {
            IdeaModule::Text(m) => {
                obj.insert(TEXT_KEY.to_string(), Value::from(m.text()));
            }
            IdeaModule::Image(m) => {
                obj.insert(IMAGE_REF_KEY.to_string(), Value::from(m.image_ref()));
                obj.insert(CAPTION_KEY.to_string(), Value::from(m.caption()));
            }
            IdeaModule::Video(m) => {
                obj.insert(VIDEO_REF_KEY.to_string(), Value::from(m.video_ref()));
            }
            IdeaModule::Audio(m) => {
                obj.insert(AUDIO_REF_KEY.to_string(), Value::from(m.audio_ref()));
            }
            IdeaModule::SheetMusic(m) => {
                obj.insert(SHEET_REF_KEY.to_string(), Value::from(m.sheet_ref()));
            }
        }
        Value::Object(obj)
    }

    /// Decodes a module at `path` (e.g. `ideas[0].modules[3]`).
    ///
    /// An explicit `kind` always wins. Field presence is only consulted when the
    /// tag is absent, and an ambiguous or empty shape is an error.
    pub fn from_document(value: &Value, path: &str) -> CreativeResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| CreativeError::decode(path, "module is not an object"))?;

        let kind = match obj.get(KIND_KEY) {
            Some(Value::String(tag)) => ModuleKind::parse(tag).ok_or_else(|| {
                CreativeError::decode(path, format!("unknown module kind '{}'", tag))
            })?,
            Some(other) => {
                return Err(CreativeError::decode(
                    path,
                    format!("module kind must be a string, found {}", other),
                ))
            }
            None => infer_kind(obj, path)?,
        };

        warn_unknown_fields(obj, kind.known_keys(), path);

        let module = match kind {
            ModuleKind::Text => IdeaModule::text(read_payload(
                obj,
                &[TEXT_KEY, LEGACY_TEXT_KEY],
                path,
            )?),
            ModuleKind::Image => IdeaModule::image(
                read_payload(obj, &[IMAGE_REF_KEY, LEGACY_IMAGE_KEY], path)?,
                read_payload(obj, &[CAPTION_KEY], path)?,
            ),
            ModuleKind::Video => IdeaModule::video(read_payload(
                obj,
                &[VIDEO_REF_KEY, LEGACY_URI_KEY],
                path,
            )?),
            ModuleKind::Audio => IdeaModule::audio(read_payload(
                obj,
                &[AUDIO_REF_KEY, LEGACY_URI_KEY],
                path,
            )?),
            ModuleKind::SheetMusic => IdeaModule::sheet_music(read_payload(
                obj,
                &[SHEET_REF_KEY, LEGACY_SHEET_KEY],
                path,
            )?),
        };
        Ok(module)
    }
}

/// Fallback classification for untagged documents.
fn infer_kind(obj: &Map<String, Value>, path: &str) -> CreativeResult<ModuleKind> {
    let matches: Vec<ModuleKind> = ModuleKind::ALL
        .iter()
        .copied()
        .filter(|kind| kind.marker_keys().iter().any(|k| obj.contains_key(*k)))
        .collect();

    match matches.as_slice() {
        [kind] => Ok(*kind),
        [] if obj.contains_key(LEGACY_URI_KEY) => Err(CreativeError::decode(
            path,
            "untagged 'uri' module is ambiguous (video or audio)",
        )),
        [] => Err(CreativeError::decode(path, "missing module kind")),
        many => Err(CreativeError::decode(
            path,
            format!(
                "untagged module matches several kinds: {}",
                many.iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        )),
    }
}

impl From<IdeaModule> for Value {
    fn from(module: IdeaModule) -> Self {
        module.to_document()
    }
}

impl TryFrom<Value> for IdeaModule {
    type Error = CreativeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        IdeaModule::from_document(&value, "module")
    }
}

// =============================================================================
// REPLICA MAPPING
// =============================================================================

/// Writes `{kind, fields}` into the replica and deletes payload keys that
/// belong to other variants, so a slot that changes kind carries no stale data.
impl Reconcile for IdeaModule {
    type Key<'a> = NoKey;

    fn reconcile<R: Reconciler>(&self, mut reconciler: R) -> Result<(), R::Error> {
        let mut m = reconciler.map()?;
        m.put(KIND_KEY, self.kind().as_str().to_string())?;

        let fields: Vec<(&str, &str)> = match self {
            IdeaModule::Text(t) => vec![(TEXT_KEY, t.text())],
            IdeaModule::Image(i) => vec![(IMAGE_REF_KEY, i.image_ref()), (CAPTION_KEY, i.caption())],
            IdeaModule::Video(v) => vec![(VIDEO_REF_KEY, v.video_ref())],
            IdeaModule::Audio(a) => vec![(AUDIO_REF_KEY, a.audio_ref())],
            IdeaModule::SheetMusic(s) => vec![(SHEET_REF_KEY, s.sheet_ref())],
        };

        for key in PAYLOAD_KEYS {
            match fields.iter().find(|(k, _)| *k == key) {
                Some((_, value)) => m.put(key, value.to_string())?,
                None => {
                    let _ = m.delete(key);
                }
            }
        }
        Ok(())
    }
}

impl Hydrate for IdeaModule {
    fn hydrate_map<D: ReadDoc>(doc: &D, obj: &automerge::ObjId) -> Result<Self, HydrateError> {
        // Missing keys hydrate as empty strings.
        fn hydrate_str<D: ReadDoc>(
            doc: &D,
            obj: &automerge::ObjId,
            key: &str,
        ) -> Result<String, HydrateError> {
            match doc.get(obj, key)? {
                Some((AmValue::Scalar(s), _)) => match s.as_ref() {
                    ScalarValue::Str(st) => Ok(st.to_string()),
                    _ => Ok(String::new()),
                },
                _ => Ok(String::new()),
            }
        }

        let tag = hydrate_str(doc, obj, KIND_KEY)?;
        let kind = ModuleKind::parse(&tag)
            .ok_or_else(|| HydrateError::unexpected("a module kind tag", tag.clone()))?;

        Ok(match kind {
            ModuleKind::Text => IdeaModule::text(hydrate_str(doc, obj, TEXT_KEY)?),
            ModuleKind::Image => IdeaModule::image(
                hydrate_str(doc, obj, IMAGE_REF_KEY)?,
                hydrate_str(doc, obj, CAPTION_KEY)?,
            ),
            ModuleKind::Video => IdeaModule::video(hydrate_str(doc, obj, VIDEO_REF_KEY)?),
            ModuleKind::Audio => IdeaModule::audio(hydrate_str(doc, obj, AUDIO_REF_KEY)?),
            ModuleKind::SheetMusic => {
                IdeaModule::sheet_music(hydrate_str(doc, obj, SHEET_REF_KEY)?)
            }
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
