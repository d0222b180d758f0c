//! Serialization layer between the object graph and plain JSON documents.
//!
//! Document shape:
//!
//! ```text
//! {
//!   "title": "...", "category": "Music", "isPublic": false,
//!   "ideas": [ { "title": "...", "modules": [ { "kind": "text", "text": "..." } ] } ],
//!   "lastEdited": "2025-04-01T12:00:00Z"
//! }
//! ```
//!
//! Unknown fields are dropped with a `warn` event at every level. `lastEdited`
//! is not part of [`Project`]; the write path attaches it.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use super::model::{Category, Idea, Project};
use super::module::IdeaModule;
use crate::error::{CreativeError, CreativeResult};

pub const TITLE_KEY: &str = "title";
pub const CATEGORY_KEY: &str = "category";
pub const IS_PUBLIC_KEY: &str = "isPublic";
pub const IDEAS_KEY: &str = "ideas";
pub const MODULES_KEY: &str = "modules";
pub const LAST_EDITED_KEY: &str = "lastEdited";

const LEGACY_IS_PUBLIC_KEY: &str = "is_public";

const PROJECT_KEYS: [&str; 6] = [
    TITLE_KEY,
    CATEGORY_KEY,
    IS_PUBLIC_KEY,
    LEGACY_IS_PUBLIC_KEY,
    IDEAS_KEY,
    LAST_EDITED_KEY,
];
const IDEA_KEYS: [&str; 2] = [TITLE_KEY, MODULES_KEY];

// =============================================================================
// ENCODE
// =============================================================================

/// Encodes a project without a `lastEdited` marker.
pub fn encode_project(project: &Project) -> Value {
    let mut obj = Map::new();
    obj.insert(TITLE_KEY.to_string(), Value::from(project.title()));
    obj.insert(
        CATEGORY_KEY.to_string(),
        Value::from(project.category().as_str()),
    );
    obj.insert(IS_PUBLIC_KEY.to_string(), Value::Bool(project.is_public()));
    obj.insert(
        IDEAS_KEY.to_string(),
        Value::Array(project.ideas().iter().map(encode_idea).collect()),
    );
    Value::Object(obj)
}

pub fn encode_idea(idea: &Idea) -> Value {
    let mut obj = Map::new();
    obj.insert(TITLE_KEY.to_string(), Value::from(idea.title()));
    obj.insert(
        MODULES_KEY.to_string(),
        Value::Array(idea.modules().iter().map(IdeaModule::to_document).collect()),
    );
    Value::Object(obj)
}

/// Returns `document` with its `lastEdited` marker set to `at` (RFC 3339).
pub fn with_last_edited(mut document: Value, at: DateTime<Utc>) -> Value {
    if let Value::Object(ref mut obj) = document {
        obj.insert(LAST_EDITED_KEY.to_string(), Value::from(at.to_rfc3339()));
    }
    document
}

// =============================================================================
// DECODE
// =============================================================================

pub fn decode_project(value: &Value) -> CreativeResult<Project> {
    let obj = value
        .as_object()
        .ok_or_else(|| CreativeError::decode("$", "project is not an object"))?;
    warn_unknown_fields(obj, &PROJECT_KEYS, "$");

    let title = match obj.get(TITLE_KEY) {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(CreativeError::decode(TITLE_KEY, "title must be a string")),
        None => return Err(CreativeError::decode(TITLE_KEY, "missing project title")),
    };

    let category = match obj.get(CATEGORY_KEY) {
        None | Some(Value::Null) => Category::Uncategorized,
        Some(Value::String(label)) => Category::parse(label).ok_or_else(|| {
            CreativeError::decode(CATEGORY_KEY, format!("unknown category '{}'", label))
        })?,
        Some(_) => {
            return Err(CreativeError::decode(
                CATEGORY_KEY,
                "category must be a string",
            ))
        }
    };

    let is_public = match obj.get(IS_PUBLIC_KEY).or_else(|| obj.get(LEGACY_IS_PUBLIC_KEY)) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            return Err(CreativeError::decode(
                IS_PUBLIC_KEY,
                "isPublic must be a boolean",
            ))
        }
    };

    let ideas = match obj.get(IDEAS_KEY) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| decode_idea(item, &format!("{}[{}]", IDEAS_KEY, i)))
            .collect::<CreativeResult<Vec<_>>>()?,
        Some(_) => return Err(CreativeError::decode(IDEAS_KEY, "ideas must be an array")),
    };

    Ok(Project::new(title)
        .with_category(category)
        .with_public(is_public)
        .with_ideas(ideas))
}

/// Decodes one idea at `path`. Early documents stored ideas as bare strings;
/// those become an idea with that title and no modules.
pub fn decode_idea(value: &Value, path: &str) -> CreativeResult<Idea> {
    let obj = match value {
        Value::String(title) => return Ok(Idea::new(title.clone())),
        Value::Object(obj) => obj,
        _ => return Err(CreativeError::decode(path, "idea is not an object")),
    };
    warn_unknown_fields(obj, &IDEA_KEYS, path);

    let title = match obj.get(TITLE_KEY) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(CreativeError::decode(
                format!("{}.{}", path, TITLE_KEY),
                "title must be a string",
            ))
        }
    };

    let modules = match obj.get(MODULES_KEY) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                IdeaModule::from_document(item, &format!("{}.{}[{}]", path, MODULES_KEY, i))
            })
            .collect::<CreativeResult<Vec<_>>>()?,
        Some(_) => {
            return Err(CreativeError::decode(
                format!("{}.{}", path, MODULES_KEY),
                "modules must be an array",
            ))
        }
    };

    Ok(Idea::with_modules(title, modules))
}

/// Reads the `lastEdited` marker: an RFC 3339 string, epoch milliseconds, or a
/// timestamp object (`{seconds, nanoseconds}`, also with leading underscores).
pub fn last_edited(document: &Value) -> Option<DateTime<Utc>> {
    match document.get(LAST_EDITED_KEY)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => match n.as_i64() {
            Some(ms) => Utc.timestamp_millis_opt(ms).single(),
            None => n.as_f64().and_then(millis_from_f64),
        },
        Value::Object(obj) => {
            let seconds = obj.get("seconds").or_else(|| obj.get("_seconds"))?.as_i64()?;
            let nanos = match obj.get("nanoseconds").or_else(|| obj.get("_nanoseconds")) {
                Some(v) => u32::try_from(v.as_u64()?).ok()?,
                None => 0,
            };
            Utc.timestamp_opt(seconds, nanos).single()
        }
        _ => None,
    }
}

fn millis_from_f64(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    let whole = ms.floor();
    let nanos = ((ms - whole) * 1_000_000.0).round() as u32;
    let base = Utc.timestamp_millis_opt(whole as i64).single()?;
    base.checked_add_signed(chrono::Duration::nanoseconds(i64::from(nanos)))
}

// =============================================================================
// HELPERS
// =============================================================================

/// Reads the first present key of `keys` as a string payload. Missing means
/// empty; a non-string value is malformed.
pub(crate) fn read_payload(
    obj: &Map<String, Value>,
    keys: &[&str],
    path: &str,
) -> CreativeResult<String> {
    for key in keys {
        match obj.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => return Ok(s.clone()),
            Some(other) => {
                return Err(CreativeError::decode(
                    format!("{}.{}", path, key),
                    format!("expected a string, found {}", other),
                ))
            }
        }
    }
    Ok(String::new())
}

pub(crate) fn warn_unknown_fields(obj: &Map<String, Value>, known: &[&str], path: &str) {
    for key in obj.keys() {
        if !known.contains(&key.as_str()) {
            tracing::warn!(path = %path, field = %key, "dropping unknown document field");
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
