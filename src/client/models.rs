use serde::{Deserialize, Deserializer, Serialize};

/// Branch used when the caller does not name one
pub const DEFAULT_BRANCH: &str = "master";

/// One test-suite execution on the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub run_id: String,
    pub project_id: Option<String>,
    pub suite_id: Option<String>,
    pub branch_name: String,
    #[serde(default)]
    pub disabled: bool,
}

/// Body of `POST runs`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRunRequest<'a> {
    pub branch_name: &'a str,
    pub project_name: &'a str,
    pub suite_name: &'a str,
}

/// Response of `POST runs`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRun {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub project_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub suite_id: Option<String>,
    #[serde(default)]
    pub branch_name: Option<String>,
}

/// Axis-aligned region in pixels; may go negative once re-based onto an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rectangle {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self { x, y, width, height }
    }

    /// Moves the rectangle into the coordinate space whose origin is `origin`'s corner
    pub fn relative_to(&self, origin: &Rectangle) -> Rectangle {
        Rectangle {
            x: self.x - origin.x,
            y: self.y - origin.y,
            width: self.width,
            height: self.height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The `mask` part of a screenshot upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mask {
    pub exclude_zones: Vec<Rectangle>,
}

impl Mask {
    pub fn is_empty(&self) -> bool {
        self.exclude_zones.is_empty()
    }
}

/// Response of `GET runs/{runId}/analysis`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunAnalysis {
    pub diffs: Vec<Diff>,
}

/// A single screenshot verdict within an analysis
#[derive(Debug, Clone, Deserialize)]
pub struct Diff {
    #[serde(default)]
    pub after: Option<DiffScreenshot>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffScreenshot {
    #[serde(default)]
    pub screenshot_name: String,
}

/// Accepts ids sent either as JSON numbers or strings
fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<IdRepr>::deserialize(deserializer)? {
        Some(IdRepr::Number(n)) => Some(n.to_string()),
        Some(IdRepr::Text(s)) if !s.is_empty() => Some(s),
        _ => None,
    })
}
