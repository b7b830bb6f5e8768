//! Utility functions for working with artifacts.
//!
//! Stored `Artifact`s are assigned their `id`/`index`/`timestamp` by
//! `executor::commit_artifact`, not by processor code — a processor only
//! ever builds the `ArtifactSignal` it yields. These helpers build that
//! signal; [`get_artifact_text`] reads back from the stored form.

use crate::producer::ArtifactSignal;
use crate::types::{Artifact, Part};
use crate::utils::parts::get_text_parts;
use serde_json::Value;

/// Builds a signal for a brand-new artifact at the task's next free slot.
///
/// # Example
///
/// ```
/// use a2a_engine::types::Part;
/// use a2a_engine::utils::new_artifact_signal;
///
/// let parts = vec![
///     Part::Text { text: "Sample text".to_string(), metadata: None },
/// ];
/// let signal = new_artifact_signal(parts, "My Artifact", Some("This is a test artifact."));
/// assert_eq!(signal.name, Some("My Artifact".to_string()));
/// ```
pub fn new_artifact_signal(
    parts: Vec<Part>,
    name: impl Into<String>,
    description: Option<impl Into<String>>,
) -> ArtifactSignal {
    ArtifactSignal {
        name: Some(name.into()),
        description: description.map(|d| d.into()),
        parts,
        metadata: None,
        index: None,
        append: false,
        last_chunk: None,
    }
}

/// Builds a single-text-Part artifact signal.
///
/// # Example
///
/// ```
/// use a2a_engine::utils::new_text_artifact_signal;
///
/// let signal = new_text_artifact_signal("Text Artifact", "Hello, world!", Some("A greeting"));
/// assert_eq!(signal.name, Some("Text Artifact".to_string()));
/// ```
pub fn new_text_artifact_signal(
    name: impl Into<String>,
    text: impl Into<String>,
    description: Option<impl Into<String>>,
) -> ArtifactSignal {
    let part = Part::Text { text: text.into(), metadata: None };
    new_artifact_signal(vec![part], name, description)
}

/// Builds a single-data-Part artifact signal.
///
/// # Example
///
/// ```
/// use a2a_engine::utils::new_data_artifact_signal;
/// use serde_json::json;
///
/// let data = json!({"key": "value", "number": 123});
/// let signal = new_data_artifact_signal("Data Artifact", data, Some("Sample data"));
/// assert_eq!(signal.name, Some("Data Artifact".to_string()));
/// ```
pub fn new_data_artifact_signal(
    name: impl Into<String>,
    data: Value,
    description: Option<impl Into<String>>,
) -> ArtifactSignal {
    let part = Part::Data { data, metadata: None };
    new_artifact_signal(vec![part], name, description)
}

/// Extracts and joins all text content from a stored Artifact's parts.
///
/// # Example
///
/// ```
/// use a2a_engine::types::{Artifact, Part};
/// use a2a_engine::utils::get_artifact_text;
///
/// let artifact = Artifact {
///     id: "a1".into(),
///     index: 0,
///     name: Some("Multi-line".into()),
///     description: None,
///     parts: vec![
///         Part::Text { text: "First line".to_string(), metadata: None },
///         Part::Text { text: "Second line".to_string(), metadata: None },
///     ],
///     metadata: None,
///     timestamp: "now".into(),
/// };
/// let text = get_artifact_text(&artifact, "\n");
/// assert_eq!(text, "First line\nSecond line");
/// ```
pub fn get_artifact_text(artifact: &Artifact, delimiter: &str) -> String {
    get_text_parts(&artifact.parts).join(delimiter)
}
