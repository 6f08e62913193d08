// FlowCompare — Amazon Connect contact-flow documents

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const FLOW_LANGUAGE_VERSION: &str = "2019-10-30";

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("failed to read flow file: {0}")]
    Read(#[from] std::io::Error),
    #[error("invalid contact flow JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A contact flow as exported by Amazon Connect.
///
/// An empty object deserializes to a flow with no actions; that is how a
/// flow that did not exist yet is represented.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ContactFlow {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub start_action: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    /// Metadata and other sections Connect adds on export.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Action {
    pub identifier: String,
    #[serde(rename = "Type")]
    pub action_type: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions: Option<Transitions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Transitions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Branch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Branch>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An error or condition branch; only the target matters here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Branch {
    #[serde(default)]
    pub next_action: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A structural problem found by [`ContactFlow::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowIssue {
    MissingStartAction,
    UnknownStartAction(String),
    DuplicateIdentifier(String),
    DanglingTransition { from: String, to: String },
}

impl std::fmt::Display for FlowIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowIssue::MissingStartAction => write!(f, "flow has actions but no StartAction"),
            FlowIssue::UnknownStartAction(id) => {
                write!(f, "StartAction '{}' does not match any action", id)
            }
            FlowIssue::DuplicateIdentifier(id) => write!(f, "duplicate action identifier '{}'", id),
            FlowIssue::DanglingTransition { from, to } => {
                write!(f, "action '{}' transitions to unknown action '{}'", from, to)
            }
        }
    }
}

impl Transitions {
    /// Every action identifier this set of transitions can lead to.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.next_action
            .iter()
            .map(String::as_str)
            .chain(self.errors.iter().map(|b| b.next_action.as_str()))
            .chain(self.conditions.iter().map(|b| b.next_action.as_str()))
            .filter(|t| !t.is_empty())
    }
}

impl ContactFlow {
    pub fn parse(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, FlowError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.start_action.is_empty()
    }

    pub fn action(&self, identifier: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.identifier == identifier)
    }

    /// Structural checks: start action, unique identifiers, transition targets.
    pub fn check(&self) -> Vec<FlowIssue> {
        let mut issues = Vec::new();
        if self.is_empty() {
            return issues;
        }

        let mut seen = HashSet::new();
        for action in &self.actions {
            if !seen.insert(action.identifier.as_str()) {
                issues.push(FlowIssue::DuplicateIdentifier(action.identifier.clone()));
            }
        }

        if self.start_action.is_empty() {
            issues.push(FlowIssue::MissingStartAction);
        } else if !seen.contains(self.start_action.as_str()) {
            issues.push(FlowIssue::UnknownStartAction(self.start_action.clone()));
        }

        for action in &self.actions {
            let Some(transitions) = &action.transitions else {
                continue;
            };
            for target in transitions.targets() {
                if !seen.contains(target) {
                    issues.push(FlowIssue::DanglingTransition {
                        from: action.identifier.clone(),
                        to: target.to_string(),
                    });
                }
            }
        }

        issues
    }

    /// Two-block flow: a welcome message followed by a disconnect.
    pub fn sample(start_id: &str, end_id: &str, welcome_text: &str) -> Self {
        let mut parameters = Map::new();
        parameters.insert("Text".into(), Value::String(welcome_text.to_string()));

        Self {
            version: FLOW_LANGUAGE_VERSION.to_string(),
            start_action: start_id.to_string(),
            actions: vec![
                Action {
                    identifier: start_id.to_string(),
                    action_type: "MessageParticipant".into(),
                    parameters,
                    transitions: Some(Transitions {
                        next_action: Some(end_id.to_string()),
                        ..Default::default()
                    }),
                    extra: Map::new(),
                },
                Action {
                    identifier: end_id.to_string(),
                    action_type: "DisconnectParticipant".into(),
                    parameters: Map::new(),
                    transitions: None,
                    extra: Map::new(),
                },
            ],
            extra: Map::new(),
        }
    }

    pub fn to_pretty_json(&self) -> Result<String, FlowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<(), FlowError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_pretty_json()?)?;
        Ok(())
    }
}

/// JSON files directly under `dir`, sorted by name. A missing directory yields none.
pub fn list_flow_files(dir: &Path) -> Result<Vec<PathBuf>, FlowError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
