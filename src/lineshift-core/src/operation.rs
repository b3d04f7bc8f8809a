//! Edit operations and batches.
//!
//! Operations arrive as JSON from an issuer that only saw the buffer before the
//! batch began, so every line field is in that original frame. Line fields are
//! kept loosely typed until application: a missing or non-numeric line must
//! fail the one operation that carries it, not the whole batch.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buffer::BufferId;
use crate::error::{EditError, EditResult};

/// A declared line number: an integer or a numeric string.
///
/// Any other JSON value is kept as-is so it can be reported against the
/// operation that carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineArg {
    Number(i64),
    Text(String),
    Other(serde_json::Value),
}

impl LineArg {
    /// Resolve to a 1-based line. `0` is read as `1`.
    ///
    /// Integral floats such as `4.0` are accepted. Lines above `isize::MAX`
    /// cannot be addressed and are rejected.
    pub fn resolve(&self, field: &'static str) -> EditResult<usize> {
        let invalid = || EditError::invalid_coordinate(field, self.to_string());
        let line = match self {
            Self::Number(n) => usize::try_from(*n).map_err(|_| invalid())?,
            Self::Text(s) => s.trim().parse::<usize>().map_err(|_| invalid())?,
            Self::Other(value) => value
                .as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f < isize::MAX as f64)
                .map(|f| f as usize)
                .ok_or_else(invalid)?,
        };
        if isize::try_from(line).is_err() {
            return Err(invalid());
        }
        Ok(line.max(1))
    }
}

impl fmt::Display for LineArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Other(value) => write!(f, "{value}"),
        }
    }
}

impl From<usize> for LineArg {
    fn from(line: usize) -> Self {
        i64::try_from(line).map_or_else(|_| Self::Text(line.to_string()), Self::Number)
    }
}

/// Resolve a line field that must be present.
pub(crate) fn required_line(arg: Option<&LineArg>, field: &'static str) -> EditResult<usize> {
    arg.ok_or_else(|| EditError::missing_coordinate(field))?
        .resolve(field)
}

/// Resolve a line field that may be absent.
pub(crate) fn optional_line(arg: Option<&LineArg>, field: &'static str) -> EditResult<Option<usize>> {
    arg.map(|a| a.resolve(field)).transpose()
}

/// Text to insert: either one string or a list of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InsertText {
    Lines(Vec<String>),
    Joined(String),
}

impl InsertText {
    /// The lines this text occupies once inserted.
    pub fn to_lines(&self) -> Vec<String> {
        match self {
            Self::Lines(lines) => lines.clone(),
            Self::Joined(text) => split_lines(text),
        }
    }
}

impl From<&str> for InsertText {
    fn from(text: &str) -> Self {
        Self::Joined(text.to_string())
    }
}

impl From<String> for InsertText {
    fn from(text: String) -> Self {
        Self::Joined(text)
    }
}

impl From<Vec<String>> for InsertText {
    fn from(lines: Vec<String>) -> Self {
        Self::Lines(lines)
    }
}

impl From<Vec<&str>> for InsertText {
    fn from(lines: Vec<&str>) -> Self {
        Self::Lines(lines.into_iter().map(String::from).collect())
    }
}

/// Split on `\n` keeping empty lines; `"a\n\nb"` is three lines.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// Kind of an [`EditOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Add,
    Delete,
    Update,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Update => "update",
        };
        f.pad(name)
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "delete" => Ok(Self::Delete),
            "update" => Ok(Self::Update),
            _ => Err(format!("Unknown operation kind: {s}")),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A single line-range edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditOperation {
    /// Insert `text` before `line`, or replace the whole buffer.
    Add {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        buffer: Option<BufferId>,
        #[serde(default, alias = "at_line", skip_serializing_if = "Option::is_none")]
        line: Option<LineArg>,
        #[serde(default, skip_serializing_if = "is_false")]
        replace_all: bool,
        text: InsertText,
    },
    /// Remove `start_line..=end_line`, or every line.
    Delete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        buffer: Option<BufferId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_line: Option<LineArg>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_line: Option<LineArg>,
        #[serde(default, skip_serializing_if = "is_false")]
        all: bool,
    },
    /// Replace `start_line..=end_line` with `text`.
    Update {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        buffer: Option<BufferId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_line: Option<LineArg>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_line: Option<LineArg>,
        text: InsertText,
    },
}

impl EditOperation {
    pub fn add(line: usize, text: impl Into<InsertText>) -> Self {
        Self::Add {
            buffer: None,
            line: Some(line.into()),
            replace_all: false,
            text: text.into(),
        }
    }

    pub fn replace_all(text: impl Into<InsertText>) -> Self {
        Self::Add {
            buffer: None,
            line: None,
            replace_all: true,
            text: text.into(),
        }
    }

    pub fn delete(start_line: usize, end_line: usize) -> Self {
        Self::Delete {
            buffer: None,
            start_line: Some(start_line.into()),
            end_line: Some(end_line.into()),
            all: false,
        }
    }

    pub fn delete_all() -> Self {
        Self::Delete {
            buffer: None,
            start_line: None,
            end_line: None,
            all: true,
        }
    }

    pub fn update(start_line: usize, end_line: usize, text: impl Into<InsertText>) -> Self {
        Self::Update {
            buffer: None,
            start_line: Some(start_line.into()),
            end_line: Some(end_line.into()),
            text: text.into(),
        }
    }

    /// Target a specific buffer.
    pub fn on_buffer(mut self, id: BufferId) -> Self {
        match &mut self {
            Self::Add { buffer, .. } | Self::Delete { buffer, .. } | Self::Update { buffer, .. } => {
                *buffer = Some(id);
            }
        }
        self
    }

    /// The buffer this operation names, if any.
    pub fn buffer(&self) -> Option<BufferId> {
        match self {
            Self::Add { buffer, .. } | Self::Delete { buffer, .. } | Self::Update { buffer, .. } => {
                *buffer
            }
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Add { .. } => OperationKind::Add,
            Self::Delete { .. } => OperationKind::Delete,
            Self::Update { .. } => OperationKind::Update,
        }
    }

    /// Short human-readable description.
    pub fn description(&self) -> String {
        fn show(arg: &Option<LineArg>) -> String {
            match arg {
                Some(LineArg::Text(s)) => format!("{s:?}"),
                Some(other) => other.to_string(),
                None => "?".to_string(),
            }
        }

        match self {
            Self::Add {
                replace_all: true, ..
            } => "Replace all lines".to_string(),
            Self::Add { line, .. } => format!("Add at line {}", show(line)),
            Self::Delete { all: true, .. } => "Delete all lines".to_string(),
            Self::Delete {
                start_line,
                end_line,
                ..
            } => format!("Delete lines {}-{}", show(start_line), show(end_line)),
            Self::Update {
                start_line,
                end_line,
                ..
            } => format!("Update lines {}-{}", show(start_line), show(end_line)),
        }
    }
}

/// An ordered sequence of operations sharing one coordinate frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch {
    operations: Vec<EditOperation>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of operations.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn push(&mut self, operation: EditOperation) {
        self.operations.push(operation);
    }

    pub fn with(mut self, operation: EditOperation) -> Self {
        self.push(operation);
        self
    }

    pub fn operations(&self) -> &[EditOperation] {
        &self.operations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EditOperation> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl From<Vec<EditOperation>> for Batch {
    fn from(operations: Vec<EditOperation>) -> Self {
        Self { operations }
    }
}

impl From<EditOperation> for Batch {
    fn from(operation: EditOperation) -> Self {
        Self {
            operations: vec![operation],
        }
    }
}

impl FromIterator<EditOperation> for Batch {
    fn from_iter<I: IntoIterator<Item = EditOperation>>(iter: I) -> Self {
        Self {
            operations: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a EditOperation;
    type IntoIter = std::slice::Iter<'a, EditOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_arg_resolution() {
        assert_eq!(LineArg::Number(7).resolve("line").unwrap(), 7);
        assert_eq!(LineArg::Number(0).resolve("line").unwrap(), 1);
        assert_eq!(LineArg::Text(" 12 ".into()).resolve("line").unwrap(), 12);
        assert_eq!(LineArg::Text("0".into()).resolve("line").unwrap(), 1);
    }

    #[test]
    fn test_line_arg_rejects_garbage() {
        let err = LineArg::Text("twelve".into()).resolve("start_line").unwrap_err();
        assert_eq!(err, EditError::invalid_coordinate("start_line", "twelve"));

        let err = LineArg::Number(-3).resolve("line").unwrap_err();
        assert!(matches!(err, EditError::InvalidCoordinate { field: "line", .. }));
    }

    #[test]
    fn test_line_arg_rejects_unaddressable_lines() {
        let err = LineArg::Text(u64::MAX.to_string())
            .resolve("start_line")
            .unwrap_err();
        assert_eq!(
            err,
            EditError::invalid_coordinate("start_line", "18446744073709551615")
        );

        let max = isize::MAX as usize;
        assert_eq!(LineArg::Text(max.to_string()).resolve("line").unwrap(), max);
        assert!(LineArg::Text((max + 1).to_string()).resolve("line").is_err());
    }

    #[test]
    fn test_line_arg_accepts_any_json_value() {
        let parse = |json: &str| serde_json::from_str::<LineArg>(json).unwrap();

        assert_eq!(parse("4.0").resolve("line").unwrap(), 4);
        assert!(parse("2.5").resolve("line").is_err());
        assert!(parse("-1.0").resolve("line").is_err());
        assert!(parse("true").resolve("line").is_err());
        assert!(parse("{}").resolve("line").is_err());
        assert!(parse("18446744073709551615").resolve("line").is_err());
    }

    #[test]
    fn test_required_and_optional_lines() {
        assert_eq!(
            required_line(None, "line").unwrap_err(),
            EditError::missing_coordinate("line")
        );
        assert_eq!(optional_line(None, "end_line").unwrap(), None);
        assert_eq!(
            optional_line(Some(&LineArg::Number(4)), "end_line").unwrap(),
            Some(4)
        );
    }

    #[test]
    fn test_split_lines_keeps_empty_lines() {
        assert_eq!(split_lines("a\n\nb"), vec!["a", "", "b"]);
        assert_eq!(split_lines("a\r\nb"), vec!["a", "b"]);
        assert_eq!(split_lines(""), vec![""]);
    }

    #[test]
    fn test_parse_operations_from_json() {
        let batch = Batch::from_json(
            r#"[
                {"type": "delete", "start_line": 2, "end_line": "3"},
                {"type": "add", "at_line": 4, "text": "x\ny"},
                {"type": "update", "buffer": 9, "start_line": 1, "end_line": 1, "text": ["a", "b"]},
                {"type": "add", "replace_all": true, "text": "fresh"},
                {"type": "delete", "all": true}
            ]"#,
        )
        .unwrap();

        assert_eq!(batch.len(), 5);
        assert_eq!(
            batch.operations()[0],
            EditOperation::Delete {
                buffer: None,
                start_line: Some(LineArg::Number(2)),
                end_line: Some(LineArg::Text("3".into())),
                all: false,
            }
        );
        assert_eq!(batch.operations()[1], EditOperation::add(4, "x\ny"));
        assert_eq!(batch.operations()[2].buffer(), Some(BufferId::new(9)));
        assert_eq!(batch.operations()[2].kind(), OperationKind::Update);
        assert_eq!(batch.operations()[3], EditOperation::replace_all("fresh"));
        assert_eq!(batch.operations()[4], EditOperation::delete_all());
    }

    #[test]
    fn test_missing_line_still_parses() {
        let batch = Batch::from_json(r#"[{"type": "add", "text": "x"}]"#).unwrap();
        match &batch.operations()[0] {
            EditOperation::Add { line, .. } => assert!(line.is_none()),
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn test_single_operation_is_batch_of_one() {
        let batch = Batch::from(EditOperation::delete(1, 1));
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_serialize_skips_defaults() {
        let json = serde_json::to_value(EditOperation::add(3, "x")).unwrap();
        assert_eq!(json["type"], "add");
        assert_eq!(json["line"], 3);
        assert!(json.get("replace_all").is_none());
        assert!(json.get("buffer").is_none());
    }

    #[test]
    fn test_description() {
        assert_eq!(EditOperation::add(3, "x").description(), "Add at line 3");
        assert_eq!(
            EditOperation::delete(2, 5).description(),
            "Delete lines 2-5"
        );
        assert_eq!(EditOperation::delete_all().description(), "Delete all lines");
        assert_eq!(
            EditOperation::replace_all("x").description(),
            "Replace all lines"
        );
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Delete".parse::<OperationKind>().unwrap(), OperationKind::Delete);
        assert!("rename".parse::<OperationKind>().is_err());
    }
}
