//! Structured property paths into live value trees.
//!
//! Paths are sequences of explicit steps, not strings: `a.b[2].c` is
//! `[Field("a"), Field("b"), Index(2), Field("c")]`. The textual form
//! exists only at the edges (CLI edit scripts, reports).

use std::fmt;
use std::str::FromStr;

use crate::value::{ArrayHandle, ObjectHandle, Value, ValueKind};

/// One traversal step: a named object field or an array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Field(String),
    Index(usize),
}

/// A parsed path from a root value to one of its descendants.
///
/// The empty path addresses the root itself; it resolves but cannot be
/// assigned or removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path {
    steps: Vec<PathStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("cannot {verb} the path root")]
    Root { verb: &'static str },
    #[error("malformed path `{text}` at byte {at}")]
    Parse { text: String, at: usize },
    #[error("no field `{field}` at `{at}`")]
    MissingField { field: String, at: String },
    #[error("index {index} out of bounds at `{at}`")]
    IndexOutOfBounds { index: usize, at: String },
    #[error("expected {expected} at `{at}`, found {found}")]
    Unexpected {
        expected: ValueKind,
        found: ValueKind,
        at: String,
    },
}

impl Path {
    /// The empty path, addressing the root value.
    pub fn root() -> Path {
        Path::default()
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Parse the textual form: field names separated by `.`, indexes in
    /// brackets directly after their segment (`players[2].name`). The
    /// empty string parses to the root path.
    pub fn parse(text: &str) -> Result<Path, PathError> {
        let mut steps = Vec::new();
        let mut cursor = text;
        let mut offset = 0;

        while !cursor.is_empty() {
            if let Some(rest) = cursor.strip_prefix('[') {
                let close = rest.find(']').ok_or_else(|| PathError::Parse {
                    text: text.to_owned(),
                    at: offset,
                })?;
                let index = rest[..close].parse::<usize>().map_err(|_| PathError::Parse {
                    text: text.to_owned(),
                    at: offset + 1,
                })?;
                steps.push(PathStep::Index(index));
                offset += close + 2;
                cursor = &rest[close + 1..];
                continue;
            }

            let body = if offset == 0 {
                cursor
            } else if let Some(rest) = cursor.strip_prefix('.') {
                offset += 1;
                rest
            } else {
                return Err(PathError::Parse {
                    text: text.to_owned(),
                    at: offset,
                });
            };

            let end = body
                .char_indices()
                .find(|(_, c)| *c == '.' || *c == '[')
                .map(|(i, _)| i)
                .unwrap_or(body.len());
            if end == 0 {
                return Err(PathError::Parse {
                    text: text.to_owned(),
                    at: offset,
                });
            }
            steps.push(PathStep::Field(body[..end].to_owned()));
            offset += end;
            cursor = &body[end..];
        }

        Ok(Path { steps })
    }

    /// Walk the path from `root`, cloning the value found at its end
    /// (a handle clone for containers).
    pub fn resolve(&self, root: &Value) -> Result<Value, PathError> {
        self.walk(root, &self.steps)
    }

    /// Set the addressed slot. Object fields are created when missing;
    /// array indexes must already be in bounds.
    pub fn assign(&self, root: &Value, value: impl Into<Value>) -> Result<(), PathError> {
        let Some((last, lead)) = self.steps.split_last() else {
            return Err(PathError::Root { verb: "assign" });
        };
        let parent = self.walk(root, lead)?;
        match last {
            PathStep::Field(name) => {
                let obj = self.expect_object(&parent, lead.len())?;
                obj.set(name.clone(), value);
                Ok(())
            }
            PathStep::Index(index) => {
                let arr = self.expect_array(&parent, lead.len())?;
                if arr.set(*index, value.into()) {
                    Ok(())
                } else {
                    Err(PathError::IndexOutOfBounds {
                        index: *index,
                        at: self.prefix(lead.len()),
                    })
                }
            }
        }
    }

    /// Remove the addressed slot, returning what was there. A missing
    /// field or out-of-range index removes nothing and returns `None`.
    pub fn remove(&self, root: &Value) -> Result<Option<Value>, PathError> {
        let Some((last, lead)) = self.steps.split_last() else {
            return Err(PathError::Root { verb: "remove" });
        };
        let parent = self.walk(root, lead)?;
        match last {
            PathStep::Field(name) => {
                let obj = self.expect_object(&parent, lead.len())?;
                Ok(obj.remove(name))
            }
            PathStep::Index(index) => {
                let arr = self.expect_array(&parent, lead.len())?;
                Ok(arr.remove(*index))
            }
        }
    }

    fn walk(&self, root: &Value, steps: &[PathStep]) -> Result<Value, PathError> {
        let mut current = root.clone();
        for (depth, step) in steps.iter().enumerate() {
            current = match step {
                PathStep::Field(name) => {
                    let obj = self.expect_object(&current, depth)?;
                    obj.get(name).ok_or_else(|| PathError::MissingField {
                        field: name.clone(),
                        at: self.prefix(depth),
                    })?
                }
                PathStep::Index(index) => {
                    let arr = self.expect_array(&current, depth)?;
                    arr.get(*index).ok_or_else(|| PathError::IndexOutOfBounds {
                        index: *index,
                        at: self.prefix(depth),
                    })?
                }
            };
        }
        Ok(current)
    }

    fn expect_object(&self, value: &Value, depth: usize) -> Result<ObjectHandle, PathError> {
        value
            .as_object()
            .cloned()
            .ok_or_else(|| PathError::Unexpected {
                expected: ValueKind::Object,
                found: value.kind(),
                at: self.prefix(depth),
            })
    }

    fn expect_array(&self, value: &Value, depth: usize) -> Result<ArrayHandle, PathError> {
        value
            .as_array()
            .cloned()
            .ok_or_else(|| PathError::Unexpected {
                expected: ValueKind::Array,
                found: value.kind(),
                at: self.prefix(depth),
            })
    }

    /// Textual form of the first `len` steps, for error messages.
    fn prefix(&self, len: usize) -> String {
        if len == 0 {
            return "(root)".to_owned();
        }
        Path {
            steps: self.steps[..len].to_vec(),
        }
        .to_string()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, step) in self.steps.iter().enumerate() {
            match step {
                PathStep::Field(name) => {
                    if position > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                PathStep::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(text: &str) -> Result<Path, PathError> {
        Path::parse(text)
    }
}
