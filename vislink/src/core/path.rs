//! Slash-delimited path resolution
//!
//! A path addresses one member of the object graph: every segment but the
//! last selects a nested node, the last names the member the operation
//! targets. Paths whose first segment is [`CONNECTION_SEGMENT`] address the
//! engine-owned handshake object instead of the application root.

use std::sync::Arc;

use thiserror::Error;

use crate::graph::Addressable;

/// Reserved first segment routing to the connection handshake object.
pub const CONNECTION_SEGMENT: &str = "$connection";

#[derive(Debug, Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("no root configured for the {0} namespace")]
    NoRoot(&'static str),
    #[error("path `{path}` does not resolve at `{segment}`")]
    NoSuchObject { path: String, segment: String },
}

/// Which root a path resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Application,
    Connection,
}

/// The containing node and leaf member a path resolved to.
pub struct Resolved {
    pub node: Arc<dyn Addressable>,
    pub member: String,
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("member", &self.member)
            .finish_non_exhaustive()
    }
}

/// Split the reserved connection marker off a path, if present.
pub fn split_namespace(path: &str) -> (Namespace, &str) {
    let trimmed = path.trim_end_matches('/');
    if trimmed == CONNECTION_SEGMENT {
        return (Namespace::Connection, "");
    }
    if let Some(rest) = trimmed
        .strip_prefix(CONNECTION_SEGMENT)
        .and_then(|rest| rest.strip_prefix('/'))
    {
        return (Namespace::Connection, rest);
    }
    (Namespace::Application, trimmed)
}

/// Walk `path` from `root`, returning the penultimate node and the final
/// member name. A trailing slash is ignored.
pub fn resolve(root: Arc<dyn Addressable>, path: &str) -> Result<Resolved, PathError> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(PathError::Empty);
    }

    let (walk, member) = match trimmed.rsplit_once('/') {
        Some((prefix, member)) => (prefix, member),
        None => ("", trimmed),
    };
    if member.is_empty() {
        return Err(PathError::Empty);
    }

    let mut node = root;
    if !walk.is_empty() {
        for segment in walk.split('/') {
            node = node.child(segment).ok_or_else(|| PathError::NoSuchObject {
                path: trimmed.to_string(),
                segment: segment.to_string(),
            })?;
        }
    }

    Ok(Resolved {
        node,
        member: member.to_string(),
    })
}
