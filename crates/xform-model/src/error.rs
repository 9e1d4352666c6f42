use thiserror::Error;

use crate::reference::{ReferenceParseError, TreeReference};

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("no instance node at {0}")]
    NodeNotFound(TreeReference),

    #[error("no parent node for {0}")]
    ParentNotFound(TreeReference),

    #[error("node `{name}` is a group and cannot hold a value")]
    NotALeaf { name: String },

    #[error("node `{name}` holds a value and cannot have children")]
    NotAGroup { name: String },

    #[error("instance node {0} already exists")]
    NodeExists(TreeReference),

    #[error("repeat instance {reference} would leave a gap; the next instance is {next}")]
    MultiplicityGap {
        reference: TreeReference,
        next: usize,
    },

    #[error("reference {0} is not absolute")]
    NotAbsolute(TreeReference),

    #[error(transparent)]
    InvalidReference(#[from] ReferenceParseError),
}
