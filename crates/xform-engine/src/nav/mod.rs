//! Linearized, repeat-aware traversal of a form.

mod index;
mod navigator;

pub use index::{FormIndex, IndexLevel};
pub use navigator::{CollapsedIndex, Navigator};
