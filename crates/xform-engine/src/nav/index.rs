use std::fmt;

use smallvec::SmallVec;

/// One level of a [`FormIndex`]: the child position within the parent element and, for
/// repeats, the instance multiplicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexLevel {
    pub local_index: usize,
    pub instance_index: Option<usize>,
}

impl IndexLevel {
    pub const fn element(local_index: usize) -> Self {
        Self {
            local_index,
            instance_index: None,
        }
    }

    pub const fn repeat(local_index: usize, instance_index: usize) -> Self {
        Self {
            local_index,
            instance_index: Some(instance_index),
        }
    }
}

/// A cursor into the form: a root-to-element path of levels, or one of the two sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FormIndex {
    Beginning,
    End,
    At(SmallVec<[IndexLevel; 4]>),
}

impl FormIndex {
    pub fn from_levels(levels: impl IntoIterator<Item = IndexLevel>) -> Self {
        let levels: SmallVec<[IndexLevel; 4]> = levels.into_iter().collect();
        if levels.is_empty() {
            FormIndex::Beginning
        } else {
            FormIndex::At(levels)
        }
    }

    pub fn is_beginning(&self) -> bool {
        matches!(self, FormIndex::Beginning)
    }

    pub fn is_end(&self) -> bool {
        matches!(self, FormIndex::End)
    }

    /// Levels from the root; empty for the sentinels.
    pub fn levels(&self) -> &[IndexLevel] {
        match self {
            FormIndex::At(levels) => levels,
            FormIndex::Beginning | FormIndex::End => &[],
        }
    }

    pub fn depth(&self) -> usize {
        self.levels().len()
    }
}

impl fmt::Display for FormIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormIndex::Beginning => f.write_str("BEGINNING"),
            FormIndex::End => f.write_str("END"),
            FormIndex::At(levels) => {
                for (idx, level) in levels.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", level.local_index)?;
                    if let Some(instance) = level.instance_index {
                        write!(f, "_{instance}")?;
                    }
                }
                Ok(())
            }
        }
    }
}
