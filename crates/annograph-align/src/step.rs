//! Edit steps.

use std::fmt;

/// What an [`EditStep`] does to turn the source sequence into the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOperation {
    /// The elements are equal.
    None,
    /// The source element is substituted by the target element.
    Change,
    /// The source element has no counterpart in the target.
    Delete,
    /// The target element has no counterpart in the source.
    Insert,
}

impl fmt::Display for StepOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Change => f.write_str("change"),
            Self::Delete => f.write_str("delete"),
            Self::Insert => f.write_str("insert"),
        }
    }
}

/// One step of an edit path.
///
/// Indices are 0-based positions in the source (`from`) and target (`to`)
/// sequences. A deletion has no target side and an insertion has no source
/// side.
#[derive(Debug, Clone, PartialEq)]
pub struct EditStep<T> {
    operation: StepOperation,
    from: Option<T>,
    to: Option<T>,
    from_index: Option<usize>,
    to_index: Option<usize>,
    step_distance: u32,
    total_distance: u32,
}

impl<T> EditStep<T> {
    pub(crate) fn new(
        operation: StepOperation,
        from: Option<(usize, T)>,
        to: Option<(usize, T)>,
        step_distance: u32,
        total_distance: u32,
    ) -> Self {
        let (from_index, from) = from.map_or((None, None), |(i, value)| (Some(i), Some(value)));
        let (to_index, to) = to.map_or((None, None), |(i, value)| (Some(i), Some(value)));
        Self {
            operation,
            from,
            to,
            from_index,
            to_index,
            step_distance,
            total_distance,
        }
    }

    pub fn operation(&self) -> StepOperation {
        self.operation
    }

    pub fn from(&self) -> Option<&T> {
        self.from.as_ref()
    }

    pub fn to(&self) -> Option<&T> {
        self.to.as_ref()
    }

    pub fn from_index(&self) -> Option<usize> {
        self.from_index
    }

    pub fn to_index(&self) -> Option<usize> {
        self.to_index
    }

    /// Cost of this step alone.
    pub fn step_distance(&self) -> u32 {
        self.step_distance
    }

    /// Cost of the path up to and including this step.
    pub fn total_distance(&self) -> u32 {
        self.total_distance
    }

    /// Turns a deletion into a substitution by `to`.
    pub(crate) fn absorb_insert(&mut self, insert: Self) {
        self.operation = StepOperation::Change;
        self.to = insert.to;
        self.to_index = insert.to_index;
        self.step_distance += insert.step_distance;
        self.total_distance = insert.total_distance;
    }

    /// Turns an insertion into a substitution of `from`.
    pub(crate) fn absorb_delete(&mut self, delete: Self) {
        self.operation = StepOperation::Change;
        self.from = delete.from;
        self.from_index = delete.from_index;
        self.step_distance += delete.step_distance;
        self.total_distance = delete.total_distance;
    }
}

impl<T: fmt::Display> fmt::Display for EditStep<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |value: &Option<T>| value.as_ref().map_or_else(|| "-".to_string(), T::to_string);
        write!(
            f,
            "{} {} -> {} ({})",
            self.operation,
            side(&self.from),
            side(&self.to),
            self.step_distance
        )
    }
}
