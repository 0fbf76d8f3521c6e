//! Grouping edit steps into correspondences between index ranges.

use std::ops::Range;

use crate::step::{EditStep, StepOperation};

/// A block of source elements that corresponds to a block of target
/// elements.
///
/// Either range may be empty: a deletion block has no target elements and
/// an insertion block has no source elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correspondence {
    operation: StepOperation,
    from: Range<usize>,
    to: Range<usize>,
    distance: u32,
}

impl Correspondence {
    pub fn operation(&self) -> StepOperation {
        self.operation
    }

    /// Source indices covered by the block.
    pub fn from(&self) -> Range<usize> {
        self.from.clone()
    }

    /// Target indices covered by the block.
    pub fn to(&self) -> Range<usize> {
        self.to.clone()
    }

    /// Sum of the step distances in the block.
    pub fn distance(&self) -> u32 {
        self.distance
    }
}

/// Folds an edit path into correspondences.
///
/// Every matching step becomes a one-to-one block. A maximal run of
/// non-matching steps becomes one-to-one blocks if it consists only of
/// substitutions, and one many-to-many block otherwise.
///
/// # Example
///
/// ```
/// # use annograph_align::{FnComparator, StepOperation, group_correspondences, minimum_edit_path};
/// let never = FnComparator::new(|_: &&str, _: &&str| false);
/// let path = minimum_edit_path(&["walked"], &["w", "aa", "k", "t"], &never);
/// let blocks = group_correspondences(&path);
/// assert_eq!(blocks.len(), 1);
/// assert_eq!(blocks[0].operation(), StepOperation::Change);
/// assert_eq!((blocks[0].from(), blocks[0].to()), (0..1, 0..4));
/// ```
pub fn group_correspondences<T>(path: &[EditStep<T>]) -> Vec<Correspondence> {
    let mut blocks = Vec::new();
    let (mut from, mut to) = (0, 0);
    let mut run: Vec<&EditStep<T>> = Vec::new();

    for step in path {
        if step.operation() != StepOperation::None {
            run.push(step);
            continue;
        }
        flush_run(&mut run, &mut from, &mut to, &mut blocks);
        blocks.push(Correspondence {
            operation: StepOperation::None,
            from: from..from + 1,
            to: to..to + 1,
            distance: step.step_distance(),
        });
        from += 1;
        to += 1;
    }
    flush_run(&mut run, &mut from, &mut to, &mut blocks);
    blocks
}

fn flush_run<T>(
    run: &mut Vec<&EditStep<T>>,
    from: &mut usize,
    to: &mut usize,
    blocks: &mut Vec<Correspondence>,
) {
    if run.is_empty() {
        return;
    }
    if run
        .iter()
        .all(|step| step.operation() == StepOperation::Change)
    {
        for step in run.drain(..) {
            blocks.push(Correspondence {
                operation: StepOperation::Change,
                from: *from..*from + 1,
                to: *to..*to + 1,
                distance: step.step_distance(),
            });
            *from += 1;
            *to += 1;
        }
        return;
    }

    let sources = run.iter().filter(|step| step.from().is_some()).count();
    let targets = run.iter().filter(|step| step.to().is_some()).count();
    let operation = match (sources, targets) {
        (0, _) => StepOperation::Insert,
        (_, 0) => StepOperation::Delete,
        _ => StepOperation::Change,
    };
    blocks.push(Correspondence {
        operation,
        from: *from..*from + sources,
        to: *to..*to + targets,
        distance: run.iter().map(|step| step.step_distance()).sum(),
    });
    *from += sources;
    *to += targets;
    run.clear();
}
