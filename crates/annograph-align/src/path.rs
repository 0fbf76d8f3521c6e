//! Minimum edit paths.
//!
//! The path is found by dynamic programming over an `(m + 1) x (n + 1)`
//! table of cumulative costs. When several moves into a cell cost the same,
//! the diagonal move (match or substitution) wins over a deletion, which
//! wins over an insertion. This keeps alignments paired rather than split.

use log::trace;

use crate::{
    comparator::EditComparator,
    step::{EditStep, StepOperation},
};

#[derive(Debug, Clone, Copy)]
enum Move {
    Start,
    Diagonal { equal: bool, distance: u32 },
    Delete(u32),
    Insert(u32),
}

/// Cumulative costs and the move chosen into each cell, row-major.
struct Table {
    columns: usize,
    costs: Vec<u32>,
    moves: Vec<Move>,
}

impl Table {
    fn build<T, C>(from: &[T], to: &[T], comparator: &C) -> Self
    where
        C: EditComparator<T> + ?Sized,
    {
        let columns = to.len() + 1;
        let cells = (from.len() + 1) * columns;
        let mut costs = vec![0u32; cells];
        let mut moves = vec![Move::Start; cells];

        for (j, target) in to.iter().enumerate() {
            let cost = comparator.insert_cost(target);
            costs[j + 1] = costs[j] + cost;
            moves[j + 1] = Move::Insert(cost);
        }
        for (i, source) in from.iter().enumerate() {
            let row = (i + 1) * columns;
            let above = i * columns;
            let delete = comparator.delete_cost(source);
            costs[row] = costs[above] + delete;
            moves[row] = Move::Delete(delete);

            for (j, target) in to.iter().enumerate() {
                let comparison = comparator.compare(source, target);
                let insert = comparator.insert_cost(target);
                let diagonal_cost = costs[above + j] + comparison.distance();
                let delete_cost = costs[above + j + 1] + delete;
                let insert_cost = costs[row + j] + insert;

                let (cost, chosen) = if diagonal_cost <= delete_cost && diagonal_cost <= insert_cost {
                    let chosen = Move::Diagonal {
                        equal: comparison.is_equal(),
                        distance: comparison.distance(),
                    };
                    (diagonal_cost, chosen)
                } else if delete_cost <= insert_cost {
                    (delete_cost, Move::Delete(delete))
                } else {
                    (insert_cost, Move::Insert(insert))
                };
                costs[row + j + 1] = cost;
                moves[row + j + 1] = chosen;
            }
        }
        Self {
            columns,
            costs,
            moves,
        }
    }

    fn cost(&self, i: usize, j: usize) -> u32 {
        self.costs[i * self.columns + j]
    }

    fn chosen(&self, i: usize, j: usize) -> Move {
        self.moves[i * self.columns + j]
    }
}

/// Computes the minimum-cost sequence of steps that turns `from` into `to`.
///
/// Replaying the steps in order yields `from` on the source side and `to`
/// on the target side. Either sequence may be empty.
///
/// # Example
///
/// ```
/// # use annograph_align::{DefaultComparator, StepOperation, minimum_edit_path};
/// let path = minimum_edit_path(&['c', 'a', 't'], &['c', 'u', 't'], &DefaultComparator);
/// let operations: Vec<_> = path.iter().map(|step| step.operation()).collect();
/// assert_eq!(
///     operations,
///     vec![StepOperation::None, StepOperation::Change, StepOperation::None]
/// );
/// assert_eq!(path[2].total_distance(), 1);
/// ```
pub fn minimum_edit_path<T, C>(from: &[T], to: &[T], comparator: &C) -> Vec<EditStep<T>>
where
    T: Clone,
    C: EditComparator<T> + ?Sized,
{
    let table = Table::build(from, to, comparator);
    let mut steps = Vec::with_capacity(from.len().max(to.len()));
    let (mut i, mut j) = (from.len(), to.len());

    loop {
        let total = table.cost(i, j);
        let step = match table.chosen(i, j) {
            Move::Start => break,
            Move::Diagonal { equal, distance } => {
                i -= 1;
                j -= 1;
                let operation = if equal {
                    StepOperation::None
                } else {
                    StepOperation::Change
                };
                EditStep::new(
                    operation,
                    Some((i, from[i].clone())),
                    Some((j, to[j].clone())),
                    distance,
                    total,
                )
            }
            Move::Delete(distance) => {
                i -= 1;
                EditStep::new(
                    StepOperation::Delete,
                    Some((i, from[i].clone())),
                    None,
                    distance,
                    total,
                )
            }
            Move::Insert(distance) => {
                j -= 1;
                EditStep::new(
                    StepOperation::Insert,
                    None,
                    Some((j, to[j].clone())),
                    distance,
                    total,
                )
            }
        };
        steps.push(step);
    }
    steps.reverse();

    trace!(
        from = from.len(),
        to = to.len(),
        steps = steps.len(),
        distance = table.cost(from.len(), to.len());
        "Edit path computed"
    );
    steps
}

/// Returns the cost of the minimum edit path from `from` to `to`.
pub fn minimum_edit_distance<T, C>(from: &[T], to: &[T], comparator: &C) -> u32
where
    C: EditComparator<T> + ?Sized,
{
    Table::build(from, to, comparator).cost(from.len(), to.len())
}

/// Merges adjacent deletion/insertion pairs into substitutions.
///
/// A pair is merged when substituting its elements costs at most three
/// times the pair itself; the merged step keeps the cost of the pair. A
/// merged step is never merged again.
pub fn collapse<T, C>(path: Vec<EditStep<T>>, comparator: &C) -> Vec<EditStep<T>>
where
    C: EditComparator<T> + ?Sized,
{
    let mut collapsed: Vec<EditStep<T>> = Vec::with_capacity(path.len());
    let mut mergeable = false;

    for step in path {
        if mergeable {
            if let Some(last) = collapsed.last_mut() {
                let pair_cost = last.step_distance() + step.step_distance();
                let substitution = match (last.operation(), step.operation()) {
                    (StepOperation::Delete, StepOperation::Insert) => last
                        .from()
                        .zip(step.to())
                        .map(|(from, to)| comparator.compare(from, to).distance()),
                    (StepOperation::Insert, StepOperation::Delete) => last
                        .to()
                        .zip(step.from())
                        .map(|(to, from)| comparator.compare(from, to).distance()),
                    _ => None,
                };
                if substitution.is_some_and(|cost| cost <= 3 * pair_cost) {
                    if last.operation() == StepOperation::Delete {
                        last.absorb_insert(step);
                    } else {
                        last.absorb_delete(step);
                    }
                    mergeable = false;
                    continue;
                }
            }
        }
        mergeable = true;
        collapsed.push(step);
    }
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::{Comparison, DefaultComparator, FnComparator};

    fn operations<T>(path: &[EditStep<T>]) -> Vec<StepOperation> {
        path.iter().map(EditStep::operation).collect()
    }

    #[test]
    fn test_empty_sequences() {
        let empty: [char; 0] = [];
        assert!(minimum_edit_path(&empty, &empty, &DefaultComparator).is_empty());

        let path = minimum_edit_path(&['a', 'b'], &empty, &DefaultComparator);
        assert_eq!(operations(&path), vec![StepOperation::Delete; 2]);
        assert_eq!(path[1].from_index(), Some(1));
        assert_eq!(path[1].to_index(), None);

        let path = minimum_edit_path(&empty, &['a'], &DefaultComparator);
        assert_eq!(operations(&path), vec![StepOperation::Insert]);
        assert_eq!(path[0].to(), Some(&'a'));
    }

    #[test]
    fn test_kitten_sitting() {
        let from: Vec<char> = "kitten".chars().collect();
        let to: Vec<char> = "sitting".chars().collect();
        assert_eq!(minimum_edit_distance(&from, &to, &DefaultComparator), 3);

        let path = minimum_edit_path(&from, &to, &DefaultComparator);
        assert_eq!(path.last().map(EditStep::total_distance), Some(3));
        assert_eq!(
            operations(&path),
            vec![
                StepOperation::Change,
                StepOperation::None,
                StepOperation::None,
                StepOperation::None,
                StepOperation::Change,
                StepOperation::None,
                StepOperation::Insert,
            ]
        );
    }

    #[test]
    fn test_ties_prefer_pairing() {
        let never = FnComparator::new(|_: &&str, _: &&str| false);
        let path = minimum_edit_path(&["walked"], &["w", "aa", "k", "t"], &never);
        assert_eq!(
            operations(&path),
            vec![
                StepOperation::Insert,
                StepOperation::Insert,
                StepOperation::Insert,
                StepOperation::Change,
            ]
        );
        assert_eq!(path[3].from_index(), Some(0));
        assert_eq!(path[3].to_index(), Some(3));
    }

    #[test]
    fn test_dear_substitution_splits() {
        // Substitution is dearer than a deletion plus an insertion.
        struct Dear;
        impl EditComparator<char> for Dear {
            fn compare(&self, from: &char, to: &char) -> Comparison {
                if from == to {
                    Comparison::equal()
                } else {
                    Comparison::change(5)
                }
            }
        }
        let path = minimum_edit_path(&['a'], &['b'], &Dear);
        assert_eq!(
            operations(&path),
            vec![StepOperation::Insert, StepOperation::Delete]
        );
    }

    #[test]
    fn test_collapse_merges_cheap_pairs() {
        struct Dear;
        impl EditComparator<char> for Dear {
            fn compare(&self, from: &char, to: &char) -> Comparison {
                match (from, to) {
                    (a, b) if a == b => Comparison::equal(),
                    ('a', 'b') => Comparison::change(5),
                    _ => Comparison::change(100),
                }
            }
        }
        let path = minimum_edit_path(&['a', 'x'], &['b', 'x'], &Dear);
        assert_eq!(
            operations(&path),
            vec![
                StepOperation::Insert,
                StepOperation::Delete,
                StepOperation::None
            ]
        );

        let collapsed = collapse(path, &Dear);
        assert_eq!(
            operations(&collapsed),
            vec![StepOperation::Change, StepOperation::None]
        );
        assert_eq!(collapsed[0].from(), Some(&'a'));
        assert_eq!(collapsed[0].to(), Some(&'b'));
        assert_eq!(collapsed[0].step_distance(), 2);
        assert_eq!(collapsed[0].to_index(), Some(0));

        let path = minimum_edit_path(&['c'], &['d'], &Dear);
        let collapsed = collapse(path, &Dear);
        assert_eq!(
            operations(&collapsed),
            vec![StepOperation::Insert, StepOperation::Delete]
        );
    }
}
