//! Element comparators.
//!
//! An [`EditComparator`] decides whether two elements are equal and what it
//! costs to substitute, delete or insert them. Comparators are pure: they
//! hold no state that a comparison could change.

use std::marker::PhantomData;

/// Result of comparing a source element with a target element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    equal: bool,
    distance: u32,
}

impl Comparison {
    /// The elements are equal at no cost.
    pub fn equal() -> Self {
        Self {
            equal: true,
            distance: 0,
        }
    }

    /// The elements are equivalent, but pairing them still costs `distance`.
    pub fn equal_with_cost(distance: u32) -> Self {
        Self {
            equal: true,
            distance,
        }
    }

    /// The elements differ; substituting one for the other costs `distance`.
    pub fn change(distance: u32) -> Self {
        Self {
            equal: false,
            distance,
        }
    }

    pub fn is_equal(self) -> bool {
        self.equal
    }

    pub fn distance(self) -> u32 {
        self.distance
    }
}

/// Compares elements of an edit path.
pub trait EditComparator<T> {
    fn compare(&self, from: &T, to: &T) -> Comparison;

    /// Cost of deleting a source element.
    fn delete_cost(&self, _from: &T) -> u32 {
        1
    }

    /// Cost of inserting a target element.
    fn insert_cost(&self, _to: &T) -> u32 {
        1
    }
}

impl<T, C: EditComparator<T> + ?Sized> EditComparator<T> for &C {
    fn compare(&self, from: &T, to: &T) -> Comparison {
        (**self).compare(from, to)
    }

    fn delete_cost(&self, from: &T) -> u32 {
        (**self).delete_cost(from)
    }

    fn insert_cost(&self, to: &T) -> u32 {
        (**self).insert_cost(to)
    }
}

impl<T, C: EditComparator<T> + ?Sized> EditComparator<T> for Box<C> {
    fn compare(&self, from: &T, to: &T) -> Comparison {
        (**self).compare(from, to)
    }

    fn delete_cost(&self, from: &T) -> u32 {
        (**self).delete_cost(from)
    }

    fn insert_cost(&self, to: &T) -> u32 {
        (**self).insert_cost(to)
    }
}

/// Equality by [`PartialEq`], with unit costs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultComparator;

impl<T: PartialEq> EditComparator<T> for DefaultComparator {
    fn compare(&self, from: &T, to: &T) -> Comparison {
        if from == to {
            Comparison::equal()
        } else {
            Comparison::change(1)
        }
    }
}

/// Equality by a predicate, with unit costs.
///
/// # Example
///
/// ```
/// # use annograph_align::{FnComparator, minimum_edit_distance};
/// let never = FnComparator::new(|_: &&str, _: &&str| false);
/// assert_eq!(minimum_edit_distance(&["walked"], &["w", "aa", "k", "t"], &never), 4);
/// ```
pub struct FnComparator<T, F> {
    predicate: F,
    marker: PhantomData<fn(&T, &T)>,
}

impl<T, F: Fn(&T, &T) -> bool> FnComparator<T, F> {
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            marker: PhantomData,
        }
    }
}

impl<T, F: Fn(&T, &T) -> bool> EditComparator<T> for FnComparator<T, F> {
    fn compare(&self, from: &T, to: &T) -> Comparison {
        if (self.predicate)(from, to) {
            Comparison::equal()
        } else {
            Comparison::change(1)
        }
    }
}

// =============================================================================
// Label translation
// =============================================================================

/// Maps a label into the label space of another layer.
pub trait LabelTranslator {
    fn translate(&self, label: &str) -> String;
}

/// Lower-cases a label and drops everything that is not a letter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedTranslator;

impl LabelTranslator for NormalizedTranslator {
    fn translate(&self, label: &str) -> String {
        label
            .chars()
            .filter(|c| c.is_alphabetic())
            .flat_map(char::to_lowercase)
            .collect()
    }
}

/// Translates labels before handing them to an inner comparator.
///
/// Only source labels are translated unless
/// [`with_translated_target`](Self::with_translated_target) is set.
#[derive(Debug, Clone)]
pub struct TranslatingComparator<L, C> {
    translator: L,
    inner: C,
    translate_target: bool,
}

impl<L: LabelTranslator, C: EditComparator<String>> TranslatingComparator<L, C> {
    pub fn new(translator: L, inner: C) -> Self {
        Self {
            translator,
            inner,
            translate_target: false,
        }
    }

    pub fn with_translated_target(mut self) -> Self {
        self.translate_target = true;
        self
    }
}

impl<L: LabelTranslator, C: EditComparator<String>> EditComparator<String>
    for TranslatingComparator<L, C>
{
    fn compare(&self, from: &String, to: &String) -> Comparison {
        let from = self.translator.translate(from);
        if self.translate_target {
            self.inner.compare(&from, &self.translator.translate(to))
        } else {
            self.inner.compare(&from, to)
        }
    }

    fn delete_cost(&self, from: &String) -> u32 {
        self.inner.delete_cost(from)
    }

    fn insert_cost(&self, to: &String) -> u32 {
        self.inner.insert_cost(to)
    }
}
