//! Sparse matrix columns, stored as a binary heap of non-zero entries.
//!
//! Entries are pushed lazily without summing; repeated row indices are only combined when the pivot (the largest
//! entry) is requested. A column therefore behaves like a formal linear combination with a leading term.
use crate::{
    fields::NonZeroCoefficient,
    matrices::{BasisElement, FiltrationT},
};
use std::{collections::BinaryHeap, fmt::Debug, iter::repeat, ops::Mul};

#[derive(Clone, Copy)]
pub struct ColumnEntry<FilT: FiltrationT, RowT: BasisElement, CF> {
    pub filtration_value: FilT,
    pub row_index: RowT,
    pub coeff: CF,
}

impl<FilT: FiltrationT, RowT: BasisElement, CF> Debug for ColumnEntry<FilT, RowT, CF>
where
    FilT: Debug,
    RowT: Debug,
    CF: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "({:?} * {:?}) :: {:?}",
            self.coeff, self.row_index, self.filtration_value
        ))
    }
}

impl<FilT: FiltrationT, RowT: BasisElement, CF> From<(CF, RowT, FilT)>
    for ColumnEntry<FilT, RowT, CF>
{
    fn from((coeff, row_index, filtration_value): (CF, RowT, FilT)) -> Self {
        Self {
            filtration_value,
            row_index,
            coeff,
        }
    }
}

impl<FilT: FiltrationT, RowT: BasisElement, CF> From<ColumnEntry<FilT, RowT, CF>>
    for (CF, RowT, FilT)
{
    fn from(entry: ColumnEntry<FilT, RowT, CF>) -> Self {
        (entry.coeff, entry.row_index, entry.filtration_value)
    }
}

/// WARNING: Equality only checks row index - to check coefficient and filtration value, convert to a tuple.
impl<FilT: FiltrationT, RowT: BasisElement, CF> PartialEq for ColumnEntry<FilT, RowT, CF> {
    // Equal row index implies equal filtration value
    fn eq(&self, other: &Self) -> bool {
        self.row_index.eq(&other.row_index)
    }
}
impl<FilT: FiltrationT, RowT: BasisElement, CF> Eq for ColumnEntry<FilT, RowT, CF> {}

impl<FilT: FiltrationT, RowT: BasisElement, CF> PartialOrd for ColumnEntry<FilT, RowT, CF> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// Order by filtration value and then by the order on RowT
impl<FilT: FiltrationT, RowT: BasisElement, CF> Ord for ColumnEntry<FilT, RowT, CF> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.filtration_value, &self.row_index).cmp(&(&other.filtration_value, &other.row_index))
    }
}

impl<FilT: FiltrationT, RowT: BasisElement, CF: NonZeroCoefficient> Mul<CF>
    for ColumnEntry<FilT, RowT, CF>
{
    type Output = Self;

    fn mul(self, rhs: CF) -> Self::Output {
        ColumnEntry {
            coeff: self.coeff * rhs,
            filtration_value: self.filtration_value,
            row_index: self.row_index,
        }
    }
}

/// A column stored as a binary heap, so that the pivot can be found quickly after many column additions.
#[derive(Clone)]
pub struct BHCol<FilT: FiltrationT, RowT: BasisElement, CF> {
    heap: BinaryHeap<ColumnEntry<FilT, RowT, CF>>,
}

impl<FilT: FiltrationT, RowT: BasisElement, CF> Debug for BHCol<FilT, RowT, CF>
where
    ColumnEntry<FilT, RowT, CF>: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(&self.heap).finish()
    }
}

impl<FilT: FiltrationT, RowT: BasisElement, CF> Default for BHCol<FilT, RowT, CF> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::default(),
        }
    }
}

impl<FilT: FiltrationT, RowT: BasisElement, CF> BHCol<FilT, RowT, CF> {
    pub fn add_entries(&mut self, entries: impl Iterator<Item = ColumnEntry<FilT, RowT, CF>>) {
        let (lower_bound, _) = entries.size_hint();
        self.heap.reserve(lower_bound);
        for entry in entries {
            self.heap.push(entry);
        }
    }

    pub fn add_tuples(&mut self, tuples: impl Iterator<Item = (CF, RowT, FilT)>) {
        self.add_entries(tuples.map(Into::into));
    }

    pub fn add_tuple(&mut self, tuple: (CF, RowT, FilT)) {
        self.heap.push(tuple.into());
    }

    pub fn push(&mut self, entry: ColumnEntry<FilT, RowT, CF>) {
        self.heap.push(entry);
    }

    pub fn drain_sorted(&mut self) -> impl Iterator<Item = ColumnEntry<FilT, RowT, CF>> + '_
    where
        CF: NonZeroCoefficient,
    {
        repeat(()).map_while(|()| self.pop_pivot())
    }

    /// Returns a copy of the pivot, leaving the consolidated pivot at the top of the heap.
    pub fn clone_pivot(&mut self) -> Option<ColumnEntry<FilT, RowT, CF>>
    where
        CF: NonZeroCoefficient,
    {
        let pivot = self.pop_pivot()?;
        self.push(pivot);
        Some(pivot)
    }

    /// WARNING: Only valid if previously called [`clone_pivot`](Self::clone_pivot) or pushed the new pivot.
    pub fn peek_pivot(&self) -> Option<&ColumnEntry<FilT, RowT, CF>> {
        self.heap.peek()
    }

    /// Removes and returns the largest entry with a non-zero total coefficient.
    /// Any summands above it that cancel to zero are discarded along the way.
    pub fn pop_pivot(&mut self) -> Option<ColumnEntry<FilT, RowT, CF>>
    where
        CF: NonZeroCoefficient,
    {
        let first_entry = self.heap.pop()?;
        let mut working_index: RowT = first_entry.row_index;
        let mut working_sum: Option<CF> = Some(first_entry.coeff);
        let mut working_filtration = first_entry.filtration_value;

        while let Some(next_entry) = self.heap.peek() {
            if next_entry.row_index != working_index {
                if working_sum.is_some() {
                    // Found the largest index with non-zero coefficient
                    break;
                }
                // Everything so far cancelled, start summing the next largest index
                working_index = next_entry.row_index;
                working_sum = None;
                working_filtration = next_entry.filtration_value;
            }

            if let Some(next_entry) = self.heap.pop() {
                working_sum = next_entry.coeff + working_sum;
            }
        }

        working_sum.map(|coeff| ColumnEntry {
            row_index: working_index,
            filtration_value: working_filtration,
            coeff,
        })
    }
}
