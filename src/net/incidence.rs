//! 库所×迁移关联矩阵的稠密封装，行以 `PlaceId` 索引、列以 `TransitionId` 索引。
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::{Idx, IndexVec};

type SmallRow<T> = SmallVec<[T; 4]>;

/// Raised when the nested rows handed over by the factory are not rectangular.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("row {row} has {found} entries, expected {expected}")]
pub struct ShapeError {
    pub row: usize,
    pub expected: usize,
    pub found: usize,
}

/// A |P|×|T| table of arc annotations.
///
/// `T` is `u64` for the pre/post/reader weights, `i64` for the net effect
/// and `bool` for the inhibition and reset relations. The table is built
/// once by the factory collaborator and never mutated afterwards.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incidence<T> {
    rows: IndexVec<PlaceId, SmallRow<T>>,
    cols: usize,
}

/// Boolean relation over (place, transition); used for inhibition and reset.
pub type IncidenceBool = Incidence<bool>;

impl<T> Incidence<T> {
    pub fn new(places: usize, transitions: usize, default: T) -> Self
    where
        T: Clone,
    {
        let rows = (0..places)
            .map(|_| SmallRow::from_elem(default.clone(), transitions))
            .collect();
        Self {
            rows,
            cols: transitions,
        }
    }

    /// Builds the table from factory-supplied nested rows, rejecting ragged
    /// input.
    pub fn from_nested(nested: Vec<Vec<T>>) -> Result<Self, ShapeError> {
        let cols = nested.first().map_or(0, |row| row.len());
        let mut rows = IndexVec::new();
        for (idx, row) in nested.into_iter().enumerate() {
            if row.len() != cols {
                return Err(ShapeError {
                    row: idx,
                    expected: cols,
                    found: row.len(),
                });
            }
            rows.push(SmallRow::from_vec(row));
        }
        Ok(Self { rows, cols })
    }

    pub fn places(&self) -> usize {
        self.rows.len()
    }

    pub fn transitions(&self) -> usize {
        self.cols
    }

    pub fn set(&mut self, place: PlaceId, transition: TransitionId, value: T) {
        self.rows[place][transition.index()] = value;
    }

    /// True when any entry satisfies the predicate; drives the derived
    /// has-inhibition/has-reset/has-reader flags.
    pub fn any<F>(&self, mut pred: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.rows.iter().any(|row| row.iter().any(&mut pred))
    }
}

impl<T> Incidence<T>
where
    T: Copy,
{
    pub fn get(&self, place: PlaceId, transition: TransitionId) -> T {
        self.rows[place][transition.index()]
    }

    /// Walks one transition's column in place order.
    pub fn column(&self, transition: TransitionId) -> impl Iterator<Item = (PlaceId, T)> + '_ {
        self.rows
            .iter_enumerated()
            .map(move |(place, row)| (place, row[transition.index()]))
    }
}

impl Incidence<u64> {
    /// Entry-wise `self − other`; yields the net effect table when called as
    /// `post.difference(&pre)`.
    pub fn difference(&self, other: &Self) -> Incidence<i64> {
        assert_eq!(self.places(), other.places());
        assert_eq!(self.transitions(), other.transitions());
        let rows = self
            .rows
            .iter()
            .zip(other.rows.iter())
            .map(|(left, right)| {
                left.iter()
                    .zip(right.iter())
                    .map(|(l, r)| *l as i64 - *r as i64)
                    .collect::<SmallRow<_>>()
            })
            .collect();
        Incidence {
            rows,
            cols: self.cols,
        }
    }
}

impl<T> fmt::Debug for Incidence<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Incidence")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}
