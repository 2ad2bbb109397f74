use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// A [Vec] holding at least one element.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "Vec<T>", into = "Vec<T>")]
pub struct NonEmptyVec<T: Clone>(Vec<T>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("expected at least one element")]
pub struct EmptyVecError;

impl<T: Clone> NonEmptyVec<T> {
    pub fn new(first: T) -> Self {
        Self(vec![first])
    }

    pub fn push(&mut self, t: T) {
        self.0.push(t)
    }

    /// Apply a fallible conversion to every element, keeping their order.
    pub fn try_map<U: Clone, E>(
        &self,
        f: impl FnMut(&T) -> Result<U, E>,
    ) -> Result<NonEmptyVec<U>, E> {
        self.0.iter().map(f).collect::<Result<Vec<U>, E>>().map(NonEmptyVec)
    }

    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T: Clone> TryFrom<Vec<T>> for NonEmptyVec<T> {
    type Error = EmptyVecError;

    fn try_from(v: Vec<T>) -> Result<Self, Self::Error> {
        if v.is_empty() {
            return Err(EmptyVecError);
        }
        Ok(Self(v))
    }
}

impl<T: Clone> From<NonEmptyVec<T>> for Vec<T> {
    fn from(NonEmptyVec(v): NonEmptyVec<T>) -> Self {
        v
    }
}

impl<T: Clone> Deref for NonEmptyVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T: Clone> IntoIterator for NonEmptyVec<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
