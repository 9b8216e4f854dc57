//! Range filter primitives shared by [`crate::records::RecordsFilter`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lower bound of a [`Range`].
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Lower<T> {
    /// `>= value`.
    Inclusive(T),
    /// `> value`.
    Exclusive(T),
}

/// Upper bound of a [`Range`].
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Upper<T> {
    /// `<= value`.
    Inclusive(T),
    /// `< value`.
    Exclusive(T),
}

/// An optionally-bounded range over an orderable type.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Range<T> {
    /// Lower bound, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<Lower<T>>,

    /// Upper bound, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<Upper<T>>,
}

impl<T: PartialOrd> Range<T> {
    /// Does `value` fall within the range?
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        let lower_ok = match &self.lower {
            Some(Lower::Inclusive(v)) => value >= v,
            Some(Lower::Exclusive(v)) => value > v,
            None => true,
        };
        let upper_ok = match &self.upper {
            Some(Upper::Inclusive(v)) => value <= v,
            Some(Upper::Exclusive(v)) => value < v,
            None => true,
        };
        lower_ok && upper_ok
    }
}

/// A range over timestamps.
pub type DateRange = Range<DateTime<Utc>>;
