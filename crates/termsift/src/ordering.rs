//! Sort keys passed to the engine.
//!
//! Without sort keys an engine returns hits in its own order, which for
//! [`crate::MemoryIndex`] is insertion order. Null values sort after
//! everything else in both directions, so documents missing a sort field
//! never crowd the first page.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::SearchError;
use crate::value::FieldValue;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dir {
    #[default]
    Asc,
    Desc,
}

impl Dir {
    /// Orients an ascending comparison.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        if self == Dir::Desc {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

impl fmt::Display for Dir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dir::Asc => "asc",
            Dir::Desc => "desc",
        })
    }
}

impl FromStr for Dir {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Dir::Asc),
            "desc" | "descending" => Ok(Dir::Desc),
            other => Err(SearchError::Config(format!(
                "unknown sort direction '{}'",
                other
            ))),
        }
    }
}

/// One sort key: a field and a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub dir: Dir,
}

impl OrderBy {
    pub fn new(field: impl Into<String>, dir: Dir) -> Self {
        OrderBy {
            field: field.into(),
            dir,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        OrderBy::new(field, Dir::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        OrderBy::new(field, Dir::Desc)
    }

    /// Compares two values of this key's field.
    ///
    /// The direction flips present values only; a null stays behind a
    /// present value either way. `None` when the types differ.
    pub fn compare(&self, a: &FieldValue, b: &FieldValue) -> Option<Ordering> {
        match (a.is_null(), b.is_null()) {
            (false, false) => compare_values(a, b).map(|o| self.dir.apply(o)),
            _ => compare_values(a, b),
        }
    }
}

/// Parses `field` or `field:dir`, e.g. `"name:desc"`.
impl FromStr for OrderBy {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, dir) = match s.rsplit_once(':') {
            Some((field, dir)) => (field.trim(), dir.trim().parse()?),
            None => (s.trim(), Dir::Asc),
        };
        if field.is_empty() {
            return Err(SearchError::Config(format!("sort key '{}' has no field", s)));
        }
        Ok(OrderBy::new(field, dir))
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.dir)
    }
}

/// Ascending comparison of two field values.
///
/// Text compares case-insensitively, then by raw text, so `"aspirin"` sorts
/// next to `"Aspirin"`. Nulls come last. `None` for mismatched types.
pub fn compare_values(a: &FieldValue, b: &FieldValue) -> Option<Ordering> {
    use FieldValue::*;

    match (a, b) {
        (Null, Null) => Some(Ordering::Equal),
        (Null, _) => Some(Ordering::Greater),
        (_, Null) => Some(Ordering::Less),
        (Text(x), Text(y)) => {
            let folded = x.to_lowercase().cmp(&y.to_lowercase());
            Some(folded.then_with(|| x.cmp(y)))
        }
        (Integer(x), Integer(y)) => Some(x.cmp(y)),
        (Bool(x), Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Compares two documents key by key, reading fields through `accessor`.
///
/// Later keys only break ties left by earlier ones. Keys whose values cannot
/// be compared are skipped.
pub fn compare_by_orderings<T, F>(a: &T, b: &T, orderings: &[OrderBy], accessor: &F) -> Ordering
where
    F: Fn(&T, &str) -> FieldValue,
{
    orderings
        .iter()
        .filter_map(|key| key.compare(&accessor(a, &key.field), &accessor(b, &key.field)))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_from_text() {
        assert_eq!("DESC".parse::<Dir>().unwrap(), Dir::Desc);
        assert_eq!("ascending".parse::<Dir>().unwrap(), Dir::Asc);
        assert!("sideways".parse::<Dir>().is_err());
        assert_eq!(Dir::Desc.apply(Ordering::Less), Ordering::Greater);
    }

    #[test]
    fn sort_key_from_text() {
        assert_eq!("name".parse::<OrderBy>().unwrap(), OrderBy::asc("name"));
        assert_eq!(
            "dateCreated:desc".parse::<OrderBy>().unwrap(),
            OrderBy::desc("dateCreated")
        );
        assert!(":desc".parse::<OrderBy>().is_err());
        assert_eq!(OrderBy::desc("name").to_string(), "name:desc");
    }

    #[test]
    fn text_compares_case_insensitively() {
        let a = FieldValue::from("aspirin");
        let b = FieldValue::from("Codeine");
        assert_eq!(compare_values(&a, &b), Some(Ordering::Less));
    }

    #[test]
    fn null_sorts_last_both_directions() {
        let null = FieldValue::Null;
        let one = FieldValue::from(1i64);
        assert_eq!(OrderBy::asc("x").compare(&null, &one), Some(Ordering::Greater));
        assert_eq!(OrderBy::desc("x").compare(&null, &one), Some(Ordering::Greater));
        assert_eq!(OrderBy::desc("x").compare(&one, &null), Some(Ordering::Less));
    }

    #[test]
    fn mismatched_types_are_incomparable() {
        assert_eq!(
            compare_values(&FieldValue::from("1"), &FieldValue::from(1i64)),
            None
        );
    }

    #[test]
    fn later_keys_break_ties() {
        let rows = [("b", 1i64), ("a", 2), ("a", 1)];
        let accessor = |row: &(&str, i64), field: &str| match field {
            "name" => FieldValue::from(row.0),
            "rank" => FieldValue::from(row.1),
            _ => FieldValue::Null,
        };
        let orderings = vec![OrderBy::asc("name"), OrderBy::desc("rank")];

        let mut sorted = rows.to_vec();
        sorted.sort_by(|a, b| compare_by_orderings(a, b, &orderings, &accessor));
        assert_eq!(sorted, vec![("a", 2), ("a", 1), ("b", 1)]);
    }
}
