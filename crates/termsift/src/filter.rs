//! Term filters.
//!
//! A [`TermFilter`] accumulates inclusion groups and exclusion terms and
//! turns them into a [`Filter`] the engine applies next to the primary
//! expression. The combination logic is fixed:
//!
//! ```text
//! match = (every inclusion group has at least one matching term)
//!       ∧ (no exclusion term matches)
//! ```
//!
//! Terms are matched against the raw, unanalyzed field value. Filters never
//! influence scoring and never re-parse the expression they are attached to.

use std::collections::BTreeSet;
use std::fmt;

/// A `(field, value)` pair matched exactly against a document field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Term {
    /// The field name.
    pub field: String,
    /// The raw value.
    pub value: String,
}

impl Term {
    /// Creates a new term.
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Term {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.value)
    }
}

/// Terms of which at least one must match.
///
/// Groups are never empty: [`TermFilter::include_all`] ignores empty input
/// instead of adding a group that could never match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InclusionGroup {
    terms: BTreeSet<Term>,
}

impl InclusionGroup {
    /// Returns the terms of this group.
    pub fn terms(&self) -> &BTreeSet<Term> {
        &self.terms
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Always `false` for groups held by a [`TermFilter`].
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Accumulated inclusion groups and exclusion terms.
///
/// Every method consumes the accumulator and returns the updated value, so a
/// filter handed to another component can never change under it.
///
/// # Example
///
/// ```
/// use termsift::TermFilter;
///
/// let filter = TermFilter::new()
///     .include_all("class", ["analgesic", "antipyretic"])
///     .include("form", "tablet")
///     .exclude("retired", true);
///
/// assert_eq!(filter.groups().len(), 2);
/// assert_eq!(filter.exclusions().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermFilter {
    groups: BTreeSet<InclusionGroup>,
    exclusions: BTreeSet<Term>,
}

impl TermFilter {
    /// Creates an empty accumulator, which filters nothing out.
    pub fn new() -> Self {
        TermFilter::default()
    }

    /// Adds a single-term inclusion group.
    pub fn include(self, field: &str, value: impl ToString) -> Self {
        self.include_all(field, [value])
    }

    /// Adds one inclusion group holding every given value.
    ///
    /// Empty input (including `None`) leaves the accumulator unchanged.
    pub fn include_all<I>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        let terms: BTreeSet<Term> = values
            .into_iter()
            .map(|value| Term::new(field, value.to_string()))
            .collect();
        if !terms.is_empty() {
            self.groups.insert(InclusionGroup { terms });
        }
        self
    }

    /// Adds a single exclusion term.
    pub fn exclude(self, field: &str, value: impl ToString) -> Self {
        self.exclude_all(field, [value])
    }

    /// Adds every given value to the exclusion set.
    ///
    /// Empty input (including `None`) leaves the accumulator unchanged.
    pub fn exclude_all<I>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        self.exclusions.extend(
            values
                .into_iter()
                .map(|value| Term::new(field, value.to_string())),
        );
        self
    }

    /// Returns the inclusion groups.
    pub fn groups(&self) -> &BTreeSet<InclusionGroup> {
        &self.groups
    }

    /// Returns the exclusion terms.
    pub fn exclusions(&self) -> &BTreeSet<Term> {
        &self.exclusions
    }

    /// Returns `true` if nothing has been included or excluded.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.exclusions.is_empty()
    }

    /// Builds the engine filter, or `None` when there is nothing to filter.
    pub fn to_filter(&self) -> Option<Filter> {
        if self.is_empty() {
            return None;
        }
        Some(Filter::Terms {
            groups: self.groups.iter().map(|g| g.terms.clone()).collect(),
            exclusions: self.exclusions.clone(),
        })
    }

    /// Evaluates the accumulated terms against a document.
    ///
    /// `has_term` reports whether the document holds the exact term.
    pub fn matches<F>(&self, has_term: F) -> bool
    where
        F: Fn(&Term) -> bool,
    {
        self.groups
            .iter()
            .all(|group| group.terms.iter().any(&has_term))
            && !self.exclusions.iter().any(&has_term)
    }
}

/// Filter attached to a search next to its expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Conjunction of disjunctions, minus exclusions.
    Terms {
        groups: Vec<BTreeSet<Term>>,
        exclusions: BTreeSet<Term>,
    },
    /// Only documents whose identifier field holds one of `ids`.
    ///
    /// An empty id set matches nothing.
    Identifiers { field: String, ids: BTreeSet<String> },
}

impl Filter {
    /// Creates an identifier filter.
    pub fn identifiers<I>(field: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Filter::Identifiers {
            field: field.into(),
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Evaluates the filter against a document.
    ///
    /// `has_term` reports whether the document holds the exact term.
    pub fn matches<F>(&self, has_term: F) -> bool
    where
        F: Fn(&Term) -> bool,
    {
        match self {
            Filter::Terms { groups, exclusions } => {
                groups.iter().all(|group| group.iter().any(&has_term))
                    && !exclusions.iter().any(&has_term)
            }
            Filter::Identifiers { field, ids } => ids
                .iter()
                .any(|id| has_term(&Term::new(field.as_str(), id.as_str()))),
        }
    }

    /// Number of terms the engine has to look up to evaluate this filter.
    pub fn term_count(&self) -> usize {
        match self {
            Filter::Terms { groups, exclusions } => {
                groups.iter().map(BTreeSet::len).sum::<usize>() + exclusions.len()
            }
            Filter::Identifiers { ids, .. } => ids.len(),
        }
    }
}
