//! Searchable expressions.
//!
//! An [`Expression`] is the primary, scored part of a search: what the
//! free-text parser produces, or what a custom preparation builds by hand.
//! Filters are kept separate (see [`crate::filter`]) so they can be swapped
//! without touching the expression.
//!
//! Boolean expressions follow the usual full-text semantics:
//!
//! ```text
//! match = (every Must clause matches)
//!       ∧ (no MustNot clause matches)
//!       ∧ (some Should clause matches, unless a Must clause exists)
//! ```
//!
//! A boolean made only of `MustNot` clauses matches nothing; combine it with
//! [`Expression::MatchAll`] to get "everything except".

use std::fmt;

/// How a clause participates in a boolean expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occur {
    /// Clause is required.
    Must,
    /// Clause is optional; at least one must match when no `Must` exists.
    Should,
    /// Clause disqualifies a document.
    MustNot,
}

impl Occur {
    /// Returns the query-syntax prefix for this occurrence.
    pub fn prefix(self) -> &'static str {
        match self {
            Occur::Must => "+",
            Occur::Should => "",
            Occur::MustNot => "-",
        }
    }
}

/// A clause of a boolean expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanClause {
    /// How the clause combines with its siblings.
    pub occur: Occur,
    /// The nested expression.
    pub expression: Expression,
}

impl BooleanClause {
    /// Creates a new clause.
    pub fn new(occur: Occur, expression: Expression) -> Self {
        BooleanClause { occur, expression }
    }
}

/// A searchable expression.
///
/// A `field` of `None` means "any indexed field".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// Matches every document.
    MatchAll,
    /// A single analyzed token.
    Term { field: Option<String>, text: String },
    /// Any token starting with `prefix`.
    Prefix { field: Option<String>, prefix: String },
    /// Consecutive tokens in one field.
    Phrase {
        field: Option<String>,
        terms: Vec<String>,
    },
    /// Any token fully matching a regular expression.
    Regex {
        field: Option<String>,
        pattern: String,
    },
    /// Nested clauses.
    Boolean(Vec<BooleanClause>),
}

impl Expression {
    /// Creates a term expression on a specific field.
    pub fn term(field: impl Into<String>, text: impl Into<String>) -> Self {
        Expression::Term {
            field: Some(field.into()),
            text: text.into(),
        }
    }

    /// Creates a term expression searched in any field.
    pub fn any_field(text: impl Into<String>) -> Self {
        Expression::Term {
            field: None,
            text: text.into(),
        }
    }

    /// Creates a prefix expression on a specific field.
    pub fn prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Expression::Prefix {
            field: Some(field.into()),
            prefix: prefix.into(),
        }
    }

    /// Creates a phrase expression on a specific field.
    pub fn phrase<I, S>(field: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expression::Phrase {
            field: Some(field.into()),
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }

    /// Requires every expression to match.
    pub fn all<I: IntoIterator<Item = Expression>>(expressions: I) -> Self {
        Expression::combine(Occur::Must, expressions)
    }

    /// Requires at least one expression to match.
    pub fn any<I: IntoIterator<Item = Expression>>(expressions: I) -> Self {
        Expression::combine(Occur::Should, expressions)
    }

    /// Matches everything except documents matching `expression`.
    pub fn not(expression: Expression) -> Self {
        Expression::Boolean(vec![
            BooleanClause::new(Occur::Must, Expression::MatchAll),
            BooleanClause::new(Occur::MustNot, expression),
        ])
    }

    fn combine<I: IntoIterator<Item = Expression>>(occur: Occur, expressions: I) -> Self {
        let mut clauses: Vec<BooleanClause> = expressions
            .into_iter()
            .map(|expression| BooleanClause::new(occur, expression))
            .collect();
        if clauses.len() == 1 {
            return clauses.remove(0).expression;
        }
        Expression::Boolean(clauses)
    }

    /// Returns `true` if this is [`Expression::MatchAll`].
    pub fn is_match_all(&self) -> bool {
        matches!(self, Expression::MatchAll)
    }
}

fn write_field(f: &mut fmt::Formatter<'_>, field: &Option<String>) -> fmt::Result {
    match field {
        Some(name) => write!(f, "{}:", name),
        None => Ok(()),
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::MatchAll => write!(f, "*:*"),
            Expression::Term { field, text } => {
                write_field(f, field)?;
                write!(f, "{}", text)
            }
            Expression::Prefix { field, prefix } => {
                write_field(f, field)?;
                write!(f, "{}*", prefix)
            }
            Expression::Phrase { field, terms } => {
                write_field(f, field)?;
                write!(f, "\"{}\"", terms.join(" "))
            }
            Expression::Regex { field, pattern } => {
                write_field(f, field)?;
                write!(f, "/{}/", pattern)
            }
            Expression::Boolean(clauses) => {
                write!(f, "(")?;
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}{}", clause.occur.prefix(), clause.expression)?;
                }
                write!(f, ")")
            }
        }
    }
}
