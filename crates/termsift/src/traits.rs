//! Collaborator interfaces.
//!
//! The builder never talks to a concrete engine. It is handed a
//! [`SearchSession`] that parses and executes, and an [`EntityMetadata`]
//! that knows which property identifies each entity type. Entity types
//! themselves implement [`Entity`], and [`Searchable`] when they are to be
//! indexed by the bundled [`crate::MemoryIndex`].

use std::collections::HashMap;

use crate::error::{Result, SearchError};
use crate::expression::Expression;
use crate::filter::Filter;
use crate::ordering::OrderBy;
use crate::value::{FieldValue, Projection};

/// A type that search results are materialized as.
pub trait Entity {
    /// Name the entity is registered under in the persistence metadata.
    const NAME: &'static str;
}

/// An entity the in-memory index can store and match.
///
/// # Example
///
/// ```
/// use termsift::{Entity, FieldValue, Searchable};
///
/// #[derive(Clone)]
/// struct Drug {
///     id: i64,
///     name: String,
/// }
///
/// impl Entity for Drug {
///     const NAME: &'static str = "Drug";
/// }
///
/// impl Searchable for Drug {
///     const FIELDS: &'static [&'static str] = &["id", "name"];
///
///     fn field_value(&self, field: &str) -> FieldValue {
///         match field {
///             "id" => self.id.into(),
///             "name" => self.name.as_str().into(),
///             _ => FieldValue::Null,
///         }
///     }
/// }
/// ```
pub trait Searchable: Entity {
    /// Fields indexed for every document.
    const FIELDS: &'static [&'static str];

    /// Returns the value of a field.
    ///
    /// Called while indexing, projecting and sorting. Unknown fields should
    /// return [`FieldValue::Null`].
    fn field_value(&self, field: &str) -> FieldValue;
}

/// Window applied to a search at materialization time.
///
/// `None` means "from the start" for `first_result` and "no limit" for
/// `max_results`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    /// Number of hits to skip.
    pub first_result: Option<u64>,
    /// Maximum number of hits to return.
    pub max_results: Option<u64>,
}

impl Window {
    /// The unbounded window.
    pub fn all() -> Self {
        Window::default()
    }

    /// Creates a window.
    pub fn new(first_result: Option<u64>, max_results: Option<u64>) -> Self {
        Window {
            first_result,
            max_results,
        }
    }

    /// Applies the window to an iterator of hits.
    pub fn apply<I: Iterator>(self, hits: I) -> impl Iterator<Item = I::Item> {
        let skip = self.first_result.map_or(0, saturating_usize);
        let take = self.max_results.map_or(usize::MAX, saturating_usize);
        hits.skip(skip).take(take)
    }
}

fn saturating_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// Everything an engine needs to run one search.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    /// Primary expression.
    pub expression: &'a Expression,
    /// Filter evaluated next to the expression.
    pub filter: Option<&'a Filter>,
    /// Sort keys; empty means engine order.
    pub sort: &'a [OrderBy],
    /// Pagination window.
    pub window: Window,
}

impl<'a> SearchRequest<'a> {
    /// Creates an unfiltered, unsorted, unbounded request.
    pub fn new(expression: &'a Expression) -> Self {
        SearchRequest {
            expression,
            filter: None,
            sort: &[],
            window: Window::all(),
        }
    }

    /// Sets the filter.
    pub fn filter(mut self, filter: Option<&'a Filter>) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the sort keys.
    pub fn sort(mut self, sort: &'a [OrderBy]) -> Self {
        self.sort = sort;
        self
    }

    /// Sets the window.
    pub fn window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }
}

/// Hits returned by an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHits<R> {
    /// Hits inside the requested window, in engine order.
    pub items: Vec<R>,
    /// Number of documents matching, regardless of the window.
    pub total: u64,
    /// `true` if the engine stopped collecting for resource reasons.
    pub partial: bool,
}

/// A search engine session borrowed by the builder.
///
/// Every call blocks until the engine answers. Errors are returned to the
/// caller untouched.
pub trait SearchSession<T> {
    /// Parses query text, failing with [`SearchError::QuerySyntax`].
    fn parse(&self, text: &str) -> Result<Expression>;

    /// Runs a search and materializes hits as entities.
    fn search(&self, request: &SearchRequest<'_>) -> Result<SearchHits<T>>;

    /// Runs a search and reads only the named fields of each hit.
    fn project(&self, request: &SearchRequest<'_>, fields: &[String])
        -> Result<SearchHits<Projection>>;

    /// Counts matching documents without materializing them.
    fn count(&self, request: &SearchRequest<'_>) -> Result<u64>;

    /// Returns the only matching entity.
    ///
    /// Fails with [`SearchError::MultipleResults`] when more than one
    /// document matches.
    fn unique(&self, request: &SearchRequest<'_>) -> Result<Option<T>> {
        let mut hits = self.search(request)?;
        if hits.total > 1 {
            return Err(SearchError::MultipleResults { count: hits.total });
        }
        Ok(hits.items.pop())
    }
}

/// Persistence metadata consulted for identifier properties.
pub trait EntityMetadata {
    /// Returns the identifier property of an entity, if registered.
    fn identifier_property(&self, entity: &str) -> Option<String>;
}

/// Fixed entity-to-identifier mapping.
///
/// ```
/// use termsift::{EntityMetadata, MetadataRegistry};
///
/// let metadata = MetadataRegistry::new().register("Concept", "conceptId");
/// assert_eq!(metadata.identifier_property("Concept").as_deref(), Some("conceptId"));
/// assert_eq!(metadata.identifier_property("Drug"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    identifiers: HashMap<String, String>,
}

impl MetadataRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        MetadataRegistry::default()
    }

    /// Registers the identifier property of an entity.
    pub fn register(mut self, entity: impl Into<String>, property: impl Into<String>) -> Self {
        self.identifiers.insert(entity.into(), property.into());
        self
    }

    /// Registers the identifier property of an [`Entity`] type.
    pub fn register_entity<T: Entity>(self, property: impl Into<String>) -> Self {
        self.register(T::NAME, property)
    }
}

impl EntityMetadata for MetadataRegistry {
    fn identifier_property(&self, entity: &str) -> Option<String> {
        self.identifiers.get(entity).cloned()
    }
}
