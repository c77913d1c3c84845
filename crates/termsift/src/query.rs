//! Query builder and executor.
//!
//! [`SearchQuery`] prepares a base expression once, accumulates term
//! filters on top of it and materializes results through the session it was
//! given. Builder methods take `self` and return it, so a query that has
//! been handed to someone else cannot be changed behind their back; clone it
//! to branch.
//!
//! The only derived state is the attached filter. It is recomputed eagerly
//! by every `include*`/`exclude*` call that changes the accumulated terms,
//! and replaced by [`SearchQuery::skip_same`].

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::mem;
use std::sync::Arc;

use crate::error::{Result, SearchError};
use crate::expression::Expression;
use crate::filter::{Filter, TermFilter};
use crate::ordering::{Dir, OrderBy};
use crate::page::ResultPage;
use crate::traits::{Entity, EntityMetadata, SearchRequest, SearchSession, Window};
use crate::value::Projection;

/// Closure building a custom base expression.
pub type CustomPreparation = Arc<dyn Fn() -> Result<Expression> + Send + Sync>;

/// How a query builds its base expression.
#[derive(Clone)]
pub enum Preparation {
    /// Parse free text with the session; blank text matches everything.
    FreeText(String),
    /// Match every document.
    MatchAll,
    /// Build the expression in code.
    Custom(CustomPreparation),
}

impl Preparation {
    /// Wraps a closure as a custom preparation.
    pub fn custom<F>(build: F) -> Self
    where
        F: Fn() -> Result<Expression> + Send + Sync + 'static,
    {
        Preparation::Custom(Arc::new(build))
    }
}

impl fmt::Debug for Preparation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preparation::FreeText(text) => f.debug_tuple("FreeText").field(text).finish(),
            Preparation::MatchAll => write!(f, "MatchAll"),
            Preparation::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// A full-text query over entities of type `T`.
///
/// # Example
///
/// ```
/// use termsift::{Entity, FieldValue, MemoryIndex, MetadataRegistry, Searchable, SearchQuery};
///
/// #[derive(Debug, Clone)]
/// struct Concept {
///     id: i64,
///     name: &'static str,
///     class: &'static str,
/// }
///
/// impl Entity for Concept {
///     const NAME: &'static str = "Concept";
/// }
///
/// impl Searchable for Concept {
///     const FIELDS: &'static [&'static str] = &["id", "name", "class"];
///
///     fn field_value(&self, field: &str) -> FieldValue {
///         match field {
///             "id" => self.id.into(),
///             "name" => self.name.into(),
///             "class" => self.class.into(),
///             _ => FieldValue::Null,
///         }
///     }
/// }
///
/// let mut index = MemoryIndex::new();
/// index.add(Concept { id: 1, name: "Aspirin tablet", class: "Drug" });
/// index.add(Concept { id: 2, name: "Aspirin allergy", class: "Diagnosis" });
/// index.add(Concept { id: 3, name: "Codeine tablet", class: "Drug" });
/// let metadata = MetadataRegistry::new().register_entity::<Concept>("id");
///
/// let page = SearchQuery::new("tablet", &index, &metadata)?
///     .include_all("class", ["Drug", "Vaccine"])
///     .order_desc("id")
///     .list_page(Some(0), Some(1))?;
///
/// assert_eq!(page.total, 2);
/// assert_eq!(page.items[0].id, 3);
/// # Ok::<(), termsift::SearchError>(())
/// ```
pub struct SearchQuery<'s, T> {
    session: &'s dyn SearchSession<T>,
    metadata: &'s dyn EntityMetadata,
    preparation: Preparation,
    expression: Expression,
    terms: TermFilter,
    filter: Option<Filter>,
    orderings: Vec<OrderBy>,
    deduplicated: bool,
}

impl<'s, T: Entity> SearchQuery<'s, T> {
    /// Creates a query from free text.
    ///
    /// Fails with [`SearchError::QuerySyntax`] if the session cannot parse
    /// the text.
    pub fn new(
        text: &str,
        session: &'s dyn SearchSession<T>,
        metadata: &'s dyn EntityMetadata,
    ) -> Result<Self> {
        Self::with_preparation(Preparation::FreeText(text.to_string()), session, metadata)
    }

    /// Creates a query matching every document.
    pub fn match_all(
        session: &'s dyn SearchSession<T>,
        metadata: &'s dyn EntityMetadata,
    ) -> Result<Self> {
        Self::with_preparation(Preparation::MatchAll, session, metadata)
    }

    /// Creates a query with an explicit preparation strategy.
    pub fn with_preparation(
        preparation: Preparation,
        session: &'s dyn SearchSession<T>,
        metadata: &'s dyn EntityMetadata,
    ) -> Result<Self> {
        let expression = prepare(&preparation, session)?;
        tracing::debug!(entity = T::NAME, expression = %expression, "prepared query");
        Ok(SearchQuery {
            session,
            metadata,
            preparation,
            expression,
            terms: TermFilter::new(),
            filter: None,
            orderings: Vec::new(),
            deduplicated: false,
        })
    }

    // ========================================================================
    // Term filters
    // ========================================================================

    /// Only keeps documents whose `field` holds `value`.
    ///
    /// Every `include*` call adds its own group and groups are combined with
    /// AND: `include("type", "drug").include("type", "vaccine")` only matches
    /// documents holding both values.
    pub fn include(self, field: &str, value: impl ToString) -> Self {
        self.include_all(field, [value])
    }

    /// Only keeps documents whose `field` holds any of `values`.
    ///
    /// Empty input (including `None`) is a no-op.
    pub fn include_all<I>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        let values: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
        if values.is_empty() {
            return self;
        }
        self.terms = mem::take(&mut self.terms).include_all(field, values);
        self.attach_terms();
        self
    }

    /// Drops documents whose `field` holds `value`.
    pub fn exclude(self, field: &str, value: impl ToString) -> Self {
        self.exclude_all(field, [value])
    }

    /// Drops documents whose `field` holds any of `values`.
    ///
    /// Exclusions accumulate across calls. Empty input (including `None`) is
    /// a no-op.
    pub fn exclude_all<I>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        let values: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
        if values.is_empty() {
            return self;
        }
        self.terms = mem::take(&mut self.terms).exclude_all(field, values);
        self.attach_terms();
        self
    }

    fn attach_terms(&mut self) {
        if self.deduplicated {
            tracing::warn!(
                entity = T::NAME,
                "term filter changed after skip_same; duplicates are no longer skipped"
            );
            self.deduplicated = false;
        }
        self.filter = self.terms.to_filter();
        tracing::debug!(
            entity = T::NAME,
            groups = self.terms.groups().len(),
            exclusions = self.terms.exclusions().len(),
            "attached term filter"
        );
    }

    // ========================================================================
    // Duplicate elimination
    // ========================================================================

    /// Keeps only the first document for each distinct value of `field`.
    ///
    /// Runs a projection of the identifier and `field` over everything
    /// currently matching, in the current order, then rebuilds the query
    /// restricted to the identifiers of the first document per value. Call
    /// it last: the accumulated term filter is replaced, and the scan costs
    /// one extra pass over all matches.
    pub fn skip_same(mut self, field: &str) -> Result<Self> {
        let id_property = self.metadata.identifier_property(T::NAME).ok_or_else(|| {
            SearchError::MetadataResolution {
                entity: T::NAME.to_string(),
            }
        })?;

        let fields = [id_property.clone(), field.to_string()];
        let scan = self.session.project(&self.request(Window::all()), &fields)?;
        if scan.partial {
            tracing::warn!(
                entity = T::NAME,
                field,
                total = scan.total,
                "duplicate scan was truncated; unscanned documents are dropped"
            );
        }

        let scanned = scan.items.len();
        let mut seen = HashSet::new();
        let mut ids = BTreeSet::new();
        for row in scan.items {
            let (Some(id), Some(key)) = (row.value_at(0), row.value_at(1)) else {
                continue;
            };
            // Rows without an identifier must not claim their value.
            let Some(id) = id.as_text() else {
                continue;
            };
            if seen.insert(key.clone()) {
                ids.insert(id.into_owned());
            }
        }

        self.expression = prepare(&self.preparation, self.session)?;
        tracing::debug!(
            entity = T::NAME,
            field,
            scanned,
            kept = ids.len(),
            "skipping duplicates"
        );
        self.filter = Some(Filter::Identifiers {
            field: id_property,
            ids,
        });
        self.deduplicated = true;
        Ok(self)
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    /// Adds a sort key.
    pub fn order_by(mut self, field: &str, dir: Dir) -> Self {
        self.orderings.push(OrderBy::new(field, dir));
        self
    }

    /// Adds an ascending sort key.
    pub fn order_asc(self, field: &str) -> Self {
        self.order_by(field, Dir::Asc)
    }

    /// Adds a descending sort key.
    pub fn order_desc(self, field: &str) -> Self {
        self.order_by(field, Dir::Desc)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Returns the prepared base expression.
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Returns the attached filter, if any.
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Returns the accumulated term filter.
    pub fn term_filter(&self) -> &TermFilter {
        &self.terms
    }

    /// Returns the sort keys.
    pub fn orderings(&self) -> &[OrderBy] {
        &self.orderings
    }

    /// Returns `true` if [`SearchQuery::skip_same`] is in effect.
    pub fn is_deduplicated(&self) -> bool {
        self.deduplicated
    }

    // ========================================================================
    // Execution
    // ========================================================================

    fn request(&self, window: Window) -> SearchRequest<'_> {
        SearchRequest::new(&self.expression)
            .filter(self.filter.as_ref())
            .sort(&self.orderings)
            .window(window)
    }

    /// Returns the only matching entity.
    ///
    /// Fails with [`SearchError::MultipleResults`] if several match.
    pub fn unique_result(&self) -> Result<Option<T>> {
        self.session.unique(&self.request(Window::all()))
    }

    /// Returns every matching entity.
    pub fn list(&self) -> Result<Vec<T>> {
        Ok(self.session.search(&self.request(Window::all()))?.items)
    }

    /// Counts matching documents, ignoring any window.
    pub fn result_size(&self) -> Result<u64> {
        self.session.count(&self.request(Window::all()))
    }

    /// Returns one page of entities.
    ///
    /// `None` for `first_result` starts at the first hit; `None` for
    /// `max_results` returns everything from there.
    pub fn list_page(
        &self,
        first_result: Option<u64>,
        max_results: Option<u64>,
    ) -> Result<ResultPage<T>> {
        let window = Window::new(first_result, max_results);
        let hits = self.session.search(&self.request(window))?;
        Ok(ResultPage::from_hits(hits, window))
    }

    /// Returns the named fields of every matching document.
    pub fn list_projection(&self, fields: &[&str]) -> Result<Vec<Projection>> {
        let fields = owned(fields);
        Ok(self
            .session
            .project(&self.request(Window::all()), &fields)?
            .items)
    }

    /// Returns one page of projected fields.
    pub fn list_projection_page(
        &self,
        first_result: Option<u64>,
        max_results: Option<u64>,
        fields: &[&str],
    ) -> Result<ResultPage<Projection>> {
        let window = Window::new(first_result, max_results);
        let hits = self.session.project(&self.request(window), &owned(fields))?;
        Ok(ResultPage::from_hits(hits, window))
    }
}

fn owned(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|field| field.to_string()).collect()
}

/// Builds the base expression. The only place an expression is produced.
fn prepare<T>(preparation: &Preparation, session: &dyn SearchSession<T>) -> Result<Expression> {
    match preparation {
        Preparation::FreeText(text) if text.trim().is_empty() => Ok(Expression::MatchAll),
        Preparation::FreeText(text) => session.parse(text),
        Preparation::MatchAll => Ok(Expression::MatchAll),
        Preparation::Custom(build) => build(),
    }
}

impl<T> Clone for SearchQuery<'_, T> {
    fn clone(&self) -> Self {
        SearchQuery {
            session: self.session,
            metadata: self.metadata,
            preparation: self.preparation.clone(),
            expression: self.expression.clone(),
            terms: self.terms.clone(),
            filter: self.filter.clone(),
            orderings: self.orderings.clone(),
            deduplicated: self.deduplicated,
        }
    }
}

impl<T> fmt::Debug for SearchQuery<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchQuery")
            .field("preparation", &self.preparation)
            .field("expression", &self.expression)
            .field("filter", &self.filter)
            .field("orderings", &self.orderings)
            .field("deduplicated", &self.deduplicated)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Term;
    use crate::traits::SearchHits;
    use std::cell::RefCell;

    struct Stub;

    impl Entity for Stub {
        const NAME: &'static str = "Stub";
    }

    /// Session that records requests and answers with nothing.
    #[derive(Default)]
    struct RecordingSession {
        filters: RefCell<Vec<Option<Filter>>>,
        parsed: RefCell<Vec<String>>,
    }

    impl SearchSession<Stub> for RecordingSession {
        fn parse(&self, text: &str) -> Result<Expression> {
            self.parsed.borrow_mut().push(text.to_string());
            if text.contains('(') {
                return Err(SearchError::syntax(0, "unbalanced parenthesis"));
            }
            Ok(Expression::any_field(text))
        }

        fn search(&self, request: &SearchRequest<'_>) -> Result<SearchHits<Stub>> {
            self.filters.borrow_mut().push(request.filter.cloned());
            Ok(SearchHits {
                items: Vec::new(),
                total: 0,
                partial: false,
            })
        }

        fn project(
            &self,
            request: &SearchRequest<'_>,
            _fields: &[String],
        ) -> Result<SearchHits<Projection>> {
            self.filters.borrow_mut().push(request.filter.cloned());
            Ok(SearchHits {
                items: Vec::new(),
                total: 0,
                partial: false,
            })
        }

        fn count(&self, _request: &SearchRequest<'_>) -> Result<u64> {
            Ok(0)
        }
    }

    fn metadata() -> crate::traits::MetadataRegistry {
        crate::traits::MetadataRegistry::new().register_entity::<Stub>("id")
    }

    #[test]
    fn blank_text_is_not_parsed() {
        let session = RecordingSession::default();
        let metadata = metadata();
        let query = SearchQuery::new("  ", &session, &metadata).unwrap();
        assert!(query.expression().is_match_all());
        assert!(session.parsed.borrow().is_empty());
    }

    #[test]
    fn syntax_error_aborts_construction() {
        let session = RecordingSession::default();
        let metadata = metadata();
        let err = SearchQuery::new("(aspirin", &session, &metadata).unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn custom_preparation() {
        let session = RecordingSession::default();
        let metadata = metadata();
        let preparation = Preparation::custom(|| Ok(Expression::term("class", "drug")));
        let query = SearchQuery::with_preparation(preparation, &session, &metadata).unwrap();
        assert_eq!(query.expression(), &Expression::term("class", "drug"));
    }

    #[test]
    fn empty_include_keeps_no_filter() {
        let session = RecordingSession::default();
        let metadata = metadata();
        let query = SearchQuery::match_all(&session, &metadata)
            .unwrap()
            .include_all("type", Vec::<String>::new())
            .include_all("type", None::<&str>)
            .exclude_all("type", None::<&str>);
        assert!(query.filter().is_none());
    }

    #[test]
    fn filter_is_recomputed_on_every_change() {
        let session = RecordingSession::default();
        let metadata = metadata();
        let query = SearchQuery::match_all(&session, &metadata)
            .unwrap()
            .include("type", "drug");
        let first = query.filter().cloned();

        let query = query.exclude("retired", true);
        let second = query.filter().cloned();

        assert_ne!(first, second);
        match second {
            Some(Filter::Terms { groups, exclusions }) => {
                assert_eq!(groups.len(), 1);
                assert!(exclusions.contains(&Term::new("retired", "true")));
            }
            other => panic!("expected term filter, got {:?}", other),
        }
    }

    #[test]
    fn materialization_sees_current_filter() {
        let session = RecordingSession::default();
        let metadata = metadata();
        let query = SearchQuery::match_all(&session, &metadata).unwrap();
        query.list().unwrap();
        let query = query.include("type", "drug");
        query.list().unwrap();

        let filters = session.filters.borrow();
        assert_eq!(filters.len(), 2);
        assert!(filters[0].is_none());
        assert!(filters[1].is_some());
    }

    #[test]
    fn skip_same_without_identifier_fails() {
        let session = RecordingSession::default();
        let metadata = crate::traits::MetadataRegistry::new();
        let err = SearchQuery::match_all(&session, &metadata)
            .unwrap()
            .skip_same("patientId")
            .unwrap_err();
        assert!(matches!(err, SearchError::MetadataResolution { entity } if entity == "Stub"));
    }

    #[test]
    fn skip_same_re_prepares_and_installs_identifier_filter() {
        let session = RecordingSession::default();
        let metadata = metadata();
        let query = SearchQuery::new("aspirin", &session, &metadata)
            .unwrap()
            .include("type", "drug")
            .skip_same("patientId")
            .unwrap();

        assert_eq!(session.parsed.borrow().len(), 2);
        assert!(query.is_deduplicated());
        assert_eq!(
            query.filter(),
            Some(&Filter::Identifiers {
                field: "id".into(),
                ids: BTreeSet::new(),
            })
        );
        // The scan itself ran under the term filter.
        assert!(matches!(
            session.filters.borrow()[0],
            Some(Filter::Terms { .. })
        ));
    }

    #[test]
    fn include_after_skip_same_replaces_identifier_filter() {
        let session = RecordingSession::default();
        let metadata = metadata();
        let query = SearchQuery::match_all(&session, &metadata)
            .unwrap()
            .skip_same("patientId")
            .unwrap()
            .include("type", "drug");
        assert!(!query.is_deduplicated());
        assert!(matches!(query.filter(), Some(Filter::Terms { .. })));
    }

    #[test]
    fn clone_branches_independently() {
        let session = RecordingSession::default();
        let metadata = metadata();
        let base = SearchQuery::match_all(&session, &metadata).unwrap();
        let drugs = base.clone().include("type", "drug");
        assert!(base.filter().is_none());
        assert!(drugs.filter().is_some());
    }

    #[test]
    fn ordering_is_kept() {
        let session = RecordingSession::default();
        let metadata = metadata();
        let query = SearchQuery::match_all(&session, &metadata)
            .unwrap()
            .order_asc("name")
            .order_desc("id");
        assert_eq!(
            query.orderings(),
            &[OrderBy::asc("name"), OrderBy::desc("id")]
        );
    }
}
