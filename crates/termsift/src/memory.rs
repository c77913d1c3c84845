//! In-memory inverted index.
//!
//! [`MemoryIndex`] is a complete [`SearchSession`] over entities held in
//! memory. Each field listed in [`Searchable::FIELDS`] is indexed twice:
//!
//! - **analyzed**: tokens from [`analyze`] with their positions, used by
//!   expressions (terms, prefixes, phrases, regular expressions);
//! - **keyword**: the raw string form of the value, used by filters.
//!
//! Hits come back in insertion order unless sort keys are given.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use regex::Regex;

use crate::analysis::analyze;
use crate::config::{Config, IndexConfig};
use crate::error::{Result, SearchError};
use crate::expression::{BooleanClause, Expression, Occur};
use crate::filter::Term;
use crate::ordering::compare_by_orderings;
use crate::parser::QueryParser;
use crate::traits::{SearchHits, SearchRequest, SearchSession, Searchable};
use crate::value::Projection;

/// Position of a document in the index.
pub type DocId = usize;

/// token -> document -> positions
type Postings = BTreeMap<String, BTreeMap<DocId, Vec<u32>>>;

/// An in-memory index of `T` documents.
///
/// # Example
///
/// ```
/// use termsift::{Entity, FieldValue, MemoryIndex, Searchable, SearchQuery, MetadataRegistry};
///
/// #[derive(Debug, Clone)]
/// struct Drug {
///     id: i64,
///     name: &'static str,
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
///             "name" => self.name.into(),
///             _ => FieldValue::Null,
///         }
///     }
/// }
///
/// let mut index = MemoryIndex::new();
/// index.add(Drug { id: 1, name: "Aspirin 100mg" });
/// index.add(Drug { id: 2, name: "Codeine" });
///
/// let metadata = MetadataRegistry::new().register_entity::<Drug>("id");
/// let query = SearchQuery::new("name:aspirin", &index, &metadata).unwrap();
/// let drugs = query.list().unwrap();
/// assert_eq!(drugs.len(), 1);
/// assert_eq!(drugs[0].id, 1);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryIndex<T> {
    documents: Vec<T>,
    analyzed: HashMap<String, Postings>,
    keywords: HashMap<String, HashMap<String, BTreeSet<DocId>>>,
    parser: QueryParser,
    config: IndexConfig,
}

impl<T: Searchable> Default for MemoryIndex<T> {
    fn default() -> Self {
        MemoryIndex::new()
    }
}

impl<T: Searchable> MemoryIndex<T> {
    /// Creates an empty index with default configuration.
    pub fn new() -> Self {
        MemoryIndex::with_config(Config::default())
    }

    /// Creates an empty index.
    pub fn with_config(config: Config) -> Self {
        MemoryIndex {
            documents: Vec::new(),
            analyzed: HashMap::new(),
            keywords: HashMap::new(),
            parser: QueryParser::new(config.search),
            config: config.index,
        }
    }

    /// Indexes a document and returns its id.
    pub fn add(&mut self, document: T) -> DocId {
        let id = self.documents.len();
        for &field in T::FIELDS {
            let value = document.field_value(field);
            let Some(text) = value.as_text() else {
                continue;
            };

            self.keywords
                .entry(field.to_string())
                .or_default()
                .entry(text.to_string())
                .or_default()
                .insert(id);

            let postings = self.analyzed.entry(field.to_string()).or_default();
            for (position, token) in analyze(&text).into_iter().enumerate() {
                postings
                    .entry(token)
                    .or_default()
                    .entry(id)
                    .or_default()
                    .push(position as u32);
            }
        }
        self.documents.push(document);
        tracing::trace!(entity = T::NAME, doc = id, "indexed document");
        id
    }

    /// Returns a document by id.
    pub fn get(&self, id: DocId) -> Option<&T> {
        self.documents.get(id)
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if nothing has been indexed.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Fields an expression with the given field qualifier searches.
    fn fields<'a>(&'a self, field: &'a Option<String>) -> Vec<&'a str> {
        match field {
            Some(name) => vec![name.as_str()],
            None => T::FIELDS.to_vec(),
        }
    }

    fn postings(&self, field: &str) -> Option<&Postings> {
        self.analyzed.get(field)
    }

    /// Documents matching an expression.
    fn matching(&self, expression: &Expression) -> Result<BTreeSet<DocId>> {
        let docs = match expression {
            Expression::MatchAll => (0..self.documents.len()).collect(),
            Expression::Term { field, text } => self
                .fields(field)
                .into_iter()
                .filter_map(|name| self.postings(name)?.get(text))
                .flat_map(|docs| docs.keys().copied())
                .collect(),
            Expression::Prefix { field, prefix } => {
                let prefix = prefix.as_str();
                self.fields(field)
                    .into_iter()
                    .filter_map(|name| self.postings(name))
                    .flat_map(move |postings| {
                        postings
                            .range(prefix.to_string()..)
                            .take_while(move |(token, _)| token.starts_with(prefix))
                            .flat_map(|(_, docs)| docs.keys().copied())
                    })
                    .collect()
            }
            Expression::Phrase { field, terms } => self
                .fields(field)
                .into_iter()
                .filter_map(|name| self.postings(name))
                .flat_map(|postings| phrase_matches(postings, terms))
                .collect(),
            Expression::Regex { field, pattern } => {
                let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|err| {
                    SearchError::syntax(0, format!("invalid regular expression: {}", err))
                })?;
                self.fields(field)
                    .into_iter()
                    .filter_map(|name| self.postings(name))
                    .flat_map(|postings| {
                        postings
                            .iter()
                            .filter(|(token, _)| regex.is_match(token))
                            .flat_map(|(_, docs)| docs.keys().copied())
                            .collect::<Vec<_>>()
                    })
                    .collect()
            }
            Expression::Boolean(clauses) => self.boolean(clauses)?,
        };
        Ok(docs)
    }

    fn boolean(&self, clauses: &[BooleanClause]) -> Result<BTreeSet<DocId>> {
        let mut required: Option<BTreeSet<DocId>> = None;
        let mut optional: BTreeSet<DocId> = BTreeSet::new();
        let mut prohibited: BTreeSet<DocId> = BTreeSet::new();

        for clause in clauses {
            let docs = self.matching(&clause.expression)?;
            match clause.occur {
                Occur::Must => {
                    required = Some(match required {
                        Some(current) => current.intersection(&docs).copied().collect(),
                        None => docs,
                    });
                }
                Occur::Should => optional.extend(docs),
                Occur::MustNot => prohibited.extend(docs),
            }
        }

        // Without required clauses at least one optional clause has to match.
        let candidates = required.unwrap_or(optional);
        Ok(candidates.difference(&prohibited).copied().collect())
    }

    fn has_keyword(&self, doc: DocId, term: &Term) -> bool {
        self.keywords
            .get(&term.field)
            .and_then(|values| values.get(&term.value))
            .is_some_and(|docs| docs.contains(&doc))
    }

    /// Documents matching the expression and filter, in insertion order.
    fn candidates(&self, request: &SearchRequest<'_>) -> Result<BTreeSet<DocId>> {
        let mut docs = self.matching(request.expression)?;
        if let Some(filter) = request.filter {
            docs.retain(|doc| filter.matches(|term| self.has_keyword(*doc, term)));
        }
        Ok(docs)
    }

    fn check_field(field: &str) -> Result<()> {
        if T::FIELDS.contains(&field) {
            Ok(())
        } else {
            Err(SearchError::UnknownField {
                field: field.to_string(),
            })
        }
    }

    /// Runs a request down to the ids of the windowed hits.
    fn execute(&self, request: &SearchRequest<'_>) -> Result<SearchHits<DocId>> {
        for order_by in request.sort {
            Self::check_field(&order_by.field)?;
        }

        let docs = self.candidates(request)?;
        let total = docs.len() as u64;
        let mut ordered: Vec<DocId> = docs.into_iter().collect();
        if !request.sort.is_empty() {
            let accessor = |doc: &T, field: &str| doc.field_value(field);
            ordered.sort_by(|a, b| {
                compare_by_orderings(
                    &self.documents[*a],
                    &self.documents[*b],
                    request.sort,
                    &accessor,
                )
            });
        }

        let mut partial = false;
        if let Some(cap) = self.config.max_hits {
            if ordered.len() > cap {
                ordered.truncate(cap);
                partial = true;
            }
        }

        let items: Vec<DocId> = request.window.apply(ordered.into_iter()).collect();
        tracing::debug!(
            entity = T::NAME,
            total,
            returned = items.len(),
            partial,
            "executed search"
        );
        Ok(SearchHits {
            items,
            total,
            partial,
        })
    }
}

/// Documents holding `terms` at consecutive positions.
fn phrase_matches(postings: &Postings, terms: &[String]) -> Vec<DocId> {
    let Some((first, rest)) = terms.split_first() else {
        return Vec::new();
    };
    let Some(first_docs) = postings.get(first) else {
        return Vec::new();
    };

    let mut following = Vec::with_capacity(rest.len());
    for term in rest {
        match postings.get(term) {
            Some(docs) => following.push(docs),
            None => return Vec::new(),
        }
    }

    first_docs
        .iter()
        .filter(|(doc, starts)| {
            starts.iter().any(|&start| {
                following.iter().enumerate().all(|(offset, docs)| {
                    docs.get(*doc)
                        .is_some_and(|positions| positions.contains(&(start + offset as u32 + 1)))
                })
            })
        })
        .map(|(doc, _)| *doc)
        .collect()
}

impl<T: Searchable + Clone> SearchSession<T> for MemoryIndex<T> {
    fn parse(&self, text: &str) -> Result<Expression> {
        self.parser.parse(text)
    }

    fn search(&self, request: &SearchRequest<'_>) -> Result<SearchHits<T>> {
        let hits = self.execute(request)?;
        Ok(SearchHits {
            items: hits
                .items
                .into_iter()
                .map(|doc| self.documents[doc].clone())
                .collect(),
            total: hits.total,
            partial: hits.partial,
        })
    }

    fn project(
        &self,
        request: &SearchRequest<'_>,
        fields: &[String],
    ) -> Result<SearchHits<Projection>> {
        for field in fields {
            Self::check_field(field)?;
        }
        let hits = self.execute(request)?;
        Ok(SearchHits {
            items: hits
                .items
                .into_iter()
                .map(|doc| {
                    let document = &self.documents[doc];
                    fields
                        .iter()
                        .map(|field| (field.clone(), document.field_value(field)))
                        .collect()
                })
                .collect(),
            total: hits.total,
            partial: hits.partial,
        })
    }

    fn count(&self, request: &SearchRequest<'_>) -> Result<u64> {
        Ok(self.candidates(request)?.len() as u64)
    }
}
