//! Termsift - Full-text query builder over pluggable search engines.
//!
//! Termsift turns user-typed search text into a query against a full-text
//! engine, narrows it with term filters, and materializes the results as
//! entities, field projections or pages. It supports:
//!
//! - Query text with fields, phrases, prefixes, regular expressions and
//!   boolean operators, parsed by [`QueryParser`]
//! - Include/exclude term filters combined into one attached [`Filter`]
//! - Duplicate elimination on any field with [`SearchQuery::skip_same`]
//! - Multi-field ordering, pagination and partial-result reporting
//! - A complete in-memory engine, [`MemoryIndex`]
//!
//! # Quick Start
//!
//! ```rust
//! use termsift::{Entity, FieldValue, MemoryIndex, MetadataRegistry, Searchable, SearchQuery};
//!
//! // Define your entity
//! #[derive(Debug, Clone)]
//! struct Obs {
//!     id: i64,
//!     patient: i64,
//!     concept: &'static str,
//!     kind: &'static str,
//! }
//!
//! impl Entity for Obs {
//!     const NAME: &'static str = "Obs";
//! }
//!
//! // Tell the index how to read it
//! impl Searchable for Obs {
//!     const FIELDS: &'static [&'static str] = &["id", "patient", "concept", "kind"];
//!
//!     fn field_value(&self, field: &str) -> FieldValue {
//!         match field {
//!             "id" => self.id.into(),
//!             "patient" => self.patient.into(),
//!             "concept" => self.concept.into(),
//!             "kind" => self.kind.into(),
//!             _ => FieldValue::Null,
//!         }
//!     }
//! }
//!
//! let mut index = MemoryIndex::new();
//! index.add(Obs { id: 1, patient: 7, concept: "Blood pressure", kind: "vital" });
//! index.add(Obs { id: 2, patient: 7, concept: "Blood glucose", kind: "lab" });
//! index.add(Obs { id: 3, patient: 8, concept: "Blood pressure", kind: "vital" });
//! index.add(Obs { id: 4, patient: 8, concept: "Body weight", kind: "vital" });
//! let metadata = MetadataRegistry::new().register_entity::<Obs>("id");
//!
//! // Build and execute a query
//! let query = SearchQuery::new("blood", &index, &metadata)?
//!     .exclude("kind", "lab")
//!     .skip_same("concept")?;
//!
//! let results = query.list()?;
//! assert_eq!(results.len(), 1);
//! assert_eq!(results[0].id, 1);
//! # Ok::<(), termsift::SearchError>(())
//! ```
//!
//! # Filter Semantics
//!
//! Every `include*` call adds one group; every `exclude*` value joins one
//! shared exclusion set:
//!
//! ```text
//! match = expression
//!       ∧ (each include group has at least one term present)
//!       ∧ (no excluded term present)
//! ```
//!
//! Two single-value includes on the same field therefore require a document
//! to hold both values. Filters compare raw stored values; expressions match
//! analyzed tokens.
//!
//! # Query Syntax
//!
//! | Form | Meaning |
//! |------|---------|
//! | `aspirin` | token in any default field |
//! | `name:aspirin` | token in `name` |
//! | `"oral drops"` | adjacent tokens |
//! | `asp*` | token prefix |
//! | `/asp.+n/` | token regular expression |
//! | `a AND b`, `a && b` | both |
//! | `a OR b`, `a \|\| b` | either |
//! | `NOT a`, `!a`, `-a` | must not match |
//! | `+a` | must match |
//! | `name:(a b)` | group on one field |
//! | `*:*` | every document |

pub mod analysis;
mod config;
mod error;
mod expression;
mod filter;
mod memory;
mod ordering;
mod page;
mod parser;
mod query;
mod traits;
mod value;

// Re-export public API
pub use config::{Config, DefaultOperator, IndexConfig, SearchConfig};
pub use error::{Result, SearchError};
pub use expression::{BooleanClause, Expression, Occur};
pub use filter::{Filter, InclusionGroup, Term, TermFilter};
pub use memory::{DocId, MemoryIndex};
pub use ordering::{compare_by_orderings, compare_values, Dir, OrderBy};
pub use page::ResultPage;
pub use parser::{escape_query, QueryParser};
pub use query::{CustomPreparation, Preparation, SearchQuery};
pub use traits::{
    Entity, EntityMetadata, MetadataRegistry, SearchHits, SearchRequest, SearchSession,
    Searchable, Window,
};
pub use value::{FieldValue, Projection};
