//! Property-based tests for termsift using proptest.

use std::collections::HashSet;

use proptest::prelude::*;
use termsift::analysis::analyze;
use termsift::{Entity, FieldValue, MemoryIndex, MetadataRegistry, SearchQuery, Searchable};

// ============================================================================
// Test helpers
// ============================================================================

const KINDS: [&str; 3] = ["drug", "vaccine", "lab"];

#[derive(Debug, Clone)]
struct Item {
    id: i64,
    patient: i64,
    kind: &'static str,
    name: String,
}

impl Entity for Item {
    const NAME: &'static str = "Item";
}

impl Searchable for Item {
    const FIELDS: &'static [&'static str] = &["id", "patient", "kind", "name"];

    fn field_value(&self, field: &str) -> FieldValue {
        match field {
            "id" => self.id.into(),
            "patient" => self.patient.into(),
            "kind" => self.kind.into(),
            "name" => self.name.as_str().into(),
            _ => FieldValue::Null,
        }
    }
}

// Strategy to generate documents; ids are assigned on insertion
fn item_strategy() -> impl Strategy<Value = (i64, usize, String)> {
    (0i64..5, 0usize..KINDS.len(), "[a-z]{1,6}( [a-z]{1,6}){0,2}")
}

fn build_index(items: Vec<(i64, usize, String)>) -> MemoryIndex<Item> {
    let mut index = MemoryIndex::new();
    for (n, (patient, kind, name)) in items.into_iter().enumerate() {
        index.add(Item {
            id: n as i64,
            patient,
            kind: KINDS[kind],
            name,
        });
    }
    index
}

fn metadata() -> MetadataRegistry {
    MetadataRegistry::new().register_entity::<Item>("id")
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// Counting and listing agree for any combination of filters.
    #[test]
    fn result_size_equals_list_length(
        items in prop::collection::vec(item_strategy(), 0..40),
        included in prop::collection::vec(0usize..KINDS.len(), 0..3),
        excluded in prop::option::of(0i64..5),
    ) {
        let index = build_index(items);
        let metadata = metadata();
        let query = SearchQuery::match_all(&index, &metadata)
            .unwrap()
            .include_all("kind", included.iter().map(|&k| KINDS[k]))
            .exclude_all("patient", excluded);

        prop_assert_eq!(
            query.result_size().unwrap(),
            query.list().unwrap().len() as u64
        );
    }

    /// Filters never grow the match set.
    #[test]
    fn filters_never_grow_matches(
        items in prop::collection::vec(item_strategy(), 0..40),
        kind in 0usize..KINDS.len(),
        patient in 0i64..5,
    ) {
        let index = build_index(items);
        let metadata = metadata();
        let base = SearchQuery::match_all(&index, &metadata).unwrap();
        let total = base.result_size().unwrap();

        let included = base.clone().include("kind", KINDS[kind]);
        let narrowed = included.result_size().unwrap();
        prop_assert!(narrowed <= total);

        let excluded = included.exclude("patient", patient);
        prop_assert!(excluded.result_size().unwrap() <= narrowed);
    }

    /// Every listed document satisfies every include group and no exclusion.
    #[test]
    fn listed_documents_satisfy_filters(
        items in prop::collection::vec(item_strategy(), 0..40),
        kinds in prop::collection::vec(0usize..KINDS.len(), 1..3),
        patient in 0i64..5,
    ) {
        let index = build_index(items);
        let metadata = metadata();
        let allowed: Vec<&str> = kinds.iter().map(|&k| KINDS[k]).collect();
        let query = SearchQuery::match_all(&index, &metadata)
            .unwrap()
            .include_all("kind", allowed.clone())
            .exclude("patient", patient);

        for item in query.list().unwrap() {
            prop_assert!(allowed.contains(&item.kind));
            prop_assert_ne!(item.patient, patient);
        }
    }

    /// skip_same leaves exactly one document per distinct value.
    #[test]
    fn skip_same_yields_distinct_values(
        items in prop::collection::vec(item_strategy(), 0..40),
    ) {
        let distinct: HashSet<i64> = items.iter().map(|(patient, _, _)| *patient).collect();
        let index = build_index(items);
        let metadata = metadata();
        let listed = SearchQuery::match_all(&index, &metadata)
            .unwrap()
            .skip_same("patient")
            .unwrap()
            .list()
            .unwrap();

        prop_assert_eq!(listed.len(), distinct.len());
        let seen: HashSet<i64> = listed.iter().map(|item| item.patient).collect();
        prop_assert_eq!(seen, distinct);
    }

    /// Consecutive pages cover the match set exactly once.
    #[test]
    fn pages_partition_matches(
        items in prop::collection::vec(item_strategy(), 0..40),
        size in 1u64..7,
    ) {
        let index = build_index(items);
        let metadata = metadata();
        let query = SearchQuery::match_all(&index, &metadata)
            .unwrap()
            .order_asc("id");
        let everything: Vec<i64> = query.list().unwrap().iter().map(|i| i.id).collect();

        let mut paged = Vec::new();
        let mut first = 0;
        while first < everything.len() as u64 {
            let page = query.list_page(Some(first), Some(size)).unwrap();
            prop_assert_eq!(page.total, everything.len() as u64);
            prop_assert!(page.len() as u64 <= size);
            paged.extend(page.items.iter().map(|i| i.id));
            first += size;
        }
        prop_assert_eq!(paged, everything);
    }

    /// Analyzed tokens are lowercase ASCII alphanumerics.
    #[test]
    fn analyzed_tokens_are_normalized(text in "\\PC{0,40}") {
        for token in analyze(&text) {
            prop_assert!(!token.is_empty());
            prop_assert!(token.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        }
    }
}
