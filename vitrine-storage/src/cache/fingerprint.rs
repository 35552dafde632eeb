//! Query fingerprints.
//!
//! A fingerprint is the cache identity of a [`QuerySpec`]. It is a pure
//! function of the query's canonical form, so equal queries always share a
//! fingerprint and distinct queries collide only if SHA-256 does.
//!
//! # Canonical Form
//!
//! Fields are written in a fixed order, each terminated by `;`:
//!
//! ```text
//! category=<v>;brand=<v>;in_stock=<v>;price=<v>;page=<n>;sort_field=<v>;sort_order=<asc|desc>;
//! ```
//!
//! - absent values are written as `~`
//! - strings are length-prefixed: `s<byte len>:<text>`
//! - a price range is written as the IEEE-754 bits of both bounds in hex,
//!   joined by `..`
//!
//! Length prefixes keep the encoding injective whatever bytes a filter
//! value contains.
//!
//! # Storage Keys
//!
//! A fingerprint names a query, not a page of records. The same query cut at
//! another page size, or answered by another record source whose history
//! does not carry over, is a different page. [`KeyScope`] carries those
//! and prefixes every result store key:
//!
//! ```text
//! <collection>:<epoch or ~>:p<page size>:qf1:<sha256 hex>
//! ```

use std::fmt;
use std::fmt::Write as _;

use sha2::{Digest, Sha256};
use vitrine_core::{EntityId, QuerySpec};

/// Format version, bumped whenever the canonical form changes.
const FINGERPRINT_VERSION: &str = "qf1";

/// Sentinel for an absent field.
const ABSENT: &str = "~";

/// Cache identity of a validated query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryFingerprint(String);

impl QueryFingerprint {
    /// Fingerprint a query.
    pub fn of(spec: &QuerySpec) -> Self {
        let digest = Sha256::digest(Self::canonical_form(spec).as_bytes());
        Self(format!("{}:{}", FINGERPRINT_VERSION, hex::encode(digest)))
    }

    /// Pre-hash encoding of a query.
    pub fn canonical_form(spec: &QuerySpec) -> String {
        let mut out = String::with_capacity(128);
        push_text(&mut out, "category", spec.category());
        push_text(&mut out, "brand", spec.brand());

        out.push_str("in_stock=");
        match spec.in_stock() {
            Some(flag) => out.push_str(if flag { "true" } else { "false" }),
            None => out.push_str(ABSENT),
        }
        out.push(';');

        out.push_str("price=");
        match spec.price() {
            Some(range) => {
                let _ = write!(
                    out,
                    "{:016x}..{:016x}",
                    range.min().to_bits(),
                    range.max().to_bits()
                );
            }
            None => out.push_str(ABSENT),
        }
        out.push(';');

        let _ = write!(out, "page={};", spec.page());
        push_text(&mut out, "sort_field", Some(spec.sort_field()));
        let _ = write!(out, "sort_order={};", spec.sort_order().as_str());
        out
    }

    /// The fingerprint string, including its version prefix.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Result store key for this fingerprint within `scope`.
    pub fn storage_key(&self, scope: &KeyScope) -> String {
        format!("{}:{}", scope, self.0)
    }
}

/// Partition of a result store that one cache reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyScope {
    collection: &'static str,
    epoch: Option<EntityId>,
    page_size: u64,
}

impl KeyScope {
    /// Scope for `collection` pages of `page_size` records, with no epoch.
    pub fn new(collection: &'static str, page_size: u64) -> Self {
        Self {
            collection,
            epoch: None,
            page_size,
        }
    }

    /// Pin the scope to one record source history.
    pub fn with_epoch(mut self, epoch: Option<EntityId>) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    pub fn epoch(&self) -> Option<EntityId> {
        self.epoch
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }
}

impl fmt::Display for KeyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.epoch {
            Some(epoch) => write!(f, "{}:{}:p{}", self.collection, epoch.simple(), self.page_size),
            None => write!(f, "{}:{}:p{}", self.collection, ABSENT, self.page_size),
        }
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn push_text(out: &mut String, name: &str, value: Option<&str>) {
    out.push_str(name);
    out.push('=');
    match value {
        Some(text) => {
            let _ = write!(out, "s{}:{}", text.len(), text);
        }
        None => out.push_str(ABSENT),
    }
    out.push(';');
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use vitrine_core::{QuerySpecParams, SortOrder, SORTABLE_FIELDS};

    fn arb_spec() -> impl Strategy<Value = QuerySpec> {
        (
            proptest::option::of("[A-Za-z~;:= ]{1,6}"),
            proptest::option::of("[A-Za-z~;:=]{1,4}"),
            proptest::option::of(any::<bool>()),
            proptest::option::of((0u32..4, 0u32..4)),
            1u64..4,
            proptest::sample::select(SORTABLE_FIELDS.to_vec()),
            prop_oneof![Just(SortOrder::Asc), Just(SortOrder::Desc)],
        )
            .prop_filter_map(
                "valid spec",
                |(category, brand, in_stock, price, page, field, order)| {
                    let (min, max) = match price {
                        Some((a, b)) => (Some(f64::from(a.min(b))), Some(f64::from(a.max(b)))),
                        None => (None, None),
                    };
                    QuerySpecParams {
                        category,
                        brand,
                        in_stock,
                        min_price: min,
                        max_price: max,
                        page: Some(page),
                        sort_field: Some(field.to_string()),
                        sort_order: Some(order),
                    }
                    .into_spec()
                    .ok()
                },
            )
    }

    proptest! {
        /// Property: two specs share a fingerprint exactly when they are equal.
        #[test]
        fn prop_fingerprint_equality_matches_spec_equality(a in arb_spec(), b in arb_spec()) {
            let fa = QueryFingerprint::of(&a);
            let fb = QueryFingerprint::of(&b);
            prop_assert_eq!(a == b, fa == fb);
        }

        /// Property: canonical form is injective over specs.
        #[test]
        fn prop_canonical_form_injective(a in arb_spec(), b in arb_spec()) {
            let ca = QueryFingerprint::canonical_form(&a);
            let cb = QueryFingerprint::canonical_form(&b);
            prop_assert_eq!(a == b, ca == cb);
        }

        /// Property: fingerprinting is deterministic.
        #[test]
        fn prop_fingerprint_deterministic(a in arb_spec()) {
            prop_assert_eq!(QueryFingerprint::of(&a), QueryFingerprint::of(&a.clone()));
        }
    }
}
