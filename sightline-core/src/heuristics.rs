//! Identifier detection heuristics.
//!
//! These decide which columns are worth offering identity resolution for.
//! They are deliberately cheap and allowed to be wrong: the resolution
//! coordinator re-checks every value with [`is_identifier`] before it is sent.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Minimum share of non-null values that must look like identifiers.
pub const DEFAULT_IDENTIFIER_RATIO: f64 = 0.7;

// 8-4-4-4-12 hex, version nibble 1-5, variant nibble 8/9/a/b.
static IDENTIFIER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$",
    )
    .unwrap_or_else(|err| unreachable!("identifier pattern is a literal: {err}"))
});

/// Substrings that suggest a column holds directory identities.
const IDENTITY_NAME_HINTS: &[&str] = &[
    "principalid",
    "objectid",
    "ownerid",
    "userid",
    "groupid",
    "clientid",
    "appid",
    "applicationid",
    "assigneeid",
    "identityid",
    "createdby",
    "modifiedby",
];

/// True if `value` is a canonical 36-character hyphenated identifier.
pub fn is_identifier(value: &str) -> bool {
    value.len() == 36 && IDENTIFIER_PATTERN.is_match(value)
}

/// Same as [`is_identifier`] for a raw JSON cell value. Non-strings never match.
pub fn is_identifier_value(value: &Value) -> bool {
    value.as_str().is_some_and(is_identifier)
}

/// True iff at least `threshold` of the non-null values are identifiers.
///
/// A column with no non-null values is never eligible.
pub fn is_identifier_column<'a, I>(values: I, threshold: f64) -> bool
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut non_null = 0usize;
    let mut matching = 0usize;
    for value in values {
        if value.is_null() {
            continue;
        }
        non_null += 1;
        if is_identifier_value(value) {
            matching += 1;
        }
    }
    if non_null == 0 {
        return false;
    }
    (matching as f64 / non_null as f64) >= threshold
}

/// Lowercases the name and drops separator characters.
fn normalize_column_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | '.' | ' ' | '/' | '\\' | '[' | ']'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// True if the column name looks like it carries identities.
pub fn is_likely_identity_column_name(name: &str) -> bool {
    let normalized = normalize_column_name(name);
    if normalized.is_empty() {
        return false;
    }
    IDENTITY_NAME_HINTS
        .iter()
        .any(|hint| normalized.contains(hint))
        || normalized.ends_with("id")
}

/// Name heuristic AND value heuristic (with the default ratio).
pub fn should_offer_resolution<'a, I>(name: &str, values: I) -> bool
where
    I: IntoIterator<Item = &'a Value>,
{
    should_offer_resolution_with(name, values, DEFAULT_IDENTIFIER_RATIO)
}

/// [`should_offer_resolution`] with an explicit identifier ratio.
pub fn should_offer_resolution_with<'a, I>(name: &str, values: I, threshold: f64) -> bool
where
    I: IntoIterator<Item = &'a Value>,
{
    is_likely_identity_column_name(name) && is_identifier_column(values, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GUID: &str = "3f2504e0-4f89-41d3-9a0c-0305e82c3301";

    #[test]
    fn test_identifier_accepts_canonical_forms() {
        assert!(is_identifier(GUID));
        assert!(is_identifier(&GUID.to_ascii_uppercase()));
    }

    #[test]
    fn test_identifier_rejects_near_misses() {
        // version nibble 0
        assert!(!is_identifier("3f2504e0-4f89-01d3-9a0c-0305e82c3301"));
        // variant nibble c
        assert!(!is_identifier("3f2504e0-4f89-41d3-ca0c-0305e82c3301"));
        // no hyphens
        assert!(!is_identifier("3f2504e04f8941d39a0c0305e82c3301"));
        // braces
        assert!(!is_identifier("{3f2504e0-4f89-41d3-9a0c-0305e82c3301}"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("not-a-guid"));
    }

    #[test]
    fn test_identifier_value_ignores_non_strings() {
        assert!(is_identifier_value(&json!(GUID)));
        assert!(!is_identifier_value(&json!(42)));
        assert!(!is_identifier_value(&Value::Null));
        assert!(!is_identifier_value(&json!({ "id": GUID })));
    }

    #[test]
    fn test_identifier_column_ignores_nulls() {
        let values = vec![json!(GUID), Value::Null, Value::Null, json!(GUID)];
        assert!(is_identifier_column(&values, 0.7));
    }

    #[test]
    fn test_identifier_column_all_null_is_never_eligible() {
        let values = vec![Value::Null, Value::Null];
        assert!(!is_identifier_column(&values, 0.0));
        assert!(!is_identifier_column(&Vec::<Value>::new(), 0.0));
    }

    #[test]
    fn test_identifier_column_threshold_boundary() {
        // 7 of 10 is exactly 0.7
        let mut values: Vec<Value> = (0..7).map(|_| json!(GUID)).collect();
        values.extend((0..3).map(|i| json!(format!("name-{i}"))));
        assert!(is_identifier_column(&values, 0.7));

        values.push(json!("one more miss"));
        assert!(!is_identifier_column(&values, 0.7));
    }

    #[test]
    fn test_identity_column_names() {
        assert!(is_likely_identity_column_name("principalId"));
        assert!(is_likely_identity_column_name("properties.principal_id"));
        assert!(is_likely_identity_column_name("Owner-Id"));
        assert!(is_likely_identity_column_name("createdBy"));
        assert!(is_likely_identity_column_name("subscriptionId"));
        assert!(!is_likely_identity_column_name("name"));
        assert!(!is_likely_identity_column_name("location"));
        assert!(!is_likely_identity_column_name(""));
    }

    #[test]
    fn test_should_offer_requires_both_heuristics() {
        let ids = vec![json!(GUID), json!(GUID)];
        let names = vec![json!("alice"), json!("bob")];
        assert!(should_offer_resolution("principalId", &ids));
        assert!(!should_offer_resolution("displayName", &ids));
        assert!(!should_offer_resolution("principalId", &names));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn arb_guid() -> impl Strategy<Value = String> {
        any::<u128>().prop_map(|bits| uuid::Uuid::from_u128(bits).to_string()).prop_map(|s| {
            // force a valid v4 layout
            let mut chars: Vec<char> = s.chars().collect();
            chars[14] = '4';
            chars[19] = 'a';
            chars.into_iter().collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: random v4-shaped identifiers always match, in either case
        #[test]
        fn prop_generated_identifiers_match(guid in arb_guid(), upper in any::<bool>()) {
            let value = if upper { guid.to_ascii_uppercase() } else { guid };
            prop_assert!(is_identifier(&value));
        }

        /// Property: below 70% identifier share, resolution is never offered
        #[test]
        fn prop_low_ratio_never_offered(
            guid in arb_guid(),
            hits in 0usize..20,
            misses in 1usize..20,
            nulls in 0usize..10,
        ) {
            prop_assume!((hits as f64) / ((hits + misses) as f64) < 0.7);
            let mut values: Vec<Value> = Vec::new();
            values.extend((0..hits).map(|_| json!(guid.clone())));
            values.extend((0..misses).map(|i| json!(format!("plain-{i}"))));
            values.extend((0..nulls).map(|_| Value::Null));
            prop_assert!(!should_offer_resolution("principalId", &values));
        }
    }
}
