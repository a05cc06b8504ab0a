//! Attribute-based subscription filters.

use std::collections::HashMap;

/// A predicate over one named event attribute and an allow-list of values.
///
/// A message matches iff it carries the attribute and the value is in the
/// allow-list. Subscriptions without a filter match everything.
#[derive(Debug, Clone)]
pub struct AttributeFilter {
    attribute: String,
    allowlist: Vec<String>,
}

impl AttributeFilter {
    pub fn new<I, S>(attribute: impl Into<String>, allowlist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attribute: attribute.into(),
            allowlist: allowlist.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, attributes: &HashMap<String, String>) -> bool {
        attributes
            .get(&self.attribute)
            .is_some_and(|value| self.allowlist.iter().any(|allowed| allowed == value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn matches_value_in_allowlist() {
        let filter = AttributeFilter::new("comment_type", ["Caption"]);
        assert!(filter.matches(&attrs(&[("comment_type", "Caption")])));
    }

    #[test]
    fn rejects_value_outside_allowlist() {
        let filter = AttributeFilter::new("comment_type", ["Caption"]);
        assert!(!filter.matches(&attrs(&[("comment_type", "Other")])));
    }

    #[test]
    fn rejects_missing_attribute() {
        let filter = AttributeFilter::new("comment_type", ["Caption"]);
        assert!(!filter.matches(&attrs(&[("unrelated", "Caption")])));
        assert!(!filter.matches(&HashMap::new()));
    }
}
