//! Prefix rewriting from the OCR index's view of the library to the
//! backend's view.

use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathRule {
    pub from: String,
    pub to: String,
}

impl PathRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Ordered rule set. The first rule whose `from` prefixes a path wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathRewriter {
    rules: Vec<PathRule>,
}

impl PathRewriter {
    /// Keeps the rules in the given order.
    pub fn new(rules: Vec<PathRule>) -> Result<Self, ValidationError> {
        {
            let mut seen = HashSet::new();
            for rule in &rules {
                if rule.from.is_empty() {
                    return Err(ValidationError::EmptyRulePrefix);
                }
                if !seen.insert(rule.from.as_str()) {
                    return Err(ValidationError::DuplicateRulePrefix(rule.from.clone()));
                }
            }
        }
        Ok(Self { rules })
    }

    /// Builds from an unordered mapping. Longer prefixes are tried first so
    /// the result does not depend on map iteration order.
    pub fn from_map<I>(map: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut rules: Vec<PathRule> = map
            .into_iter()
            .map(|(from, to)| PathRule { from, to })
            .collect();
        rules.sort_by(|a, b| {
            b.from
                .len()
                .cmp(&a.from.len())
                .then_with(|| a.from.cmp(&b.from))
        });
        Self::new(rules)
    }

    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rewrite<'a>(&self, path: &'a str) -> Cow<'a, str> {
        for rule in &self.rules {
            if let Some(rest) = path.strip_prefix(rule.from.as_str()) {
                return Cow::Owned(format!("{}{}", rule.to, rest));
            }
        }
        Cow::Borrowed(path)
    }

    pub fn rewrite_all<'a, I>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        paths
            .into_iter()
            .map(|p| self.rewrite(p).into_owned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_rule_replaces_prefix() {
        let rw = PathRewriter::new(vec![PathRule::new("/mnt/a", "/data/a")]).unwrap();
        assert_eq!(rw.rewrite("/mnt/a/photo.jpg"), "/data/a/photo.jpg");
        assert_eq!(rw.rewrite("/mnt/b/photo.jpg"), "/mnt/b/photo.jpg");
        assert!(matches!(rw.rewrite("/other"), Cow::Borrowed(_)));
    }

    #[test]
    fn only_the_leading_occurrence_is_replaced() {
        let rw = PathRewriter::new(vec![PathRule::new("/x", "/y")]).unwrap();
        assert_eq!(rw.rewrite("/x/x/x.jpg"), "/y/x/x.jpg");
        assert_eq!(rw.rewrite("/a/x/b.jpg"), "/a/x/b.jpg");
    }

    #[test]
    fn list_order_is_respected() {
        let rw = PathRewriter::new(vec![
            PathRule::new("/mnt", "/short"),
            PathRule::new("/mnt/a", "/long"),
        ])
        .unwrap();
        assert_eq!(rw.rewrite("/mnt/a/1.jpg"), "/short/a/1.jpg");
    }

    #[test]
    fn map_form_prefers_longest_prefix() {
        let rw = PathRewriter::from_map(vec![
            ("/mnt".to_string(), "/short".to_string()),
            ("/mnt/a".to_string(), "/long".to_string()),
        ])
        .unwrap();
        assert_eq!(rw.rewrite("/mnt/a/1.jpg"), "/long/1.jpg");
        assert_eq!(rw.rewrite("/mnt/b/1.jpg"), "/short/b/1.jpg");
        assert_eq!(rw.rules()[0].from, "/mnt/a");
    }

    #[test]
    fn empty_and_duplicate_prefixes_are_rejected() {
        assert_eq!(
            PathRewriter::new(vec![PathRule::new("", "/x")]),
            Err(ValidationError::EmptyRulePrefix)
        );
        assert_eq!(
            PathRewriter::new(vec![PathRule::new("/a", "/x"), PathRule::new("/a", "/y")]),
            Err(ValidationError::DuplicateRulePrefix("/a".into()))
        );
    }

    #[test]
    fn no_rules_is_identity() {
        let rw = PathRewriter::default();
        assert!(rw.is_empty());
        assert_eq!(
            rw.rewrite_all(["/a.jpg", "/b.jpg"]),
            vec!["/a.jpg".to_string(), "/b.jpg".to_string()]
        );
    }
}
