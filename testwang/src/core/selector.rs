//! Deterministic translation of dotted test ids into pytest selectors.
//!
//! The default rule is positional: with two segments the id is
//! `module.function`, with three or more the last two segments are always
//! `Class.method`. A module-level function nested in a package
//! (`pkg.mod.test_fn`) therefore translates to `pkg.py::mod::test_fn`; use
//! filesystem resolution (`io::resolve`) when that matters.

use std::collections::HashMap;

use crate::core::types::{Selector, TestId};
use crate::error::TranslateError;

/// Translate with the positional class/method rule.
pub fn translate(id: &TestId) -> Result<Selector, TranslateError> {
    let segments = checked_segments(id)?;
    let module_len = if segments.len() == 2 {
        1
    } else {
        segments.len() - 2
    };
    Ok(join_selector(&segments, module_len))
}

/// Split `id` into segments, rejecting ids with fewer than two segments or
/// any empty segment.
pub fn checked_segments(id: &TestId) -> Result<Vec<&str>, TranslateError> {
    let segments: Vec<&str> = id.segments().collect();
    if segments.len() < 2 || segments.iter().any(|segment| segment.trim().is_empty()) {
        return Err(TranslateError::MalformedTestId {
            id: id.as_str().to_string(),
        });
    }
    Ok(segments)
}

/// Build `a/b.py::C::m` from segments, where the first `module_len` segments
/// form the module path.
pub fn join_selector(segments: &[&str], module_len: usize) -> Selector {
    let (module, rest) = segments.split_at(module_len);
    let mut selector = module.join("/");
    selector.push_str(".py");
    for part in rest {
        selector.push_str("::");
        selector.push_str(part);
    }
    Selector::new(selector)
}

/// Bidirectional TestId <-> Selector mapping for one run, in input order.
#[derive(Debug, Clone, Default)]
pub struct SelectorMap {
    entries: Vec<(TestId, Selector)>,
    by_selector: HashMap<Selector, TestId>,
}

impl SelectorMap {
    pub fn ids(&self) -> impl Iterator<Item = &TestId> {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn entries(&self) -> &[(TestId, Selector)] {
        &self.entries
    }

    pub fn selector(&self, id: &TestId) -> Option<&Selector> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, selector)| selector)
    }

    pub fn test_id(&self, selector: &Selector) -> Option<&TestId> {
        self.by_selector.get(selector)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Translate every id, failing on the first bad one.
///
/// Duplicate ids keep their first position. Two distinct ids that translate
/// to the same selector cannot be told apart in the runner's output, so that
/// is rejected as malformed too.
pub fn translate_all<F>(
    ids: &[TestId],
    mut translate_one: F,
) -> Result<SelectorMap, TranslateError>
where
    F: FnMut(&TestId) -> Result<Selector, TranslateError>,
{
    let mut map = SelectorMap::default();
    for id in ids {
        if map.selector(id).is_some() {
            continue;
        }
        let selector = translate_one(id)?;
        if map.by_selector.contains_key(&selector) {
            return Err(TranslateError::MalformedTestId {
                id: id.as_str().to_string(),
            });
        }
        map.by_selector.insert(selector.clone(), id.clone());
        map.entries.push((id.clone(), selector));
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(id: &str) -> Result<String, TranslateError> {
        translate(&TestId::new(id)).map(|s| s.as_str().to_string())
    }

    #[test]
    fn two_segments_are_module_and_function() {
        assert_eq!(sel("test_mod.test_fn").unwrap(), "test_mod.py::test_fn");
    }

    #[test]
    fn trailing_pair_is_class_and_method() {
        assert_eq!(sel("a.b.C.test_x").unwrap(), "a/b.py::C::test_x");
        assert_eq!(sel("a.b.test_y").unwrap(), "a.py::b::test_y");
    }

    #[test]
    fn single_segment_is_malformed() {
        let err = sel("test_bare").expect_err("malformed");
        assert_eq!(
            err,
            TranslateError::MalformedTestId {
                id: "test_bare".to_string()
            }
        );
    }

    #[test]
    fn empty_segment_is_malformed() {
        assert!(sel("a..b").is_err());
        assert!(sel("a.b.").is_err());
    }

    #[test]
    fn translation_is_deterministic() {
        let id = TestId::new("pkg.mod.Class.test_it");
        assert_eq!(translate(&id), translate(&id));
    }

    #[test]
    fn translate_all_keeps_order_and_maps_back() {
        let ids = vec![
            TestId::new("a.b.C.test_x"),
            TestId::new("a.test_y"),
            TestId::new("a.b.C.test_x"),
        ];
        let map = translate_all(&ids, translate).expect("translate");
        assert_eq!(map.len(), 2);
        let order: Vec<&str> = map.ids().map(TestId::as_str).collect();
        assert_eq!(order, vec!["a.b.C.test_x", "a.test_y"]);
        assert_eq!(
            map.test_id(&Selector::new("a.py::test_y")),
            Some(&TestId::new("a.test_y"))
        );
    }

    #[test]
    fn translate_all_fails_fast_on_bad_id() {
        let ids = vec![TestId::new("a.test_y"), TestId::new("test_bare")];
        assert!(translate_all(&ids, translate).is_err());
    }
}
