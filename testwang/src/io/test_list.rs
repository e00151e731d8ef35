//! Reading the list of test ids to examine.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::types::TestId;

/// Parse one id per line; blank lines and `#` comments are skipped and
/// surrounding whitespace is trimmed. Repeated ids keep their first position.
pub fn parse_test_list(contents: &str) -> Vec<TestId> {
    let mut ids: Vec<TestId> = Vec::new();
    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let id = TestId::new(line);
        if ids.contains(&id) {
            warn!(test = %id, "duplicate test id ignored");
            continue;
        }
        ids.push(id);
    }
    ids
}

pub fn read_test_list(path: &Path) -> Result<Vec<TestId>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read test list {}", path.display()))?;
    let ids = parse_test_list(&contents);
    debug!(path = %path.display(), tests = ids.len(), "test list loaded");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_and_comment_lines() {
        let ids = parse_test_list(
            "# flaky on CI\n\n  a.b.C.test_x  \n#a.b.test_z\na.b.test_y\n\t\n",
        );
        let ids: Vec<&str> = ids.iter().map(TestId::as_str).collect();
        assert_eq!(ids, vec!["a.b.C.test_x", "a.b.test_y"]);
    }

    #[test]
    fn duplicates_keep_first_position() {
        let ids = parse_test_list("a.x\na.y\na.x\n");
        let ids: Vec<&str> = ids.iter().map(TestId::as_str).collect();
        assert_eq!(ids, vec!["a.x", "a.y"]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = read_test_list(&temp.path().join("nope.txt")).expect_err("missing");
        assert!(format!("{err:#}").contains("read test list"));
    }
}
