//! Expansion of trailing pytest arguments given on the command line.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// `${NAME}` (group 1) or `$NAME` (group 2).
static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").unwrap()
});

/// Replace `$VAR` and `${VAR}` using `lookup`. Unknown variables are left
/// untouched.
pub fn expand_vars<F>(token: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    VAR_RE
        .replace_all(token, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |m| m.as_str());
            lookup(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Expand every token against `lookup`, then split on whitespace.
pub fn expand_args_with<F>(tokens: &[String], lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    tokens
        .iter()
        .flat_map(|token| {
            expand_vars(token, &lookup)
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Expand against the process environment.
pub fn expand_args(tokens: &[String]) -> Vec<String> {
    expand_args_with(tokens, |name| std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        match name {
            "OPTS" => Some("-x  -q".to_string()),
            "MARK" => Some("slow".to_string()),
            _ => None,
        }
    }

    #[test]
    fn expands_both_forms() {
        assert_eq!(expand_vars("-m $MARK", env), "-m slow");
        assert_eq!(expand_vars("${MARK}er", env), "slower");
    }

    #[test]
    fn unknown_variables_are_kept() {
        assert_eq!(expand_vars("$NOPE/${ALSO_NOPE}", env), "$NOPE/${ALSO_NOPE}");
    }

    #[test]
    fn expanded_tokens_are_split_on_whitespace() {
        let tokens = vec!["$OPTS".to_string(), "-k name".to_string(), "  ".to_string()];
        assert_eq!(expand_args_with(&tokens, env), vec!["-x", "-q", "-k", "name"]);
    }

    #[test]
    fn no_tokens_gives_no_args() {
        assert!(expand_args_with(&[], env).is_empty());
    }
}
