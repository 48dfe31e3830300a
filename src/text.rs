use once_cell::sync::Lazy;
use regex::Regex;

static TRAILING_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.[a-zA-Z0-9]+$").expect("valid extension regex"));

/// Splits a symbol name (or free query text) into lowercase word fragments.
///
/// Indexing and querying both go through this function, so any change here
/// invalidates existing token postings and requires a rebuild.
///
/// Stages, applied in order:
/// 1. drop a trailing `.ext` so file-like names do not index their extension
/// 2. break camelCase and acronym (`HTTPResponse`) boundaries
/// 3. collapse runs of `_ - . /` into a single space
/// 4. drop anything that is not an ASCII letter, digit or space
/// 5. break letter/digit boundaries (`v2` -> `v 2`)
/// 6. lowercase and split on whitespace
///
/// Digit boundaries are split after stage 4 so that the output is a fixed
/// point: `tokenize(tokenize(x).join(" ")) == tokenize(x)`.
pub fn tokenize(name: &str) -> Vec<String> {
    let stripped = TRAILING_EXTENSION.replace(name, "");
    let split = insert_case_boundaries(&stripped);
    let spaced = collapse_separators(&split);
    let cleaned: String = spaced
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect();

    insert_digit_boundaries(&cleaned)
        .to_ascii_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn insert_case_boundaries(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 8);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let camel = prev.is_ascii_lowercase() && c.is_ascii_uppercase();
            let acronym = prev.is_ascii_uppercase()
                && c.is_ascii_uppercase()
                && next.is_some_and(|n| n.is_ascii_lowercase());
            if camel || acronym {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

fn insert_digit_boundaries(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if let Some(p) = prev {
            if (p.is_ascii_alphabetic() && c.is_ascii_digit())
                || (p.is_ascii_digit() && c.is_ascii_alphabetic())
            {
                out.push(' ');
            }
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

fn collapse_separators(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for c in s.chars() {
        if matches!(c, '_' | '-' | '.' | '/') {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("getHTTPResponse_v2.cpp", &["get", "http", "response", "v", "2"] ; "extension acronym and digits")]
    #[test_case("parse_line", &["parse", "line"] ; "snake case")]
    #[test_case("kebab-case-name", &["kebab", "case", "name"] ; "kebab case")]
    #[test_case("src/util/strbuf", &["src", "util", "strbuf"] ; "path like")]
    #[test_case("readFile", &["read", "file"] ; "camel case")]
    #[test_case("operator<<", &["operator"] ; "symbols removed")]
    #[test_case("__init__", &["init"] ; "separator runs")]
    #[test_case("", &[] ; "empty")]
    #[test_case("  ", &[] ; "blank")]
    fn tokenize_table(input: &str, expected: &[&str]) {
        assert_eq!(tokenize(input), expected);
    }

    #[test]
    fn extension_only_stripped_at_end() {
        assert_eq!(tokenize("a.b_c"), vec!["a", "b", "c"]);
        assert_eq!(tokenize("a.b"), vec!["a"]);
        assert_eq!(tokenize("main.c"), vec!["main"]);
    }

    #[test]
    fn boundaries_are_judged_before_symbols_are_removed() {
        // `$` keeps `a` and `B` apart during case splitting, then vanishes.
        assert_eq!(tokenize("a$B"), vec!["ab"]);
        // digit edges are judged on the cleaned text
        assert_eq!(tokenize("a$2"), vec!["a", "2"]);
    }

    proptest! {
        #[test]
        fn tokenize_is_idempotent(input in "[a-zA-Z0-9_./$ -]{0,40}") {
            let once = tokenize(&input);
            let twice = tokenize(&once.join(" "));
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn tokens_are_lowercase_alphanumeric(input in ".{0,40}") {
            for token in tokenize(&input) {
                prop_assert!(!token.is_empty());
                prop_assert!(token.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
            }
        }
    }
}
