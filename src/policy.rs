//! Naming and enum-matching policy.
//!
//! Every knob here cascades: an explicit property-level setting wins, then the
//! declaring type, then each lexically enclosing type from the nearest outward,
//! and finally the built-in default.

use crate::naming::{self, NamingPattern};

/// How a data string is matched against enum constant names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnumScheme {
    #[default]
    ExactMatch,
    CaseInsensitive,
}

impl EnumScheme {
    /// Find the constant `input` selects, if any.
    pub fn parse<'a>(self, input: &str, constants: &'a [String]) -> Option<&'a str> {
        let found = match self {
            EnumScheme::ExactMatch => constants.iter().find(|c| c.as_str() == input),
            EnumScheme::CaseInsensitive => constants.iter().find(|c| c.eq_ignore_ascii_case(input)),
        };
        found.map(String::as_str)
    }
}

/// Resolve a cascading setting.
///
/// `scopes` yields the declaring type's setting first, then each enclosing
/// type's, nearest first.
pub fn cascade<T: Copy + Default>(
    explicit: Option<T>,
    scopes: impl IntoIterator<Item = Option<T>>,
) -> T {
    explicit
        .or_else(|| scopes.into_iter().flatten().next())
        .unwrap_or_default()
}

/// The key a property is read from: an explicit rename verbatim, otherwise the
/// declared name under `pattern`.
pub fn effective_name(declared: &str, rename: Option<&str>, pattern: NamingPattern) -> String {
    match rename {
        Some(key) => key.to_string(),
        None => naming::format(declared, pattern),
    }
}

/// Closest constant to a rejected input, compared case-insensitively.
///
/// A constant qualifies when its edit distance is at most 2, or at most 30% of
/// the constant's length.
pub fn suggest(input: &str, constants: &[String]) -> Option<String> {
    if input.is_empty() {
        return None;
    }
    let needle = input.to_lowercase();
    let mut best: Option<(usize, &String)> = None;
    for constant in constants {
        let distance = levenshtein(&needle, &constant.to_lowercase());
        let close = distance <= 2 || (distance as f64) <= constant.chars().count() as f64 * 0.3;
        if close && best.is_none_or(|(d, _)| distance < d) {
            best = Some((distance, constant));
        }
    }
    best.map(|(_, c)| c.clone())
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut row = Vec::with_capacity(b.len() + 1);
        row.push(i + 1);
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            let value = (prev[j + 1] + 1).min(row[j] + 1).min(prev[j] + cost);
            row.push(value);
        }
        prev = row;
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constants() -> Vec<String> {
        vec!["HELLO".into(), "GOODBYE".into()]
    }

    #[test]
    fn exact_match_is_case_sensitive() {
        let c = constants();
        assert_eq!(EnumScheme::ExactMatch.parse("HELLO", &c), Some("HELLO"));
        assert_eq!(EnumScheme::ExactMatch.parse("hello", &c), None);
    }

    #[test]
    fn case_insensitive_accepts_any_case() {
        let c = constants();
        assert_eq!(EnumScheme::CaseInsensitive.parse("hello", &c), Some("HELLO"));
        assert_eq!(EnumScheme::CaseInsensitive.parse("GoodBye", &c), Some("GOODBYE"));
        assert_eq!(EnumScheme::CaseInsensitive.parse("hi", &c), None);
    }

    #[test]
    fn explicit_setting_wins() {
        let chosen = cascade(
            Some(NamingPattern::UpperKebabCase),
            [Some(NamingPattern::LowerSnakeCase)],
        );
        assert_eq!(chosen, NamingPattern::UpperKebabCase);
    }

    #[test]
    fn nearest_scope_wins() {
        let chosen = cascade(
            None,
            [None, Some(EnumScheme::CaseInsensitive), Some(EnumScheme::ExactMatch)],
        );
        assert_eq!(chosen, EnumScheme::CaseInsensitive);
    }

    #[test]
    fn falls_back_to_default() {
        assert_eq!(cascade::<NamingPattern>(None, [None, None]), NamingPattern::Default);
        assert_eq!(cascade::<EnumScheme>(None, []), EnumScheme::ExactMatch);
    }

    #[test]
    fn rename_is_verbatim() {
        assert_eq!(
            effective_name("listenPort", Some("PORT"), NamingPattern::LowerSnakeCase),
            "PORT"
        );
        assert_eq!(
            effective_name("listenPort", None, NamingPattern::LowerSnakeCase),
            "listen_port"
        );
    }

    #[test]
    fn suggestion_picks_nearest_constant() {
        let c = vec!["LOW".to_string(), "MEDIUM".into(), "HIGH".into()];
        assert_eq!(suggest("hgih", &c), Some("HIGH".into()));
        assert_eq!(suggest("meduim", &c), Some("MEDIUM".into()));
        assert_eq!(suggest("enormous", &c), None);
        assert_eq!(suggest("", &c), None);
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }
}
