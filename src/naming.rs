//! Key naming patterns.
//!
//! A declared property name such as `listenPort` is split into words and
//! re-joined according to a [`NamingPattern`] to produce the key looked up in
//! the data tree (`listen_port`, `Listen-Port`, ...).

/// How a declared name is transformed into a data key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NamingPattern {
    /// Use the declared name verbatim.
    #[default]
    Default,
    LowerCamelCase,
    UpperCamelCase,
    LowerSnakeCase,
    UpperSnakeCase,
    LowerKebabCase,
    UpperKebabCase,
}

impl NamingPattern {
    pub const ALL: [NamingPattern; 7] = [
        NamingPattern::Default,
        NamingPattern::LowerCamelCase,
        NamingPattern::UpperCamelCase,
        NamingPattern::LowerSnakeCase,
        NamingPattern::UpperSnakeCase,
        NamingPattern::LowerKebabCase,
        NamingPattern::UpperKebabCase,
    ];
}

/// Apply `pattern` to `name`.
///
/// Words break at a lowercase→uppercase transition and before an uppercase
/// letter that is followed by a lowercase one, so acronyms stay together:
/// `parseXMLDocument` splits into `parse`, `XML`, `Document`. Only ASCII
/// letters are considered when looking for boundaries.
pub fn format(name: &str, pattern: NamingPattern) -> String {
    let words = split_words(name);
    match pattern {
        NamingPattern::Default => name.to_string(),
        NamingPattern::UpperCamelCase => words.iter().map(|w| capitalize(w)).collect(),
        NamingPattern::LowerCamelCase => {
            let joined: String = words.iter().map(|w| capitalize(w)).collect();
            uncapitalize(&joined)
        }
        NamingPattern::LowerSnakeCase => join_lower(&words, "_"),
        NamingPattern::UpperSnakeCase => join_capitalized(&words, "_"),
        NamingPattern::LowerKebabCase => join_lower(&words, "-"),
        NamingPattern::UpperKebabCase => join_capitalized(&words, "-"),
    }
}

fn split_words(name: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = name.char_indices().collect();
    let mut words = Vec::new();
    let mut start = 0;
    for i in 1..chars.len() {
        let (offset, c) = chars[i];
        let after_lower = chars[i - 1].1.is_ascii_lowercase() && c.is_ascii_uppercase();
        let before_lower = c.is_ascii_uppercase()
            && chars.get(i + 1).is_some_and(|(_, n)| n.is_ascii_lowercase());
        if after_lower || before_lower {
            words.push(&name[start..offset]);
            start = offset;
        }
    }
    if start < name.len() {
        words.push(&name[start..]);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn uncapitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn join_lower(words: &[&str], sep: &str) -> String {
    words
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(sep)
}

fn join_capitalized(words: &[&str], sep: &str) -> String {
    words
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_and_kebab() {
        assert_eq!(format("helloWorld", NamingPattern::LowerSnakeCase), "hello_world");
        assert_eq!(format("helloWorld", NamingPattern::UpperSnakeCase), "Hello_World");
        assert_eq!(format("helloWorld", NamingPattern::LowerKebabCase), "hello-world");
        assert_eq!(format("helloWorld", NamingPattern::UpperKebabCase), "Hello-World");
    }

    #[test]
    fn camel_variants() {
        assert_eq!(format("helloWorld", NamingPattern::UpperCamelCase), "HelloWorld");
        assert_eq!(format("HelloWorld", NamingPattern::LowerCamelCase), "helloWorld");
        assert_eq!(format("hello", NamingPattern::UpperCamelCase), "Hello");
    }

    #[test]
    fn default_is_identity() {
        for name in ["helloWorld", "XMLParser", "a_b", ""] {
            assert_eq!(format(name, NamingPattern::Default), name);
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        for pattern in NamingPattern::ALL {
            assert_eq!(format("", pattern), "");
        }
    }

    #[test]
    fn single_word_has_no_separator() {
        assert_eq!(format("port", NamingPattern::LowerSnakeCase), "port");
        assert_eq!(format("port", NamingPattern::UpperKebabCase), "Port");
    }

    #[test]
    fn acronyms_stay_together() {
        assert_eq!(
            format("parseXMLDocument", NamingPattern::LowerSnakeCase),
            "parse_xml_document"
        );
        assert_eq!(format("XMLParser", NamingPattern::LowerKebabCase), "xml-parser");
        assert_eq!(format("HTTP", NamingPattern::LowerSnakeCase), "http");
    }

    #[test]
    fn upper_variants_keep_the_rest_of_each_word() {
        assert_eq!(format("loadXML", NamingPattern::UpperSnakeCase), "Load_XML");
    }

    #[test]
    fn non_ascii_letters_do_not_split() {
        assert_eq!(format("größeÜber", NamingPattern::LowerSnakeCase), "größeüber");
    }
}
