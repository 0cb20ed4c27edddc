// SPDX-FileCopyrightText: 2026 Convoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with fuzzy match suggestions.
//!
//! Every figment failure becomes a [`ConfigError`]. Unknown keys and type
//! mismatches are located in the TOML text they came from so miette can
//! underline them; unknown keys also get a Jaro-Winkler "did you mean?".

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
/// Catches typos like `retry_budgt` -> `retry_budget`.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key that no section of `convoy.toml` declares.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(convoy::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// Key as written by the operator.
        key: String,
        /// Closest declared key, when one is similar enough.
        suggestion: Option<String>,
        /// Comma-separated keys the enclosing section accepts.
        valid_keys: String,
        /// Where the key sits in the source, when it could be found.
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that does not deserialize into the declared type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(convoy::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path, e.g. `delivery.retry_budget` or `teams.0.id`.
        key: String,
        detail: String,
        expected: String,
        /// The offending value, when it could be found.
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A key every table of its kind must carry, e.g. a team's `id`.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(convoy::config::missing_key),
        help("add `{key} = <value>` to your convoy.toml")
    )]
    MissingKey {
        /// Dotted path of the absent key.
        key: String,
    },

    /// A value that parsed but breaks a semantic rule, such as a zero
    /// retry budget or two teams sharing a phone number id.
    #[error("validation error: {message}")]
    #[diagnostic(code(convoy::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(convoy::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Convert a `figment::Error` into a list of `ConfigError` diagnostics.
///
/// `toml_sources` holds `(path, content)` pairs for the files that fed the
/// figment; an inline string is passed as a single pair.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let sources = Sources {
                error: &error,
                all: toml_sources,
            };
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = sources.locate(field, KeySpan::Key);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: dotted(&error.path, Some(field)),
                },
                Kind::InvalidType(actual, expected) => {
                    // The failing key is the last path element.
                    let (span, src) = match error.path.split_last() {
                        Some((field, _)) => sources.locate(field, KeySpan::Value),
                        None => (None, None),
                    };
                    ConfigError::InvalidType {
                        key: dotted(&error.path, None),
                        detail: format!("found {actual}, expected {expected}"),
                        expected: expected.to_string(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn dotted(path: &[String], field: Option<&str>) -> String {
    let mut parts: Vec<&str> = path.iter().map(String::as_str).collect();
    parts.extend(field);
    parts.join(".")
}

#[derive(Clone, Copy)]
enum KeySpan {
    Key,
    Value,
}

/// The TOML text a single figment error points into.
struct Sources<'a> {
    error: &'a figment::error::Error,
    all: &'a [(String, String)],
}

impl Sources<'_> {
    fn origin(&self) -> Option<&(String, String)> {
        let file = self
            .error
            .metadata
            .as_ref()
            .and_then(|m| m.source.as_ref())
            .and_then(|s| match s {
                figment::Source::File(path) => Some(path.display().to_string()),
                _ => None,
            });
        match file {
            Some(path) => self.all.iter().find(|(p, _)| *p == path),
            // Inline strings carry no file source.
            None if self.all.len() == 1 => self.all.first(),
            None => None,
        }
    }

    fn locate(
        &self,
        field: &str,
        what: KeySpan,
    ) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
        let Some((name, content)) = self.origin() else {
            return (None, None);
        };
        // For type errors the path ends with the field itself.
        let section = match what {
            KeySpan::Key => &self.error.path[..],
            KeySpan::Value => &self.error.path[..self.error.path.len().saturating_sub(1)],
        };
        let Some(offset) = find_key_offset(content, section, field) else {
            return (None, None);
        };
        let span = match what {
            KeySpan::Key => SourceSpan::new(offset.into(), field.len()),
            KeySpan::Value => match value_span(content, offset + field.len()) {
                Some(span) => span,
                None => SourceSpan::new(offset.into(), field.len()),
            },
        };
        (Some(span), Some(NamedSource::new(name, content.clone())))
    }
}

/// Span of the value following `key = ` on the line starting at `after_key`.
fn value_span(content: &str, after_key: usize) -> Option<SourceSpan> {
    let rest = &content[after_key..];
    let line = rest.split('\n').next().unwrap_or(rest);
    let eq = line.find('=')?;
    let raw = &line[eq + 1..];
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    let start = after_key + eq + 1 + (raw.len() - raw.trim_start().len());
    Some(SourceSpan::new(start.into(), value.len()))
}

/// Find the byte offset of a key in TOML content, relative to a section path.
///
/// `["delivery"]` searches after the `[delivery]` header. `["teams", "1"]`
/// searches after the second `[[teams]]` header. An empty path searches
/// from the start of the document.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let body_start = match path {
        [] => 0,
        [table, index, ..] if index.parse::<usize>().is_ok() => {
            let header = format!("[[{table}]]");
            let nth = index.parse::<usize>().ok()?;
            let (pos, _) = content.match_indices(&header).nth(nth)?;
            pos + header.len()
        }
        [section, ..] => {
            let header = format!("[{section}]");
            content.find(&header)? + header.len()
        }
    };

    let mut offset = body_start;
    for line in content[body_start..].split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let text = &line[indent..];
        if text.starts_with('[') && offset > body_start {
            return None;
        }
        let is_key = text
            .strip_prefix(field)
            .is_some_and(|after| after.starts_with([' ', '\t', '=']));
        if is_key {
            return Some(offset + indent);
        }
        offset += line.len();
    }

    None
}

/// Suggest a similar key name using Jaro-Winkler string similarity.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|&key| (strsim::jaro_winkler(unknown, key), key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggest_retry_budget_for_typo() {
        let valid = &["retry_budget", "backoff_base_ms", "backoff_max_ms"];
        assert_eq!(
            suggest_key("retry_budgt", valid),
            Some("retry_budget".to_string())
        );
    }

    #[test]
    fn suggestion_prefers_closest_key() {
        let valid = &["backoff_base_ms", "backoff_max_ms"];
        assert_eq!(
            suggest_key("backoff_max_m", valid),
            Some("backoff_max_ms".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["name", "log_level"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn find_key_offset_in_section() {
        let content = "[delivery]\nretry_budgt = 3\n";
        let path = vec!["delivery".to_string()];
        let o = find_key_offset(content, &path, "retry_budgt").unwrap();
        assert_eq!(&content[o..o + 11], "retry_budgt");
    }

    #[test]
    fn find_key_offset_in_second_array_table() {
        let content = "[[teams]]\nid = 1\nnaem = \"a\"\n\n[[teams]]\nid = 2\nnaem = \"b\"\n";
        let path = vec!["teams".to_string(), "1".to_string()];
        let o = find_key_offset(content, &path, "naem").unwrap();
        assert_eq!(&content[o..o + 10], "naem = \"b\"");
    }

    #[test]
    fn find_key_offset_stops_at_next_section() {
        let content = "[service]\nname = \"x\"\n[delivery]\nport = 1\n";
        let path = vec!["service".to_string()];
        assert_eq!(find_key_offset(content, &path, "port"), None);
    }

    #[test]
    fn find_key_offset_ignores_key_prefixes() {
        let content = "[delivery]\nretry_budget_extra = 1\nretry_budget = 3\n";
        let path = vec!["delivery".to_string()];
        let o = find_key_offset(content, &path, "retry_budget").unwrap();
        assert_eq!(&content[o..], "retry_budget = 3\n");
    }

    #[test]
    fn value_span_covers_the_value() {
        let content = "[delivery]\nretry_budget =  \"three\"\n";
        let key = content.find("retry_budget").unwrap();
        let span = value_span(content, key + "retry_budget".len()).unwrap();
        assert_eq!(&content[span.offset()..span.offset() + span.len()], "\"three\"");
    }
}
