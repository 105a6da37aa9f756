use std::fmt::{Display, Formatter};

use crate::error::{invalid_argument, StateResult};

const DOCUMENT_ID_FIELD: &str = "__name__";

/// A path into a document's fields, parsed from the server's dotted format.
///
/// Segments are separated by `.`; a segment that contains `.` (or any other
/// character outside `[_a-zA-Z0-9]`) is wrapped in back-quotes, with `\` escaping
/// a literal back-quote or backslash inside the quotes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn new<S, I>(segments: I) -> StateResult<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(invalid_argument(
                "FieldPath must contain at least one segment",
            ));
        }
        if segments.iter().any(String::is_empty) {
            return Err(invalid_argument("FieldPath segments cannot be empty"));
        }
        Ok(Self { segments })
    }

    /// Builds a path addressing exactly one top-level key, whatever characters it holds.
    pub fn from_key(key: impl Into<String>) -> StateResult<Self> {
        FieldPath::new([key.into()])
    }

    pub fn parse(path: &str) -> StateResult<Self> {
        if path.is_empty() {
            return Err(invalid_argument("FieldPath string cannot be empty"));
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut quoted = false;
        let mut was_quoted = false;
        let mut chars = path.chars();

        while let Some(ch) = chars.next() {
            match ch {
                '\\' if quoted => match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => {
                        return Err(invalid_argument(format!(
                            "Trailing escape character in field path: {path}"
                        )))
                    }
                },
                '`' => {
                    quoted = !quoted;
                    was_quoted = true;
                }
                '.' if !quoted => {
                    if current.is_empty() && !was_quoted {
                        return Err(invalid_argument(format!(
                            "Empty segment in field path: {path}"
                        )));
                    }
                    segments.push(std::mem::take(&mut current));
                    was_quoted = false;
                }
                _ => current.push(ch),
            }
        }

        if quoted {
            return Err(invalid_argument(format!(
                "Unterminated back-quote in field path: {path}"
            )));
        }
        if current.is_empty() && !was_quoted {
            return Err(invalid_argument(format!(
                "Empty segment in field path: {path}"
            )));
        }
        segments.push(current);
        FieldPath::new(segments)
    }

    pub fn is_document_id(&self) -> bool {
        self.segments.len() == 1 && self.segments[0] == DOCUMENT_ID_FIELD
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn first_segment(&self) -> &str {
        &self.segments[0]
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The remainder after dropping the first segment, `None` for single-segment paths.
    pub fn pop_first(&self) -> Option<FieldPath> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[1..].to_vec(),
        })
    }

    pub fn canonical_string(&self) -> String {
        self.segments
            .iter()
            .map(|segment| escape_segment(segment))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_string())
    }
}

/// Quotes `segment` unless it is a plain identifier.
pub fn escape_segment(segment: &str) -> String {
    let mut chars = segment.chars();
    let is_identifier = match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {
            chars.all(|ch| ch == '_' || ch.is_ascii_alphanumeric())
        }
        _ => false,
    };
    if is_identifier {
        return segment.to_string();
    }

    let mut escaped = String::with_capacity(segment.len() + 2);
    escaped.push('`');
    for ch in segment.chars() {
        if ch == '`' || ch == '\\' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('`');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_path() {
        let field = FieldPath::parse("favorites.cake").unwrap();
        assert_eq!(field.segments(), &["favorites", "cake"]);
        assert_eq!(field.pop_first().unwrap().segments(), &["cake"]);
    }

    #[test]
    fn quoted_segment_keeps_dots() {
        let field = FieldPath::parse("`user.name`.first").unwrap();
        assert_eq!(field.segments(), &["user.name", "first"]);
        assert_eq!(field.canonical_string(), "`user.name`.first");
    }

    #[test]
    fn escapes_inside_quotes() {
        let field = FieldPath::parse(r"`a\`b`").unwrap();
        assert_eq!(field.segments(), &["a`b"]);
        assert_eq!(escape_segment("a`b"), r"`a\`b`");
        assert_eq!(escape_segment("my-field"), "`my-field`");
        assert_eq!(escape_segment("plain_1"), "plain_1");
    }

    #[test]
    fn rejects_malformed_paths() {
        for path in ["", "a..b", ".a", "a.", "`open"] {
            let err = FieldPath::parse(path).unwrap_err();
            assert_eq!(err.code_str(), "state/invalid-argument", "{path}");
        }
    }

    #[test]
    fn recognises_document_id() {
        assert!(FieldPath::parse("__name__").unwrap().is_document_id());
        assert!(!FieldPath::parse("name").unwrap().is_document_id());
    }
}
