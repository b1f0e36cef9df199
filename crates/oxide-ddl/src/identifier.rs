//! Identifier quoting and generated identifier names.
//!
//! Identifiers are carried around as plain strings exactly as the caller
//! wrote them. A caller may pre-quote a name (`"like"`, `` `like` ``,
//! `[like]`) to force quoting; otherwise the [`Quoter`] decides based on the
//! dialect's reserved words and the characters in the name.

use std::collections::BTreeSet;

/// Quote pairs recognized as caller-supplied quoting.
const QUOTE_PAIRS: [(char, char); 3] = [('"', '"'), ('`', '`'), ('[', ']')];

/// Returns true if the name is wrapped in a recognized pair of quote marks.
#[must_use]
pub fn is_quoted(name: &str) -> bool {
    quote_pair(name).is_some()
}

fn quote_pair(name: &str) -> Option<(char, char)> {
    let mut chars = name.chars();
    let first = chars.next()?;
    let last = chars.next_back()?;
    QUOTE_PAIRS
        .iter()
        .copied()
        .find(|&(open, close)| first == open && last == close)
}

/// Strips caller-supplied quote marks, if any.
#[must_use]
pub fn unquote(name: &str) -> &str {
    match quote_pair(name) {
        Some((open, close)) => &name[open.len_utf8()..name.len() - close.len_utf8()],
        None => name,
    }
}

/// Lookup key for an identifier: unquoted and lowercased.
///
/// SQLite resolves table, column and index names case-insensitively, so two
/// identifiers with the same key name the same object.
#[must_use]
pub fn name_key(name: &str) -> String {
    unquote(name).to_lowercase()
}

/// Returns true if both identifiers name the same object.
#[must_use]
pub fn same_name(a: &str, b: &str) -> bool {
    unquote(a).eq_ignore_ascii_case(unquote(b))
}

/// Generates a deterministic identifier such as `IDX_8D93D64923A0E66`.
///
/// The hash part is the concatenated lowercase hex CRC-32 of the table name
/// and every column name (unquoted, no zero padding). The result is
/// uppercased and cut to `max_length` characters.
#[must_use]
pub fn generate_identifier_name(
    prefix: &str,
    table: &str,
    columns: &[String],
    max_length: usize,
) -> String {
    let hash: String = std::iter::once(table)
        .chain(columns.iter().map(String::as_str))
        .map(|part| format!("{:x}", crc32fast::hash(unquote(part).as_bytes())))
        .collect();

    let mut name = format!("{prefix}_{hash}").to_uppercase();
    name.truncate(max_length);
    name
}

/// Renders identifiers for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct Quoter<'a> {
    quote_char: char,
    reserved_words: &'a BTreeSet<String>,
    quote_mixed_case: bool,
}

impl<'a> Quoter<'a> {
    /// Creates a quoter. `reserved_words` must be uppercase.
    #[must_use]
    pub fn new(quote_char: char, reserved_words: &'a BTreeSet<String>, quote_mixed_case: bool) -> Self {
        Self {
            quote_char,
            reserved_words,
            quote_mixed_case,
        }
    }

    /// Quotes `name` if the dialect requires it.
    ///
    /// Names already wrapped in the dialect quote character are returned as
    /// they are; names wrapped in any other recognized quote pair are
    /// re-quoted with the dialect character.
    #[must_use]
    pub fn quote(&self, name: &str) -> String {
        match quote_pair(name) {
            Some((open, _)) if open == self.quote_char => name.to_string(),
            Some(_) => self.wrap(unquote(name)),
            None if self.requires_quoting(name) => self.wrap(name),
            None => name.to_string(),
        }
    }

    /// Quotes every name and joins them with `", "`.
    #[must_use]
    pub fn quote_list<S: AsRef<str>>(&self, names: &[S]) -> String {
        names
            .iter()
            .map(|name| self.quote(name.as_ref()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Returns true if the name collides with a reserved word.
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_words
            .contains(&unquote(name).to_ascii_uppercase())
    }

    fn requires_quoting(&self, name: &str) -> bool {
        let Some(first) = name.chars().next() else {
            return true;
        };

        first.is_ascii_digit()
            || name
                .chars()
                .any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '$'))
            || self.is_reserved(name)
            || (self.quote_mixed_case && name.chars().any(|c| c.is_ascii_uppercase()))
    }

    fn wrap(&self, raw: &str) -> String {
        let q = self.quote_char;
        let escaped = raw.replace(q, &format!("{q}{q}"));
        format!("{q}{escaped}{q}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserved() -> BTreeSet<String> {
        ["SELECT", "TABLE", "CREATE", "KEY"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_plain_names_are_left_alone() {
        let words = reserved();
        let quoter = Quoter::new('"', &words, false);
        assert_eq!(quoter.quote("user"), "user");
        assert_eq!(quoter.quote("Column_1$"), "Column_1$");
    }

    #[test]
    fn test_reserved_words_are_quoted_case_insensitively() {
        let words = reserved();
        let quoter = Quoter::new('"', &words, false);
        assert_eq!(quoter.quote("select"), "\"select\"");
        assert_eq!(quoter.quote("Table"), "\"Table\"");
        assert_eq!(quoter.quote("key"), "\"key\"");
    }

    #[test]
    fn test_special_characters_are_quoted_and_escaped() {
        let words = reserved();
        let quoter = Quoter::new('"', &words, false);
        assert_eq!(quoter.quote("foo-bar"), "\"foo-bar\"");
        assert_eq!(quoter.quote("my table"), "\"my table\"");
        assert_eq!(quoter.quote("a\"b"), "\"a\"\"b\"");
        assert_eq!(quoter.quote("1st"), "\"1st\"");
        assert_eq!(quoter.quote(""), "\"\"");
    }

    #[test]
    fn test_quoting_is_idempotent() {
        let words = reserved();
        let quoter = Quoter::new('"', &words, false);
        let once = quoter.quote("select");
        assert_eq!(quoter.quote(&once), once);
        assert_eq!(quoter.quote("\"foo\""), "\"foo\"");
        assert_eq!(quoter.quote("`foo`"), "\"foo\"");
        assert_eq!(quoter.quote("[foo]"), "\"foo\"");
    }

    #[test]
    fn test_mixed_case_policy() {
        let words = reserved();
        let quoter = Quoter::new('"', &words, true);
        assert_eq!(quoter.quote("UserName"), "\"UserName\"");
        assert_eq!(quoter.quote("username"), "username");
    }

    #[test]
    fn test_quote_list() {
        let words = reserved();
        let quoter = Quoter::new('"', &words, false);
        let cols = vec!["create".to_string(), "foo".to_string()];
        assert_eq!(quoter.quote_list(&cols), "\"create\", foo");
    }

    #[test]
    fn test_unquote_and_keys() {
        assert_eq!(unquote("\"Foo\""), "Foo");
        assert_eq!(unquote("[bar]"), "bar");
        assert_eq!(unquote("baz"), "baz");
        assert_eq!(unquote("\""), "\"");
        assert_eq!(name_key("\"Foo\""), "foo");
        assert!(same_name("ID", "\"id\""));
        assert!(!same_name("id", "key"));
    }

    #[test]
    fn test_generated_names() {
        let name = generate_identifier_name("idx", "user", &["article".to_string()], 63);
        assert_eq!(name, "IDX_8D93D64923A0E66");

        let name = generate_identifier_name("fk", "user", &["parent".to_string()], 63);
        assert_eq!(name, "FK_8D93D6493D8E604F");

        let name = generate_identifier_name(
            "uniq",
            "test",
            &["foo".to_string(), "bar".to_string()],
            63,
        );
        assert_eq!(name, "UNIQ_D87F7E0C8C73652176FF8CAA");

        let name = generate_identifier_name("idx", "\"quoted\"", &["\"create\"".to_string()], 63);
        assert_eq!(name, "IDX_22660D028FD6E0FB");

        let name = generate_identifier_name("idx", "user", &["article".to_string()], 8);
        assert_eq!(name, "IDX_8D93");
    }
}
