// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Identifier checks and result-table name templates.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! name that ends up in generated SQL passes through this module first.

use std::fmt;

use crate::error::{Error, Result};

/// Default result-table name template: `<run name>-<experiment id>-<counter>`.
pub const DEFAULT_NAME_TEMPLATE: &str = "{}-{}-{}";

const MAX_IDENTIFIER_LEN: usize = 128;

/// Check that `name` is usable as a column name.
///
/// Column names follow the usual identifier rules: an ASCII letter or
/// underscore followed by letters, digits or underscores.
pub fn validate_column(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            name.len() <= MAX_IDENTIFIER_LEN && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid && !name.to_ascii_lowercase().starts_with("sqlite_") {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_owned()))
    }
}

/// Check that `name` is usable as a result-table name.
///
/// Formatted run names contain dashes and dots, so tables allow those on
/// top of the column alphabet. Names are always quoted in SQL.
pub fn validate_table(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.to_ascii_lowercase().starts_with("sqlite_");
    if valid {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_owned()))
    }
}

/// Quote an already validated identifier.
pub(crate) fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

/// A result-table name template.
///
/// Placeholders are `{}` (next positional argument) or `{0}`, `{1}`, `{2}`
/// for the run name, experiment id and run counter. `{{` and `}}` produce
/// literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    source: String,
    pieces: Vec<Piece>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Arg(usize),
}

const ARG_COUNT: usize = 3;

impl NameTemplate {
    /// Parse a template, rejecting unbalanced braces and unknown placeholders.
    pub fn parse(template: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidTemplate {
            template: template.to_owned(),
            reason: reason.to_owned(),
        };

        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut next_auto = 0;
        let mut used_auto = false;
        let mut used_manual = false;
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => field.push(c),
                            None => return Err(invalid("unclosed '{'")),
                        }
                    }
                    let index = if field.is_empty() {
                        used_auto = true;
                        next_auto += 1;
                        next_auto - 1
                    } else {
                        used_manual = true;
                        field
                            .parse::<usize>()
                            .map_err(|_| invalid("placeholders must be '{}' or '{N}'"))?
                    };
                    if used_auto && used_manual {
                        return Err(invalid("cannot mix '{}' and '{N}' placeholders"));
                    }
                    if index >= ARG_COUNT {
                        return Err(invalid("only three arguments are available"));
                    }
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(Piece::Arg(index));
                }
                '}' => return Err(invalid("single '}' encountered")),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self {
            source: template.to_owned(),
            pieces,
        })
    }

    /// The template as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Substitute `(name, exp_id, counter)` into the template.
    pub fn format(&self, name: &str, exp_id: i64, counter: i64) -> String {
        let args = [name.to_owned(), exp_id.to_string(), counter.to_string()];
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Arg(i) => out.push_str(&args[*i]),
            }
        }
        out
    }
}

impl Default for NameTemplate {
    fn default() -> Self {
        Self {
            source: DEFAULT_NAME_TEMPLATE.to_owned(),
            pieces: vec![
                Piece::Arg(0),
                Piece::Literal("-".into()),
                Piece::Arg(1),
                Piece::Literal("-".into()),
                Piece::Arg(2),
            ],
        }
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("{}-{}-{}", "sweep-4-7")]
    #[case("{2}_{0}", "7_sweep")]
    #[case("run{{{1}}}", "run{4}")]
    #[case("fixed", "fixed")]
    fn template_format(#[case] template: &str, #[case] expected: &str) {
        let t = NameTemplate::parse(template).unwrap();
        assert_eq!(t.format("sweep", 4, 7), expected);
    }

    #[rstest]
    #[case("{")]
    #[case("}")]
    #[case("{}-{}-{}-{}")]
    #[case("{3}")]
    #[case("{name}")]
    #[case("{}-{1}")]
    fn template_rejects(#[case] template: &str) {
        assert!(matches!(
            NameTemplate::parse(template),
            Err(Error::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn default_matches_parsed() {
        assert_eq!(
            NameTemplate::default(),
            NameTemplate::parse(DEFAULT_NAME_TEMPLATE).unwrap()
        );
    }

    #[rstest]
    #[case("a", true)]
    #[case("_x1", true)]
    #[case("1a", false)]
    #[case("a b", false)]
    #[case("a;drop", false)]
    #[case("sqlite_master", false)]
    #[case("", false)]
    fn column_names(#[case] name: &str, #[case] ok: bool) {
        assert_eq!(validate_column(name).is_ok(), ok);
    }

    #[rstest]
    #[case("sweep-1-1", true)]
    #[case("run.v2", true)]
    #[case("a\"b", false)]
    #[case("x y", false)]
    fn table_names(#[case] name: &str, #[case] ok: bool) {
        assert_eq!(validate_table(name).is_ok(), ok);
    }
}
