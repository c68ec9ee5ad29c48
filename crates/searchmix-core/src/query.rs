//! Rewrites queries from the public language into the internal
//! field-addressed, normalized form handed to the index's query parser.
//!
//! The public language: bare terms, quoted phrases, `AND`/`OR`/`NOT`
//! (case-insensitive), parentheses, a trailing `*` for prefix matching, and
//! `field:value` restrictions over `title`, `h1`..`h6`, `headings`, `body`.
//!
//! The rewrite renames recognized fields to their `_normalized` columns,
//! folds every term and phrase with [`crate::normalize::fold`], expands the
//! `headings` pseudo-field into an OR across the six heading columns, and
//! converts single-term prefixes into the phrase-prefix form the backing
//! parser evaluates as a prefix query. Operators, parentheses, and quoting
//! survive untouched, so the boolean structure of the query is preserved.

use crate::field::FieldKind;
use crate::normalize::fold;

/// A single search term derived from a query, used by the snippet extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTerm {
    /// Normalized term text, `*` removed.
    pub text: String,
    /// True when the term carried a trailing `*`.
    pub prefix: bool,
}

#[derive(Debug, Clone)]
enum Token {
    Open,
    Close,
    /// AND / OR / NOT, normalized to uppercase.
    Operator(&'static str),
    /// Quoted span, quotes removed; `prefix` for a trailing `*`.
    Phrase { content: String, prefix: bool },
    /// `field:value` or `field:"phrase"`.
    Fielded { field: String, value: Box<Token> },
    /// Bare term, possibly with a trailing `*` or leading `-`.
    Term(String),
}

/// Rewrite a public-language query into the internal form.
#[must_use]
pub fn rewrite(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 16);
    for token in tokenize(query) {
        if !out.is_empty() && needs_space(&out, &token) {
            out.push(' ');
        }
        emit(&token, &mut out);
    }
    out
}

/// Derive the term list the snippet extractor scans for: operators,
/// parentheses, quotes, and field prefixes stripped; whitespace-split;
/// prefix markers recorded; terms normalized.
///
/// Single-character alphanumeric terms are kept (a heading can legitimately
/// be one letter); single-character punctuation-only tokens are noise and
/// dropped.
#[must_use]
pub fn derive_terms(query: &str) -> Vec<QueryTerm> {
    let mut terms = Vec::new();
    for token in tokenize(query) {
        collect_terms(&token, &mut terms);
    }
    terms
}

fn collect_terms(token: &Token, terms: &mut Vec<QueryTerm>) {
    match token {
        Token::Open | Token::Close | Token::Operator(_) => {},
        Token::Phrase { content, prefix } => {
            let words: Vec<&str> = content.split_whitespace().collect();
            for (i, word) in words.iter().enumerate() {
                let last = i + 1 == words.len();
                push_term(word, *prefix && last, terms);
            }
        },
        Token::Fielded { value, .. } => collect_terms(value, terms),
        Token::Term(text) => {
            let prefix = text.ends_with('*');
            let base = text.trim_start_matches('-').trim_end_matches('*');
            push_term(base, prefix, terms);
        },
    }
}

fn push_term(raw: &str, prefix: bool, terms: &mut Vec<QueryTerm>) {
    let base = raw.trim_end_matches('*');
    if base.is_empty() {
        return;
    }
    if base.chars().count() == 1 && !base.chars().all(char::is_alphanumeric) {
        return;
    }
    terms.push(QueryTerm {
        text: fold(base),
        prefix: prefix || raw.ends_with('*'),
    });
}

fn tokenize(query: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = query.char_indices().peekable();

    while let Some(&(idx, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            },
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            },
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            },
            '"' => {
                chars.next();
                tokens.push(read_phrase(query, &mut chars));
            },
            _ => {
                let word = read_word(query, idx, &mut chars);
                tokens.push(classify_word(word, query, &mut chars));
            },
        }
    }
    tokens
}

fn read_phrase(query: &str, chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> Token {
    let start = chars.peek().map_or(query.len(), |&(i, _)| i);
    let mut end = query.len();
    for (i, c) in chars.by_ref() {
        if c == '"' {
            end = i;
            break;
        }
    }
    let content = query[start..end.min(query.len())].to_string();
    let mut prefix = false;
    if chars.peek().is_some_and(|&(_, c)| c == '*') {
        chars.next();
        prefix = true;
    }
    Token::Phrase { content, prefix }
}

fn read_word<'q>(
    query: &'q str,
    start: usize,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> &'q str {
    let mut end = query.len();
    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() || matches!(c, '(' | ')' | '"') {
            end = i;
            break;
        }
        chars.next();
    }
    &query[start..end]
}

fn classify_word(
    word: &str,
    query: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Token {
    for op in ["AND", "OR", "NOT"] {
        if word.eq_ignore_ascii_case(op) {
            return Token::Operator(op);
        }
    }

    if let Some(colon) = word.find(':') {
        let (field, rest) = (&word[..colon], &word[colon + 1..]);
        if !field.is_empty() {
            // `field:"phrase"` — the quote terminated the word scan.
            if rest.is_empty() && chars.peek().is_some_and(|&(_, c)| c == '"') {
                chars.next();
                let phrase = read_phrase(query, chars);
                return Token::Fielded {
                    field: field.to_string(),
                    value: Box::new(phrase),
                };
            }
            if !rest.is_empty() {
                return Token::Fielded {
                    field: field.to_string(),
                    value: Box::new(Token::Term(rest.to_string())),
                };
            }
        }
    }

    Token::Term(word.to_string())
}

fn emit(token: &Token, out: &mut String) {
    match token {
        Token::Open => out.push('('),
        Token::Close => out.push(')'),
        Token::Operator(op) => out.push_str(op),
        Token::Phrase { content, prefix } => emit_phrase(content, *prefix, out),
        Token::Term(text) => emit_term(text, out),
        Token::Fielded { field, value } => emit_fielded(field, value, out),
    }
}

fn emit_phrase(content: &str, prefix: bool, out: &mut String) {
    out.push('"');
    out.push_str(&fold(content));
    out.push('"');
    if prefix {
        out.push('*');
    }
}

/// A bare term folds wholesale; a trailing `*` turns it into the single-term
/// phrase-prefix form. A leading `-` (exclusion) stays outside the quotes.
fn emit_term(text: &str, out: &mut String) {
    let negated = text.starts_with('-');
    let body = text.trim_start_matches('-');
    if negated {
        out.push('-');
    }
    if let Some(base) = body.strip_suffix('*') {
        out.push('"');
        out.push_str(&fold(base));
        out.push_str("\"*");
    } else {
        out.push_str(&fold(body));
    }
}

fn emit_fielded(field: &str, value: &Token, out: &mut String) {
    let mut value_text = String::new();
    match value {
        Token::Phrase { content, prefix } => emit_phrase(content, *prefix, &mut value_text),
        Token::Term(text) => emit_term(text, &mut value_text),
        _ => {},
    }

    if field == "headings" {
        out.push('(');
        for (i, kind) in [
            FieldKind::H1,
            FieldKind::H2,
            FieldKind::H3,
            FieldKind::H4,
            FieldKind::H5,
            FieldKind::H6,
        ]
        .iter()
        .enumerate()
        {
            if i > 0 {
                out.push_str(" OR ");
            }
            out.push_str(kind.normalized_column());
            out.push(':');
            out.push_str(&value_text);
        }
        out.push(')');
        return;
    }

    match FieldKind::from_query_name(field) {
        Some(kind) => {
            out.push_str(kind.normalized_column());
            out.push(':');
            out.push_str(&value_text);
        },
        // Unrecognized field: value is still normalized, the field is left
        // for the index parser to reject.
        None => {
            out.push_str(field);
            out.push(':');
            out.push_str(&value_text);
        },
    }
}

fn needs_space(out: &str, token: &Token) -> bool {
    let last = out.chars().last().unwrap_or(' ');
    if last == '(' {
        return false;
    }
    !matches!(token, Token::Close)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_terms_are_folded() {
        assert_eq!(rewrite("Mediterráneo"), "mediterraneo");
        assert_eq!(rewrite("ALPHA beta"), "alpha beta");
    }

    #[test]
    fn recognized_fields_are_renamed() {
        assert_eq!(rewrite("title:alpha"), "title_normalized:alpha");
        assert_eq!(rewrite("h3:Configuración"), "h3_normalized:configuracion");
        assert_eq!(rewrite("body:texto"), "body_normalized:texto");
    }

    #[test]
    fn unrecognized_field_keeps_name_but_folds_value() {
        assert_eq!(rewrite("author:Ésteban"), "author:esteban");
    }

    #[test]
    fn operators_survive_and_are_case_insensitive() {
        assert_eq!(rewrite("alpha AND beta"), "alpha AND beta");
        assert_eq!(rewrite("alpha and beta"), "alpha AND beta");
        assert_eq!(rewrite("Alpha Or NOT Beta"), "alpha OR NOT beta");
    }

    #[test]
    fn grouping_is_preserved() {
        assert_eq!(
            rewrite("(alpha OR beta) AND title:gamma"),
            "(alpha OR beta) AND title_normalized:gamma"
        );
    }

    #[test]
    fn phrases_fold_as_a_unit() {
        assert_eq!(rewrite("\"Viaje al Mediterráneo\""), "\"viaje al mediterraneo\"");
        assert_eq!(
            rewrite("title:\"Crème Brûlée\""),
            "title_normalized:\"creme brulee\""
        );
    }

    #[test]
    fn prefix_terms_become_phrase_prefix() {
        assert_eq!(rewrite("mediterr*"), "\"mediterr\"*");
        assert_eq!(rewrite("h2:config*"), "h2_normalized:\"config\"*");
        assert_eq!(rewrite("\"getting start\"*"), "\"getting start\"*");
    }

    #[test]
    fn headings_field_expands_to_all_levels() {
        let rewritten = rewrite("headings:intro");
        assert!(rewritten.starts_with('('));
        assert!(rewritten.contains("h1_normalized:intro"));
        assert!(rewritten.contains("h6_normalized:intro"));
        assert_eq!(rewritten.matches(" OR ").count(), 5);
    }

    #[test]
    fn negation_survives_folding() {
        assert_eq!(rewrite("alpha -Beta"), "alpha -beta");
        assert_eq!(rewrite("-med*"), "-\"med\"*");
    }

    #[test]
    fn derive_terms_strips_structure() {
        let terms = derive_terms("(title:Alpha AND \"Beta Gamma\") OR delta*");
        let texts: Vec<(&str, bool)> = terms
            .iter()
            .map(|t| (t.text.as_str(), t.prefix))
            .collect();
        assert_eq!(
            texts,
            vec![
                ("alpha", false),
                ("beta", false),
                ("gamma", false),
                ("delta", true)
            ]
        );
    }

    #[test]
    fn derive_terms_keeps_single_letters_drops_punctuation() {
        let terms = derive_terms("C - !");
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].text, "c");
    }

    #[test]
    fn derive_terms_folds_accents() {
        let terms = derive_terms("Mediterráneo");
        assert_eq!(terms[0].text, "mediterraneo");
    }

    #[test]
    fn derive_terms_ignores_operator_words_any_case() {
        assert!(derive_terms("AND or Not").is_empty());
    }

    #[test]
    fn rewrite_is_stable_for_already_internal_terms() {
        assert_eq!(rewrite("alpha"), rewrite(&rewrite("alpha")));
    }
}
