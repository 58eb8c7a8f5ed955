//! Tokenizer for the composite `Input` cell of a test-case sheet.
//!
//! The cell packs several form fields into one string:
//! `first_name=John, address="123 Main, St", city=Springfield`.
//! Values may be double-quoted to protect embedded commas.

/// One `key=value` assignment taken from an `Input` cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedField {
    pub key: String,
    pub value: String,
}

impl TokenizedField {
    fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Result of tokenizing one cell.
///
/// `fields` keeps the order of the cell. Segments without `=` end up in
/// `dropped`, and `unterminated_quote` is set when a quote was left open
/// (every comma after it was taken as content).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokenized {
    pub fields: Vec<TokenizedField>,
    pub dropped: Vec<String>,
    pub unterminated_quote: bool,
}

/// Split an `Input` cell into ordered key/value pairs.
pub fn tokenize(input: &str) -> Tokenized {
    let (segments, unterminated_quote) = split_segments(input);

    let mut result = Tokenized {
        unterminated_quote,
        ..Default::default()
    };

    for segment in segments {
        match segment.split_once('=') {
            Some((key, value)) => {
                result
                    .fields
                    .push(TokenizedField::new(key.trim(), strip_quotes(value.trim())));
            }
            None => result.dropped.push(segment),
        }
    }

    result
}

/// Single left-to-right scan producing trimmed, non-empty segments.
fn split_segments(input: &str) -> (Vec<String>, bool) {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                push_segment(&mut segments, &current);
                current.clear();
            }
            '\r' | '\n' => continue,
            _ => current.push(c),
        }
    }
    push_segment(&mut segments, &current);

    (segments, in_quotes)
}

fn push_segment(segments: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
}

/// Remove exactly one leading and one trailing double quote when both exist.
fn strip_quotes(value: &str) -> &str {
    if value.starts_with('"') && value.ends_with('"') {
        // A lone `"` both starts and ends the value.
        if value.len() == 1 {
            return "";
        }
        &value[1..value.len() - 1]
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(tokenized: &Tokenized) -> Vec<(&str, &str)> {
        tokenized
            .fields
            .iter()
            .map(|f| (f.key.as_str(), f.value.as_str()))
            .collect()
    }

    #[test]
    fn test_quoted_value_keeps_commas() {
        let result = tokenize(r#"first_name=John, address="123 Main, St""#);
        assert_eq!(
            pairs(&result),
            vec![("first_name", "John"), ("address", "123 Main, St")]
        );
        assert!(result.dropped.is_empty());
        assert!(!result.unterminated_quote);
    }

    #[test]
    fn test_segment_without_equals_is_dropped() {
        let result = tokenize("first_name=Jane, stray text, city=Hanoi");
        assert_eq!(pairs(&result), vec![("first_name", "Jane"), ("city", "Hanoi")]);
        assert_eq!(result.dropped, vec!["stray text".to_string()]);
    }

    #[test]
    fn test_whitespace_trimmed_and_line_breaks_removed() {
        let result = tokenize("  email = jane@x.com ,\r\n password=Sec\nret123  ");
        assert_eq!(
            pairs(&result),
            vec![("email", "jane@x.com"), ("password", "Secret123")]
        );
    }

    #[test]
    fn test_line_break_is_not_a_delimiter() {
        let result = tokenize("city=Ho Chi\r\nMinh");
        assert_eq!(pairs(&result), vec![("city", "Ho ChiMinh")]);
    }

    #[test]
    fn test_splits_on_first_equals_only() {
        let result = tokenize("password=a=b=c");
        assert_eq!(pairs(&result), vec![("password", "a=b=c")]);
    }

    #[test]
    fn test_empty_and_quoted_empty_values() {
        let result = tokenize(r#"first_name=, last_name="""#);
        assert_eq!(pairs(&result), vec![("first_name", ""), ("last_name", "")]);
    }

    #[test]
    fn test_unterminated_quote_absorbs_rest() {
        let result = tokenize(r#"address="12 Elm, city=Paris, postcode=75000"#);
        assert!(result.unterminated_quote);
        assert_eq!(result.fields.len(), 1);
        assert_eq!(result.fields[0].key, "address");
        // Quotes are stripped in pairs only, so the opening one stays.
        assert_eq!(result.fields[0].value, r#""12 Elm, city=Paris, postcode=75000"#);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(tokenize(""), Tokenized::default());
        assert_eq!(tokenize(" , ,\n"), Tokenized::default());
    }
}
