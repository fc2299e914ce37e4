//! Text shaping applied to field values before they are drawn.

use thiserror::Error;

/// Placeholders a field's format template substitutes the raw value into.
/// `texto` is the name older layout documents use.
pub(crate) const TEXT_PLACEHOLDERS: [&str; 2] = ["text", "texto"];

/// Problems with a `{placeholder}` template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("unknown placeholder '{{{0}}}'")]
    UnknownKey(String),
    #[error("unclosed '{{' at offset {0}")]
    UnclosedBrace(usize),
    #[error("single '}}' at offset {0}; write '}}}}' for a literal brace")]
    StrayBrace(usize),
}

/// Substitute `{name}` placeholders from `tokens`.
///
/// `{{` and `}}` produce literal braces. A placeholder that is not in `tokens`
/// is an error rather than being left in place.
pub fn expand_pattern(pattern: &str, tokens: &[(&str, &str)]) -> Result<String, FormatError> {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.char_indices().peekable();
    while let Some((offset, ch)) = chars.next() {
        match ch {
            '{' if chars.next_if(|&(_, c)| c == '{').is_some() => out.push('{'),
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, c)) => key.push(c),
                        None => return Err(FormatError::UnclosedBrace(offset)),
                    }
                }
                let value = tokens
                    .iter()
                    .find_map(|&(name, value)| (name == key).then_some(value))
                    .ok_or(FormatError::UnknownKey(key))?;
                out.push_str(value);
            }
            '}' if chars.next_if(|&(_, c)| c == '}').is_some() => out.push('}'),
            '}' => return Err(FormatError::StrayBrace(offset)),
            _ => out.push(ch),
        }
    }
    Ok(out)
}

/// Check that a field template only references `{text}` or `{texto}`.
pub(crate) fn validate_template(template: &str) -> Result<(), FormatError> {
    expand_pattern(template, &text_tokens("")).map(|_| ())
}

fn text_tokens(value: &str) -> [(&'static str, &str); 2] {
    TEXT_PLACEHOLDERS.map(|name| (name, value))
}

/// Apply a field's optional template and wrap width to its raw value.
pub fn format_field_text(
    raw: &str,
    template: Option<&str>,
    max_width: Option<usize>,
) -> Result<String, FormatError> {
    let text = match template {
        Some(template) => expand_pattern(template, &text_tokens(raw))?,
        None => raw.to_string(),
    };
    Ok(match max_width {
        Some(width) => wrap_text(&text, width),
        None => text,
    })
}

/// Greedy word wrap to at most `width` characters per line.
///
/// Runs of whitespace (including newlines) collapse to single spaces. Words
/// longer than a line start on a fresh line and are split into `width`-sized
/// chunks; they never fill the tail of the previous line.
pub fn wrap_text(text: &str, width: usize) -> String {
    let width = width.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len <= width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
            continue;
        }
        if current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if word_len <= width {
            current.push_str(word);
            current_len = word_len;
            continue;
        }

        let chars: Vec<char> = word.chars().collect();
        let mut pieces = chars.chunks(width).peekable();
        while let Some(piece) = pieces.next() {
            let piece: String = piece.iter().collect();
            if pieces.peek().is_some() {
                lines.push(piece);
            } else {
                current_len = piece.chars().count();
                current = piece;
            }
        }
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines.join("\n")
}
