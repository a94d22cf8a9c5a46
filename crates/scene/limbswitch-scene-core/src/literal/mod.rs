//! Parsing of authored list-literal attributes.
//!
//! Rig authoring tools store node lists on the param node as serialized
//! literals, e.g. `"['l_arm_fk_ctrl', 'l_elbow_fk_ctrl']"`. Both quote styles,
//! tuple brackets, a trailing comma and a legacy `u` prefix on items are
//! accepted. Anything else is rejected; nothing is evaluated.

use thiserror::Error;

/// Errors produced while parsing a list literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    #[error("expected a list literal, found '{0}'")]
    ExpectedList(String),
    #[error("expected a quoted string, found '{0}'")]
    ExpectedString(String),
    #[error("unterminated string in '{0}'")]
    Unterminated(String),
    #[error("empty name literal")]
    EmptyName,
}

/// Parse a `[..]` / `(..)` literal of quoted strings.
pub fn parse_string_list(text: &str) -> Result<Vec<String>, LiteralError> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .or_else(|| trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')))
        .ok_or_else(|| LiteralError::ExpectedList(trimmed.to_string()))?;

    let mut items = Vec::new();
    let mut rest = inner.trim_start();
    while !rest.is_empty() {
        let (item, tail) = take_quoted(rest, text)?;
        items.push(item);
        rest = tail.trim_start();
        match rest.strip_prefix(',') {
            Some(after) => rest = after.trim_start(),
            None if rest.is_empty() => break,
            None => return Err(LiteralError::ExpectedList(trimmed.to_string())),
        }
    }
    Ok(items)
}

/// Parse a single node name stored either bare (`pv_match`) or quoted (`'pv_match'`).
pub fn parse_name(text: &str) -> Result<String, LiteralError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(LiteralError::EmptyName);
    }
    let first = trimmed.trim_start_matches('u').chars().next();
    let name = if matches!(first, Some('\'') | Some('"')) {
        let (item, tail) = take_quoted(trimmed, text)?;
        if !tail.trim().is_empty() {
            return Err(LiteralError::ExpectedString(trimmed.to_string()));
        }
        item
    } else {
        trimmed.to_string()
    };
    if name.is_empty() {
        return Err(LiteralError::EmptyName);
    }
    Ok(name)
}

fn take_quoted<'a>(s: &'a str, whole: &str) -> Result<(String, &'a str), LiteralError> {
    let original = s;
    let s = s.strip_prefix('u').unwrap_or(s);
    let quote = match s.chars().next() {
        Some(q @ ('\'' | '"')) => q,
        _ => {
            let token = original.split(',').next().unwrap_or(original).trim();
            return Err(LiteralError::ExpectedString(token.to_string()));
        }
    };
    let body = &s[1..];
    let end = body
        .find(quote)
        .ok_or_else(|| LiteralError::Unterminated(whole.trim().to_string()))?;
    Ok((body[..end].to_string(), &body[end + 1..]))
}
