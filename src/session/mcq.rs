//! Multiple-choice block extraction
//!
//! The tutor wraps answer options in `[MCQ] ... [/MCQ]`, one option per
//! line. Only the first block of a message is used.

use regex::Regex;
use std::sync::OnceLock;

/// A parsed multiple-choice block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McqBlock {
    /// Text before the block
    pub before: String,
    /// Non-empty trimmed option lines
    pub options: Vec<String>,
    /// Text after the block
    pub after: String,
}

fn mcq_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[MCQ\](.*?)\[/MCQ\]").ok())
        .as_ref()
}

/// Extract the first MCQ block of a message
///
/// # Examples
///
/// ```
/// use studysphere::session::mcq::parse_mcq;
///
/// let block = parse_mcq("Pick one:\n[MCQ]\nA) 4\nB) 6\n[/MCQ]").unwrap();
/// assert_eq!(block.options, vec!["A) 4", "B) 6"]);
/// assert_eq!(block.before, "Pick one:\n");
/// ```
pub fn parse_mcq(content: &str) -> Option<McqBlock> {
    let caps = mcq_regex()?.captures(content)?;
    let whole = caps.get(0)?;
    let inner = caps.get(1)?.as_str();

    let options = inner
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    Some(McqBlock {
        before: content[..whole.start()].to_string(),
        options,
        after: content[whole.end()..].to_string(),
    })
}

/// Resolve a user's choice against the options
///
/// Accepts a 1-based number (`2`) or an option letter (`b`, `B`, `B)`),
/// matched against the option's leading label.
pub fn resolve_option<'a>(options: &'a [String], choice: &str) -> Option<&'a str> {
    let choice = choice.trim().trim_end_matches([')', '.']);

    if let Ok(n) = choice.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| options.get(i)).map(String::as_str);
    }

    let mut chars = choice.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() || !letter.is_ascii_alphabetic() {
        return None;
    }

    options
        .iter()
        .find(|opt| {
            let mut label = opt.chars();
            label.next().map(|c| c.to_ascii_uppercase()) == Some(letter)
                && matches!(label.next(), Some(')') | Some('.') | Some(':'))
        })
        .or_else(|| options.get((letter as u8 - b'A') as usize))
        .map(String::as_str)
}
