//! Fitting task inputs under a tier's token ceiling
//!
//! Inputs that already fit are passed through untouched so cache keys stay
//! stable. Oversized string values are shrunk in two passes: a lossy
//! rewrite (comment stripping for code, filler removal for prose) and then
//! a proportional cut on line boundaries.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tiergate_core::{Params, TierPreference};

const BYTES_PER_TOKEN: usize = 4;

/// Line prefixes kept when only the outline of code is needed
const STRUCTURE_PREFIXES: &[&str] = &[
    "def ",
    "async def ",
    "class ",
    "import ",
    "from ",
    "fn ",
    "pub fn ",
    "pub(crate) fn ",
    "async fn ",
    "pub async fn ",
    "struct ",
    "pub struct ",
    "enum ",
    "pub enum ",
    "trait ",
    "pub trait ",
    "impl ",
    "impl<",
    "use ",
    "pub use ",
    "mod ",
    "pub mod ",
    "function ",
    "interface ",
    "export ",
    "func ",
    "type ",
];

const PHRASES: &[(&str, &str)] = &[
    (r"(?i)\bin order to\b", "to"),
    (r"(?i)\bdue to the fact that\b", "because"),
    (r"(?i)\bfor the purpose of\b", "to"),
    (r"(?i)\bat this point in time\b", "now"),
    (r"(?i)\bmake use of\b", "use"),
    (r"(?i)\btake into consideration\b", "consider"),
];

fn filler_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(basically|actually|literally|obviously|clearly|simply)\b").expect("must be valid regex")
    })
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("must be valid regex"))
}

fn phrase_regexes() -> &'static [(Regex, &'static str)] {
    static RE: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RE.get_or_init(|| {
        PHRASES
            .iter()
            .map(|(pattern, short)| (Regex::new(pattern).expect("must be valid regex"), *short))
            .collect()
    })
}

/// Shrink string inputs so their combined size fits `max_tokens`
pub fn compress_params(params: &Params, max_tokens: u32, preference: TierPreference) -> Params {
    let budget = max_tokens as usize * BYTES_PER_TOKEN;
    let total = string_bytes(params);
    if total <= budget {
        return params.clone();
    }

    let rewritten: Params = params
        .iter()
        .map(|(name, value)| match value {
            Value::String(text) => (name.clone(), Value::String(compress_text(text, preference))),
            other => (name.clone(), other.clone()),
        })
        .collect();

    let rewritten_total = string_bytes(&rewritten);
    tracing::debug!(original = total, rewritten = rewritten_total, budget, "compressed oversized inputs");
    if rewritten_total <= budget {
        return rewritten;
    }

    rewritten
        .into_iter()
        .map(|(name, value)| match value {
            Value::String(text) => {
                // Each value keeps its share of the budget
                let share = budget * text.len() / rewritten_total;
                (name, Value::String(truncate_lines(&text, share)))
            }
            other => (name, other),
        })
        .collect()
}

fn string_bytes(params: &Params) -> usize {
    params.values().filter_map(Value::as_str).map(str::len).sum()
}

/// Lossy rewrite of a single value
pub fn compress_text(text: &str, preference: TierPreference) -> String {
    if !looks_like_code(text) {
        return compress_prose(text);
    }

    let stripped = normalize_indentation(&strip_comments(text));
    if preference.preserves_structure() {
        return stripped;
    }

    let outline = extract_structure(text);
    if outline.is_empty() { stripped } else { outline }
}

fn looks_like_code(text: &str) -> bool {
    let mut lines = 0;
    let mut code_lines = 0;
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        lines += 1;
        if STRUCTURE_PREFIXES.iter().any(|p| line.starts_with(p))
            || line.ends_with(['{', '}', ';', ':', ')'])
        {
            code_lines += 1;
        }
    }
    lines > 1 && code_lines * 3 >= lines
}

fn is_comment_line(trimmed: &str) -> bool {
    trimmed.starts_with("//") || trimmed == "#" || trimmed.starts_with("# ")
}

/// Drop blank lines and whole-line comments
fn strip_comments(code: &str) -> String {
    code.lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !is_comment_line(trimmed)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Two spaces per four columns of leading indentation
fn normalize_indentation(code: &str) -> String {
    code.lines()
        .map(|line| {
            let body = line.trim_start();
            let columns: usize = line[..line.len() - body.len()]
                .chars()
                .map(|c| if c == '\t' { 4 } else { 1 })
                .sum();
            format!("{}{}", "  ".repeat(columns / 4), body.trim_end())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep only signatures, type declarations and imports
fn extract_structure(code: &str) -> String {
    code.lines()
        .map(str::trim)
        .filter(|line| STRUCTURE_PREFIXES.iter().any(|p| line.starts_with(p)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn compress_prose(text: &str) -> String {
    let mut out = filler_regex().replace_all(text, "").into_owned();
    for (re, short) in phrase_regexes() {
        out = re.replace_all(&out, *short).into_owned();
    }
    whitespace_regex().replace_all(&out, " ").trim().to_string()
}

/// Cut `text` to at most `max_bytes`, preferring whole lines
fn truncate_lines(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut out = String::with_capacity(max_bytes);
    for line in text.lines() {
        let needed = if out.is_empty() { line.len() } else { line.len() + 1 };
        if out.len() + needed > max_bytes {
            break;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }

    if out.is_empty() {
        // First line alone is too long
        let cut = text
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .take_while(|end| *end <= max_bytes)
            .last()
            .unwrap_or(0);
        out.push_str(&text[..cut]);
    }

    out
}
