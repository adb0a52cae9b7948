//! Post-processing: deterministic cleanup of OCR-generated Markdown.
//!
//! Mistral OCR occasionally injects stray `%` characters into otherwise valid
//! Markdown, most often at line ends and at the very end of a page. This
//! module removes them along with excess blank lines and trailing whitespace.
//!
//! ## Two stages
//!
//! [`normalize`] runs on the collected body. [`finalize`] runs once on the
//! whole document after the metadata header has been prepended: it fixes the
//! configured corrupted phrases, re-applies the normalisation rules and then
//! sweeps every remaining unescaped `%`. Phrase repair always comes before
//! `%` stripping, otherwise phrases keyed on a `%` could never match.
//!
//! A `%` immediately preceded by a backslash (`\%`) is an escape and is kept
//! by every rule.
//!
//! ## Rule Order
//!
//! Rules are data: an ordered list of [`CleanupRule`]s run by [`apply_rules`].
//! Blank-line collapsing must run after `%` stripping, because removing a
//! `%`-only line leaves an empty one, and whitespace trimming must run last
//! so that lines exposed by the earlier rules are trimmed too.

use crate::config::RepairPhrase;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use tracing::debug;

/// One find-and-replace step.
#[derive(Debug, Clone)]
pub struct CleanupRule {
    name: &'static str,
    pattern: Regex,
    replacement: String,
}

impl CleanupRule {
    /// A rule matching a regular expression. `replacement` may use `${n}`.
    ///
    /// Panics if `pattern` is not a valid regex; only used with literals.
    pub fn pattern(name: &'static str, pattern: &str, replacement: impl Into<String>) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            replacement: replacement.into(),
        }
    }

    /// A rule matching `find` verbatim.
    pub fn literal(name: &'static str, find: &str, replace: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(&regex::escape(find)).unwrap(),
            replacement: replace.replace('$', "$$"),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Apply this rule to `input`.
    pub fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        self.pattern.replace_all(input, self.replacement.as_str())
    }
}

/// Run `rules` over `input` in order.
pub fn apply_rules(input: &str, rules: &[CleanupRule]) -> String {
    rules.iter().fold(input.to_string(), |acc, rule| {
        let changed = match rule.apply(&acc) {
            Cow::Borrowed(_) => None,
            Cow::Owned(s) => Some(s),
        };
        match changed {
            Some(s) => {
                debug!("cleanup rule '{}' changed the text", rule.name());
                s
            }
            None => acc,
        }
    })
}

// ── Normalisation rules ──────────────────────────────────────────────────────

/// Rules 1–3, in order:
/// 1. Strip unescaped `%` (any run after a non-backslash, then a leading run)
/// 2. Collapse 3+ newlines (whitespace-only lines count as blank) to 2
/// 3. Trim trailing spaces/tabs on every line
static NORMALIZE_RULES: Lazy<Vec<CleanupRule>> = Lazy::new(|| {
    vec![
        CleanupRule::pattern("strip-percent", r"([^\\])%+", "${1}"),
        CleanupRule::pattern("strip-leading-percent", r"^%+", ""),
        CleanupRule::pattern("collapse-blank-lines", r"\n(?:[ \t]*\n){2,}", "\n\n"),
        CleanupRule::pattern("trim-trailing-whitespace", r"(?m)[ \t]+$", ""),
    ]
});

/// Trailing `%` sweep run after the repair phrases.
static SWEEP_RULES: Lazy<Vec<CleanupRule>> = Lazy::new(|| {
    vec![
        CleanupRule::pattern("percent-at-end", r"([^\\])%\s*$", "${1}"),
        CleanupRule::pattern("percent-before-newline", r"([^\\])%[ \t]*\n", "${1}\n"),
        CleanupRule::pattern("strip-percent", r"([^\\])%+", "${1}"),
        CleanupRule::pattern("strip-leading-percent", r"^%+", ""),
    ]
});

/// Apply normalisation rules 1–3 to a Markdown body.
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(input: &str) -> String {
    debug!("before normalize, tail: {:?}", tail(input, 30));
    let out = apply_rules(input, &NORMALIZE_RULES);
    debug!("after normalize, tail: {:?}", tail(&out, 30));
    out
}

/// Literal rules for the given repair phrases, in list order.
pub fn repair_rules(phrases: &[RepairPhrase]) -> Vec<CleanupRule> {
    phrases
        .iter()
        .map(|p| CleanupRule::literal("repair-phrase", &p.find, &p.replace))
        .collect()
}

/// Replace every configured phrase. Must run before [`normalize`], which
/// strips the `%` most phrases are keyed on.
pub fn repair(text: &str, phrases: &[RepairPhrase]) -> String {
    apply_rules(text, &repair_rules(phrases))
}

/// Final-output cleanup: repair phrases, normalise the whole document, then
/// sweep trailing `%`.
///
/// After this pass the document holds no `%` that is not preceded by `\`.
pub fn finalize(document: &str, phrases: &[RepairPhrase]) -> String {
    let repaired = repair(document, phrases);
    let normalized = normalize(&repaired);
    let out = apply_rules(&normalized, &SWEEP_RULES);
    debug!(
        "final document: {} chars, tail {:?}, unescaped % left: {}",
        out.chars().count(),
        tail(&out, 40),
        has_unescaped_percent(&out)
    );
    out
}

/// True if any `%` is not immediately preceded by a backslash.
pub fn has_unescaped_percent(s: &str) -> bool {
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if c == '%' && prev != Some('\\') {
            return true;
        }
        prev = Some(c);
    }
    false
}

/// Last `n` characters of `s`, for diagnostics.
fn tail(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    let start = s
        .char_indices()
        .nth(count - n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &s[start..]
}

// ── Tests ────────────────────────────────────────────────────────────────────
