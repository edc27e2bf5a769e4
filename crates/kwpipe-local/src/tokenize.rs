//! Word tokenization for keyword scoring.
//!
//! A token starts with an alphanumeric character and continues through alphanumerics,
//! apostrophes and hyphens. Tokens are lowercased and then dropped when they are stopwords,
//! too short, mostly digits, or look like CSS/hex noise.

use kwpipe_core::{ExtractedContent, TokenizedContent};

/// Short tokens kept even though the length filter would reject them.
const ALWAYS_KEEP: [&str; 2] = ["ai", "seo"];

const CSS_UNITS: [&str; 5] = ["px", "em", "rem", "vh", "vw"];

const COLOR_WORDS: [&str; 4] = ["rgb", "rgba", "hsl", "hsla"];

// Sorted for binary search (checked by a test).
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "can't", "cannot", "could", "couldn't", "did", "didn't", "do",
    "does", "doesn't", "doing", "don't", "down", "during", "each", "either", "else", "ever",
    "every", "few", "for", "from", "further", "had", "hadn't", "has", "hasn't", "have",
    "haven't", "having", "he", "he'd", "he'll", "he's", "her", "here", "here's", "hers",
    "herself", "him", "himself", "his", "how", "how's", "however", "i", "i'd", "i'll", "i'm",
    "i've", "if", "in", "into", "is", "isn't", "it", "it's", "its", "itself", "just", "let's",
    "may", "me", "might", "more", "most", "must", "mustn't", "my", "myself", "neither", "no",
    "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "ought", "our",
    "ours", "ourselves", "out", "over", "own", "same", "shall", "shan't", "she", "she'd",
    "she'll", "she's", "should", "shouldn't", "so", "some", "such", "than", "that", "that's",
    "the", "their", "theirs", "them", "themselves", "then", "there", "there's", "these", "they",
    "they'd", "they'll", "they're", "they've", "this", "those", "through", "to", "too", "under",
    "until", "up", "upon", "us", "very", "was", "wasn't", "we", "we'd", "we'll", "we're",
    "we've", "were", "weren't", "what", "what's", "when", "when's", "where", "where's",
    "whether", "which", "while", "who", "who's", "whom", "whose", "why", "why's", "will",
    "with", "won't", "would", "wouldn't", "yet", "you", "you'd", "you'll", "you're", "you've",
    "your", "yours", "yourself", "yourselves",
];

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.binary_search(&token).is_ok()
}

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || c == '\'' || c == '-'
}

/// Raw token spans in order, lowercased, apostrophes folded to ASCII. No filtering.
fn raw_tokens(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    for ch in text.chars() {
        let ch = if ch == '\u{2019}' { '\'' } else { ch };
        if cur.is_empty() {
            if ch.is_alphanumeric() {
                cur.extend(ch.to_lowercase());
            }
        } else if is_token_char(ch) {
            cur.extend(ch.to_lowercase());
        } else {
            out.push(std::mem::take(&mut cur));
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    for t in &mut out {
        let trimmed = t.trim_end_matches(&['\'', '-'][..]).len();
        t.truncate(trimmed);
    }
    out
}

fn is_digit_heavy(token: &str) -> bool {
    let total = token.chars().count();
    let digits = token.chars().filter(char::is_ascii_digit).count();
    total > 0 && digits * 10 >= total * 7
}

fn is_hex_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// `#?[0-9a-f]{3,6}`. Plain words spelled only with a-f (`cafe`, `bad`) match too.
fn is_hex_color(token: &str) -> bool {
    let hex = token.strip_prefix('#').unwrap_or(token);
    (3..=6).contains(&hex.len()) && is_hex_digits(hex)
}

/// `(0x|x)[0-9a-f]+`
fn is_hex_literal(token: &str) -> bool {
    token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix('x'))
        .is_some_and(is_hex_digits)
}

/// A unit (`px`, `em`, `rem`, `vh`, `vw`) alone or after a number; `system` and `them` are words.
fn is_css_unit(token: &str) -> bool {
    CSS_UNITS.iter().any(|unit| {
        token.strip_suffix(*unit).is_some_and(|num| {
            num.is_empty() || num.chars().all(|c| c.is_ascii_digit() || c == '-')
        })
    })
}

/// Styling/technical noise: CSS units, color functions, hex colors and hex literals.
pub fn is_noise_token(token: &str) -> bool {
    is_css_unit(token)
        || COLOR_WORDS.contains(&token)
        || is_hex_color(token)
        || is_hex_literal(token)
}

/// Apply every filter to an already-lowercased token.
pub fn keep_token(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    if token.chars().count() < 2 && !ALWAYS_KEEP.contains(&token) {
        return false;
    }
    !is_stopword(token) && !is_digit_heavy(token) && !is_noise_token(token)
}

/// Tokenize one string into filtered, lowercase tokens (repeats preserved).
pub fn tokenize_text(text: &str) -> Vec<String> {
    raw_tokens(text)
        .into_iter()
        .filter(|t| keep_token(t))
        .collect()
}

fn tokenize_all(items: &[String]) -> Vec<Vec<String>> {
    items.iter().map(|s| tokenize_text(s)).collect()
}

pub fn tokenize(content: &ExtractedContent) -> TokenizedContent {
    TokenizedContent {
        title: tokenize_text(&content.title),
        meta_description: tokenize_text(&content.meta_description),
        h1: tokenize_all(&content.h1),
        h2: tokenize_all(&content.h2),
        h3: tokenize_all(&content.h3),
        alt_texts: tokenize_all(&content.alt_texts),
        main_content: tokenize_text(&content.main_content),
        url_slug: tokenize_text(&content.url_slug),
    }
}
