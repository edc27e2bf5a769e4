//! N-gram generation, scoring and ranking over a tokenized page.
//!
//! Phrases of 1..=4 tokens are built from the body stream only. Structural zones only feed
//! the position set (and through it a small score bonus).

use kwpipe_core::{KeywordFinding, Label, Position, PositionSet, TokenizedContent};
use std::collections::HashMap;

pub const MAX_NGRAM: usize = 4;

/// Density (percent) above which a phrase is treated as likely keyword stuffing.
const STUFFING_DENSITY: f64 = 5.0;
const STUFFING_FACTOR: f64 = 0.5;
const POSITION_WEIGHT: f64 = 0.1;
const UNIGRAM_BONUS: f64 = 0.5;
const PER_TOKEN_BONUS: f64 = 0.2;

#[derive(Debug, Clone)]
struct NGram {
    phrase: String,
    tokens: u8,
    frequency: u32,
    positions: PositionSet,
}

/// Phrase key: letters/digits/space/apostrophe/hyphen only, apostrophes and hyphens become
/// spaces, whitespace collapsed, lowercased.
pub fn normalize_phrase(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = true;
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_space = false;
        } else if (ch.is_whitespace() || ch == '\'' || ch == '-') && !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `ln(f + 1) * density + 0.1 * |positions| + lengthBonus`, halved when density > 5%.
pub fn raw_score(frequency: u32, density: f64, positions: usize, tokens: u8) -> f64 {
    let length_bonus = if tokens == 1 {
        UNIGRAM_BONUS
    } else {
        f64::from(tokens) * PER_TOKEN_BONUS
    };
    let mut score = (f64::from(frequency) + 1.0).ln() * density
        + POSITION_WEIGHT * positions as f64
        + length_bonus;
    if density > STUFFING_DENSITY {
        score *= STUFFING_FACTOR;
    }
    score
}

/// Normalized, space-joined text of one structural zone.
struct ZoneText {
    position: Position,
    text: String,
}

impl ZoneText {
    fn new<'a>(position: Position, tokens: impl IntoIterator<Item = &'a String>) -> Self {
        let joined = tokens
            .into_iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            position,
            text: normalize_phrase(&joined),
        }
    }

    /// Plain substring containment: `rust` is found in `rusty chart`.
    fn contains(&self, phrase: &str) -> bool {
        phrase.len() <= self.text.len() && self.text.contains(phrase)
    }
}

/// Every zone except the body. Phrases are cut from the body, so `Content` always matches and
/// is never scanned.
fn structural_zones(t: &TokenizedContent) -> Vec<ZoneText> {
    [
        ZoneText::new(Position::Title, &t.title),
        ZoneText::new(Position::H1, t.h1.iter().flatten()),
        ZoneText::new(Position::H2, t.h2.iter().flatten()),
        ZoneText::new(Position::H3, t.h3.iter().flatten()),
        ZoneText::new(Position::Meta, &t.meta_description),
        ZoneText::new(Position::Alt, t.alt_texts.iter().flatten()),
        ZoneText::new(Position::Url, &t.url_slug),
    ]
    .into_iter()
    .filter(|z| !z.text.is_empty())
    .collect()
}

/// Count every 1..=4 token window of the body, keyed by normalized phrase, in first-seen order.
fn collect_ngrams(body: &[String]) -> Vec<NGram> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut grams: Vec<NGram> = Vec::new();
    for n in 1..=MAX_NGRAM {
        for window in body.windows(n) {
            let phrase = normalize_phrase(&window.join(" "));
            if phrase.is_empty() {
                continue;
            }
            if let Some(&i) = index.get(&phrase) {
                grams[i].frequency += 1;
                continue;
            }
            index.insert(phrase.clone(), grams.len());
            grams.push(NGram {
                phrase,
                tokens: n as u8,
                frequency: 1,
                positions: PositionSet::new(),
            });
        }
    }
    grams
}

/// Rank every body phrase.
///
/// `total_body_tokens` is the density denominator (normally `tokenized.main_content.len()`);
/// zero yields no findings.
pub fn score(tokenized: &TokenizedContent, total_body_tokens: usize) -> Vec<KeywordFinding> {
    if total_body_tokens == 0 {
        return Vec::new();
    }
    let zones = structural_zones(tokenized);
    let mut grams = collect_ngrams(&tokenized.main_content);
    for g in &mut grams {
        g.positions = zones
            .iter()
            .filter(|z| z.contains(&g.phrase))
            .map(|z| z.position)
            .collect();
        g.positions.insert(Position::Content);
    }

    let total = total_body_tokens as f64;
    let mut findings: Vec<KeywordFinding> = grams
        .into_iter()
        .map(|g| {
            let density = f64::from(g.frequency) / total * 100.0;
            let score = raw_score(g.frequency, density, g.positions.len(), g.tokens);
            let density = round2(density);
            debug_assert!(
                (0.0..=100.0).contains(&density),
                "density out of range: {density} for {:?}",
                g.phrase
            );
            KeywordFinding {
                rank: 0,
                keyword: g.phrase,
                tokens: g.tokens,
                frequency: g.frequency,
                density,
                score: round2(score),
                positions: g.positions,
                labels: Label::for_density(density),
            }
        })
        .collect();

    // Stable: equal scores keep first-seen order.
    findings.sort_by(|a, b| b.score.total_cmp(&a.score));
    for (i, f) in findings.iter_mut().enumerate() {
        f.rank = i + 1;
    }
    findings
}

/// Keep the top `max` findings; ranks are already contiguous so truncation preserves them.
pub fn truncate_ranked(findings: &mut Vec<KeywordFinding>, max: Option<usize>) {
    if let Some(max) = max {
        findings.truncate(max);
    }
}
