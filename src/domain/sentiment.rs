//! Lexicon Sentiment Scorer
//!
//! Compound polarity in [-1, 1] for short social posts. Word valences are
//! summed with simple negation and booster handling, then normalized with
//! `x / sqrt(x^2 + alpha)`.

use std::collections::HashMap;

/// Normalization constant for the compound score
const ALPHA: f64 = 15.0;
/// Scale applied to a valence that follows a negator
const NEGATION_SCALAR: f64 = -0.74;
/// Added magnitude for a valence that follows a booster
const BOOSTER_INCREMENT: f64 = 0.293;

const LEXICON: &[(&str, f64)] = &[
    // general
    ("good", 1.9),
    ("great", 3.1),
    ("love", 3.2),
    ("amazing", 2.8),
    ("win", 2.8),
    ("winning", 2.4),
    ("happy", 2.7),
    ("strong", 2.3),
    ("safe", 1.9),
    ("bad", -2.5),
    ("terrible", -2.1),
    ("hate", -2.7),
    ("awful", -2.0),
    ("lose", -1.7),
    ("losing", -1.6),
    ("loss", -1.3),
    ("weak", -1.9),
    ("fear", -2.2),
    ("panic", -2.3),
    ("dead", -3.3),
    // market slang
    ("bullish", 2.5),
    ("moon", 2.0),
    ("mooning", 2.4),
    ("pump", 1.5),
    ("pumping", 1.8),
    ("gem", 2.2),
    ("lfg", 2.0),
    ("ath", 1.8),
    ("bearish", -2.5),
    ("dump", -1.9),
    ("dumping", -2.1),
    ("rug", -3.0),
    ("rugged", -3.2),
    ("scam", -3.0),
    ("honeypot", -2.8),
    ("rekt", -2.6),
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "without", "isnt",
    "dont", "doesnt", "wont", "cant", "aint",
];

const BOOSTERS: &[&str] = &[
    "very", "really", "extremely", "super", "so", "totally", "absolutely", "incredibly",
];

/// Scores text polarity from a word list
#[derive(Debug, Clone)]
pub struct SentimentScorer {
    lexicon: HashMap<String, f64>,
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentScorer {
    pub fn new() -> Self {
        Self {
            lexicon: LEXICON.iter().map(|(w, v)| (w.to_string(), *v)).collect(),
        }
    }

    /// Add or override a word valence
    pub fn with_word(mut self, word: &str, valence: f64) -> Self {
        self.lexicon.insert(word.to_lowercase(), valence);
        self
    }

    /// Compound polarity of `text`, 0.0 when no scored words are present
    pub fn compound(&self, text: &str) -> f64 {
        let tokens: Vec<String> = text
            .split_whitespace()
            .map(normalize_token)
            .filter(|t| !t.is_empty())
            .collect();

        let mut sum = 0.0;
        for (i, token) in tokens.iter().enumerate() {
            let Some(&base) = self.lexicon.get(token.as_str()) else {
                continue;
            };

            let mut valence = base;
            if let Some(prev) = i.checked_sub(1).map(|j| tokens[j].as_str()) {
                if BOOSTERS.contains(&prev) {
                    valence += BOOSTER_INCREMENT * valence.signum();
                }
            }

            // Negation within the three preceding tokens
            let window_start = i.saturating_sub(3);
            if tokens[window_start..i]
                .iter()
                .any(|t| NEGATORS.contains(&t.as_str()))
            {
                valence *= NEGATION_SCALAR;
            }

            sum += valence;
        }

        if sum == 0.0 {
            return 0.0;
        }

        let mut exclamations = text.matches('!').count().min(4) as f64 * 0.292;
        if sum < 0.0 {
            exclamations = -exclamations;
        }
        let total = sum + exclamations;

        (total / (total * total + ALPHA).sqrt()).clamp(-1.0, 1.0)
    }

    /// Mean compound score over a batch, 0.0 for an empty batch
    pub fn mean_compound<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> (f64, usize) {
        let mut total = 0.0;
        let mut count = 0usize;
        for text in texts {
            total += self.compound(text);
            count += 1;
        }

        if count == 0 {
            (0.0, 0)
        } else {
            (total / count as f64, count)
        }
    }
}

fn normalize_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
