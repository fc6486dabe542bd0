//! Lexicon-based sentiment analysis for notes and communications.
//!
//! Polarity runs from -1.0 (negative) to 1.0 (positive); subjectivity from
//! 0.0 (factual) to 1.0 (opinion). Each lexicon word found in the text
//! contributes its scores, adjusted by a preceding intensifier ("very good")
//! or a nearby negator ("not good" flips and halves the polarity). The text
//! scores are the means over all hits.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Polarity above which text is positive (and below whose negation it is negative).
pub const NEUTRAL_BAND: f64 = 0.1;

/// Polarity factor applied when a word is negated.
const NEGATION_FACTOR: f64 = -0.5;

/// How many tokens back a negator still applies.
const NEGATION_WINDOW: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > NEUTRAL_BAND {
            Sentiment::Positive
        } else if polarity < -NEUTRAL_BAND {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores carried by a single lexicon word.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordSentiment {
    pub polarity: f64,
    pub subjectivity: f64,
}

/// Source of per-word sentiment scores.
pub trait Lexicon {
    /// Scores for a lower-cased token, if the lexicon knows it.
    fn word(&self, token: &str) -> Option<WordSentiment>;

    /// Multiplier for an intensifying/diminishing modifier such as "very".
    fn intensity(&self, token: &str) -> Option<f64>;

    /// Whether the token negates what follows.
    fn is_negator(&self, token: &str) -> bool;
}

/// (word, polarity, subjectivity)
const WORDS: &[(&str, f64, f64)] = &[
    // positive
    ("amazing", 0.6, 0.9),
    ("awesome", 1.0, 1.0),
    ("beautiful", 0.85, 1.0),
    ("best", 1.0, 0.3),
    ("better", 0.5, 0.5),
    ("brilliant", 0.9, 1.0),
    ("delighted", 0.7, 0.8),
    ("easy", 0.43, 0.83),
    ("effective", 0.6, 0.8),
    ("enjoyed", 0.4, 0.5),
    ("excellent", 1.0, 1.0),
    ("excited", 0.375, 0.75),
    ("exciting", 0.3, 0.8),
    ("fantastic", 0.4, 0.9),
    ("fast", 0.2, 0.6),
    ("fine", 0.42, 0.5),
    ("glad", 0.5, 1.0),
    ("good", 0.7, 0.6),
    ("great", 0.8, 0.75),
    ("happy", 0.8, 1.0),
    ("helpful", 0.5, 0.5),
    ("impressed", 1.0, 1.0),
    ("interested", 0.25, 0.5),
    ("keen", 0.5, 0.6),
    ("like", 0.2, 0.4),
    ("love", 0.5, 0.6),
    ("loved", 0.7, 0.8),
    ("nice", 0.6, 1.0),
    ("perfect", 1.0, 1.0),
    ("pleased", 0.5, 1.0),
    ("positive", 0.23, 0.55),
    ("promising", 0.4, 0.6),
    ("recommend", 0.3, 0.4),
    ("satisfied", 0.5, 1.0),
    ("significant", 0.375, 0.875),
    ("smooth", 0.4, 0.6),
    ("strong", 0.43, 0.73),
    ("success", 0.3, 0.0),
    ("successful", 0.75, 0.95),
    ("thank", 0.2, 0.2),
    ("thanks", 0.2, 0.2),
    ("useful", 0.3, 0.0),
    ("valuable", 0.55, 0.8),
    ("well", 0.2, 0.3),
    ("wonderful", 1.0, 1.0),
    // negative
    ("angry", -0.5, 1.0),
    ("annoyed", -0.4, 0.8),
    ("awful", -1.0, 1.0),
    ("bad", -0.7, 0.67),
    ("broken", -0.4, 0.4),
    ("cancel", -0.3, 0.3),
    ("complaint", -0.4, 0.5),
    ("confused", -0.4, 0.7),
    ("delay", -0.3, 0.3),
    ("delayed", -0.3, 0.3),
    ("difficult", -0.5, 1.0),
    ("disappointed", -0.75, 0.75),
    ("disappointing", -0.6, 0.7),
    ("expensive", -0.5, 0.7),
    ("fail", -0.5, 0.3),
    ("failed", -0.5, 0.3),
    ("frustrated", -0.7, 0.7),
    ("frustrating", -0.4, 0.7),
    ("hate", -0.8, 0.9),
    ("horrible", -1.0, 1.0),
    ("lost", 0.0, 0.0),
    ("negative", -0.3, 0.4),
    ("poor", -0.4, 0.6),
    ("problem", -0.2, 0.3),
    ("slow", -0.3, 0.39),
    ("terrible", -1.0, 1.0),
    ("unhappy", -0.6, 0.9),
    ("unclear", -0.1, 0.4),
    ("upset", -0.4, 0.6),
    ("useless", -0.5, 0.2),
    ("worse", -0.4, 0.6),
    ("worst", -1.0, 1.0),
    ("wrong", -0.5, 0.9),
    // weakly subjective
    ("nothing", 0.0, 0.0),
    ("okay", 0.5, 0.5),
    ("ok", 0.5, 0.5),
    ("special", 0.36, 0.57),
];

/// (modifier, multiplier)
const INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.3),
    ("really", 1.3),
    ("extremely", 1.5),
    ("incredibly", 1.5),
    ("super", 1.4),
    ("so", 1.2),
    ("quite", 1.1),
    ("highly", 1.3),
    ("absolutely", 1.5),
    ("slightly", 0.5),
    ("somewhat", 0.7),
    ("barely", 0.4),
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "neither", "nor", "cannot", "dont", "don't", "doesn't", "doesnt",
    "didn't", "didnt", "isn't", "isnt", "wasn't", "wasnt", "aren't", "arent", "won't", "wont",
    "can't", "cant", "couldn't", "couldnt", "shouldn't", "shouldnt",
];

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z]+(?:'[a-z]+)?").expect("token pattern is valid"));

/// The English word table shipped with the service.
pub struct BuiltinLexicon {
    words: HashMap<&'static str, WordSentiment>,
    intensifiers: HashMap<&'static str, f64>,
}

impl BuiltinLexicon {
    fn new() -> Self {
        let words = WORDS
            .iter()
            .map(|&(word, polarity, subjectivity)| {
                (
                    word,
                    WordSentiment {
                        polarity,
                        subjectivity,
                    },
                )
            })
            .collect();
        let intensifiers = INTENSIFIERS.iter().copied().collect();
        Self {
            words,
            intensifiers,
        }
    }
}

impl Lexicon for BuiltinLexicon {
    fn word(&self, token: &str) -> Option<WordSentiment> {
        self.words.get(token).copied()
    }

    fn intensity(&self, token: &str) -> Option<f64> {
        self.intensifiers.get(token).copied()
    }

    fn is_negator(&self, token: &str) -> bool {
        NEGATORS.contains(&token)
    }
}

static BUILTIN: LazyLock<BuiltinLexicon> = LazyLock::new(BuiltinLexicon::new);

/// Raw polarity/subjectivity of a text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScores {
    pub polarity: f64,
    pub subjectivity: f64,
}

/// Full analysis returned by [`SentimentAnalyzer::analyze_detailed`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentAnalysis {
    pub sentiment: Sentiment,
    pub polarity: f64,
    pub subjectivity: f64,
    pub classification: Sentiment,
    pub interpretation: String,
}

/// Analyzer driven by a [`Lexicon`].
pub struct SentimentAnalyzer<'a, L: Lexicon + ?Sized> {
    lexicon: &'a L,
}

impl SentimentAnalyzer<'static, BuiltinLexicon> {
    pub fn builtin() -> Self {
        Self {
            lexicon: LazyLock::force(&BUILTIN),
        }
    }
}

impl<'a, L: Lexicon + ?Sized> SentimentAnalyzer<'a, L> {
    pub fn new(lexicon: &'a L) -> Self {
        Self { lexicon }
    }

    /// Label and polarity (rounded to 3 decimals).
    ///
    /// Blank text is neutral and never reaches the lexicon.
    pub fn analyze(&self, text: &str) -> (Sentiment, f64) {
        if text.trim().is_empty() {
            return (Sentiment::Neutral, 0.0);
        }
        let scores = self.scores(text);
        (
            Sentiment::from_polarity(scores.polarity),
            round3(scores.polarity),
        )
    }

    /// Label, polarity, subjectivity and a one-sentence interpretation.
    pub fn analyze_detailed(&self, text: &str) -> SentimentAnalysis {
        let scores = if text.trim().is_empty() {
            SentimentScores {
                polarity: 0.0,
                subjectivity: 0.0,
            }
        } else {
            self.scores(text)
        };

        let sentiment = Sentiment::from_polarity(scores.polarity);
        SentimentAnalysis {
            sentiment,
            polarity: round3(scores.polarity),
            subjectivity: round3(scores.subjectivity),
            classification: sentiment,
            interpretation: interpret(scores.polarity, scores.subjectivity),
        }
    }

    /// Unrounded scores for non-blank text.
    pub fn scores(&self, text: &str) -> SentimentScores {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = TOKEN_PATTERN
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .collect();

        let mut polarity_sum = 0.0;
        let mut subjectivity_sum = 0.0;
        let mut hits = 0usize;

        for (idx, token) in tokens.iter().enumerate() {
            let Some(word) = self.lexicon.word(token) else {
                continue;
            };

            let mut polarity = word.polarity;
            let mut subjectivity = word.subjectivity;

            if let Some(multiplier) = idx
                .checked_sub(1)
                .and_then(|prev| self.lexicon.intensity(tokens[prev]))
            {
                polarity *= multiplier;
                subjectivity *= multiplier;
            }

            let window_start = idx.saturating_sub(NEGATION_WINDOW);
            if tokens[window_start..idx]
                .iter()
                .any(|t| self.lexicon.is_negator(t))
            {
                polarity *= NEGATION_FACTOR;
            }

            polarity_sum += polarity.clamp(-1.0, 1.0);
            subjectivity_sum += subjectivity.clamp(0.0, 1.0);
            hits += 1;
        }

        if hits == 0 {
            return SentimentScores {
                polarity: 0.0,
                subjectivity: 0.0,
            };
        }

        SentimentScores {
            polarity: (polarity_sum / hits as f64).clamp(-1.0, 1.0),
            subjectivity: (subjectivity_sum / hits as f64).clamp(0.0, 1.0),
        }
    }
}

/// Label and polarity using the builtin lexicon.
pub fn analyze_sentiment(text: &str) -> (Sentiment, f64) {
    SentimentAnalyzer::builtin().analyze(text)
}

/// Detailed analysis using the builtin lexicon.
pub fn analyze_sentiment_detailed(text: &str) -> SentimentAnalysis {
    SentimentAnalyzer::builtin().analyze_detailed(text)
}

fn interpret(polarity: f64, subjectivity: f64) -> String {
    let tone = Sentiment::from_polarity(polarity);
    let stance = if subjectivity > 0.6 {
        "highly subjective"
    } else if subjectivity > 0.3 {
        "somewhat subjective"
    } else {
        "factual"
    };
    format!("The text is {} and {}.", tone, stance)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
