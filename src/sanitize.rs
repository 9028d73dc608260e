//! Text normalization for speech synthesis.
//!
//! Voices stumble over currency symbols, digit grouping, clock times,
//! typographic punctuation, asides in parentheses, acronyms and local place
//! names. [`sanitize_for_speech`] rewrites all of these into plain spoken
//! forms. The pass is deterministic and idempotent: running it on its own
//! output changes nothing.
//!
//! Abbreviations and pronunciations live in a [`SpeechLexicon`] loaded from
//! YAML (`data/speech_lexicon.yaml` is compiled in as the default).

use crate::utils::collapse_whitespace;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::{Captures, NoExpand, Regex, RegexBuilder};
use serde::Deserialize;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

const BUILTIN_LEXICON: &str = include_str!("../data/speech_lexicon.yaml");

static RE_MONEY_MAGNITUDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\$(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*(?:(?i:(thousand|million|billion|trillion))\b|([KMB])\b)",
    )
    .unwrap()
});
static RE_MONEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\d{1,3}(?:,\d{3})+|\d+)(?:\.(\d{2}))?").unwrap());
static RE_GROUPED_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{1,3}(?:,\d{3})+\b").unwrap());
static RE_CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*([ap])\.?m\b\.?").unwrap());
static RE_INNER_PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^()]*\)").unwrap());
/// An unclosed aside runs until sentence-ending punctuation followed by a space.
static RE_OPEN_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((?:[^.!?]|[.!?]\S)*").unwrap());
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([,.!?])").unwrap());
static RE_COMMA_PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r",+\.").unwrap());
static RE_REPEATED_PERIODS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").unwrap());
static RE_REPEATED_COMMAS: Lazy<Regex> = Lazy::new(|| Regex::new(r",{2,}").unwrap());
static RE_COMMA_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r#",([^\s"'])"#).unwrap());
static RE_RUN_ON: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z0-9])\.([A-Z])").unwrap());

const PUNCTUATION: &[(&str, &str)] = &[
    ("—", " "),
    ("–", " "),
    ("...", "."),
    ("…", "."),
    (" / ", " or "),
    (" & ", " and "),
    ("\u{2018}", "'"),
    ("\u{2019}", "'"),
    ("\u{201C}", "\""),
    ("\u{201D}", "\""),
    (";", ","),
];

/// Capitalized words that continue a sentence after "a.m."/"p.m.".
const CLOCK_CONTINUATIONS: &[&str] = &[
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday", "January",
    "February", "March", "April", "May", "June", "July", "August", "September", "October",
    "November", "December", "Eastern", "ET", "EST", "EDT",
];

const SCALES: [&str; 5] = ["", " thousand", " million", " billion", " trillion"];

#[derive(Debug, Deserialize)]
struct LexiconFile {
    #[serde(default)]
    acronyms: Vec<String>,
    #[serde(default)]
    expansions: Vec<LexiconEntry>,
    #[serde(default)]
    pronunciations: Vec<LexiconEntry>,
}

#[derive(Debug, Deserialize)]
struct LexiconEntry {
    term: String,
    spoken: String,
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: Regex,
    spoken: String,
    /// Matches lying inside a hit of this pattern are left alone.
    guard: Option<Regex>,
}

impl Rule {
    fn apply(&self, text: &str) -> String {
        let Some(guard) = &self.guard else {
            return self.pattern.replace_all(text, NoExpand(&self.spoken)).into_owned();
        };
        let covered: Vec<(usize, usize)> = guard.find_iter(text).map(|m| (m.start(), m.end())).collect();
        self.pattern
            .replace_all(text, |caps: &Captures<'_>| match caps.get(0) {
                Some(m) if covered.iter().any(|(s, e)| *s <= m.start() && m.end() <= *e) => {
                    m.as_str().to_string()
                }
                _ => self.spoken.clone(),
            })
            .into_owned()
    }
}

/// Whole-word, whitespace-tolerant matcher. All-uppercase terms are case-sensitive.
fn term_regex(term: &str) -> Result<Regex, regex::Error> {
    let body = term.split_whitespace().map(regex::escape).join(r"\s+");
    let case_sensitive = !term.chars().any(char::is_lowercase);
    RegexBuilder::new(&format!(r"\b{body}\b"))
        .case_insensitive(!case_sensitive)
        .build()
}

/// Compiled acronym, expansion and pronunciation tables.
#[derive(Debug, Clone)]
pub struct SpeechLexicon {
    acronyms: Vec<Rule>,
    expansions: Vec<Rule>,
    pronunciations: Vec<Rule>,
}

impl SpeechLexicon {
    /// Parse and compile a lexicon document.
    pub fn from_yaml(yaml: &str) -> Result<Self, Box<dyn Error>> {
        let file: LexiconFile = serde_yaml::from_str(yaml)?;

        let acronyms = file
            .acronyms
            .iter()
            .filter(|a| !a.trim().is_empty())
            .map(|a| -> Result<Rule, regex::Error> {
                Ok(Rule {
                    pattern: term_regex(a)?,
                    spoken: a.trim().chars().join(" "),
                    guard: None,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let expansions = file
            .expansions
            .iter()
            .map(|e| -> Result<Rule, regex::Error> {
                Ok(Rule {
                    pattern: term_regex(&e.term)?,
                    spoken: e.spoken.clone(),
                    guard: Some(term_regex(&e.spoken)?),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let pronunciations = file
            .pronunciations
            .iter()
            .map(|p| -> Result<Rule, regex::Error> {
                Ok(Rule {
                    pattern: RegexBuilder::new(&format!(r"\b{}\b", regex::escape(p.term.trim())))
                        .case_insensitive(true)
                        .build()?,
                    spoken: p.spoken.clone(),
                    guard: None,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            acronyms,
            expansions,
            pronunciations,
        })
    }

    /// The lexicon shipped with the crate.
    pub fn builtin() -> Result<Self, Box<dyn Error>> {
        Self::from_yaml(BUILTIN_LEXICON)
    }

    /// Load a lexicon file, or the built-in one when no path is configured.
    pub async fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let lexicon = match path {
            Some(path) => {
                let yaml = fs::read_to_string(path).await?;
                Self::from_yaml(&yaml)?
            }
            None => Self::builtin()?,
        };
        info!(
            acronyms = lexicon.acronyms.len(),
            expansions = lexicon.expansions.len(),
            pronunciations = lexicon.pronunciations.len(),
            "Loaded speech lexicon"
        );
        Ok(lexicon)
    }
}

/// `1,250,300` -> `1 million 250 thousand 300`; zero groups are skipped.
fn spell_grouped(number: &str) -> String {
    let groups: Vec<&str> = number.split(',').collect();
    if groups.len() > SCALES.len() {
        return number.replace(',', "");
    }
    let spelled = groups
        .iter()
        .enumerate()
        .filter_map(|(i, group)| {
            let value: u32 = group.parse().ok()?;
            (value > 0).then(|| format!("{value}{}", SCALES[groups.len() - 1 - i]))
        })
        .join(" ");
    if spelled.is_empty() { "0".to_string() } else { spelled }
}

fn speak_numbers(text: &str) -> String {
    let text = RE_MONEY_MAGNITUDE.replace_all(text, |caps: &Captures<'_>| {
        let magnitude = match (caps.get(2), caps.get(3).map(|m| m.as_str())) {
            (Some(word), _) => word.as_str().to_lowercase(),
            (None, Some("K")) => "thousand".to_string(),
            (None, Some("M")) => "million".to_string(),
            _ => "billion".to_string(),
        };
        format!("{} {magnitude} dollars", &caps[1])
    });

    let text = RE_MONEY.replace_all(&text, |caps: &Captures<'_>| {
        let amount = &caps[1];
        let unit = if amount == "1" { "dollar" } else { "dollars" };
        match caps.get(2).map(|c| c.as_str().trim_start_matches('0')) {
            Some("") | None => format!("{amount} {unit}"),
            Some("1") => format!("{amount} {unit} and 1 cent"),
            Some(cents) => format!("{amount} {unit} and {cents} cents"),
        }
    });

    let text = RE_GROUPED_NUMBER.replace_all(&text, |caps: &Captures<'_>| spell_grouped(&caps[0]));

    RE_CLOCK
        .replace_all(&text, |caps: &Captures<'_>| {
            let hour = caps[1].parse::<u32>().unwrap_or_default();
            let minutes = &caps[2];
            let meridiem = if caps[3].eq_ignore_ascii_case("a") { "AM" } else { "PM" };
            let mut spoken = if minutes == "00" {
                format!("{hour} {meridiem}")
            } else {
                format!("{hour} {minutes} {meridiem}")
            };
            // "p.m." may also be the end of the sentence.
            let end = caps.get(0).map_or(text.len(), |m| m.end());
            let next_word: String = text[end..]
                .trim_start()
                .chars()
                .take_while(|c| c.is_alphanumeric())
                .collect();
            let ends_sentence = caps[0].ends_with('.')
                && (text[end..].trim().is_empty()
                    || (next_word.starts_with(char::is_uppercase)
                        && !CLOCK_CONTINUATIONS.contains(&next_word.as_str())));
            if ends_sentence {
                spoken.push('.');
            }
            spoken
        })
        .into_owned()
}

fn soften_punctuation(text: &str) -> String {
    PUNCTUATION
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

fn drop_parentheticals(text: &str) -> String {
    let mut text = text.to_string();
    loop {
        let next = RE_INNER_PARENS.replace_all(&text, "").into_owned();
        if next == text {
            break;
        }
        text = next;
    }
    RE_OPEN_PAREN.replace_all(&text, "").replace(')', "")
}

fn tidy(text: &str) -> String {
    let text = collapse_whitespace(text);
    let text = RE_SPACE_BEFORE_PUNCT.replace_all(&text, "${1}");
    let text = RE_COMMA_PERIOD.replace_all(&text, ".");
    let text = RE_REPEATED_PERIODS.replace_all(&text, ".");
    let text = RE_REPEATED_COMMAS.replace_all(&text, ",");
    let text = RE_COMMA_SPACE.replace_all(&text, ", ${1}");
    let text = RE_RUN_ON.replace_all(&text, "${1}. ${2}");
    text.trim().to_string()
}

/// Rewrite a script into a form a speech synthesizer reads naturally.
///
/// Order matters: numbers are spoken before punctuation is softened (so
/// `$1,500.50` keeps its decimal point), and parentheses are dropped before
/// lexicon terms are applied.
pub fn sanitize_for_speech(script: &str, lexicon: &SpeechLexicon) -> String {
    let text = speak_numbers(script);
    let text = soften_punctuation(&text);
    let text = drop_parentheticals(&text);
    let text = lexicon.acronyms.iter().fold(text, |acc, rule| rule.apply(&acc));
    let text = lexicon.expansions.iter().fold(text, |acc, rule| rule.apply(&acc));
    let text = lexicon.pronunciations.iter().fold(text, |acc, rule| rule.apply(&acc));
    let text = tidy(&text);
    debug!(chars = text.len(), "Sanitized script for speech");
    text
}
