//! Lead-sentence notes for the script rewriter.
//!
//! Each deduplicated story is reduced to one attributed line. Article text is
//! preferred; when it is missing or yields too short a lead, the feed summary
//! and then the bare title are tried before the story is dropped.

use crate::extract::ArticleText;
use crate::models::{DedupedItem, ExtractedNote};
use crate::utils::{collapse_whitespace, word_count};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument};

/// Sentence boundaries in preference order; every occurrence of one is tried before the next.
const DELIMITERS: [&str; 5] = [". ", " — ", " – ", ": ", " • "];
/// A delimiter candidate needs at least this many words.
const MIN_CANDIDATE_WORDS: usize = 8;
/// Character budget for the truncation fallback.
const MAX_LEAD_CHARS: usize = 230;

const TRAILING: &[char] = &[' ', '.', ',', ';', ':', '-', '–', '—', '•', '…', '|'];

fn truncate_to_word(text: &str, max_chars: usize) -> &str {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text;
    };
    let head = &text[..cut];
    match head.rfind(char::is_whitespace) {
        Some(space) if space > 0 => &head[..space],
        _ => head,
    }
}

/// Reduce a block of text to a single lead sentence.
///
/// Every occurrence of each delimiter (in [`DELIMITERS`] order) is tried left
/// to right; the first whose preceding text has at least eight words wins. Without one, the text is cut to about 230
/// characters on a word boundary. Trailing punctuation and bullets are removed.
pub fn lead_sentence(text: &str) -> String {
    let text = collapse_whitespace(text);
    let lead = DELIMITERS
        .iter()
        .flat_map(|delimiter| text.match_indices(delimiter).map(|(at, _)| &text[..at]))
        .find(|head| word_count(head) >= MIN_CANDIDATE_WORDS)
        .unwrap_or_else(|| truncate_to_word(&text, MAX_LEAD_CHARS));
    lead.trim_end_matches(TRAILING).to_string()
}

/// Article text, then summary, then title: the first lead with enough words.
fn choose_lead(article: &str, item: &DedupedItem, min_lead_words: usize) -> Option<String> {
    [Some(article), item.summary.as_deref(), Some(item.title.as_str())]
        .into_iter()
        .flatten()
        .filter(|text| !text.trim().is_empty())
        .map(lead_sentence)
        .find(|lead| word_count(lead) >= min_lead_words)
}

/// Build at most `max_items` notes, in item order.
///
/// Article bodies are fetched up to `concurrency` at a time, but notes are
/// accepted strictly in the order of `items`, so the output is deterministic
/// for a given input.
#[instrument(level = "info", skip_all, fields(items = items.len(), max_items = max_items))]
pub async fn build_notes<E: ArticleText>(
    extractor: &E,
    items: &[DedupedItem],
    max_items: usize,
    min_lead_words: usize,
    concurrency: usize,
) -> Vec<ExtractedNote> {
    let mut notes = Vec::new();
    if max_items == 0 {
        return notes;
    }

    let mut bodies = stream::iter(items)
        .map(|item| async move { (item, extractor.article_text(&item.link).await) })
        .buffered(concurrency.max(1));

    while let Some((item, article)) = bodies.next().await {
        let Some(sentence) = choose_lead(&article, item, min_lead_words) else {
            debug!(title = %item.title, source = %item.source, "No usable lead; dropping story");
            continue;
        };
        notes.push(ExtractedNote {
            source: item.source.clone(),
            sentence,
            link: item.link.clone(),
        });
        if notes.len() >= max_items {
            break;
        }
    }

    info!(notes = notes.len(), "Built notes");
    notes
}
