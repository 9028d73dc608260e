//! Article body extraction with graceful degradation.
//!
//! News pages vary wildly in markup quality, so extraction is an ordered list
//! of [`Strategy`] values tried until one yields text:
//!
//! | Strategy | Fetch | Heuristic |
//! |----------|-------|-----------|
//! | [`Strategy::Precision`] | crate user agent | `<p>` paragraphs of the main content container, boilerplate and duplicates removed, > 40 words |
//! | [`Strategy::Readable`] | browser user agent | best-scoring content block rendered to lines, lines of 4 words or fewer dropped |
//!
//! Any failure (timeout, HTTP error, nothing extracted) falls through to the
//! next strategy; when every strategy fails the result is an empty string.

use crate::utils::{collapse_whitespace, word_count};
use once_cell::sync::Lazy;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::error::Error;
use tracing::{debug, instrument};

/// Browser-like user agent for the fallback fetch; some sites serve bots a stub page.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Precision output must exceed this many words to be accepted.
const MIN_PRECISION_WORDS: usize = 40;
/// Readable lines must exceed this many words to be kept.
const MIN_LINE_WORDS: usize = 4;

/// Elements whose content is never article text.
const BOILERPLATE: &[&str] = &[
    "nav", "header", "footer", "aside", "figure", "figcaption", "form", "script", "style",
    "noscript", "template", "iframe", "button",
];

/// Elements that start a new line when rendering text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5",
    "h6", "blockquote", "pre", "tr", "td", "table", "dd", "dt",
];

static CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["article", "[itemprop=\"articleBody\"]", "main", "body"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static CANDIDATE_BLOCKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div, section, article, main, td").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

/// Anything that can turn an article URL into plain body text.
///
/// The note builder depends on this trait rather than on HTTP directly.
pub trait ArticleText {
    /// Return the article body, or an empty string when nothing usable was found.
    async fn article_text(&self, url: &str) -> String;
}

/// One way of fetching a page and distilling its body text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Paragraph harvesting from the main content container.
    Precision,
    /// Readability-style block scoring, rendered line by line.
    Readable,
}

impl Strategy {
    fn user_agent(self) -> Option<&'static str> {
        match self {
            Strategy::Precision => None,
            Strategy::Readable => Some(BROWSER_USER_AGENT),
        }
    }

    /// Run this strategy's heuristic over a downloaded page.
    pub fn extract_from_html(self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        match self {
            Strategy::Precision => precision_text(&document),
            Strategy::Readable => readable_text(&document),
        }
    }
}

fn in_boilerplate(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(|node| node.value().as_element())
        .any(|e| BOILERPLATE.contains(&e.name()))
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn precision_text(document: &Html) -> Option<String> {
    for selector in CONTAINERS.iter() {
        let Some(container) = document.select(selector).next() else {
            continue;
        };
        let mut seen = HashSet::new();
        let paragraphs: Vec<String> = container
            .select(&PARAGRAPH)
            .filter(|p| !in_boilerplate(*p))
            .map(element_text)
            .filter(|text| !text.is_empty() && seen.insert(text.clone()))
            .collect();

        let text = paragraphs.join("\n");
        if word_count(&text) > MIN_PRECISION_WORDS {
            return Some(text);
        }
    }
    None
}

/// Words of direct paragraph and text children, plus a comma bonus,
/// discounted by link density and nudged by class/id hints.
fn block_score(element: ElementRef<'_>) -> f64 {
    let mut score = 0.0;
    for child in element.children() {
        let chunk = if let Some(text) = child.value().as_text() {
            collapse_whitespace(text)
        } else if let Some(child) = ElementRef::wrap(child).filter(|c| c.value().name() == "p") {
            element_text(child)
        } else {
            continue;
        };
        let words = word_count(&chunk);
        if words >= 3 {
            score += words as f64 + chunk.matches(',').count() as f64;
        }
    }
    if score == 0.0 {
        return 0.0;
    }

    let total_len = element_text(element).len().max(1) as f64;
    let link_len: usize = element.select(&LINK).map(|a| element_text(a).len()).sum();
    score *= 1.0 - (link_len as f64 / total_len).min(1.0);

    let hints = format!(
        "{} {}",
        element.value().attr("class").unwrap_or_default(),
        element.value().attr("id").unwrap_or_default()
    )
    .to_lowercase();
    if ["article", "content", "story", "body", "entry", "post"].iter().any(|h| hints.contains(h)) {
        score *= 1.25;
    }
    if ["comment", "sidebar", "promo", "related", "share", "newsletter", "ad-"].iter().any(|h| hints.contains(h)) {
        score *= 0.5;
    }
    score
}

fn flush_line(current: &mut String, lines: &mut Vec<String>) {
    let line = collapse_whitespace(current);
    if !line.is_empty() {
        lines.push(line);
    }
    current.clear();
}

/// Render an element to plain text, one line per block-level element.
fn render_lines(element: ElementRef<'_>, current: &mut String, lines: &mut Vec<String>) {
    let name = element.value().name();
    if BOILERPLATE.contains(&name) {
        return;
    }
    if name == "br" {
        flush_line(current, lines);
        return;
    }
    let block = BLOCK_TAGS.contains(&name);
    if block {
        flush_line(current, lines);
    }
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            current.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            render_lines(child, current, lines);
        }
    }
    if block {
        flush_line(current, lines);
    }
}

fn readable_text(document: &Html) -> Option<String> {
    let best = document
        .select(&CANDIDATE_BLOCKS)
        .filter(|el| !in_boilerplate(*el))
        .map(|el| (block_score(el), el))
        .filter(|(score, _)| *score > 0.0)
        .fold(None::<(f64, ElementRef<'_>)>, |best, (score, el)| match best {
            Some((top, _)) if top >= score => best,
            _ => Some((score, el)),
        });
    let (_, container) = best?;

    let mut lines = Vec::new();
    let mut current = String::new();
    render_lines(container, &mut current, &mut lines);
    flush_line(&mut current, &mut lines);

    let mut seen = HashSet::new();
    let kept: Vec<String> = lines
        .into_iter()
        .filter(|line| word_count(line) > MIN_LINE_WORDS && seen.insert(line.clone()))
        .collect();
    (!kept.is_empty()).then(|| kept.join("\n"))
}

/// HTTP-backed extractor running the configured strategies in order.
#[derive(Debug, Clone)]
pub struct ArticleExtractor {
    client: Client,
    strategies: Vec<Strategy>,
}

impl ArticleExtractor {
    /// Extractor with the default `[Precision, Readable]` chain.
    pub fn new(client: Client) -> Self {
        Self::with_strategies(client, vec![Strategy::Precision, Strategy::Readable])
    }

    pub fn with_strategies(client: Client, strategies: Vec<Strategy>) -> Self {
        Self { client, strategies }
    }

    async fn fetch(&self, url: &str, strategy: Strategy) -> Result<String, Box<dyn Error>> {
        let mut request = self.client.get(url);
        if let Some(agent) = strategy.user_agent() {
            request = request
                .header(USER_AGENT, agent)
                .header(ACCEPT, "text/html,application/xhtml+xml")
                .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9");
        }
        let body = request.send().await?.error_for_status()?.text().await?;
        Ok(body)
    }

    /// Try each strategy in order; the first non-empty result wins.
    #[instrument(level = "debug", skip(self))]
    pub async fn extract_text(&self, url: &str) -> String {
        for strategy in &self.strategies {
            match self.fetch(url, *strategy).await {
                Ok(html) => match strategy.extract_from_html(&html) {
                    Some(text) => {
                        debug!(?strategy, words = word_count(&text), "Extracted article text");
                        return text;
                    }
                    None => debug!(?strategy, "Strategy found no article text"),
                },
                Err(e) => debug!(?strategy, error = %e, "Article fetch failed"),
            }
        }
        String::new()
    }
}

impl ArticleText for ArticleExtractor {
    async fn article_text(&self, url: &str) -> String {
        self.extract_text(url).await
    }
}
