//! Script rewriting through an OpenAI-compatible chat completions API.
//!
//! The note list is turned into a spoken script by a language model under a
//! fixed set of hard constraints (exact greeting, note order, attribution, no
//! editorializing). Any failure, including a script that is too short, is
//! reported as "rewrite unavailable" and the caller substitutes
//! [`fallback_script`].
//!
//! # Architecture
//!
//! - [`AskModel`]: Core trait for one instructions + notes round trip
//! - [`ChatCompletions`]: `reqwest` client for `/chat/completions`
//! - [`Retrying`]: Decorator adding exponential backoff to any [`AskModel`]
//! - [`LlmRewriter`]: Tries one client per configured model, first success wins
//!
//! # Retry Strategy
//!
//! - `max_retries` extra attempts per model (from configuration)
//! - Exponential backoff starting at 1 second, capped at 30 seconds
//! - Random jitter (0-250ms) added to every delay

use crate::config::RewriterConfig;
use crate::models::ExtractedNote;
use crate::utils::{time_of_day, truncate_for_log, word_count};
use chrono::NaiveDateTime;
use itertools::Itertools;
use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Style guidance used when no prompt file is supplied.
pub const DEFAULT_STYLE_PROMPT: &str = "You write the script for a short local news radio \
briefing. Use plain, conversational sentences that are easy to read aloud. Keep each story to \
one or two sentences and use a brief transition between stories. Do not use lists, headings, \
emoji, or markdown.";

/// Build the opening line, keyed to the local time of day and date.
///
/// ```text
/// Good morning, it's Monday, October 19. This is Boston Briefing.
/// ```
pub fn greeting(now: NaiveDateTime, show_title: &str) -> String {
    format!(
        "Good {}, it's {}. This is {show_title}.",
        time_of_day(now.time()),
        now.format("%A, %B %-d")
    )
}

/// System instructions combining the style prompt with the hard content rules.
pub fn build_instructions(style_prompt: &str, greeting: &str, note_count: usize) -> String {
    format!(
        "{style}\n\n\
         Hard rules:\n\
         1. Begin the script with exactly this sentence: \"{greeting}\"\n\
         2. Cover all {note_count} notes, one story per note, in the order given.\n\
         3. Attribute every story to its source by name (for example, \"WBUR reports\").\n\
         4. Use only facts stated in the notes. Do not editorialize, speculate, or add opinions.\n\
         5. Do not read out links or URLs.\n\
         6. End with a one-sentence sign-off.\n\
         Output only the script text.",
        style = style_prompt.trim()
    )
}

/// Fixed script used when there are no notes or the rewrite is unavailable.
pub fn fallback_script(greeting: &str) -> String {
    format!(
        "{greeting} We're sorry, something went wrong while putting together today's briefing, \
         so we don't have the latest stories for you right now. Please check back tomorrow for \
         your local headlines. Thanks for listening."
    )
}

/// One request to a language model: system instructions plus the note list.
pub trait AskModel {
    async fn ask(&self, instructions: &str, notes: &str) -> Result<String, Box<dyn Error>>;
}

/// Anything that can turn notes into a script. `None` means "rewrite unavailable".
pub trait ScriptRewriter {
    async fn rewrite(&self, greeting: &str, notes: &[ExtractedNote]) -> Option<String>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskModel`].
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct Retrying<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> Retrying<T>
where
    T: AskModel,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Retrying<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrying")
            .field("inner", &self.inner)
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskModel for Retrying<T>
where
    T: AskModel,
{
    #[instrument(level = "info", skip_all)]
    async fn ask(&self, instructions: &str, notes: &str) -> Result<String, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(instructions, notes).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let exponent = u32::try_from(attempt - 1).unwrap_or(u32::MAX).min(16);
                    let delay = self.base_delay.saturating_mul(1 << exponent).min(self.max_delay);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for a single model behind an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletions {
    http: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl fmt::Debug for ChatCompletions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletions")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatCompletions {
    pub fn new(http: Client, endpoint: &str, api_key: &str, model: &str, temperature: f32) -> Self {
        Self {
            http,
            url: format!("{}/chat/completions", endpoint.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
        }
    }
}

impl AskModel for ChatCompletions {
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, instructions: &str, notes: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: instructions,
                },
                ChatMessage {
                    role: "user",
                    content: notes,
                },
            ],
            temperature: self.temperature,
        };

        let response: ChatResponse = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or("completion contained no text")?;

        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            preview = %truncate_for_log(&content, 120),
            "Completion received"
        );
        Ok(content)
    }
}

/// Rewriter that asks each configured model in turn.
#[derive(Debug)]
pub struct LlmRewriter<A> {
    models: Vec<A>,
    style_prompt: String,
    min_script_words: usize,
}

impl<A: AskModel> LlmRewriter<A> {
    pub fn new(models: Vec<A>, style_prompt: impl Into<String>, min_script_words: usize) -> Self {
        Self {
            models,
            style_prompt: style_prompt.into(),
            min_script_words,
        }
    }
}

impl LlmRewriter<Retrying<ChatCompletions>> {
    /// One retrying client per configured model. Without an API key the
    /// rewriter has no models and every rewrite is unavailable.
    pub fn from_config(
        config: &RewriterConfig,
        api_key: Option<&str>,
        style_prompt: impl Into<String>,
    ) -> reqwest::Result<Self> {
        let style_prompt = style_prompt.into();
        let Some(api_key) = api_key.filter(|k| !k.trim().is_empty()) else {
            warn!("No language-model API key configured; scripts will use the fallback");
            return Ok(Self::new(Vec::new(), style_prompt, config.min_script_words));
        };
        let http = crate::utils::http_client(StdDuration::from_secs(config.timeout_secs))?;
        let models = config
            .models
            .iter()
            .map(|model| {
                Retrying::new(
                    ChatCompletions::new(http.clone(), &config.endpoint, api_key, model, config.temperature),
                    config.max_retries,
                    StdDuration::from_secs(1),
                )
            })
            .collect();
        Ok(Self::new(models, style_prompt, config.min_script_words))
    }
}

/// Notes as numbered lines, in the order they must be read.
fn format_notes(notes: &[ExtractedNote]) -> String {
    notes
        .iter()
        .enumerate()
        .map(|(i, note)| format!("{}. {note}", i + 1))
        .join("\n")
}

impl<A: AskModel> ScriptRewriter for LlmRewriter<A> {
    #[instrument(level = "info", skip_all, fields(notes = notes.len(), models = self.models.len()))]
    async fn rewrite(&self, greeting: &str, notes: &[ExtractedNote]) -> Option<String> {
        if notes.is_empty() {
            info!("No notes to rewrite");
            return None;
        }
        let instructions = build_instructions(&self.style_prompt, greeting, notes.len());
        let note_lines = format_notes(notes);

        for (index, model) in self.models.iter().enumerate() {
            match model.ask(&instructions, &note_lines).await {
                Ok(script) if word_count(&script) >= self.min_script_words => {
                    info!(model = index, words = word_count(&script), "Script rewritten");
                    if script.starts_with("Good ") {
                        return Some(script);
                    }
                    return Some(format!("{greeting} {script}"));
                }
                Ok(script) => warn!(
                    model = index,
                    words = word_count(&script),
                    min = self.min_script_words,
                    "Script too short; trying next model"
                ),
                Err(e) => warn!(model = index, error = %e, "Rewrite failed; trying next model"),
            }
        }
        warn!("Rewrite unavailable");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap().and_hms_opt(hour, 5, 0).unwrap()
    }

    fn note(source: &str, sentence: &str) -> ExtractedNote {
        ExtractedNote {
            source: source.to_string(),
            sentence: sentence.to_string(),
            link: format!("https://{}.example.com/story", source.to_lowercase()),
        }
    }

    /// Fails `failures` times, then answers with `reply`.
    #[derive(Debug)]
    struct Flaky {
        failures: usize,
        reply: String,
        calls: AtomicUsize,
    }

    impl Flaky {
        fn new(failures: usize, reply: &str) -> Self {
            Self {
                failures,
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl AskModel for Flaky {
        async fn ask(&self, _instructions: &str, _notes: &str) -> Result<String, Box<dyn Error>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err("temporarily unavailable".into())
            } else {
                Ok(self.reply.clone())
            }
        }
    }

    fn long_script(greeting: &str) -> String {
        format!("{greeting} {}", "WBUR reports the council passed the budget today. ".repeat(8))
    }

    #[test]
    fn test_greeting_by_time_of_day() {
        assert_eq!(
            greeting(at(8), "Boston Briefing"),
            "Good morning, it's Monday, October 19. This is Boston Briefing."
        );
        assert!(greeting(at(12), "X").starts_with("Good afternoon"));
        assert!(greeting(at(16), "X").starts_with("Good afternoon"));
        assert!(greeting(at(17), "X").starts_with("Good evening"));
    }

    #[test]
    fn test_instructions_carry_hard_rules() {
        let text = build_instructions("Be brief.", "Good morning, it's Monday.", 3);
        assert!(text.starts_with("Be brief."));
        assert!(text.contains("\"Good morning, it's Monday.\""));
        assert!(text.contains("Cover all 3 notes"));
        assert!(text.contains("in the order given"));
        assert!(text.contains("Do not editorialize"));
    }

    #[test]
    fn test_fallback_script_opens_with_greeting() {
        let script = fallback_script("Good evening, it's Monday, October 19. This is Boston Briefing.");
        assert!(script.starts_with("Good evening"));
        assert!(script.contains("something went wrong"));
    }

    #[tokio::test]
    async fn test_retrying_recovers_from_transient_failures() {
        let api = Retrying::new(Flaky::new(2, "ok"), 2, StdDuration::from_millis(1));
        assert_eq!(api.ask("sys", "notes").await.unwrap(), "ok");
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retrying_gives_up_after_max_retries() {
        let api = Retrying::new(Flaky::new(10, "never"), 1, StdDuration::from_millis(1));
        assert!(api.ask("sys", "notes").await.is_err());
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rewriter_falls_through_models() {
        let hello = greeting(at(8), "Boston Briefing");
        let rewriter = LlmRewriter::new(
            vec![Flaky::new(1, "unused"), Flaky::new(0, &long_script(&hello))],
            DEFAULT_STYLE_PROMPT,
            40,
        );
        let script = rewriter.rewrite(&hello, &[note("WBUR", "The council passed the budget")]).await;
        assert_eq!(script.as_deref(), Some(long_script(&hello).as_str()));
    }

    #[tokio::test]
    async fn test_short_script_is_unavailable() {
        let rewriter = LlmRewriter::new(vec![Flaky::new(0, "Too short.")], DEFAULT_STYLE_PROMPT, 40);
        let notes = [note("WBUR", "The council passed the budget")];
        assert!(rewriter.rewrite("Good morning.", &notes).await.is_none());
    }

    #[tokio::test]
    async fn test_no_notes_or_no_models_is_unavailable() {
        let rewriter = LlmRewriter::new(vec![Flaky::new(0, "anything")], DEFAULT_STYLE_PROMPT, 1);
        assert!(rewriter.rewrite("Good morning.", &[]).await.is_none());

        let keyless = LlmRewriter::from_config(&RewriterConfig::default(), None, DEFAULT_STYLE_PROMPT).unwrap();
        assert!(keyless.rewrite("Good morning.", &[note("WBUR", "A story")]).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_greeting_is_prepended() {
        let body = "WBUR reports the council passed the budget today. ".repeat(8);
        let rewriter = LlmRewriter::new(vec![Flaky::new(0, body.trim())], DEFAULT_STYLE_PROMPT, 40);
        let script = rewriter
            .rewrite("Good morning, it's Monday.", &[note("WBUR", "The council passed the budget")])
            .await
            .unwrap();
        assert!(script.starts_with("Good morning, it's Monday. WBUR reports"));
    }

    #[tokio::test]
    async fn test_chat_completions_request_and_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::PartialJson(serde_json::json!({"model": "gpt-4o-mini"})),
                mockito::Matcher::Regex(r#""role":"user","content":"1\. WBUR: Story"#.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"  Good morning.  "}}]}"#)
            .create_async()
            .await;

        let http = crate::utils::http_client(StdDuration::from_secs(5)).unwrap();
        let client = ChatCompletions::new(http, &format!("{}/v1/", server.url()), "test-key", "gpt-4o-mini", 0.4);
        let reply = client.ask("rules", "1. WBUR: Story (link: x)").await.unwrap();
        assert_eq!(reply, "Good morning.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_completions_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .create_async()
            .await;

        let http = crate::utils::http_client(StdDuration::from_secs(5)).unwrap();
        let client = ChatCompletions::new(http, &server.url(), "k", "m", 0.0);
        assert!(client.ask("rules", "notes").await.is_err());
    }
}
