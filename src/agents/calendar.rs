//! Calendar worker: books events and reports what is on a given day.
//!
//! Time ranges are parsed deterministically first (see [`crate::schedule`]);
//! only when that fails is the inference backend asked to extract the event.
//! Every booking is checked with [`overlaps`] under the store's write lock,
//! so two sessions can never book the same slot.

use crate::agents::{mentions_any, mentions_word, Backends, TaskContext, Worker, WorkerOutput};
use crate::schedule::{
    overlaps, parse_day, parse_event_window, Interval, DEFAULT_EVENT_DURATION_MINUTES,
};
use crate::types::{PromptMessage, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const CALENDAR_ID: &str = "calendar";

const CALENDAR_KEYWORDS: &[&str] = &[
    "schedule", "calendar", "meeting", "appointment", "event", "book", "reserve",
    "available", "busy", "free time", "tomorrow", "today", "next week", "monday",
    "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "reschedule",
];

/// Questions about a day; these win even when the request names a time.
const DAY_QUESTIONS: &[&str] = &[
    "what's on", "what is on", "whats on", "my schedule", "do i have", "am i free", "am i busy",
];

const LIST_WORDS: &[&str] = &["list", "show", "agenda"];

const CREATE_WORDS: &[&str] = &[
    "schedule", "book", "meeting", "appointment", "reserve", "add", "create", "set up", "plan",
];

const EVENT_NOUNS: &[&str] = &[
    "meeting", "call", "appointment", "lunch", "dinner", "breakfast", "standup", "interview",
    "review", "sync", "workshop", "session", "event",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub interval: Interval,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl CalendarEvent {
    fn summary(&self) -> String {
        format!(
            "{} ({}-{} on {})",
            self.title,
            self.interval.start.format("%H:%M"),
            self.interval.end.format("%H:%M"),
            self.interval.start.format("%Y-%m-%d")
        )
    }

    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "start": self.interval.start.format("%Y-%m-%dT%H:%M").to_string(),
            "end": self.interval.end.format("%Y-%m-%dT%H:%M").to_string(),
        })
    }
}

/// Booked events, shared by every session using the calendar worker.
#[derive(Debug, Default)]
pub struct EventStore {
    events: RwLock<Vec<CalendarEvent>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Book `event` unless it overlaps an existing one; on conflict the
    /// overlapping events are returned and nothing is stored.
    pub fn try_book(&self, event: CalendarEvent) -> std::result::Result<(), Vec<CalendarEvent>> {
        let mut events = self.events.write();
        let existing: Vec<Interval> = events.iter().map(|e| e.interval).collect();
        let hits = overlaps(&existing, &event.interval);
        if !hits.is_empty() {
            return Err(events
                .iter()
                .filter(|e| hits.contains(&e.interval))
                .cloned()
                .collect());
        }
        events.push(event);
        Ok(())
    }

    pub fn events_on(&self, day: NaiveDate) -> Vec<CalendarEvent> {
        let mut found: Vec<CalendarEvent> = self
            .events
            .read()
            .iter()
            .filter(|e| e.interval.start.date() == day)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.interval.start);
        found
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct ExtractedEvent {
    title: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
}

/// A short title from the request: quoted text if present, otherwise the
/// first event noun plus an optional "with <name>".
fn title_from_task(task: &str) -> String {
    let quoted: Vec<&str> = task.split('"').collect();
    if quoted.len() >= 3 && !quoted[1].trim().is_empty() {
        return quoted[1].trim().to_string();
    }

    let words: Vec<&str> = task.split_whitespace().collect();
    for (i, word) in words.iter().enumerate() {
        let lowered = word.to_lowercase();
        let lowered = lowered.trim_matches(|c: char| !c.is_alphanumeric());
        if let Some(noun) = EVENT_NOUNS.iter().find(|n| **n == lowered) {
            let mut title = capitalize(noun);
            if words.get(i + 1).is_some_and(|w| w.eq_ignore_ascii_case("with")) {
                if let Some(name) = words.get(i + 2) {
                    let name = name.trim_matches(|c: char| !c.is_alphanumeric());
                    if !name.is_empty() {
                        title.push_str(" with ");
                        title.push_str(name);
                    }
                }
            }
            return title;
        }
    }

    "Event".to_string()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct CalendarWorker {
    backends: Backends,
    events: Arc<EventStore>,
    reference_date: Option<NaiveDate>,
    max_tokens: u32,
}

impl CalendarWorker {
    pub fn new(backends: Backends, events: Arc<EventStore>, max_tokens: u32) -> Self {
        Self {
            backends,
            events,
            reference_date: None,
            max_tokens,
        }
    }

    /// Pin "today" instead of using the local clock.
    pub fn with_reference_date(mut self, today: NaiveDate) -> Self {
        self.reference_date = Some(today);
        self
    }

    pub fn events(&self) -> &Arc<EventStore> {
        &self.events
    }

    fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    async fn extract_with_inference(&self, task: &str, today: NaiveDate) -> Result<Option<(String, Interval)>> {
        let messages = vec![
            PromptMessage::system(format!(
                "Extract the calendar event from the user's request. Today is {} ({}). \
                 Respond with ONLY JSON: {{\"title\": \"...\", \"start\": \"YYYY-MM-DDTHH:MM\", \"end\": \"YYYY-MM-DDTHH:MM\" or null}}. \
                 Use null for start if no time is given.",
                today.format("%Y-%m-%d"),
                today.format("%A")
            )),
            PromptMessage::user(task),
        ];

        let output = self.backends.complete(&messages, self.max_tokens).await?;
        let json = match (output.find('{'), output.rfind('}')) {
            (Some(start), Some(end)) if end > start => &output[start..=end],
            _ => return Ok(None),
        };
        let Ok(extracted) = serde_json::from_str::<ExtractedEvent>(json) else {
            tracing::debug!(raw = %output, "Calendar extraction reply was not valid JSON");
            return Ok(None);
        };

        let Some(start) = extracted.start.as_deref().and_then(parse_datetime) else {
            return Ok(None);
        };
        let end = extracted
            .end
            .as_deref()
            .and_then(parse_datetime)
            .filter(|end| *end > start)
            .unwrap_or(start + Duration::minutes(DEFAULT_EVENT_DURATION_MINUTES));

        let title = extracted
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| title_from_task(task));

        Ok(Interval::new(start, end).map(|interval| (title, interval)))
    }

    async fn create_event(&self, task: &str, context: &TaskContext) -> Result<WorkerOutput> {
        let today = self.today();

        let parsed = match parse_event_window(task, today) {
            Some(interval) => Some((title_from_task(task), interval)),
            None => self.extract_with_inference(task, today).await?,
        };

        let Some((title, interval)) = parsed else {
            return Ok(WorkerOutput::text(
                "When should I schedule it? Please give a day and a time, e.g. \"tomorrow 2-3pm\".",
            )
            .with_metadata("needs_clarification", true)
            .with_action("create_event_incomplete"));
        };

        let event = CalendarEvent {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            interval,
            session_id: context.session_id.clone(),
            created_at: Utc::now(),
        };

        match self.events.try_book(event.clone()) {
            Ok(()) => {
                tracing::info!(session_id = %context.session_id, event = %event.summary(), "Booked event");
                let created = context
                    .local_context
                    .get("events_created")
                    .and_then(Value::as_u64)
                    .unwrap_or(0)
                    + 1;

                Ok(WorkerOutput::text(format!("Scheduled {}.", event.summary()))
                    .with_metadata("conflict", false)
                    .with_metadata("event", event.to_json())
                    .with_context("last_event", event.to_json())
                    .with_local("events_created", created)
                    .with_action("create_event"))
            }
            Err(conflicts) => {
                let listed: Vec<String> = conflicts.iter().map(CalendarEvent::summary).collect();
                tracing::info!(
                    session_id = %context.session_id,
                    conflicts = conflicts.len(),
                    "Requested slot conflicts with existing events"
                );

                Ok(WorkerOutput::text(format!(
                    "That time conflicts with: {}. Please choose a different time.",
                    listed.join(", ")
                ))
                .with_metadata("conflict", true)
                .with_metadata(
                    "conflicts",
                    Value::Array(conflicts.iter().map(CalendarEvent::to_json).collect()),
                )
                .with_metadata("requested", event.to_json())
                .with_action("create_event_conflict"))
            }
        }
    }

    fn list_events(&self, task: &str) -> WorkerOutput {
        let day = parse_day(task, self.today()).unwrap_or_else(|| self.today());
        let events = self.events.events_on(day);

        let text = if events.is_empty() {
            format!("Nothing scheduled on {}.", day.format("%A, %Y-%m-%d"))
        } else {
            let lines: Vec<String> = events
                .iter()
                .map(|e| {
                    format!(
                        "- {}-{} {}",
                        e.interval.start.format("%H:%M"),
                        e.interval.end.format("%H:%M"),
                        e.title
                    )
                })
                .collect();
            format!("On {}:\n{}", day.format("%A, %Y-%m-%d"), lines.join("\n"))
        };

        WorkerOutput::text(text)
            .with_metadata("date", day.format("%Y-%m-%d").to_string())
            .with_metadata(
                "events",
                Value::Array(events.iter().map(CalendarEvent::to_json).collect()),
            )
            .with_action("list_events")
    }
}

#[async_trait]
impl Worker for CalendarWorker {
    fn id(&self) -> &str {
        CALENDAR_ID
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "create calendar events".to_string(),
            "schedule meetings and appointments".to_string(),
            "list events for a day".to_string(),
            "detect scheduling conflicts".to_string(),
        ]
    }

    fn can_handle(&self, task: &str, _context: &TaskContext) -> bool {
        mentions_any(task, CALENDAR_KEYWORDS)
    }

    async fn process(&self, task: &str, context: &TaskContext) -> Result<WorkerOutput> {
        let creates = mentions_word(task, CREATE_WORDS);
        if mentions_word(task, DAY_QUESTIONS) {
            return Ok(self.list_events(task));
        }
        if creates && parse_event_window(task, self.today()).is_some() {
            return self.create_event(task, context).await;
        }
        if mentions_word(task, LIST_WORDS) {
            return Ok(self.list_events(task));
        }
        if creates {
            return self.create_event(task, context).await;
        }

        // Anything else calendar-flavoured: let the model answer with today's date.
        let messages = vec![
            PromptMessage::system(format!(
                "You are a calendar assistant. Today is {}. Answer briefly.",
                self.today().format("%A, %Y-%m-%d")
            )),
            PromptMessage::user(task),
        ];
        let response = self.backends.complete(&messages, self.max_tokens).await?;
        Ok(WorkerOutput::text(response.trim()).with_action("calendar_query"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{backends, ScriptedInference};

    // 2026-03-10 is a Tuesday.
    fn worker(inference: Arc<ScriptedInference>) -> CalendarWorker {
        CalendarWorker::new(backends(inference), Arc::new(EventStore::new()), 300)
            .with_reference_date(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap())
    }

    fn ctx() -> TaskContext {
        TaskContext {
            session_id: "s1".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_books_then_detects_conflict() {
        let inference = ScriptedInference::new(vec![]);
        let worker = worker(inference.clone());

        let first = worker
            .process("Schedule a meeting tomorrow 2-3pm", &ctx())
            .await
            .unwrap();
        assert_eq!(first.metadata["conflict"], json!(false));
        assert_eq!(first.metadata["event"]["start"], json!("2026-03-11T14:00"));
        assert_eq!(first.last_action.as_deref(), Some("create_event"));

        let second = worker
            .process("Schedule another meeting tomorrow 2:30-3:30pm", &ctx())
            .await
            .unwrap();
        assert_eq!(second.metadata["conflict"], json!(true));
        assert_eq!(second.metadata["conflicts"].as_array().unwrap().len(), 1);
        assert_eq!(worker.events().len(), 1);

        // Deterministic parsing never needed the model.
        assert_eq!(inference.calls(), 0);
    }

    #[tokio::test]
    async fn test_touching_slot_is_not_a_conflict() {
        let worker = worker(ScriptedInference::new(vec![]));
        worker.process("Book a call tomorrow 2-3pm", &ctx()).await.unwrap();
        let next = worker.process("Book a call tomorrow 3-4pm", &ctx()).await.unwrap();

        assert_eq!(next.metadata["conflict"], json!(false));
        assert_eq!(worker.events().len(), 2);
    }

    #[tokio::test]
    async fn test_falls_back_to_inference_extraction() {
        let inference = ScriptedInference::new(vec![Ok(
            r#"{"title": "Dentist", "start": "2026-03-12T09:30", "end": null}"#.to_string(),
        )]);
        let worker = worker(inference.clone());

        let out = worker
            .process("Schedule the dentist for thursday morning half past nine", &ctx())
            .await
            .unwrap();

        assert_eq!(inference.calls(), 1);
        assert_eq!(out.metadata["event"]["title"], json!("Dentist"));
        assert_eq!(out.metadata["event"]["end"], json!("2026-03-12T10:30"));
    }

    #[tokio::test]
    async fn test_asks_for_time_when_nothing_parses() {
        let inference = ScriptedInference::new(vec![Ok(r#"{"title": "Lunch", "start": null}"#.to_string())]);
        let worker = worker(inference);

        let out = worker.process("Schedule lunch with Ana", &ctx()).await.unwrap();
        assert_eq!(out.metadata["needs_clarification"], json!(true));
        assert!(worker.events().is_empty());
    }

    #[tokio::test]
    async fn test_lists_events_for_day() {
        let worker = worker(ScriptedInference::new(vec![]));
        worker
            .process("Schedule a meeting with Ana tomorrow 10-11am", &ctx())
            .await
            .unwrap();

        let out = worker.process("What's on tomorrow?", &ctx()).await.unwrap();
        assert_eq!(out.last_action.as_deref(), Some("list_events"));
        assert!(out.response_text.contains("10:00-11:00 Meeting with Ana"));
    }

    #[tokio::test]
    async fn test_booking_updates_contexts() {
        let worker = worker(ScriptedInference::new(vec![]));
        let mut context = ctx();
        context.local_context.insert("events_created".into(), json!(2));

        let out = worker
            .process("Book an interview friday 4pm", &context)
            .await
            .unwrap();
        assert_eq!(out.local_updates["events_created"], json!(3));
        assert_eq!(out.context_updates["last_event"]["title"], json!("Interview"));
    }

    #[tokio::test]
    async fn test_words_inside_other_words_do_not_list() {
        let worker = worker(ScriptedInference::new(vec![]));

        let out = worker
            .process("Schedule a meeting to review the shortlist tomorrow 2-3pm", &ctx())
            .await
            .unwrap();
        assert_eq!(out.last_action.as_deref(), Some("create_event"));

        let out = worker
            .process("Book a showcase rehearsal friday 3pm", &ctx())
            .await
            .unwrap();
        assert_eq!(out.last_action.as_deref(), Some("create_event"));
        assert_eq!(worker.events().len(), 2);
    }

    #[tokio::test]
    async fn test_show_without_create_word_lists() {
        let worker = worker(ScriptedInference::new(vec![]));
        let out = worker.process("Show tomorrow", &ctx()).await.unwrap();
        assert_eq!(out.last_action.as_deref(), Some("list_events"));
        assert!(worker.events().is_empty());
    }

    #[test]
    fn test_can_handle_keywords() {
        let worker = worker(ScriptedInference::new(vec![]));
        assert!(worker.can_handle("Schedule a meeting", &ctx()));
        assert!(worker.can_handle("am I busy on Friday?", &ctx()));
        assert!(!worker.can_handle("write a python function", &ctx()));
    }

    #[test]
    fn test_title_from_task() {
        assert_eq!(title_from_task("Schedule a meeting tomorrow 2-3pm"), "Meeting");
        assert_eq!(title_from_task("book a call with Bob at 3pm"), "Call with Bob");
        assert_eq!(title_from_task("add \"Quarterly review\" friday 9-10am"), "Quarterly review");
        assert_eq!(title_from_task("block tomorrow 9-10am"), "Event");
    }
}
