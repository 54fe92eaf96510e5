use std::fmt::{self, Write as _};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::flows::ConversationState;
use crate::ordering::pricing::format_money;

pub const SESSION_STARTED_MESSAGE: &str = "Voice ordering session started";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Speaker {
    System,
    Customer,
    Agent,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::Customer => "CUSTOMER",
            Self::Agent => "AGENT",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Seconds since the session started.
    pub offset_secs: f64,
    pub speaker: Speaker,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.2}s] {}: {}", self.offset_secs, self.speaker, self.message)
    }
}

/// Ordered, append-only record of one conversation. Every entry is also
/// emitted as a structured log line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    session_id: String,
    started_at: DateTime<Utc>,
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn start(session_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        let mut transcript =
            Self { session_id: session_id.into(), started_at, entries: Vec::new() };
        transcript.record_at(Speaker::System, SESSION_STARTED_MESSAGE, started_at);
        transcript
    }

    pub fn record(&mut self, speaker: Speaker, message: impl Into<String>) {
        self.record_at(speaker, message, Utc::now());
    }

    pub fn record_at(
        &mut self,
        speaker: Speaker,
        message: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) {
        let message = message.into();
        let offset_secs = elapsed_secs(self.started_at, recorded_at);
        info!(
            event_name = "session.transcript.entry",
            session_id = %self.session_id,
            speaker = speaker.as_str(),
            offset_secs,
            "TRANSCRIPT [{speaker}] {message}"
        );
        self.entries.push(TranscriptEntry { offset_secs, speaker, message, recorded_at });
    }

    pub fn record_state_change(&mut self, from: ConversationState, to: ConversationState) {
        self.record(Speaker::System, format!("State changed: {from} -> {to}"));
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSummary<'a> {
    pub duration_secs: f64,
    pub line_count: usize,
    pub subtotal: Decimal,
    pub final_state: ConversationState,
    pub entries: &'a [TranscriptEntry],
}

impl<'a> SessionSummary<'a> {
    pub fn new(
        transcript: &'a Transcript,
        line_count: usize,
        subtotal: Decimal,
        final_state: ConversationState,
        ended_at: DateTime<Utc>,
    ) -> Self {
        let duration_secs = elapsed_secs(transcript.started_at, ended_at);
        Self {
            duration_secs,
            line_count,
            subtotal,
            final_state,
            entries: transcript.entries(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== CONVERSATION SUMMARY ===");
        let _ = writeln!(out, "Duration: {:.2} seconds", self.duration_secs);
        let _ = writeln!(out, "Cart Items: {}", self.line_count);
        let _ = writeln!(out, "Subtotal: {}", format_money(self.subtotal));
        let _ = writeln!(out, "Final State: {}", self.final_state);
        let _ = writeln!(out);
        let _ = writeln!(out, "=== FULL TRANSCRIPT ===");
        for entry in self.entries {
            let _ = writeln!(out, "{entry}");
        }
        let _ = writeln!(out);
        let _ = write!(out, "=== END TRANSCRIPT ===");
        out
    }
}

fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds().max(0) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use crate::flows::ConversationState;

    use super::{SessionSummary, Speaker, Transcript, SESSION_STARTED_MESSAGE};

    #[test]
    fn transcript_opens_with_session_started_entry() {
        let transcript = Transcript::start("sess-1", Utc::now());

        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.entries()[0].speaker, Speaker::System);
        assert_eq!(transcript.entries()[0].message, SESSION_STARTED_MESSAGE);
        assert_eq!(transcript.entries()[0].offset_secs, 0.0);
    }

    #[test]
    fn entries_keep_offsets_and_render_in_order() {
        let started = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid time");
        let mut transcript = Transcript::start("sess-2", started);
        let heard_at = started + Duration::milliseconds(1500);
        transcript.record_at(Speaker::Customer, "one croissant", heard_at);
        let replied_at = started + Duration::seconds(2);
        transcript.record_at(Speaker::Agent, "Added 1 Sunrise Croissant", replied_at);

        let lines: Vec<String> = transcript.entries().iter().map(ToString::to_string).collect();
        assert_eq!(lines[1], "[1.50s] CUSTOMER: one croissant");
        assert_eq!(lines[2], "[2.00s] AGENT: Added 1 Sunrise Croissant");
    }

    #[test]
    fn state_changes_are_recorded_as_system_lines() {
        let mut transcript = Transcript::start("sess-3", Utc::now());
        transcript.record_state_change(ConversationState::Greeting, ConversationState::AddingItems);

        let last = transcript.entries().last().expect("entry");
        assert_eq!(last.speaker, Speaker::System);
        assert_eq!(last.message, "State changed: greeting -> adding_items");
    }

    #[test]
    fn summary_lists_totals_and_every_entry() {
        let started = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid time");
        let transcript = Transcript::start("sess-4", started);
        let summary = SessionSummary::new(
            &transcript,
            2,
            Decimal::new(2500, 2),
            ConversationState::OrderCompleted,
            started + Duration::seconds(42),
        );

        let rendered = summary.render();
        assert!(rendered.contains("Duration: 42.00 seconds"));
        assert!(rendered.contains("Cart Items: 2"));
        assert!(rendered.contains("Subtotal: $25.00"));
        assert!(rendered.contains("Final State: order_completed"));
        assert!(rendered.contains("[0.00s] SYSTEM: Voice ordering session started"));
        assert!(rendered.ends_with("=== END TRANSCRIPT ==="));
    }
}
