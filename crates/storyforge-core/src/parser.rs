//! Story parser: model output → [`GeneratedStory`] records.
//!
//! A small line-oriented state machine. Each line is trimmed and
//! classified, then applied to the open record:
//!
//! ```text
//!            Title                 Criteria
//!   Idle ──────────▶ InStory ─────────────▶ InCriteria
//!                     ▲  │ Title (flush)        │
//!                     └──┴──────────────────────┘
//! ```
//!
//! - `Title` flushes any open record and opens a new one.
//! - `User Story` / `Priority` set fields on the open record.
//! - `Acceptance Criteria` opens (or resets) the criteria list.
//! - Bullets append to the criteria list only in `InCriteria`. A bullet
//!   whose text is itself a field line (`* **Priority**: High`) counts as
//!   that field.
//! - Everything else, including lines seen in `Idle`, is ignored.
//!
//! Parsing never fails. Blocks without a title are dropped and missing
//! fields stay empty.

use tracing::debug;

use crate::models::{GeneratedStory, Priority};
use crate::prompt::{EPIC_MARKER, ESTIMATION_MARKER};

pub const TITLE_MARKER: &str = "**Title**:";
pub const NARRATIVE_MARKER: &str = "**User Story**:";
pub const CRITERIA_MARKER: &str = "**Acceptance Criteria**:";
pub const PRIORITY_MARKER: &str = "**Priority**:";

const BULLET_MARKERS: [&str; 3] = ["•", "- ", "* "];

/// Where the parser is within the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// No record open; field lines are ignored.
    Idle,
    /// A record is open and no criteria list has been started.
    InStory,
    /// A record is open and bullets append to its criteria list.
    InCriteria,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line<'a> {
    Title(&'a str),
    Narrative(&'a str),
    Criteria,
    Priority(&'a str),
    Bullet(&'a str),
    Other,
}

fn classify(line: &str) -> Line<'_> {
    if let Some(field) = classify_field(line) {
        return field;
    }
    for bullet in BULLET_MARKERS {
        if let Some(rest) = line.strip_prefix(bullet) {
            let rest = rest.trim();
            // "* **Priority**: High" is still the priority line.
            return classify_field(rest).unwrap_or(Line::Bullet(rest));
        }
    }
    Line::Other
}

fn classify_field(line: &str) -> Option<Line<'_>> {
    if let Some(rest) = line.strip_prefix(TITLE_MARKER) {
        return Some(Line::Title(rest.trim()));
    }
    if let Some(rest) = line.strip_prefix(NARRATIVE_MARKER) {
        return Some(Line::Narrative(rest.trim()));
    }
    if line.starts_with(CRITERIA_MARKER) {
        return Some(Line::Criteria);
    }
    if let Some(rest) = line.strip_prefix(PRIORITY_MARKER) {
        return Some(Line::Priority(rest.trim()));
    }
    if line.starts_with(EPIC_MARKER) || line.starts_with(ESTIMATION_MARKER) {
        return Some(Line::Other);
    }
    None
}

#[derive(Debug)]
struct Draft {
    title: String,
    narrative: Option<String>,
    criteria: Vec<String>,
    priority: Option<Priority>,
}

/// Incremental parser; feed lines, then [`finish`](StoryParser::finish).
#[derive(Debug)]
pub struct StoryParser {
    project_id: String,
    state: ParserState,
    draft: Option<Draft>,
    stories: Vec<GeneratedStory>,
}

impl StoryParser {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            state: ParserState::Idle,
            draft: None,
            stories: Vec::new(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Apply one line of model output.
    pub fn feed_line(&mut self, raw: &str) {
        let line = classify(raw.trim());

        if let Line::Title(title) = line {
            self.flush();
            self.draft = Some(Draft {
                title: title.to_string(),
                narrative: None,
                criteria: Vec::new(),
                priority: None,
            });
            self.state = ParserState::InStory;
            return;
        }

        let draft = match self.draft.as_mut() {
            Some(d) => d,
            None => return,
        };

        match line {
            Line::Narrative(text) => draft.narrative = Some(text.to_string()),
            Line::Criteria => {
                draft.criteria.clear();
                self.state = ParserState::InCriteria;
            }
            Line::Bullet(item) if self.state == ParserState::InCriteria => {
                if !item.is_empty() {
                    draft.criteria.push(item.to_string());
                }
            }
            Line::Priority(label) => {
                let label = label.to_lowercase();
                draft.priority = Priority::from_label(&label);
                if draft.priority.is_none() {
                    debug!(%label, title = %draft.title, "unrecognised priority label");
                }
            }
            _ => {}
        }
    }

    /// Flush the open record and return every story in title order.
    pub fn finish(mut self) -> Vec<GeneratedStory> {
        self.flush();
        self.stories
    }

    fn flush(&mut self) {
        if let Some(draft) = self.draft.take() {
            self.stories.push(GeneratedStory {
                project_id: self.project_id.clone(),
                title: draft.title,
                narrative: draft.narrative,
                acceptance_criteria: draft.criteria,
                priority: draft.priority,
            });
        }
        self.state = ParserState::Idle;
    }
}

/// Parse a full model response into stories owned by `project_id`.
pub fn parse_stories(text: &str, project_id: &str) -> Vec<GeneratedStory> {
    let mut parser = StoryParser::new(project_id);
    for line in text.lines() {
        parser.feed_line(line);
    }
    parser.finish()
}
