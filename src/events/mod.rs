//! Event vocabulary shared by hosts, the coordinator, and engines.

use crossterm::event::{Event as CrosstermEvent, KeyEvent};

use crate::host::ComponentId;

/// High-level events delivered to the coordinator by the windowing layer.
#[derive(Debug, Clone)]
pub enum InputEvent {
    FocusGained(ComponentId),
    FocusLost {
        component: ComponentId,
        temporary: bool,
    },
    Key(KeyEvent),
    Paste(String),
    Raw(CrosstermEvent),
}

impl InputEvent {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::FocusGained(_) => "focus_gained",
            Self::FocusLost { .. } => "focus_lost",
            Self::Key(_) => "key",
            Self::Paste(_) => "paste",
            Self::Raw(_) => "raw",
        }
    }
}

/// Control the propagation of an event past the active engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFlow {
    Continue,
    Consumed,
}

/// Where provisional text is rendered while composition is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputStyle {
    /// The client renders composition inline when it can.
    #[default]
    OnTheSpot,
    /// Composition always renders in the auxiliary surface under the client.
    BelowTheSpot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImeEventKind {
    TextChanged,
    CaretPositionChanged,
}

/// A composition emission from an engine: the full composition text with a
/// committed prefix length (in chars) plus caret hints.
#[derive(Debug, Clone)]
pub struct CompositionUpdate {
    pub kind: ImeEventKind,
    pub text: String,
    pub committed: usize,
    pub caret: Option<usize>,
    pub visible_position: Option<usize>,
}

impl CompositionUpdate {
    /// A fully committed run of text.
    pub fn commit(text: impl Into<String>) -> Self {
        let text = text.into();
        let committed = text.chars().count();
        Self {
            kind: ImeEventKind::TextChanged,
            text,
            committed,
            caret: None,
            visible_position: None,
        }
    }

    /// An entirely provisional run of text.
    pub fn preedit(text: impl Into<String>, caret: Option<usize>) -> Self {
        Self {
            kind: ImeEventKind::TextChanged,
            text: text.into(),
            committed: 0,
            caret,
            visible_position: None,
        }
    }

    /// A run with a committed prefix and a provisional remainder.
    pub fn partial(text: impl Into<String>, committed: usize, caret: Option<usize>) -> Self {
        Self {
            kind: ImeEventKind::TextChanged,
            text: text.into(),
            committed,
            caret,
            visible_position: None,
        }
    }

    pub fn with_visible_position(mut self, position: usize) -> Self {
        self.visible_position = Some(position);
        self
    }

    pub fn is_fully_committed(&self) -> bool {
        self.committed >= self.text.chars().count()
    }

    fn split_index(&self) -> usize {
        self.text
            .char_indices()
            .nth(self.committed)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    pub fn committed_prefix(&self) -> &str {
        &self.text[..self.split_index()]
    }

    pub fn uncommitted_suffix(&self) -> &str {
        &self.text[self.split_index()..]
    }
}
