use std::collections::HashMap;
use std::fmt;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Shell-level actions of the demo application. Keys are offered to the
/// topmost panel first; only keys it ignores reach these bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Quit,
    OpenSettings,
    OpenHelp,
    OpenNotes,
    OpenLog,
    MinimizeTop,
    RestoreAll,
    CloseAll,
    Navigate,
    ToggleAllowMultiple,
    ScrollUp,
    ScrollDown,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Quit => "Quit",
            Action::OpenSettings => "Settings (right)",
            Action::OpenHelp => "Help (left)",
            Action::OpenNotes => "Notes (bottom)",
            Action::OpenLog => "Log (top)",
            Action::MinimizeTop => "Minimize top panel",
            Action::RestoreAll => "Restore minimized",
            Action::CloseAll => "Close all",
            Action::Navigate => "Change route",
            Action::ToggleAllowMultiple => "Toggle stacking",
            Action::ScrollUp => "Scroll up",
            Action::ScrollDown => "Scroll down",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

impl KeyCombo {
    pub fn new(code: KeyCode, mods: KeyModifiers) -> Self {
        Self { code, mods }
    }

    pub fn plain(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    pub fn matches(&self, key: &KeyEvent) -> bool {
        key.code == self.code && key.modifiers == self.mods
    }

    pub fn display(&self) -> String {
        let mut parts = Vec::new();
        if self.mods.contains(KeyModifiers::CONTROL) {
            parts.push("Ctrl".to_string());
        }
        if self.mods.contains(KeyModifiers::ALT) {
            parts.push("Alt".to_string());
        }
        let code = match self.code {
            KeyCode::Char(c) if self.mods.is_empty() => c.to_string(),
            KeyCode::Char(c) => c.to_ascii_uppercase().to_string(),
            KeyCode::Up => "Up".to_string(),
            KeyCode::Down => "Down".to_string(),
            KeyCode::Esc => "Esc".to_string(),
            KeyCode::F(n) => format!("F{}", n),
            other => format!("{:?}", other),
        };
        parts.push(code);
        parts.join("+")
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyBindings {
    map: HashMap<Action, Vec<KeyCombo>>,
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        use Action::*;
        let mut kb = Self::new();
        kb.add(Quit, KeyCombo::new(KeyCode::Char('q'), KeyModifiers::CONTROL));
        kb.add(Quit, KeyCombo::plain('q'));
        kb.add(OpenSettings, KeyCombo::plain('1'));
        kb.add(OpenHelp, KeyCombo::plain('2'));
        kb.add(OpenNotes, KeyCombo::plain('3'));
        kb.add(OpenLog, KeyCombo::plain('4'));
        kb.add(MinimizeTop, KeyCombo::plain('m'));
        kb.add(RestoreAll, KeyCombo::plain('r'));
        kb.add(CloseAll, KeyCombo::plain('c'));
        kb.add(Navigate, KeyCombo::plain('g'));
        kb.add(ToggleAllowMultiple, KeyCombo::plain('a'));
        kb.add(ScrollUp, KeyCombo::new(KeyCode::Up, KeyModifiers::NONE));
        kb.add(ScrollDown, KeyCombo::new(KeyCode::Down, KeyModifiers::NONE));
        kb
    }

    pub fn add(&mut self, action: Action, combo: KeyCombo) {
        self.map.entry(action).or_default().push(combo);
    }

    pub fn matches(&self, action: Action, key: &KeyEvent) -> bool {
        self.map
            .get(&action)
            .is_some_and(|list| list.iter().any(|c| c.matches(key)))
    }

    pub fn action_for_key(&self, key: &KeyEvent) -> Option<Action> {
        self.map
            .iter()
            .find(|(_, list)| list.iter().any(|c| c.matches(key)))
            .map(|(action, _)| *action)
    }

    pub fn combos_for(&self, action: Action) -> Vec<String> {
        self.map
            .get(&action)
            .map(|list| list.iter().map(|c| c.display()).collect())
            .unwrap_or_default()
    }

    /// `key: action` pairs in a stable order, for the status line.
    pub fn help_entries(&self) -> Vec<(Action, String)> {
        let mut entries: Vec<(Action, String)> = self
            .map
            .iter()
            .filter_map(|(action, list)| list.last().map(|c| (*action, c.display())))
            .collect();
        entries.sort_by_key(|(action, _)| *action);
        entries
    }
}
