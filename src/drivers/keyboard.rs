use crossterm::event::{Event, KeyCode, KeyEventKind, KeyModifiers};

/// Cleans up raw key events before they reach panels.
///
/// Releases are dropped everywhere. Esc is delivered once per physical
/// press: auto-repeat would otherwise close one panel per repeat and empty
/// the whole stack while the key is held.
#[derive(Debug, Default)]
pub struct KeyboardNormalizer {
    esc_down: bool,
    /// Set once a release arrives; only then can a held key be told apart
    /// from repeated presses.
    reports_release: bool,
}

impl KeyboardNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&mut self, evt: Event) -> Option<Event> {
        let Event::Key(mut key) = evt else {
            return Some(evt);
        };
        if key.code == KeyCode::Tab && key.modifiers.contains(KeyModifiers::SHIFT) {
            key.code = KeyCode::BackTab;
            key.modifiers.remove(KeyModifiers::SHIFT);
        }
        match key.kind {
            KeyEventKind::Release => {
                self.reports_release = true;
                if key.code == KeyCode::Esc {
                    self.esc_down = false;
                }
                None
            }
            KeyEventKind::Repeat if key.code == KeyCode::Esc => None,
            _ if key.code == KeyCode::Esc => {
                if self.esc_down && self.reports_release {
                    return None;
                }
                self.esc_down = true;
                Some(Event::Key(key))
            }
            _ => {
                self.esc_down = false;
                Some(Event::Key(key))
            }
        }
    }
}
