use std::fmt;

/// Lifecycle state of a single panel.
///
/// ```text
/// opening ──► open ──► closing ──► closed
///    │  ▲       │         ▲
///    │  └─ minimized ─────┘
///    └──────────┴─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelState {
    Opening,
    Open,
    Closing,
    Minimized,
    Closed,
}

impl PanelState {
    /// States reachable in one step from `self`.
    pub fn allowed_transitions(self) -> &'static [PanelState] {
        use PanelState::*;
        match self {
            Opening => &[Open, Closing, Minimized],
            Open => &[Closing, Minimized],
            Closing => &[Closed],
            Minimized => &[Open, Closing],
            Closed => &[],
        }
    }

    pub fn can_transition_to(self, next: PanelState) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self == PanelState::Closed
    }

    /// Whether the panel currently occupies the screen (interactive or sliding in).
    pub fn is_visible(self) -> bool {
        matches!(self, PanelState::Opening | PanelState::Open)
    }

    /// Whether `close()` still has work to do from this state.
    pub fn is_closable(self) -> bool {
        !matches!(self, PanelState::Closing | PanelState::Closed)
    }
}

impl fmt::Display for PanelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PanelState::Opening => "opening",
            PanelState::Open => "open",
            PanelState::Closing => "closing",
            PanelState::Minimized => "minimized",
            PanelState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// True when every consecutive pair in `history` is an allowed transition and
/// the walk starts at `opening`.
pub fn is_valid_history(history: &[PanelState]) -> bool {
    match history.first() {
        None => true,
        Some(first) if *first != PanelState::Opening => false,
        Some(_) => history
            .windows(2)
            .all(|pair| pair[0].can_transition_to(pair[1])),
    }
}
