use ratatui::style::{Color, Modifier, Style};

// Centralized panel colors. Callers ask for styles, never raw colors, so a
// palette change stays in this file.

pub fn panel_bg() -> Color {
    Color::Black
}

pub fn panel_fg() -> Color {
    Color::White
}

pub fn border() -> Style {
    Style::default().fg(Color::DarkGray).bg(panel_bg())
}

pub fn border_focused() -> Style {
    Style::default().fg(Color::Cyan).bg(panel_bg())
}

pub fn header(focused: bool) -> Style {
    let bg = if focused { Color::Blue } else { Color::DarkGray };
    Style::default()
        .bg(bg)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

pub fn header_button() -> Style {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
}

pub fn body() -> Style {
    Style::default().fg(panel_fg()).bg(panel_bg())
}

pub fn backdrop() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

/// Footer button style. `color` is an optional ratatui color name or hex
/// value supplied by the action.
pub fn footer_button(color: Option<&str>, disabled: bool, loading: bool) -> Style {
    if disabled {
        return Style::default().fg(Color::DarkGray).bg(Color::Black);
    }
    let bg = color
        .and_then(|name| name.parse::<Color>().ok())
        .unwrap_or(Color::Gray);
    let style = Style::default().bg(bg).fg(Color::Black);
    if loading {
        style.add_modifier(Modifier::SLOW_BLINK)
    } else {
        style
    }
}

pub fn tab(standalone: bool) -> Style {
    if standalone {
        Style::default().bg(Color::Magenta).fg(Color::Black)
    } else {
        Style::default().bg(Color::DarkGray).fg(Color::White)
    }
}

pub fn status_bar() -> Style {
    Style::default().bg(Color::DarkGray).fg(Color::White)
}
