use ratatui::prelude::*;
use ratatui::widgets::{Block, BorderType};

pub struct Theme;

impl Theme {
    // ── Text hierarchy ───────────────────────────────────────────────
    pub const TEXT_PRIMARY: Color = Color::White;
    pub const TEXT_SECONDARY: Color = Color::Rgb(140, 145, 160);
    pub const TEXT_MUTED: Color = Color::Rgb(80, 85, 100);
    pub const TEXT_CONTENT: Color = Color::Rgb(170, 175, 190);

    // ── Border ───────────────────────────────────────────────────────
    pub const BORDER_NORMAL: Color = Color::Rgb(60, 65, 80);
    pub const BORDER_ACCENT: Color = Color::Rgb(100, 180, 240);

    // ── Accent ───────────────────────────────────────────────────────
    pub const ACCENT_BLUE: Color = Color::Rgb(100, 180, 240);
    pub const ACCENT_GREEN: Color = Color::Rgb(80, 200, 120);
    pub const ACCENT_RED: Color = Color::Rgb(220, 80, 80);
    pub const ACCENT_YELLOW: Color = Color::Rgb(220, 180, 60);
    pub const ACCENT_PURPLE: Color = Color::Rgb(180, 140, 220);
    pub const ACCENT_ORANGE: Color = Color::Rgb(217, 119, 80);

    // ── Rewriter highlights ──────────────────────────────────────────
    pub const FILTER_BG: Color = Color::Rgb(50, 65, 95);
    pub const FILTER_SELECTED_BG: Color = Color::Rgb(80, 110, 170);

    // ── Block helpers ────────────────────────────────────────────────

    pub fn block() -> Block<'static> {
        Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(Style::new().fg(Self::BORDER_NORMAL))
    }

    pub fn block_accent() -> Block<'static> {
        Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(Style::new().fg(Self::BORDER_ACCENT))
    }
}

/// Badge color for a run status string.
pub fn status_color(status: &str) -> Color {
    match status {
        "running" => Theme::ACCENT_BLUE,
        "completed" => Theme::ACCENT_GREEN,
        "failed" => Theme::ACCENT_RED,
        _ => Theme::TEXT_SECONDARY,
    }
}

/// Badge color for an action label.
pub fn action_color(label: &str) -> Color {
    match label {
        "Navigate" => Theme::ACCENT_BLUE,
        "Input Text" => Theme::ACCENT_YELLOW,
        "Click" => Theme::ACCENT_PURPLE,
        "Copy to Clipboard" => Theme::ACCENT_ORANGE,
        "Complete" => Theme::ACCENT_GREEN,
        _ => Theme::TEXT_SECONDARY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_color_maps_known_and_unknown() {
        assert_eq!(status_color("running"), Theme::ACCENT_BLUE);
        assert_eq!(status_color("failed"), Theme::ACCENT_RED);
        assert_eq!(status_color("paused"), Theme::TEXT_SECONDARY);
    }
}
