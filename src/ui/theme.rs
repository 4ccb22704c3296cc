//! Theme system for the viewer
//!
//! Two palettes, picked by the `theme` config key:
//! - Dark: light text on a dark terminal background
//! - Light: dark text on a light terminal background

use ratatui::style::{Color, Modifier, Style};

/// Theme style preference
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum ThemeStyle {
    #[default]
    Dark,
    Light,
}

impl ThemeStyle {
    /// Create from config string representation. Unknown names fall back to dark.
    pub fn from_config_str(s: &str) -> Self {
        match s {
            "light" => Self::Light,
            _ => Self::Dark,
        }
    }

    pub fn colors(&self) -> ThemeColors {
        match self {
            Self::Dark => DARK,
            Self::Light => LIGHT,
        }
    }
}

/// Theme color palette
#[derive(Clone, Copy, Debug)]
pub struct ThemeColors {
    // === Text ===
    /// Body text
    pub text: Color,
    /// Secondary text (tool input, reasoning, system details)
    pub muted: Color,
    /// Tool names and the tool badge
    pub accent: Color,
    /// Run summaries and the follow indicator
    pub success: Color,
    /// Error messages in the status bar
    pub error: Color,

    // === Surfaces ===
    /// Status bar background
    pub subtle: Color,
    /// Text drawn on a solid badge
    pub on_badge: Color,
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

const DARK: ThemeColors = ThemeColors {
    text: rgb(0xdddddd),
    muted: rgb(0x626262),
    accent: rgb(0x7571f9),
    success: rgb(0x04b575),
    error: rgb(0xff5f87),
    subtle: rgb(0x383838),
    on_badge: rgb(0x000000),
};

const LIGHT: ThemeColors = ThemeColors {
    text: rgb(0x1a1a1a),
    muted: rgb(0x9b9b9b),
    accent: rgb(0x7571f9),
    success: rgb(0x04b575),
    error: rgb(0xff5f87),
    subtle: rgb(0xd9dccf),
    on_badge: rgb(0xffffff),
};

impl ThemeColors {
    fn badge(bg: Color, fg: Color) -> Style {
        Style::default()
            .bg(bg)
            .fg(fg)
            .add_modifier(Modifier::BOLD)
    }

    pub fn badge_system(&self) -> Style {
        Self::badge(self.muted, self.on_badge)
    }

    pub fn badge_user(&self) -> Style {
        Self::badge(self.text, self.on_badge)
    }

    pub fn badge_text(&self) -> Style {
        Self::badge(Color::White, Color::Black)
    }

    pub fn badge_tool(&self) -> Style {
        Self::badge(self.accent, Color::White)
    }

    pub fn badge_thinking(&self) -> Style {
        Self::badge(self.subtle, self.muted)
    }

    pub fn badge_result(&self) -> Style {
        Self::badge(self.muted, self.text)
    }

    pub fn badge_done(&self) -> Style {
        Self::badge(self.success, self.on_badge)
    }

    pub fn badge_other(&self) -> Style {
        Self::badge(self.subtle, self.text)
    }

    pub fn body(&self) -> Style {
        Style::default().fg(self.text)
    }

    pub fn secondary(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn reasoning(&self) -> Style {
        self.secondary().add_modifier(Modifier::ITALIC)
    }

    pub fn tool_name(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn summary(&self) -> Style {
        Style::default().fg(self.success)
    }

    pub fn error(&self) -> Style {
        Style::default().fg(self.error)
    }

    pub fn status_bar(&self) -> Style {
        Style::default().bg(self.subtle).fg(self.text)
    }

    pub fn follow_on(&self) -> Style {
        Style::default()
            .fg(self.success)
            .add_modifier(Modifier::BOLD)
    }
}
