use ratatui::style::Color;

pub const THEME_NAMES: [&str; 5] = ["dracula", "github-dark", "nord", "solarized", "monokai"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub name: &'static str,
    pub output_fg: Color,
    pub answer_fg: Color,
    pub success_fg: Color,
    pub error_fg: Color,
    pub question_fg: Color,
    pub panel_bg: Color,
    pub muted_fg: Color,
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

const PALETTES: [Theme; 5] = [
    Theme {
        name: "dracula",
        output_fg: rgb(0xf8f8f2),
        answer_fg: rgb(0x8be9fd),
        success_fg: rgb(0x50fa7b),
        error_fg: rgb(0xff5555),
        question_fg: rgb(0xbd93f9),
        panel_bg: rgb(0x44475a),
        muted_fg: rgb(0x6272a4),
    },
    Theme {
        name: "github-dark",
        output_fg: rgb(0xc9d1d9),
        answer_fg: rgb(0x58a6ff),
        success_fg: rgb(0x3fb950),
        error_fg: rgb(0xf85149),
        question_fg: rgb(0x58a6ff),
        panel_bg: rgb(0x21262d),
        muted_fg: rgb(0x8b949e),
    },
    Theme {
        name: "nord",
        output_fg: rgb(0xd8dee9),
        answer_fg: rgb(0x88c0d0),
        success_fg: rgb(0xa3be8c),
        error_fg: rgb(0xbf616a),
        question_fg: rgb(0x81a1c1),
        panel_bg: rgb(0x3b4252),
        muted_fg: rgb(0x4c566a),
    },
    Theme {
        name: "solarized",
        output_fg: rgb(0x839496),
        answer_fg: rgb(0x268bd2),
        success_fg: rgb(0x859900),
        error_fg: rgb(0xdc322f),
        question_fg: rgb(0x2aa198),
        panel_bg: rgb(0x073642),
        muted_fg: rgb(0x586e75),
    },
    Theme {
        name: "monokai",
        output_fg: rgb(0xf8f8f2),
        answer_fg: rgb(0x66d9e8),
        success_fg: rgb(0xa6e22e),
        error_fg: rgb(0xf92672),
        question_fg: rgb(0xe6db74),
        panel_bg: rgb(0x3e3d32),
        muted_fg: rgb(0x75715e),
    },
];

impl Default for Theme {
    fn default() -> Self {
        PALETTES[0]
    }
}

impl Theme {
    pub fn by_index(index: usize) -> Self {
        PALETTES[index % PALETTES.len()]
    }

    pub fn named(name: &str) -> Option<Self> {
        Self::index_of(name).map(Self::by_index)
    }

    pub fn index_of(name: &str) -> Option<usize> {
        let wanted = name.trim();
        THEME_NAMES
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(wanted))
    }

    pub fn initial_index(configured: &str) -> usize {
        match Self::index_of(configured) {
            Some(index) => index,
            None => {
                tracing::warn!(theme = configured, "unknown theme, using {}", THEME_NAMES[0]);
                0
            }
        }
    }

    pub fn next_index(index: usize) -> usize {
        (index + 1) % PALETTES.len()
    }
}
