//! Terminal graphics protocol selection.

use std::env;

use ratatui_image::picker::ProtocolType;

/// Supported image rendering protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageProtocol {
    /// Kitty graphics protocol (best quality)
    Kitty,
    /// Sixel graphics (wide support)
    Sixel,
    /// iTerm2 inline images
    ITerm2,
    /// Unicode half-blocks (universal fallback)
    Halfblock,
}

impl std::fmt::Display for ImageProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kitty => write!(f, "Kitty"),
            Self::Sixel => write!(f, "Sixel"),
            Self::ITerm2 => write!(f, "iTerm2"),
            Self::Halfblock => write!(f, "Halfblock"),
        }
    }
}

impl From<ImageProtocol> for ProtocolType {
    fn from(protocol: ImageProtocol) -> Self {
        match protocol {
            ImageProtocol::Kitty => Self::Kitty,
            ImageProtocol::Sixel => Self::Sixel,
            ImageProtocol::ITerm2 => Self::Iterm2,
            ImageProtocol::Halfblock => Self::Halfblocks,
        }
    }
}

/// Graphics capabilities reported by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerminalCaps {
    pub kitty: bool,
    pub sixel: bool,
    pub iterm2: bool,
}

/// Pick the best protocol the terminal supports.
///
/// Priority: Kitty, then Sixel, then iTerm2, then half-blocks.
pub const fn protocol_for(caps: TerminalCaps) -> ImageProtocol {
    if caps.kitty {
        ImageProtocol::Kitty
    } else if caps.sixel {
        ImageProtocol::Sixel
    } else if caps.iterm2 {
        ImageProtocol::ITerm2
    } else {
        ImageProtocol::Halfblock
    }
}

/// Capabilities implied by the protocol the ratatui-image probe settled on.
pub const fn caps_from_probe(protocol: ProtocolType) -> TerminalCaps {
    TerminalCaps {
        kitty: matches!(protocol, ProtocolType::Kitty),
        sixel: matches!(protocol, ProtocolType::Sixel),
        iterm2: matches!(protocol, ProtocolType::Iterm2),
    }
}

/// Guess capabilities from environment variables when probing is unavailable.
pub fn caps_from_env() -> TerminalCaps {
    caps_from_vars(
        env::var("KITTY_WINDOW_ID").ok().as_deref(),
        env::var("TERM_PROGRAM").ok().as_deref(),
        env::var("TERM").ok().as_deref(),
    )
}

fn caps_from_vars(
    kitty_window: Option<&str>,
    term_program: Option<&str>,
    term: Option<&str>,
) -> TerminalCaps {
    let term = term.unwrap_or_default();
    TerminalCaps {
        kitty: kitty_window.is_some() || term.contains("kitty") || term.contains("ghostty"),
        sixel: term.contains("sixel") || term.contains("foot"),
        iterm2: matches!(term_program, Some("iTerm.app" | "WezTerm")),
    }
}

/// Detect the best available image protocol from the environment.
pub fn detect_protocol() -> ImageProtocol {
    protocol_for(caps_from_env())
}
