use std::fmt;
use std::str::FromStr;


const CLASSIC: &'static str = "hud-classic.png";
const MINIMAL: &'static str = "hud-minimal.png";
const LEGACY_PNG: &'static str = "hud.png";
const LEGACY_JPEG: &'static str = "hud.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayStyle {
    Classic,
    Minimal,
}

impl Default for OverlayStyle {

    fn default() -> Self {
        Self::Classic
    }
}

impl OverlayStyle {

    pub const ALL: [OverlayStyle; 2] = [Self::Classic, Self::Minimal];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Minimal => "minimal",
        }
    }

    /// Asset names to try, most preferred first: own style, the other style,
    /// then the full-size legacy PNG and JPEG.
    pub fn candidates(&self) -> [&'static str; 4] {
        match self {
            Self::Classic => [CLASSIC, MINIMAL, LEGACY_PNG, LEGACY_JPEG],
            Self::Minimal => [MINIMAL, CLASSIC, LEGACY_PNG, LEGACY_JPEG],
        }
    }
}

impl fmt::Display for OverlayStyle {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OverlayStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter()
            .find(|style| style.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown overlay style `{}`, expected one of: classic, minimal", s))
    }
}
