use catppuccin::PALETTE;
use ratatui::style::Color;

const fn catppuccin_to_color(c: &catppuccin::Color) -> Color {
    Color::Rgb(c.rgb.r, c.rgb.g, c.rgb.b)
}

/// Colors used by the demo window, picked from a catppuccin flavor.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub base: Color,
    pub surface: Color,
    pub overlay: Color,
    pub text: Color,
    pub subtext: Color,
    pub accent: Color,
    pub border: Color,
    pub running: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Theme {
    const fn from_catppuccin(flavor: &catppuccin::Flavor) -> Self {
        let c = &flavor.colors;
        Self {
            base: catppuccin_to_color(&c.base),
            surface: catppuccin_to_color(&c.surface1),
            overlay: catppuccin_to_color(&c.overlay0),
            text: catppuccin_to_color(&c.text),
            subtext: catppuccin_to_color(&c.subtext0),
            accent: catppuccin_to_color(&c.mauve),
            border: catppuccin_to_color(&c.lavender),
            running: catppuccin_to_color(&c.sapphire),
            success: catppuccin_to_color(&c.green),
            warning: catppuccin_to_color(&c.peach),
            error: catppuccin_to_color(&c.red),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_catppuccin(&PALETTE.mocha)
    }
}

/// Resolve a theme by name, case-insensitively. Unknown names fall back to Mocha.
pub fn theme_from_name(name: &str) -> Theme {
    let flavor = match name.to_lowercase().as_str() {
        "catppuccin latte" | "latte" => &PALETTE.latte,
        "catppuccin frappe" | "catppuccin frappé" | "frappe" => &PALETTE.frappe,
        "catppuccin macchiato" | "macchiato" => &PALETTE.macchiato,
        "catppuccin mocha" | "mocha" => &PALETTE.mocha,
        _ => {
            tracing::warn!(name, "Unknown theme, using Catppuccin Mocha");
            &PALETTE.mocha
        }
    };
    Theme::from_catppuccin(flavor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_from_name() {
        assert_eq!(
            theme_from_name("Catppuccin Frappe").base,
            catppuccin_to_color(&PALETTE.frappe.colors.base)
        );
        assert_eq!(
            theme_from_name("LATTE").base,
            catppuccin_to_color(&PALETTE.latte.colors.base)
        );
        assert_eq!(
            theme_from_name("no such theme").base,
            Theme::default().base
        );
    }
}
