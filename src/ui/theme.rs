use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Terminal styles for CLI output; plain when stdout is not a terminal
#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub warn: Style,
    pub dim: Style,
    pub status_lead: Style,
    pub status_customer: Style,
    pub status_inactive: Style,
    pub status_other: Style,
}

impl Theme {
    pub fn detect() -> Self {
        let quiet_colors = std::env::var_os("NO_COLOR").is_some();
        if quiet_colors || !console::Term::stdout().is_term() {
            return Self::plain();
        }
        Self::colored()
    }

    pub fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            warn: Style::new().yellow().bold(),
            dim: Style::new().white().dimmed(),
            status_lead: Style::new().cyan(),
            status_customer: Style::new().green(),
            status_inactive: Style::new().bright_black(),
            status_other: Style::new().blue(),
        }
    }

    pub fn plain() -> Self {
        Self {
            header: Style::new(),
            success: Style::new(),
            error: Style::new(),
            warn: Style::new(),
            dim: Style::new(),
            status_lead: Style::new(),
            status_customer: Style::new(),
            status_inactive: Style::new(),
            status_other: Style::new(),
        }
    }

    /// Badge style for a profile status label (labels are open-ended)
    pub fn status(&self, status: &str) -> &Style {
        match status.to_lowercase().as_str() {
            "lead" => &self.status_lead,
            "customer" => &self.status_customer,
            "inactive" => &self.status_inactive,
            _ => &self.status_other,
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
