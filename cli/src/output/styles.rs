//! Stylesheet for terminal output, built on owo-colors `Style` values.
//!
//! Every style starts plain; `colorize` fills them in when the terminal and
//! flags allow colour.

use bootchain_common::RunStatus;
use owo_colors::Style;

#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub info: Style,
    /// Hosts, dependency lists and other secondary text
    pub dim: Style,
    /// Application name above a status table
    pub header: Style,
    /// Deploy progress arrows
    pub step: Style,
}

impl Styles {
    pub fn colorize(&mut self) {
        *self = Self {
            success: Style::new().green(),
            warning: Style::new().yellow(),
            error: Style::new().red(),
            info: Style::new().blue(),
            dim: Style::new().dimmed(),
            header: Style::new().bold().cyan(),
            step: Style::new().cyan(),
        };
    }

    /// Colour of a container's run state: dim until it runs, yellow while it
    /// starts, green once initialized, red when failed.
    #[must_use]
    pub fn run_status(&self, status: RunStatus) -> Style {
        match status {
            RunStatus::NotRunning => self.dim,
            RunStatus::Running => self.warning,
            RunStatus::Initialized => self.success,
            RunStatus::Failed => self.error,
        }
    }
}
