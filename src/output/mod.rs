//! Output formatting and display system
//!
//! Human-readable (plain or colored) and JSON renderings of a finished run,
//! plus the live progress line shown while transfers run.

mod colored;
mod formatter;
mod json;
mod progress;

pub use self::colored::{terminal_supports_color, ColoredFormatter, Grade, Palette};
pub use formatter::{FormattingOptions, OutputFormatter, PlainFormatter};
pub use json::{JsonFormatter, JsonReport};
pub use progress::ProgressReporter;

use crate::models::Config;

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool, unit: crate::types::SpeedUnit) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            unit,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Formatter selected by the run configuration
    pub fn for_config(config: &Config) -> Box<dyn OutputFormatter> {
        if config.json {
            Box::new(JsonFormatter::new())
        } else {
            let color = config.enable_color && terminal_supports_color();
            Self::create_formatter(color, config.verbose, config.speed_unit())
        }
    }

    /// Progress reporter, unless the configuration turns live progress off
    pub fn progress_for_config(config: &Config) -> Option<ProgressReporter> {
        if config.json || !config.show_progress {
            None
        } else {
            Some(ProgressReporter::new(config.speed_unit()))
        }
    }
}
