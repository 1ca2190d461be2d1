//! Colored terminal output
//!
//! Same layout as [`PlainFormatter`](super::PlainFormatter); figures are
//! tinted by how good they are for a home connection.

use super::formatter::{labelled, server_line, transfer_details, FormattingOptions, OutputFormatter, LABEL_WIDTH};
use crate::{
    error::{AppError, ErrorReporter, Result},
    models::AggregateResult,
    types::SpeedUnit,
};
use colored::{Color, ColoredString, Colorize};

/// Quality band of a measured figure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
    Bad,
    Slow,
    Fair,
    Good,
    Great,
}

/// Upper latency bound (ms) of each band, best first
const LATENCY_BANDS: [(f64, Grade); 4] = [
    (20.0, Grade::Great),
    (50.0, Grade::Good),
    (100.0, Grade::Fair),
    (300.0, Grade::Slow),
];

/// Lower bandwidth bound (Mbps) of each band, best first
const BANDWIDTH_BANDS: [(f64, Grade); 4] = [
    (500.0, Grade::Great),
    (100.0, Grade::Good),
    (25.0, Grade::Fair),
    (5.0, Grade::Slow),
];

impl Grade {
    pub fn for_latency(average_ms: f64) -> Self {
        LATENCY_BANDS
            .iter()
            .find(|(bound, _)| average_ms < *bound)
            .map_or(Grade::Bad, |(_, grade)| *grade)
    }

    pub fn for_bandwidth(bytes_per_sec: u64) -> Self {
        let mbps = SpeedUnit::Mbps.convert(bytes_per_sec as f64);
        BANDWIDTH_BANDS
            .iter()
            .find(|(bound, _)| mbps >= *bound)
            .map_or(Grade::Bad, |(_, grade)| *grade)
    }

    pub fn color(&self) -> Color {
        match self {
            Grade::Great => Color::Green,
            Grade::Good => Color::Cyan,
            Grade::Fair => Color::Yellow,
            Grade::Slow => Color::Magenta,
            Grade::Bad => Color::Red,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::Great => "great",
            Grade::Good => "good",
            Grade::Fair => "fair",
            Grade::Slow => "slow",
            Grade::Bad => "bad",
        }
    }
}

/// Colors for everything that is not a graded figure
#[derive(Debug, Clone)]
pub struct Palette {
    pub label: Color,
    pub server: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            label: Color::Blue,
            server: Color::Cyan,
            warning: Color::Yellow,
            error: Color::Red,
        }
    }
}

pub struct ColoredFormatter {
    options: FormattingOptions,
    palette: Palette,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_palette(options, Palette::default())
    }

    pub fn with_palette(options: FormattingOptions, palette: Palette) -> Self {
        Self { options, palette }
    }

    fn paint(&self, text: &str, color: Color, bold: bool) -> ColoredString {
        match (self.options.enable_color, bold) {
            (false, _) => text.normal(),
            (true, false) => text.color(color),
            (true, true) => text.color(color).bold(),
        }
    }

    fn faint(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.dimmed()
        } else {
            text.normal()
        }
    }

    fn label(&self, label: &str) -> ColoredString {
        self.paint(&format!("{:>width$}", label, width = LABEL_WIDTH), self.palette.label, true)
    }

    /// `<label> <value>` with the value tinted by `grade`; verbose mode
    /// appends the grade name and `details`
    fn graded_line(&self, label: &str, value: &str, grade: Grade, details: &str) -> String {
        let mut line = format!("{} {}", self.label(label), self.paint(value, grade.color(), true));
        if self.options.verbose_mode {
            line.push_str(&format!(" {}", self.faint(&format!("{} [{}]", details, grade.label()))));
        }
        line
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_result(&self, result: &AggregateResult) -> Result<String> {
        let unit = self.options.unit;
        let mut lines = Vec::new();

        if self.options.verbose_mode {
            lines.push(format!("{} {}", self.label("Server"), self.paint(&server_line(result), self.palette.server, false)));
            if !result.server.sponsor.is_empty() {
                lines.push(labelled("Sponsor", &result.server.sponsor));
            }
            if !result.isp().is_empty() {
                lines.push(labelled("ISP", result.isp()));
            }
        }

        let latency = &result.latency;
        lines.push(self.graded_line(
            "Ping",
            &format!("{:.2} ms", latency.average_ms),
            Grade::for_latency(latency.average_ms),
            &format!("(jitter {:.2} ms, {} samples)", latency.jitter_ms, latency.sample_count),
        ));

        for (label, run) in [("Download", &result.download), ("Upload", &result.upload)] {
            lines.push(self.graded_line(
                label,
                &unit.format(run.bandwidth_bytes_per_sec as f64),
                Grade::for_bandwidth(run.bandwidth_bytes_per_sec),
                &transfer_details(run),
            ));
        }

        Ok(lines.join("\n"))
    }

    fn format_error(&self, error: &AppError) -> Result<String> {
        let reporter = ErrorReporter::new(self.options.enable_color, self.options.verbose_mode);
        Ok(format!("{} {}", self.paint("Error:", self.palette.error, true), reporter.render(error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.paint("Warning:", self.palette.warning, true), warning))
    }
}

/// Whether the terminal should get ANSI colors (`NO_COLOR`, `TERM=dumb`)
pub fn terminal_supports_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    std::env::var("TERM").map_or(cfg!(unix), |term| term != "dumb")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::formatter::tests::sample_result;

    #[test]
    fn test_latency_grades() {
        assert_eq!(Grade::for_latency(5.0), Grade::Great);
        assert_eq!(Grade::for_latency(20.0), Grade::Good);
        assert_eq!(Grade::for_latency(75.0), Grade::Fair);
        assert_eq!(Grade::for_latency(299.9), Grade::Slow);
        assert_eq!(Grade::for_latency(1500.0), Grade::Bad);
    }

    #[test]
    fn test_bandwidth_grades() {
        // 12.5 MB/s is exactly 100 Mbps
        assert_eq!(Grade::for_bandwidth(12_500_000), Grade::Good);
        assert_eq!(Grade::for_bandwidth(125_000_000), Grade::Great);
        assert_eq!(Grade::for_bandwidth(1_250_000), Grade::Slow);
        assert_eq!(Grade::for_bandwidth(0), Grade::Bad);
        assert!(Grade::Great > Grade::Bad);
    }

    #[test]
    fn test_disabled_colors_match_plain_layout() {
        let formatter = ColoredFormatter::new(FormattingOptions {
            enable_color: false,
            ..Default::default()
        });
        let output = formatter.format_result(&sample_result()).unwrap();
        assert_eq!(output, "      Ping 12.35 ms\n  Download 100.00 Mbps\n    Upload 10.00 Mbps");
    }

    #[test]
    fn test_verbose_appends_grades() {
        let formatter = ColoredFormatter::new(FormattingOptions {
            enable_color: false,
            verbose_mode: true,
            ..Default::default()
        });
        let output = formatter.format_result(&sample_result()).unwrap();
        assert!(output.contains("    Server speed.example.com:8080 (New York, US) [3.25 km]"));
        assert!(output.contains("12.35 ms (jitter"));
        assert!(output.contains("[great]"));
        assert!(output.contains("100.00 Mbps ("));
        assert!(output.contains("[slow]"));
    }

    #[test]
    fn test_colored_output_keeps_values() {
        let formatter = ColoredFormatter::new(FormattingOptions::default());
        let output = formatter.format_result(&sample_result()).unwrap();
        assert!(output.contains("100.00 Mbps"));
        assert!(output.contains("12.35 ms"));
    }

    #[test]
    fn test_warning_and_error_format() {
        let formatter = ColoredFormatter::new(FormattingOptions {
            enable_color: false,
            ..Default::default()
        });
        assert_eq!(formatter.format_warning("slow").unwrap(), "Warning: slow");

        let error = formatter.format_error(&AppError::server_not_found("77")).unwrap();
        assert!(error.starts_with("Error: [SERVER]"));
    }
}
