use crate::pipeline::{PipelineSummary, StageStatus};
use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::Stylize;

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_styles() -> Styles {
    clap::builder::Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Color Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    pub const CYAN: Color = Color::Rgb {
        r: 0,
        g: 255,
        b: 255,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 0,
        g: 255,
        b: 136,
    };
    pub const ORANGE: Color = Color::Rgb {
        r: 255,
        g: 165,
        b: 0,
    };
    pub const RED: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const DIM: Color = Color::Rgb {
        r: 128,
        g: 128,
        b: 128,
    };
}

pub mod box_chars {
    pub const SINGLE_HORIZONTAL: &str = "─";
    pub const CHECK: &str = "✓";
    pub const CROSS_MARK: &str = "✗";
    pub const WARNING: &str = "⚠";
    pub const BULLET_EMPTY: &str = "○";
}

// ═══════════════════════════════════════════════════════════════════════════════
// Run Summary
// ═══════════════════════════════════════════════════════════════════════════════

const SUMMARY_WIDTH: usize = 60;

/// One plain-text line per stage, without colors.
pub fn summary_lines(summary: &PipelineSummary) -> Vec<String> {
    summary
        .stages
        .iter()
        .map(|report| {
            let status = match &report.status {
                StageStatus::Completed(detail) => format!("ok ({})", detail),
                StageStatus::Partial { failures, detail } => {
                    format!("{} failure(s) ({})", failures, detail)
                }
                StageStatus::Failed(error) => format!("failed: {}", error),
                StageStatus::Skipped => "skipped".to_string(),
            };
            format!("{:<12} {}", report.stage.to_string(), status)
        })
        .collect()
}

pub fn print_summary(summary: &PipelineSummary) {
    println!();
    println!("{}", " Run summary ".with(colors::CYAN).bold());
    println!(
        "{}",
        box_chars::SINGLE_HORIZONTAL
            .repeat(SUMMARY_WIDTH)
            .with(colors::CYAN)
    );

    for (report, line) in summary.stages.iter().zip(summary_lines(summary)) {
        let (mark, color) = match report.status {
            StageStatus::Completed(_) => (box_chars::CHECK, colors::GREEN),
            StageStatus::Partial { .. } => (box_chars::WARNING, colors::ORANGE),
            StageStatus::Failed(_) => (box_chars::CROSS_MARK, colors::RED),
            StageStatus::Skipped => (box_chars::BULLET_EMPTY, colors::DIM),
        };
        println!(" {} {}", mark.with(color).bold(), line.with(color));
    }

    println!(
        "{}",
        box_chars::SINGLE_HORIZONTAL
            .repeat(SUMMARY_WIDTH)
            .with(colors::CYAN)
    );
}
