//! CLI output formatting for the build.
//!
//! # Output Format
//!
//! One line per file, action first, path relative to the output directory.
//! Warnings are indented under the file they belong to:
//!
//! ```text
//! ==> Building release → site/ → release/
//! Generating  index.html
//! Generating  blog/first-post.html
//! Optimizing  img/photo.png
//!     warning: img/logo.svg: optimizer failed, copied unoptimized (...)
//! Copying     img/logo.svg
//! Up to date  style.css
//! Skipping    about.html~
//!
//! 2 pages, 1 optimized, 1 copied, 1 up to date, 1 skipped, 1 warning in 0.04s
//! ```
//!
//! # Architecture
//!
//! Each piece of output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::build::{BuildEvent, BuildSummary, BuildWarning};
use crate::context::BuildContext;

/// Width of the action column.
const ACTION_WIDTH: usize = 11;

fn action_line(action: &str, path: &str) -> String {
    format!("{:<width$} {}", action, path, width = ACTION_WIDTH)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}

// ============================================================================
// Build header
// ============================================================================

/// Format the line announcing a build.
pub fn format_build_header(ctx: &BuildContext) -> Vec<String> {
    let rel = |p: &std::path::Path| {
        p.strip_prefix(&ctx.root)
            .unwrap_or(p)
            .display()
            .to_string()
    };
    let mut line = format!(
        "==> Building {} \u{2192} {}/ \u{2192} {}/",
        ctx.mode,
        rel(&ctx.site_dir),
        rel(&ctx.out_dir)
    );
    if ctx.force {
        line.push_str(" (forced)");
    }
    vec![line]
}

pub fn print_build_header(ctx: &BuildContext) {
    for line in format_build_header(ctx) {
        println!("{}", line);
    }
}

// ============================================================================
// Progress events
// ============================================================================

/// Format a single build progress event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::Generated { path } => vec![action_line("Generating", path)],
        BuildEvent::Optimized { path } => vec![action_line("Optimizing", path)],
        BuildEvent::Copied { path } => vec![action_line("Copying", path)],
        BuildEvent::UpToDate { path } => vec![action_line("Up to date", path)],
        BuildEvent::Skipped { path } => vec![action_line("Skipping", path)],
        BuildEvent::Warning { path, warning } => {
            vec![format!("    warning: {}: {}", path, format_warning(warning))]
        }
    }
}

fn format_warning(warning: &BuildWarning) -> String {
    match warning {
        BuildWarning::OptimizeFailed(reason) => {
            format!("optimizer failed, copied unoptimized ({})", reason)
        }
        BuildWarning::PlaceholderMissing(placeholder) => {
            format!("template has no {} placeholder, content dropped", placeholder)
        }
        BuildWarning::UnterminatedCode => {
            "code block opened with <? is never closed".to_string()
        }
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Format the end-of-build summary.
pub fn format_summary(summary: &BuildSummary) -> Vec<String> {
    let mut parts = vec![
        plural(summary.generated, "page", "pages"),
        format!("{} optimized", summary.optimized),
        format!("{} copied", summary.copied),
        format!("{} up to date", summary.up_to_date),
        format!("{} skipped", summary.skipped),
    ];
    if summary.warnings > 0 {
        parts.push(plural(summary.warnings, "warning", "warnings"));
    }
    vec![
        String::new(),
        format!(
            "{} in {:.2}s",
            parts.join(", "),
            summary.elapsed.as_secs_f64()
        ),
    ]
}

pub fn print_summary(summary: &BuildSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Mode;
    use crate::test_helpers::*;
    use std::time::Duration;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn action_line_pads_action_column() {
        assert_eq!(action_line("Copying", "a.css"), "Copying     a.css");
        assert_eq!(action_line("Up to date", "b"), "Up to date  b");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "page", "pages"), "1 page");
        assert_eq!(plural(0, "page", "pages"), "0 pages");
        assert_eq!(plural(2, "page", "pages"), "2 pages");
    }

    // =========================================================================
    // Event tests
    // =========================================================================

    #[test]
    fn format_generated_event() {
        let event = BuildEvent::Generated {
            path: "blog/post.html".into(),
        };
        assert_eq!(format_build_event(&event), vec!["Generating  blog/post.html"]);
    }

    #[test]
    fn format_up_to_date_and_skipped() {
        let lines = format_build_event(&BuildEvent::UpToDate {
            path: "style.css".into(),
        });
        assert_eq!(lines, vec!["Up to date  style.css"]);
        let lines = format_build_event(&BuildEvent::Skipped {
            path: "index.html~".into(),
        });
        assert_eq!(lines, vec!["Skipping    index.html~"]);
    }

    #[test]
    fn format_warning_events() {
        let lines = format_build_event(&BuildEvent::Warning {
            path: "img/a.png".into(),
            warning: BuildWarning::OptimizeFailed("`optipng` not found".into()),
        });
        assert_eq!(
            lines,
            vec!["    warning: img/a.png: optimizer failed, copied unoptimized (`optipng` not found)"]
        );

        let lines = format_build_event(&BuildEvent::Warning {
            path: "index.html".into(),
            warning: BuildWarning::PlaceholderMissing("#content#".into()),
        });
        assert!(lines[0].contains("no #content# placeholder"));
    }

    // =========================================================================
    // Summary tests
    // =========================================================================

    #[test]
    fn format_summary_without_warnings() {
        let summary = BuildSummary {
            generated: 1,
            optimized: 2,
            copied: 3,
            up_to_date: 4,
            skipped: 0,
            warnings: 0,
            elapsed: Duration::from_millis(1250),
        };
        assert_eq!(
            format_summary(&summary),
            vec![
                "".to_string(),
                "1 page, 2 optimized, 3 copied, 4 up to date, 0 skipped in 1.25s".to_string()
            ]
        );
    }

    #[test]
    fn format_summary_with_warnings() {
        let summary = BuildSummary {
            warnings: 2,
            ..BuildSummary::default()
        };
        assert!(format_summary(&summary)[1].contains(", 2 warnings in "));
    }

    #[test]
    fn format_header_shows_relative_dirs() {
        let tmp = setup_project();
        let ctx = load_context(tmp.path(), Mode::Release, true);
        assert_eq!(
            format_build_header(&ctx),
            vec!["==> Building release \u{2192} site/ \u{2192} release/ (forced)"]
        );
    }
}
