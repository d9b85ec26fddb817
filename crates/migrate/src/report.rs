//! Operator-facing rendering of reconciliation results.

use std::fmt::Write as _;
use std::path::Path;

use crate::batch::BatchSummary;
use crate::reconcile::ReconcileReport;

const MISSING: &str = "-";

/// Human-readable summary of one course, listing every unmatched video
/// with the fields needed to fix it by hand.
pub fn render_summary(input: &Path, report: &ReconcileReport) -> String {
    let mut out = String::new();
    let course_id = report.course_id.as_deref().unwrap_or("(unknown course)");
    let _ = writeln!(out, "Course {course_id} ({})", input.display());
    let _ = writeln!(out, "  entries copied:     {}", report.entries);
    let _ = writeln!(out, "  registry videos:    {}", report.candidates);
    let _ = writeln!(out, "  video descriptors:  {}", report.video_entries);

    let by_strategy = report
        .matched_by
        .iter()
        .map(|(strategy, count)| format!("{strategy} {count}"))
        .collect::<Vec<_>>()
        .join(", ");
    if by_strategy.is_empty() {
        let _ = writeln!(out, "  matched:            {}", report.processed);
    } else {
        let _ = writeln!(out, "  matched:            {} ({by_strategy})", report.processed);
    }

    let _ = writeln!(out, "  not found:          {}", report.not_found.len());
    for miss in &report.not_found {
        let _ = writeln!(
            out,
            "    {}  name={:?}  source={:?}  youtube={}  tried={}",
            miss.path,
            miss.display_name.as_deref().unwrap_or(MISSING),
            miss.legacy_label.as_deref().unwrap_or(MISSING),
            miss.youtube_id.as_deref().unwrap_or(MISSING),
            miss.candidate,
        );
    }
    if !report.unreadable.is_empty() {
        let _ = writeln!(out, "  unreadable:         {}", report.unreadable.len());
        for path in &report.unreadable {
            let _ = writeln!(out, "    {path}");
        }
    }
    out
}

/// One line per course plus totals.
pub fn render_batch(summary: &BatchSummary) -> String {
    let mut out = String::new();
    for course in &summary.courses {
        let name = course.course_id().map(str::to_string).unwrap_or_else(|| {
            course.input.display().to_string()
        });
        match (&course.failure, &course.report) {
            (Some(failure), _) => {
                let _ = writeln!(out, "FAILED  {name}  [{}] {}", failure.stage, failure.message);
            }
            (None, Some(report)) => {
                let status = if report.is_complete() { "OK" } else { "PARTIAL" };
                let uploaded = if course.uploaded { ", uploaded" } else { "" };
                let _ = writeln!(
                    out,
                    "{status:<7} {name}  {}/{} matched{uploaded}",
                    report.processed, report.video_entries
                );
            }
            (None, None) => {
                let _ = writeln!(out, "SKIPPED {name}");
            }
        }
    }
    let _ = writeln!(
        out,
        "{} course(s): {} succeeded, {} failed, {} unmatched video(s){}",
        summary.courses.len(),
        summary.succeeded(),
        summary.failed(),
        summary.unmatched(),
        if summary.aborted { "; batch aborted" } else { "" },
    );
    out
}

/// The batch results as pretty-printed JSON.
pub fn to_json(summary: &BatchSummary) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(summary)
}
