//! CLI output formatting.
//!
//! Every function here is pure: it takes results and returns display lines,
//! leaving printing to `main`. That keeps the formatting testable without
//! capturing stdout.
//!
//! # Output Format
//!
//! ## Batch
//!
//! ```text
//! [1/3] photos/dawn.jpg
//!     → photos/dawn.webp  1.2 MB → 310.4 KB (-74.1%)  1600x1200
//! [2/3] photos/broken.png
//!     error: Decode error: ...
//! [3/3] photos/tiny.png
//!     skipped (optimized size 1.1 KB >= original 1.0 KB)
//!
//! 2 completed, 1 failed
//! ```
//!
//! Only terminal events produce lines; `processing` events are silent.
//!
//! ## Info
//!
//! ```text
//! photos/dawn.jpg
//!     Format: JPEG
//!     Size: 1600x1200
//!     File: 1.2 MB
//! ```

use crate::batch::{BatchProgress, BatchReport, BatchStatus};
use crate::commands::{ImageInfo, ProcessResult};
use std::path::{Path, PathBuf};

// ============================================================================
// Batch
// ============================================================================

/// Format one batch progress event as display lines.
pub fn format_batch_event(event: &BatchProgress<ProcessResult>) -> Vec<String> {
    let header = format!(
        "[{}/{}] {}",
        event.index + 1,
        event.total,
        event.file_path.display()
    );
    match event.status {
        BatchStatus::Pending | BatchStatus::Processing => Vec::new(),
        BatchStatus::Completed => match &event.result {
            Some(result) if result.skipped => {
                vec![header, format!("    {}", result_line(result))]
            }
            Some(result) => vec![header, format!("    → {}", result_line(result))],
            None => vec![header],
        },
        BatchStatus::Error => vec![
            header,
            format!(
                "    error: {}",
                event.error.as_deref().unwrap_or("unknown error")
            ),
        ],
    }
}

fn result_line(result: &ProcessResult) -> String {
    if result.skipped {
        return format!(
            "skipped (optimized size {} >= original {})",
            format_bytes(result.new_size),
            format_bytes(result.original_size)
        );
    }
    format!(
        "{}  {} → {} ({})  {}x{}",
        result.output_path.display(),
        format_bytes(result.original_size),
        format_bytes(result.new_size),
        format_change(result.original_size, result.new_size),
        result.width,
        result.height
    )
}

/// Closing lines after a batch.
pub fn format_summary<T>(report: &BatchReport<T>) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        format!("{} completed, {} failed", report.completed(), report.failed()),
    ];
    let failed: Vec<_> = report
        .items
        .iter()
        .filter(|item| item.status == BatchStatus::Error)
        .collect();
    if !failed.is_empty() {
        lines.push("Failed:".to_string());
        for item in failed {
            lines.push(format!(
                "    {}: {}",
                item.path.display(),
                item.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
    lines
}

// ============================================================================
// Info / scan
// ============================================================================

pub fn format_image_info(path: &Path, info: &ImageInfo) -> Vec<String> {
    vec![
        path.display().to_string(),
        format!("    Format: {}", info.format),
        format!("    Size: {}x{}", info.width, info.height),
        format!("    File: {}", format_bytes(info.size_bytes)),
    ]
}

/// Scanned paths, shown relative to `root` where possible.
pub fn format_scan(root: &Path, paths: &[PathBuf]) -> Vec<String> {
    let mut lines: Vec<String> = paths
        .iter()
        .map(|p| p.strip_prefix(root).unwrap_or(p).display().to_string())
        .collect();
    lines.push(format!("{} image(s)", paths.len()));
    lines
}

// ============================================================================
// Helpers
// ============================================================================

/// Human-readable byte count (1024-based).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Signed percentage change from `before` to `after`.
pub fn format_change(before: u64, after: u64) -> String {
    if before == 0 {
        return "n/a".to_string();
    }
    let pct = (after as f64 - before as f64) / before as f64 * 100.0;
    format!("{pct:+.1}%")
}
