//! Plain-text renderings of a split result

use std::fmt::Write;

use crate::split::SplitResult;

const SHARE_HEADER: &str = "WattGuard Fair Split Result";
const SHARE_FOOTER: &str = "Calculated with WattGuard AI";

/// Signed percentage for a tag weight: `+30%`, `-10%`, `0%`
pub fn format_weight(weight: f64) -> String {
    let sign = if weight > 0.0 { "+" } else { "" };
    format!("{}{:.0}%", sign, weight * 100.0)
}

/// Text suitable for pasting into a group chat
pub fn share_text(result: &SplitResult) -> String {
    let lines: Vec<String> = result
        .participants
        .iter()
        .map(|a| format!("{}: ${:.2} ({:.1}%)", a.name, a.share, a.percent))
        .collect();

    format!(
        "{}\nTotal Bill: ${:.2}\n\n{}\n\n{}",
        SHARE_HEADER,
        result.total,
        lines.join("\n"),
        SHARE_FOOTER
    )
}

/// Per-participant explanation of how each share was reached
pub fn calculation_details(result: &SplitResult) -> String {
    let mut out = String::new();
    let n = result.participants.len();
    let _ = writeln!(out, "Base Split (1/{}): ${:.2}", n, result.base_share);

    for a in &result.participants {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}: ${:.2}", a.name, a.share);
        let _ = writeln!(out, "  Base Split: {:.0}%", result.base_percent());
        for t in &a.tags {
            let _ = writeln!(out, "  {}: {}", t.tag, format_weight(t.weight));
        }
        if a.clamped {
            let _ = writeln!(out, "  Minimum ratio applied");
        }
    }

    out
}
