//! Text bar chart of action counts

use super::ActionCounts;

/// One line per action: padded label, a bar scaled to `width` columns, the count
///
/// The largest count fills the full width; any non-zero count gets at least
/// one column as long as `width` is not zero.
pub fn render_bar_chart(counts: &ActionCounts, width: usize) -> String {
    let label_width = counts.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let peak = counts.iter().map(|(_, n)| n).max().unwrap_or(0);

    let mut out = String::new();
    for (label, count) in counts.iter() {
        let bar = match (count, peak) {
            (0, _) | (_, 0) => 0,
            _ => ((count * width + peak / 2) / peak).max(1).min(width),
        };
        out.push_str(&format!(
            "{:<label_width$} | {}{} {}\n",
            label,
            "#".repeat(bar),
            " ".repeat(width - bar),
            count,
            label_width = label_width
        ));
    }
    out
}
