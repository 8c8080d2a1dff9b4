//! Minimal report rendering — plain text and a small HTML table.
//!
//! Statship deliberately has no template engine; the summary is regular
//! tabular data and the interesting formatting lives on the receiving side
//! (mail client, chat embed).

use statship_core::types::Summary;

/// Human label for a metric key.
pub fn metric_label(key: &str) -> &str {
    match key {
        "pageviews" => "Page views",
        "visitors" => "Visitors",
        "visits" => "Visits",
        "bounces" => "Bounces",
        "totaltime" => "Total time (s)",
        other => other,
    }
}

/// Signed change suffix, e.g. " (+12)" or " (-3)". Empty when unknown.
pub fn change_suffix(change: Option<i64>) -> String {
    match change {
        Some(c) if c > 0 => format!(" (+{c})"),
        Some(c) if c < 0 => format!(" ({c})"),
        Some(_) => " (±0)".to_string(),
        None => String::new(),
    }
}

/// Plain-text rendering, one metric per line.
pub fn render_text(summary: &Summary) -> String {
    let mut out = format!("{} — {}\n", summary.name, summary.period);
    for m in &summary.metrics {
        out.push_str(&format!(
            "{}: {}{}\n",
            metric_label(&m.key),
            m.value,
            change_suffix(m.change)
        ));
    }
    out
}

/// HTML rendering — a header plus a two-column table.
pub fn render_html(summary: &Summary) -> String {
    let mut rows = String::new();
    for m in &summary.metrics {
        rows.push_str(&format!(
            "<tr><td style=\"padding:4px 12px 4px 0;color:#555\">{}</td>\
             <td style=\"padding:4px 0;font-weight:600\">{}{}</td></tr>",
            metric_label(&m.key),
            m.value,
            change_suffix(m.change)
        ));
    }
    format!(
        "<html><body style=\"font-family:sans-serif\">\
         <h2 style=\"margin-bottom:2px\">{}</h2>\
         <p style=\"margin-top:0;color:#777\">{}</p>\
         <table>{rows}</table>\
         </body></html>",
        summary.name, summary.period
    )
}
