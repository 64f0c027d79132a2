//! Static HTML rendering of a [`Report`].

use super::{Finding, Report};
use crate::facts::Platform;
use crate::rules::Severity;

const TEMPLATE: &str = include_str!("../../templates/report.html");
const CSS: &str = include_str!("../../templates/report.css");

const EMPTY_GROUP: &str = r#"<div class="card empty">No findings.</div>"#;

/// Render a self-contained HTML page for `report`.
pub fn render_html(report: &Report) -> String {
    let summary = report.summary;
    let blocking = summary.blocking.to_string();
    let advisory = summary.advisory.to_string();
    let fyi = summary.fyi.to_string();
    let ios = render_group(report, Platform::Ios);
    let android = render_group(report, Platform::Android);

    fill(
        TEMPLATE,
        &[
            ("CSS", CSS),
            ("BLOCKING_COUNT", &blocking),
            ("ADVISORY_COUNT", &advisory),
            ("FYI_COUNT", &fyi),
            ("IOS_CARDS", &ios),
            ("ANDROID_CARDS", &android),
        ],
    )
}

/// Substitute `{{ NAME }}` placeholders in a single pass, so substituted text is never rescanned.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{ ") {
        let Some(len) = rest[start..].find(" }}") else {
            break;
        };
        let name = &rest[start + 3..start + len];
        out.push_str(&rest[..start]);
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + len + 3]),
        }
        rest = &rest[start + len + 3..];
    }
    out.push_str(rest);
    out
}

fn render_group(report: &Report, platform: Platform) -> String {
    let cards: Vec<String> = report.findings_for(platform).map(render_card).collect();
    if cards.is_empty() {
        EMPTY_GROUP.to_string()
    } else {
        cards.join("\n")
    }
}

fn severity_badge(severity: Severity) -> String {
    format!(
        r#"<span class="badge sev-{}">{}</span>"#,
        severity.as_str(),
        severity.as_str().to_uppercase()
    )
}

fn render_card(finding: &Finding) -> String {
    let mut html = String::from(r#"<div class="card">"#);
    html.push_str(&format!(
        r#"<div class="title">{} <span class="id">{}</span></div>"#,
        severity_badge(finding.severity),
        escape(&finding.id)
    ));

    let url = finding.policy_url();
    if let Some(text) = finding.policy_section().or(url) {
        html.push_str(&format!(
            r##"<div class="policy"><b>Policy:</b> <a href="{}" target="_blank" rel="noreferrer noopener">{}</a></div>"##,
            escape(url.unwrap_or("#")),
            escape(text)
        ));
    }

    html.push_str(&format!(
        r#"<div class="why"><b>Why this matters:</b> {}</div>"#,
        escape(&finding.why())
    ));

    if finding.remediation.is_empty() {
        html.push_str(
            r#"<div class="how"><b>How to fix:</b> See the linked policy for remediation steps.</div>"#,
        );
    } else {
        html.push_str(r#"<div class="how"><b>How to fix:</b><ol>"#);
        for step in &finding.remediation {
            html.push_str(&format!("<li>{}</li>", escape(step)));
        }
        html.push_str("</ol></div>");
    }

    if !finding.evidence.is_empty() {
        if let Ok(evidence) = serde_json::to_string_pretty(&finding.evidence) {
            html.push_str(&format!(
                "<details><summary>Evidence</summary><pre>{}</pre></details>",
                escape(&evidence)
            ));
        }
    }

    html.push_str("</div>");
    html
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
