use super::{collection_note, sanitize_mermaid, window_label, ServiceHealth};
use crate::aggregator::ClusterSeverity;
use crate::correlator::CorrelationResult;

fn severity_badge(severity: ClusterSeverity) -> String {
    let icon = match severity {
        ClusterSeverity::Low => "🟢",
        ClusterSeverity::Medium => "🟡",
        ClusterSeverity::Critical => "🔴",
    };
    format!("{} {}", icon, severity.label())
}

/// Render the result as a markdown report
///
/// Lists every cluster, unlike the terminal report, and draws propagation
/// edges as a mermaid `graph LR` block.
pub fn render_markdown(result: &CorrelationResult) -> String {
    let mut out = String::from("# Cross-Signal Correlation Report\n\n");

    out.push_str(&format!(
        "**Time window:** {} | **Signals:** {} | **Services:** {}\n\n",
        window_label(result),
        result.signals().len(),
        result.services().len()
    ));
    if let Some(note) = collection_note(result) {
        out.push_str(&format!("> {}\n\n", note));
    }

    out.push_str("## Service Health\n\n");
    out.push_str("| Service | Calls | Errors | Error Rate | Status |\n");
    out.push_str("|---------|------:|-------:|-----------:|--------|\n");
    for svc in result.services() {
        let health = ServiceHealth::of(svc);
        out.push_str(&format!(
            "| {} | {} | {} | {:.2}% | {} {} |\n",
            svc.name,
            svc.call_count,
            svc.error_count,
            svc.error_rate(),
            health.icon(),
            health.label()
        ));
    }

    let clusters = result.clusters();
    if clusters.is_empty() {
        out.push_str("\nNo event clusters detected — system looks quiet ✅\n");
    } else {
        out.push_str(&format!("\n## Event Clusters ({})\n\n", clusters.len()));
        for (i, cluster) in clusters.iter().enumerate() {
            let services: Vec<&str> = cluster.services.keys().map(String::as_str).collect();
            out.push_str(&format!(
                "### Cluster #{} — {} (score: {:.0})\n\n",
                i + 1,
                severity_badge(ClusterSeverity::from_score(cluster.score)),
                cluster.score
            ));
            out.push_str(&format!(
                "- **Time:** {} → {}\n",
                cluster.start.format("%H:%M:%S"),
                cluster.end.format("%H:%M:%S")
            ));
            out.push_str(&format!(
                "- **Signals:** {} ({} errors)\n",
                cluster.signals.len(),
                cluster.errors
            ));
            out.push_str(&format!("- **Services:** {}\n\n", services.join(", ")));
        }
    }

    if !result.propagation().is_empty() {
        out.push_str("## Error Propagation\n\n");
        out.push_str("```mermaid\ngraph LR\n");
        for edge in result.propagation() {
            out.push_str(&format!(
                "    {} -->|{}x, ~{:.0}ms| {}\n",
                sanitize_mermaid(&edge.from),
                edge.count,
                edge.delay_ms,
                sanitize_mermaid(&edge.to)
            ));
        }
        out.push_str("```\n");
    }

    out
}
