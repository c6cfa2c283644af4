use super::{
    collection_note, format_span, source_label, window_label, ServiceHealth,
    SIGNALS_PER_CLUSTER, TOP_CLUSTERS,
};
use crate::aggregator::{Cluster, ClusterSeverity};
use crate::correlator::CorrelationResult;
use crate::events::{Signal, SignalSource};
use colored::{ColoredString, Colorize};

/// Render the result as a coloured terminal report
pub fn render_terminal(result: &CorrelationResult) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}\n",
        "━━━ Cross-Signal Correlation ━━━".bold()
    ));
    out.push_str(&format!(
        "  Time window: {}  |  Signals: {}  |  Services: {}\n",
        window_label(result),
        result.signals().len(),
        result.services().len()
    ));
    if let Some(note) = collection_note(result) {
        out.push_str(&format!("  {}\n", note.yellow()));
    }

    out.push_str(&section("Service Health"));
    for svc in result.services() {
        let health = ServiceHealth::of(svc);
        out.push_str(&format!(
            "  {} {:<30} {:>6} calls  {:>4} errors  ({:.2}%)\n",
            health.icon(),
            svc.name,
            svc.call_count,
            svc.error_count,
            svc.error_rate()
        ));
    }

    let clusters = result.clusters();
    if clusters.is_empty() {
        out.push_str(&format!(
            "\n  {}\n",
            "No event clusters detected — system looks quiet ✅".green()
        ));
    } else {
        out.push_str(&section(&format!(
            "Event Clusters ({} found)",
            clusters.len()
        )));
        for (i, cluster) in clusters.iter().take(TOP_CLUSTERS).enumerate() {
            render_cluster(&mut out, i + 1, cluster);
        }
    }

    if !result.propagation().is_empty() {
        out.push_str(&section("Error Propagation Patterns"));
        for edge in result.propagation() {
            out.push_str(&format!(
                "  {} → {}  ({} correlated events, avg delay: {:.0}ms, {:.0}% of {} errors)\n",
                edge.from,
                edge.to,
                edge.count,
                edge.delay_ms,
                edge.error_rate * 100.0,
                edge.to
            ));
        }
    }

    out.push('\n');
    out
}

fn section(title: &str) -> String {
    format!("\n{} {}\n", "▸".cyan(), title.bold())
}

fn severity_label(severity: ClusterSeverity) -> ColoredString {
    let label = severity.label();
    match severity {
        ClusterSeverity::Critical => label.red().bold(),
        ClusterSeverity::Medium => label.yellow().bold(),
        ClusterSeverity::Low => label.green(),
    }
}

fn render_cluster(out: &mut String, number: usize, cluster: &Cluster) {
    let services: Vec<String> = cluster
        .services
        .iter()
        .map(|(name, count)| format!("{}({})", name, count))
        .collect();

    out.push_str(&format!(
        "\n  Cluster #{} — {} (score: {:.0})\n",
        number,
        severity_label(ClusterSeverity::from_score(cluster.score)),
        cluster.score
    ));
    out.push_str(&format!(
        "    Time: {} → {} ({})\n",
        cluster.start.format("%H:%M:%S"),
        cluster.end.format("%H:%M:%S"),
        format_span(cluster.span())
    ));
    out.push_str(&format!(
        "    Signals: {} ({} errors)\n",
        cluster.signals.len(),
        cluster.errors
    ));
    out.push_str(&format!("    Services: {}\n", services.join(", ")));

    for signal in cluster.signals.iter().take(SIGNALS_PER_CLUSTER) {
        out.push_str(&format!("    {}\n", signal_line(signal)));
    }
    if cluster.signals.len() > SIGNALS_PER_CLUSTER {
        out.push_str(&format!(
            "    {}\n",
            format!(
                "... and {} more signals",
                cluster.signals.len() - SIGNALS_PER_CLUSTER
            )
            .dimmed()
        ));
    }
}

fn signal_line(signal: &Signal) -> String {
    let icon = match signal.source {
        SignalSource::Log => "📝",
        SignalSource::Trace => "🔗",
    };
    let marker = if signal.is_error { " ❌" } else { "" };
    format!(
        "{} [{}] {} {}: {}{}",
        icon,
        signal.timestamp.format("%H:%M:%S"),
        source_label(signal.source),
        signal.service,
        signal.summary,
        marker
    )
}
