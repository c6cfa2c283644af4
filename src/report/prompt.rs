use super::{render_markdown, source_label};
use crate::correlator::CorrelationResult;

/// Signals included in the prompt timeline
pub const PROMPT_TIMELINE_LIMIT: usize = 100;

const PREAMBLE: &str = "\
You are an expert SRE performing cross-signal correlation analysis.
Analyze the following observability data from multiple services and identify:
1. Root cause chains — which service triggered the cascade?
2. Temporal correlations — events that happen together
3. Propagation paths — how errors spread between services
4. Actionable recommendations

";

const INSTRUCTIONS: &str = "
## Instructions

Provide:
1. **Incident Summary** — What happened, in plain English
2. **Root Cause Chain** — The sequence of events from trigger to impact
3. **Blast Radius** — Which services are affected and how
4. **Remediation Steps** — Ordered by priority
5. **Prevention** — How to avoid this in the future

Be specific. Reference actual timestamps, services, and error messages.
";

/// Build the narrative prompt: instructions, the markdown report and a
/// chronological timeline of the earliest signals
pub fn build_prompt(result: &CorrelationResult) -> String {
    let mut prompt = String::from(PREAMBLE);
    prompt.push_str(&render_markdown(result));

    prompt.push_str("\n## Signal Timeline (chronological)\n\n");
    for signal in result.signals().iter().take(PROMPT_TIMELINE_LIMIT) {
        prompt.push_str(&format!(
            "- {} | {} | {} | {}{}\n",
            signal.timestamp.format("%H:%M:%S%.3f"),
            source_label(signal.source),
            signal.service,
            signal.summary,
            if signal.is_error { " [ERROR]" } else { "" }
        ));
    }
    if result.signals().len() > PROMPT_TIMELINE_LIMIT {
        prompt.push_str(&format!(
            "- ... {} later signals omitted\n",
            result.signals().len() - PROMPT_TIMELINE_LIMIT
        ));
    }

    prompt.push_str(INSTRUCTIONS);
    prompt
}
