//! Prometheus text exposition format.
//!
//! Renders a [`CounterSnapshot`] so the counters file can be picked up by a
//! node exporter textfile collector or any compatible agent.

use crate::counters::{CounterName, CounterSnapshot, LabelSet};

/// Render a counter snapshot into Prometheus text format.
///
/// Every counter gets its HELP/TYPE header even when no series exist.
/// Scaling durations are exported as a summary without quantiles.
pub fn render_prometheus(snapshot: &CounterSnapshot) -> String {
    let mut out = String::new();

    for name in CounterName::ALL {
        let metric = metric_name(name);
        out.push_str(&format!("# HELP {metric} {}.\n", name.description()));
        out.push_str(&format!("# TYPE {metric} counter\n"));
        for sample in snapshot.counters.iter().filter(|c| c.name == name) {
            out.push_str(&format!("{metric}{} {}\n", render_labels(&sample.labels), sample.value));
        }
    }

    out.push_str("# HELP dbscale_scaler_scaling_duration_ms Time taken to complete a scaling operation.\n");
    out.push_str("# TYPE dbscale_scaler_scaling_duration_ms summary\n");
    for sample in &snapshot.durations {
        let labels = render_labels(&sample.labels);
        let sum: u64 = sample.values_ms.iter().sum();
        out.push_str(&format!("dbscale_scaler_scaling_duration_ms_sum{labels} {sum}\n"));
        out.push_str(&format!(
            "dbscale_scaler_scaling_duration_ms_count{labels} {}\n",
            sample.values_ms.len()
        ));
    }

    out
}

/// `scaler/scaling-success` → `dbscale_scaler_scaling_success_total`
fn metric_name(name: CounterName) -> String {
    format!("dbscale_{}_total", name.as_str().replace(['/', '-'], "_"))
}

fn render_labels(labels: &LabelSet) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape(v)))
        .collect();
    format!("{{{}}}", pairs.join(","))
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
