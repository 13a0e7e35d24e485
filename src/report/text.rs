use crate::pipeline::FitFailure;
use crate::pipeline::stage7_summary::{OverviewRow, SummaryViews};
use crate::report::{RunSummary, format_f64_6};

pub fn render_report_text(run: Option<&RunSummary>, views: &SummaryViews) -> String {
    let mut out = String::new();

    out.push_str("Indicator Performance Report\n");
    out.push_str("============================\n\n");

    if let Some(run) = run {
        out.push_str("1. Models\n");
        out.push_str(&format!("Tool: {} {}\n", run.tool_name, run.tool_version));
        out.push_str(&format!(
            "Family: {}, basis dimension k = {}\n",
            run.family, run.k
        ));
        out.push_str(&format!(
            "Split: {} (train fraction {}), {} train / {} test of {} time steps\n",
            run.split,
            format_f64_6(run.train_fraction),
            run.n_train,
            run.n_test,
            run.n_rows
        ));
        out.push_str(&format!(
            "Indicators: {}, pressures: {}\n",
            run.n_indicators, run.n_pressures
        ));
        push_failures(&mut out, "Trend model failures", &run.trend_failures);
        push_failures(&mut out, "Pressure model failures", &run.pressure_failures);
        out.push('\n');
    }

    out.push_str("2. Scores\n");
    out.push_str(&format!("Criterion groups: {:?}\n", views.groups));
    if views.overview.rows.is_empty() {
        out.push_str("No criteria scored.\n");
        return out;
    }
    let mut rows: Vec<&OverviewRow> = views.overview.rows.iter().collect();
    rows.sort_by(|a, b| {
        mean_percent(b)
            .partial_cmp(&mean_percent(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    for row in rows {
        let cells = views
            .overview
            .criteria
            .iter()
            .zip(row.percent.iter())
            .map(|(c, p)| match p {
                Some(p) => format!("{c}={p:.0}%"),
                None => format!("{c}=NA"),
            })
            .collect::<Vec<_>>()
            .join(" ");
        match row.nr_sign_press {
            Some(n) => out.push_str(&format!("{} [{} significant pressures]: {}\n", row.ind, n, cells)),
            None => out.push_str(&format!("{}: {}\n", row.ind, cells)),
        }
    }
    out
}

fn push_failures(out: &mut String, title: &str, failures: &[FitFailure]) {
    if failures.is_empty() {
        return;
    }
    out.push_str(&format!("{title}: {}\n", failures.len()));
    for f in failures {
        out.push_str(&format!("  - {}: {}\n", f.key.label(), f.error));
    }
}

/// Mean percent-of-maximum over the scored criteria, used for ordering only.
fn mean_percent(row: &OverviewRow) -> f64 {
    let present: Vec<f64> = row.percent.iter().flatten().copied().collect();
    if present.is_empty() {
        return f64::NEG_INFINITY;
    }
    present.iter().sum::<f64>() / present.len() as f64
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/text.rs"]
mod tests;
