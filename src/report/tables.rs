use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::input::InputError;
use crate::pipeline::FitResult;
use crate::pipeline::stage5_diagnostics::ModelDiagnostics;
use crate::pipeline::stage7_summary::{Overview, PressureBreakdown, ScoreMatrix};
use crate::report::format_opt;

fn csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>, InputError> {
    let file = File::create(path)?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

fn finish<W: Write>(mut wtr: csv::Writer<W>) -> Result<(), InputError> {
    wtr.flush()?;
    Ok(())
}

pub fn write_overview_csv(path: &Path, overview: &Overview) -> Result<(), InputError> {
    let mut wtr = csv_writer(path)?;
    let with_count = overview.rows.iter().any(|r| r.nr_sign_press.is_some());
    let mut header = vec!["id".to_string(), "ind".to_string()];
    if with_count {
        header.push("nr_sign_press".to_string());
    }
    header.extend(overview.criteria.iter().cloned());
    header.extend(overview.criteria.iter().map(|c| format!("{c}_in_perc")));
    wtr.write_record(&header)?;

    for row in &overview.rows {
        let mut rec = vec![row.id.to_string(), row.ind.clone()];
        if with_count {
            rec.push(
                row.nr_sign_press
                    .map_or_else(|| "NA".to_string(), |n| n.to_string()),
            );
        }
        rec.extend(row.scores.iter().map(|s| format_opt(*s)));
        rec.extend(row.percent.iter().map(|p| format_opt(*p)));
        wtr.write_record(&rec)?;
    }
    finish(wtr)
}

pub fn write_breakdown_csv(path: &Path, breakdown: &PressureBreakdown) -> Result<(), InputError> {
    let mut wtr = csv_writer(path)?;
    let mut header = vec![
        "id".to_string(),
        "ind".to_string(),
        "press".to_string(),
        "press_type".to_string(),
    ];
    header.extend(breakdown.subcriteria.iter().cloned());
    header.extend(breakdown.criteria.iter().cloned());
    header.extend(breakdown.criteria.iter().map(|c| format!("{c}_in_perc")));
    wtr.write_record(&header)?;

    for row in &breakdown.rows {
        let mut rec = vec![
            row.id.to_string(),
            row.ind.clone(),
            row.press.clone(),
            row.press_type.clone().unwrap_or_else(|| "NA".to_string()),
        ];
        rec.extend(row.subscores.iter().map(|v| format_opt(Some(*v))));
        rec.extend(row.sums.iter().map(|v| format_opt(Some(*v))));
        rec.extend(row.percent.iter().map(|v| format_opt(Some(*v))));
        wtr.write_record(&rec)?;
    }
    finish(wtr)
}

pub fn write_matrix_csv(path: &Path, matrix: &ScoreMatrix) -> Result<(), InputError> {
    let mut wtr = csv_writer(path)?;
    let mut header = vec![String::new()];
    header.extend(matrix.columns.iter().cloned());
    wtr.write_record(&header)?;
    for (name, values) in matrix.rows.iter().zip(matrix.values.iter()) {
        let mut rec = vec![name.clone()];
        rec.extend(values.iter().map(|v| format_opt(*v)));
        wtr.write_record(&rec)?;
    }
    finish(wtr)
}

pub fn write_diagnostics_csv(path: &Path, diags: &[ModelDiagnostics]) -> Result<(), InputError> {
    let mut wtr = csv_writer(path)?;
    wtr.write_record([
        "id",
        "ind",
        "press",
        "n_obs",
        "edf",
        "p_val",
        "signif_code",
        "r_sq",
        "expl_dev",
        "aic",
        "ks_test",
        "tac",
        "max_cooks",
        "nrmse",
    ])?;
    for d in diags {
        wtr.write_record([
            d.key.id.to_string(),
            d.key.ind.clone(),
            d.key.press.clone().unwrap_or_else(|| "NA".to_string()),
            d.n_obs.map_or_else(|| "NA".to_string(), |n| n.to_string()),
            format_opt(d.edf),
            format_opt(d.p_val),
            d.signif_code.unwrap_or("NA").to_string(),
            format_opt(d.r_sq),
            format_opt(d.expl_dev),
            format_opt(d.aic),
            format_opt(d.ks_test),
            d.tac.map_or_else(|| "NA".to_string(), |t| t.to_string()),
            format_opt(d.max_cooks),
            format_opt(d.nrmse),
        ])?;
    }
    finish(wtr)
}

/// Long format: one line per unit and time step of its training window.
pub fn write_predictions_csv(path: &Path, results: &[FitResult]) -> Result<(), InputError> {
    let mut wtr = csv_writer(path)?;
    wtr.write_record([
        "id",
        "ind",
        "press",
        "time",
        "pred",
        "ci_low",
        "ci_up",
        "train_na",
        "train_na_reconciled",
    ])?;
    for r in results {
        let w = &r.window;
        for i in 0..w.time.len() {
            wtr.write_record([
                r.key.id.to_string(),
                r.key.ind.clone(),
                r.key.press.clone().unwrap_or_else(|| "NA".to_string()),
                w.time[i].to_string(),
                format_opt(w.pred[i]),
                format_opt(w.ci_low[i]),
                format_opt(w.ci_up[i]),
                w.train_na[i].to_string(),
                w.train_na_reconciled
                    .as_ref()
                    .map_or_else(|| "NA".to_string(), |m| m[i].to_string()),
            ])?;
        }
    }
    finish(wtr)
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/tables.rs"]
mod tests;
