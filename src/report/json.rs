use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde_json::{Value, json};

use crate::input::InputError;
use crate::input::table::open_maybe_gz;
use crate::model::scores::ScoreTable;
use crate::pipeline::stage7_summary::SummaryViews;
use crate::report::RunSummary;

pub fn render_summary_json(
    run: Option<&RunSummary>,
    views: &SummaryViews,
) -> Result<String, InputError> {
    let mut doc = json!({
        "tool": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "groups": views.groups,
        "overview": views.overview,
        "breakdown": views.breakdown,
        "matrix": views.matrix,
    });
    if let (Some(run), Value::Object(map)) = (run, &mut doc) {
        map.insert("run".to_string(), serde_json::to_value(run)?);
    }
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Writes the flat score table so `summary` can re-aggregate it later.
pub fn write_scores_json(path: &Path, scores: &ScoreTable) -> Result<(), InputError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), scores)?;
    Ok(())
}

pub fn load_scores_json(path: &Path) -> Result<ScoreTable, InputError> {
    if !path.exists() {
        return Err(InputError::MissingInput(path.display().to_string()));
    }
    let reader = open_maybe_gz(path)?;
    let table: ScoreTable = serde_json::from_reader(reader)?;
    Ok(table)
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/json.rs"]
mod tests;
