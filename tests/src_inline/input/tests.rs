use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

use super::names::sanitize_name;
use super::table::parse_cell;
use super::*;

fn write_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_series_table_with_missing_cells() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "ind.csv",
        "year,Cod SSB,herring\n1990,1.5,NA\n1991,,2.0\n1992,2.5,3.0\n",
    );
    let table = load_series_table(&path).unwrap();
    assert_eq!(table.time_col, "year");
    assert_eq!(table.time, vec![1990.0, 1991.0, 1992.0]);
    assert_eq!(table.series.len(), 2);
    assert_eq!(table.series[0].name, "Cod SSB");
    assert_eq!(table.series[0].values, vec![Some(1.5), None, Some(2.5)]);
    let herring = table.find("herring").unwrap();
    assert_eq!(herring.values.iter().flatten().count(), 2);
}

#[test]
fn test_load_gzipped_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("press.csv.gz");
    let mut enc = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
    enc.write_all(b"year,fishing\n2000,0.4\n2001,0.5\n").unwrap();
    enc.finish().unwrap();
    let table = load_series_table(&path).unwrap();
    assert_eq!(table.n_rows(), 2);
    assert_eq!(table.series[0].values, vec![Some(0.4), Some(0.5)]);
}

#[test]
fn test_unparseable_cell_reports_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "bad.csv", "year,a\n1990,1.0\n1991,abc\n");
    let err = load_series_table(&path).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("line 3"), "{msg}");
    assert!(msg.contains("abc"), "{msg}");
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_series_table(&dir.path().join("nope.csv")),
        Err(InputError::MissingInput(_))
    ));
}

#[test]
fn test_table_contract_violations() {
    let ok = Series::from_values("a", &[1.0, 2.0]);
    assert!(SeriesTable::new("t", vec![1.0, 2.0], vec![ok.clone()]).is_ok());
    assert!(SeriesTable::new("t", vec![2.0, 1.0], vec![ok.clone()]).is_err());
    assert!(SeriesTable::new("t", vec![1.0, 2.0, 3.0], vec![ok.clone()]).is_err());
    assert!(SeriesTable::new("t", vec![1.0, 2.0], vec![ok.clone(), ok.clone()]).is_err());
    assert!(SeriesTable::new("t", vec![1.0, 2.0], Vec::new()).is_err());
    assert!(SeriesTable::new("t", Vec::new(), vec![Series::new("a", Vec::new())]).is_err());
    let inf = Series::new("b", vec![Some(f64::INFINITY), None]);
    assert!(SeriesTable::new("t", vec![1.0, 2.0], vec![inf]).is_err());
}

#[test]
fn test_missing_time_value_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "t.csv", "year,a\n1990,1\nNA,2\n");
    assert!(matches!(
        load_series_table(&path),
        Err(InputError::InvalidInput(_))
    ));
}

#[test]
fn test_parse_cell() {
    assert_eq!(parse_cell(" 1.25 "), Ok(Some(1.25)));
    assert_eq!(parse_cell(""), Ok(None));
    assert_eq!(parse_cell("NA"), Ok(None));
    assert_eq!(parse_cell("nan"), Ok(None));
    assert!(parse_cell("1,5").is_err());
}

#[test]
fn test_sanitize_name() {
    assert_eq!(sanitize_name("Cod SSB"), "Cod_SSB");
    assert_eq!(sanitize_name("2nd-index"), "X2nd_index");
    assert_eq!(sanitize_name("ok_name1"), "ok_name1");
    assert_eq!(sanitize_name("  "), "X");
    assert_eq!(sanitize_name("temp(°C)"), "temp__C_");
}

#[test]
fn test_press_types_and_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "types.csv",
        "press,press_type\nfishing,Fishing\nsst,Climate\n",
    );
    let types = load_press_types(&path).unwrap();
    assert_eq!(types.get("sst").map(String::as_str), Some("Climate"));

    let dup = write_file(
        dir.path(),
        "dup.csv",
        "press,press_type\nsst,Climate\nsst,Other\n",
    );
    assert!(load_press_types(&dup).is_err());
}

#[test]
fn test_load_expert_scores() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "expert.csv",
        "ind,subcrit,score\nCod_SSB,C11_1,2\nherring,C11_1,0\n",
    );
    let rows = load_expert_scores(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0],
        ExpertScore {
            ind: "Cod_SSB".to_string(),
            subcrit: "C11_1".to_string(),
            score: 2.0
        }
    );
}
