use super::*;
use crate::pipeline::UnitKey;
use crate::pipeline::stage4_interaction::UnitInteraction;

fn series(id: usize, name: &str) -> NamedSeries {
    NamedSeries {
        id,
        name: name.to_string(),
        raw_name: name.to_string(),
        values: Vec::new(),
    }
}

fn key(id: usize, ind: &str, press: Option<&str>) -> UnitKey {
    UnitKey {
        id,
        ind: ind.to_string(),
        press: press.map(str::to_string),
    }
}

fn diag(key: UnitKey, p_val: f64, expl_dev: f64) -> ModelDiagnostics {
    ModelDiagnostics {
        key,
        n_obs: Some(30),
        edf: Some(2.1),
        p_val: Some(p_val),
        signif_code: None,
        r_sq: Some(expl_dev),
        expl_dev: Some(expl_dev),
        aic: Some(40.0),
        ks_test: Some(0.6),
        tac: Some(false),
        max_cooks: Some(0.2),
        nrmse: None,
    }
}

struct Fixture {
    template: CriteriaTemplate,
    profile: ScoringProfile,
    indicators: Vec<NamedSeries>,
    trend: Vec<ModelDiagnostics>,
    pressure: Vec<ModelDiagnostics>,
    interactions: Stage4Output,
    press_types: BTreeMap<String, String>,
}

impl Fixture {
    fn new() -> Self {
        let mut press_types = BTreeMap::new();
        press_types.insert("fishing".to_string(), "exploitation".to_string());
        Self {
            template: CriteriaTemplate::builtin(),
            profile: ScoringProfile::default_v1(),
            indicators: vec![series(1, "cod"), series(2, "sprat")],
            trend: vec![
                diag(key(1, "cod", None), 0.001, 0.6),
                diag(key(2, "sprat", None), 0.3, 0.1),
            ],
            pressure: vec![
                diag(key(1, "cod", Some("fishing")), 0.0001, 0.8),
                diag(key(1, "cod", Some("temp")), 0.02, 0.5),
                diag(key(2, "sprat", Some("fishing")), 0.4, 0.05),
                diag(key(2, "sprat", Some("temp")), 0.6, 0.02),
            ],
            interactions: Stage4Output {
                units: vec![
                    UnitInteraction {
                        key: key(1, "cod", Some("fishing")),
                        interaction: false,
                        tests: Vec::new(),
                    },
                    UnitInteraction {
                        key: key(1, "cod", Some("temp")),
                        interaction: true,
                        tests: Vec::new(),
                    },
                ],
            },
            press_types,
        }
    }

    fn score(&self, expert: Option<&[ExpertScore]>) -> Result<ScoreTable, InputError> {
        run_stage6(&Stage6Inputs {
            template: &self.template,
            profile: &self.profile,
            indicators: &self.indicators,
            trend: &self.trend,
            pressure: &self.pressure,
            interactions: &self.interactions,
            press_types: &self.press_types,
            expert,
        })
    }
}

fn expert(ind: &str, subcrit: &str, score: f64) -> ExpertScore {
    ExpertScore {
        ind: ind.to_string(),
        subcrit: subcrit.to_string(),
        score,
    }
}

#[test]
fn test_trend_and_pressure_scores() {
    let table = Fixture::new().score(None).unwrap();
    let cod = &table.records[0];
    let general = cod.general.as_ref().unwrap();
    assert_eq!(general.get("C8"), Some(&1.0));
    assert!(!general.contains_key("C11"));

    let pressures = cod.pressures.as_ref().unwrap();
    let fishing = &pressures[0];
    assert_eq!(fishing.press, "fishing");
    assert_eq!(fishing.press_type.as_deref(), Some("exploitation"));
    assert_eq!(fishing.get("C9_1"), 1.0);
    assert_eq!(fishing.get("C9_2"), 1.5);
    assert_eq!(fishing.get("C10_1"), 1.0);
    assert_eq!(fishing.get("C10_2"), 1.0);

    let temp = &pressures[1];
    assert_eq!(temp.press_type, None);
    assert_eq!(temp.get("C9_2"), 1.0);
    assert_eq!(temp.get("C10_2"), 0.0);

    let sprat = &table.records[1];
    assert_eq!(sprat.general.as_ref().unwrap().get("C8"), Some(&0.0));
    assert!(sprat.pressures.as_ref().unwrap().iter().all(|p| !p.is_significant()));
}

#[test]
fn test_residual_diagnostics_need_every_check() {
    let mut fx = Fixture::new();
    fx.pressure[0].max_cooks = Some(2.5);
    fx.pressure[1].ks_test = Some(0.01);
    let table = fx.score(None).unwrap();
    let pressures = table.records[0].pressures.as_ref().unwrap();
    assert_eq!(pressures[0].get("C10_1"), 0.0);
    assert_eq!(pressures[1].get("C10_1"), 0.0);
}

#[test]
fn test_no_pressure_models_leaves_pressures_absent() {
    let mut fx = Fixture::new();
    fx.pressure.clear();
    let table = fx.score(None).unwrap();
    assert!(table.records.iter().all(|r| r.pressures.is_none()));
}

#[test]
fn test_expert_scores_are_weighted_and_defaulted() {
    let fx = Fixture::new();
    let rows = vec![expert("cod", "C11_1", 2.0)];
    let table = fx.score(Some(&rows)).unwrap();
    assert_eq!(table.records[0].general.as_ref().unwrap().get("C11"), Some(&2.0));
    assert_eq!(table.records[1].general.as_ref().unwrap().get("C11"), Some(&0.0));
}

#[test]
fn test_expert_score_errors() {
    let fx = Fixture::new();
    for rows in [
        vec![expert("herring", "C11_1", 1.0)],
        vec![expert("cod", "C99_1", 1.0)],
        vec![expert("cod", "C8_1", 1.0)],
        vec![expert("cod", "C11_1", 3.0)],
        vec![expert("cod", "C11_1", 1.0), expert("cod", "C11_1", 2.0)],
    ] {
        assert!(fx.score(Some(&rows)).is_err(), "{rows:?}");
    }
}
