use std::fs;
use std::path::PathBuf;

use plant_recon::config::{MatcherMode, ReconConfig};
use plant_recon::matcher::{AssignmentSolver, ExactSolver, GreedySolver};
use plant_recon::normalizer::Normalizer;
use plant_recon::schema::{Entity, MatchType};
use plant_recon::scorer::CandidateScorer;
use plant_recon::{ingest, runner};

fn entity(id: usize, name: &str, fuel: &str, status: &str, region: &str, capacity: &str) -> Entity {
    Entity {
        id,
        name: name.to_string(),
        fuel: fuel.to_string(),
        status: status.to_string(),
        commissioning: String::new(),
        region: region.to_string(),
        capacity: capacity.to_string(),
    }
}

fn temp_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("plant_recon_{}_{}", test, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn scenario_empty_system_yields_one_missing_entry() {
    let config = ReconConfig::default();
    let references = vec![entity(0, "Plant X", "coal", "operational", "", "600")];
    let eval = runner::evaluate(&references, &[], &config, "ref", "sys").unwrap();

    assert_eq!(eval.report.coverage, 0.0);
    assert_eq!(eval.report.precision, 0.0);
    assert_eq!(eval.report.f1, 0.0);
    assert_eq!(eval.entries.len(), 1);
    assert_eq!(eval.entries[0].match_type, MatchType::Missing);
}

#[test]
fn scenario_diacritic_variant_with_capacity_drift_is_approximate() {
    let config = ReconConfig::default();
    let references = vec![entity(0, "Phả Lại 2", "coal", "operational", "", "600")];
    let systems = vec![entity(0, "Pha Lai 2", "coal", "operational", "", "620")];
    let eval = runner::evaluate(&references, &systems, &config, "ref", "sys").unwrap();

    assert_eq!(eval.entries.len(), 1);
    assert_eq!(eval.entries[0].match_type, MatchType::Approximate);
    assert_eq!(eval.report.coverage, 1.0);
    assert_eq!(eval.report.precision, 1.0);
    assert_eq!(eval.report.f1, 1.0);
}

#[test]
fn scenario_colliding_system_row_is_duplicate_not_hallucinated() {
    let config = ReconConfig::default();
    let references = vec![entity(0, "Plant X", "coal", "operational", "", "600")];
    let systems = vec![
        entity(0, "Plant X", "coal", "operational", "", "600"),
        entity(1, "Plánt X", "coal", "operational", "", "600"),
    ];
    let eval = runner::evaluate(&references, &systems, &config, "ref", "sys").unwrap();

    let duplicates: Vec<_> = eval
        .entries
        .iter()
        .filter(|e| e.match_type == MatchType::Duplicate)
        .collect();
    assert_eq!(duplicates.len(), 1);
    // The duplicate is excluded from precision's denominator.
    assert_eq!(eval.report.n_system, 1);
    assert_eq!(eval.report.precision, 1.0);
    assert_eq!(eval.report.coverage, 1.0);
}

#[test]
fn conservation_holds_for_mixed_inventories() {
    let config = ReconConfig::default();
    let references = vec![
        entity(0, "Pha Lai 2", "coal", "operational", "Hai Duong", "600"),
        entity(1, "Vung Ang 1", "coal", "operational", "Ha Tinh", "1200"),
        entity(2, "O Mon 1", "oil", "operational", "Can Tho", "660"),
    ];
    let systems = vec![
        entity(0, "Pha Lai II", "coal", "operating", "Hai Duong", "620"),
        entity(1, "Nowhere Plant", "gas", "planned", "", "750"),
        entity(2, "Nowhere  Plant", "gas", "planned", "", "750"),
    ];
    let eval = runner::evaluate(&references, &systems, &config, "ref", "sys").unwrap();

    let count = |t: MatchType| eval.entries.iter().filter(|e| e.match_type == t).count();
    let matched = eval
        .entries
        .iter()
        .filter(|e| e.match_type.is_matched())
        .count();
    assert_eq!(matched + count(MatchType::Missing), references.len());
    assert_eq!(
        matched + count(MatchType::Hallucinated) + count(MatchType::Duplicate),
        systems.len()
    );
    // Every reference and system id appears exactly once.
    assert_eq!(eval.entries.len(), matched + count(MatchType::Missing) + count(MatchType::Hallucinated) + count(MatchType::Duplicate));
}

#[test]
fn adding_a_correct_entity_cannot_decrease_coverage() {
    let config = ReconConfig::default();
    let references = vec![
        entity(0, "Pha Lai 2", "coal", "operational", "", "600"),
        entity(1, "Vung Ang 1", "coal", "operational", "", "1200"),
    ];
    let smaller = vec![entity(0, "Pha Lai 2", "coal", "operational", "", "600")];
    let larger = vec![
        entity(0, "Pha Lai 2", "coal", "operational", "", "600"),
        entity(1, "Vung Ang 1", "coal", "operational", "", "1200"),
    ];
    let before = runner::evaluate(&references, &smaller, &config, "ref", "sys").unwrap();
    let after = runner::evaluate(&references, &larger, &config, "ref", "sys").unwrap();

    assert!(after.report.n_matched >= before.report.n_matched);
    assert!(after.report.coverage >= before.report.coverage);
}

#[test]
fn exact_matcher_never_scores_below_greedy() {
    let config = ReconConfig::default();
    let normalizer = Normalizer::from_rules(&config.rules).unwrap();
    // Contested instance: one system entity is the best candidate of two
    // different reference entities.
    let references = vec![
        entity(0, "Duyen Hai 1", "coal", "operational", "", "1245"),
        entity(1, "Duyen Hai 3", "coal", "operational", "", "1245"),
    ];
    let systems = vec![
        entity(0, "Duyen Hai 3", "coal", "operational", "", "1245"),
        entity(1, "Duyen Hai 3 Extension", "coal", "operational", "", "688"),
    ];
    let ref_norm: Vec<_> = references.iter().map(|e| normalizer.normalize(e)).collect();
    let sys_norm: Vec<_> = systems.iter().map(|e| normalizer.normalize(e)).collect();
    let mut scorer = CandidateScorer::new(&config);
    let candidates = scorer.generate(&ref_norm, &sys_norm);

    let exact = ExactSolver
        .solve(references.len(), systems.len(), &candidates)
        .unwrap();
    let greedy = GreedySolver {
        high_confidence: config.greedy_threshold,
    }
    .solve(references.len(), systems.len(), &candidates)
    .unwrap();

    assert!(exact.total_score(&candidates) >= greedy.total_score(&candidates));
    assert!(exact.optimal);
    assert!(!greedy.optimal);
}

#[test]
fn greedy_mode_is_labeled_in_the_report() {
    let config = ReconConfig {
        matcher_mode: MatcherMode::Greedy,
        ..ReconConfig::default()
    };
    let references = vec![entity(0, "Pha Lai 2", "coal", "operational", "", "600")];
    let systems = vec![entity(0, "Pha Lai 2", "coal", "operational", "", "600")];
    let eval = runner::evaluate(&references, &systems, &config, "ref", "sys").unwrap();
    assert!(!eval.report.optimal);
}

#[test]
fn full_pipeline_outputs_are_byte_identical_across_runs() {
    let config = ReconConfig::default();
    let dir = temp_dir("determinism");
    let references = vec![
        entity(0, "Phả Lại 2", "coal", "operational", "Hải Dương", "600"),
        entity(1, "Ô Môn I", "oil", "operational", "Cần Thơ", "660"),
        entity(2, "Vũng Áng 1", "coal", "operational", "Hà Tĩnh", "1200"),
    ];
    let systems = vec![
        entity(0, "Pha Lai 2", "coal", "operational", "Hai Duong", "620"),
        entity(1, "O Mon 1", "gas", "operational", "Can Tho", "660"),
        entity(2, "Imaginary Station", "coal", "planned", "", "2000"),
    ];

    let mut outputs = Vec::new();
    for pass in 0..2 {
        let eval = runner::evaluate(&references, &systems, &config, "ref", "sys").unwrap();
        let table_path = dir.join(format!("table_{}.csv", pass));
        let report_path = dir.join(format!("report_{}.json", pass));
        runner::write_reconciliation_csv(&eval.entries, &table_path).unwrap();
        runner::write_metrics_json(&eval.report, &report_path).unwrap();
        outputs.push((
            fs::read(&table_path).unwrap(),
            fs::read(&report_path).unwrap(),
        ));
    }
    assert_eq!(outputs[0].0, outputs[1].0);
    assert_eq!(outputs[0].1, outputs[1].1);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn csv_files_round_trip_through_the_pipeline() {
    let dir = temp_dir("roundtrip");
    let ref_path = dir.join("reference.csv");
    let sys_path = dir.join("system.csv");
    fs::write(
        &ref_path,
        "name,fuel,status,cod,province,capacity_mwe\n\
         Pha Lai 2,coal,operational,2002,Hai Duong,600\n\
         Vung Ang 1,coal,operational,2014,Ha Tinh,1200\n",
    )
    .unwrap();
    fs::write(
        &sys_path,
        "Plant Name,Fuel Type,Stage,Location,Capacity\n\
         Pha Lai 2,Coal,Operating,Hai Duong,620 MW\n",
    )
    .unwrap();

    let references = ingest::load_reference_csv(&ref_path).unwrap();
    let systems = ingest::load_system_csv(&sys_path).unwrap();
    assert_eq!(references.len(), 2);
    assert_eq!(systems.len(), 1);

    let config = ReconConfig::default();
    let eval = runner::evaluate(&references, &systems, &config, "ref", "sys").unwrap();
    assert_eq!(eval.report.n_matched, 1);
    assert_eq!(eval.report.n_missing, 1);
    assert_eq!(eval.report.coverage, 0.5);
    assert_eq!(eval.report.precision, 1.0);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn reference_with_missing_columns_is_a_schema_error() {
    let dir = temp_dir("schema_error");
    let ref_path = dir.join("bad_reference.csv");
    fs::write(&ref_path, "name,fuel\nPlant A,coal\n").unwrap();
    let err = ingest::load_reference_csv(&ref_path).unwrap_err();
    assert!(err.to_string().contains("missing required columns"));
    fs::remove_dir_all(&dir).ok();
}
