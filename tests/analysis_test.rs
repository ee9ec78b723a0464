use dcu_dashboard::analysis::{analyze, Analysis, AttentionReason, SUBSET_NAMES};
use dcu_dashboard::config::AnalysisConfig;
use dcu_dashboard::row::Row;

fn row(cells: &[(&str, &str)]) -> Row {
    cells.iter().copied().collect()
}

fn run(rows: Vec<Row>) -> Analysis {
    analyze(rows.into(), &AnalysisConfig::default()).expect("non-empty input yields an analysis")
}

fn ids(analysis: &Analysis, subset: &str) -> Vec<String> {
    let selection = analysis.selection(subset).expect("known subset");
    analysis
        .rows(&selection)
        .filter_map(|r| r.get_str("DCU").map(|s| s.into_owned()))
        .collect()
}

#[test]
fn end_to_end_two_dcus() {
    let analysis = run(vec![
        row(&[
            ("DCU", "A"),
            ("Status", "Online"),
            ("Meters 01.01.2024", "100"),
            ("Meters 02.01.2024", "900"),
        ]),
        row(&[
            ("DCU", "B"),
            ("Status", "Offline"),
            ("Meters 01.01.2024", "0"),
            ("Meters 02.01.2024", "0"),
        ]),
    ]);

    let latest = analysis.latest_column.as_ref().expect("latest column");
    assert_eq!(latest.name, "Meters 02.01.2024");
    assert_eq!(ids(&analysis, "overloaded"), vec!["A"], "900 > 850 is overloaded");
    assert_eq!(ids(&analysis, "no-meters"), vec!["B"]);
    assert_eq!(ids(&analysis, "online"), vec!["A"]);
    assert_eq!(ids(&analysis, "offline"), vec!["B"]);
    assert!(analysis.status.unregistered.is_empty());
    assert_eq!(analysis.total, 2);
}

#[test]
fn latest_column_is_the_largest_token_as_text() {
    let analysis = run(vec![row(&[
        ("DCU", "A"),
        ("Meters 01.03.2024", "1"),
        ("Meters 15.01.2024", "2"),
        ("Meters 01.12.2023", "3"),
    ])]);
    assert_eq!(
        analysis.latest_column.map(|c| c.name),
        Some("Meters 15.01.2024".to_string())
    );

    let padded = run(vec![row(&[
        ("DCU", "A"),
        ("Meters 04.03.2024", "1"),
        ("Meters 05.03.2024", "2"),
    ])]);
    assert_eq!(
        padded.latest_column.map(|c| c.token),
        Some("05.03.2024".to_string()),
        "zero-padded single-digit days order correctly"
    );
}

#[test]
fn no_reading_coercions() {
    // the first row decides the columns, so it carries the reading
    let mut rows = vec![
        row(&[("DCU", "five"), ("Status", "online"), ("Meters 01.01.2024", "5")]),
        row(&[("DCU", "missing"), ("Status", "online")]),
    ];
    for (id, value) in [("empty", ""), ("na", "#N/D"), ("zero", "0"), ("text", "abc")] {
        rows.push(row(&[("DCU", id), ("Status", "online"), ("Meters 01.01.2024", value)]));
    }

    let analysis = run(rows);
    assert_eq!(
        ids(&analysis, "no-meters"),
        vec!["missing", "empty", "na", "zero", "text"]
    );
    assert_eq!(
        ids(&analysis, "online-no-meters"),
        vec!["missing", "empty", "na", "zero", "text"]
    );
}

#[test]
fn load_thresholds_are_strict() {
    let analysis = run(vec![
        row(&[("DCU", "at-850"), ("Meters 01.01.2024", "850")]),
        row(&[("DCU", "at-851"), ("Meters 01.01.2024", "851")]),
        row(&[("DCU", "at-849"), ("Meters 01.01.2024", "849")]),
        row(&[("DCU", "at-50"), ("Meters 01.01.2024", "50")]),
        row(&[("DCU", "at-49"), ("Meters 01.01.2024", "49")]),
        row(&[("DCU", "at-0"), ("Meters 01.01.2024", "0")]),
    ]);

    assert_eq!(ids(&analysis, "overloaded"), vec!["at-851"]);
    assert_eq!(
        ids(&analysis, "underloaded"),
        vec!["at-49"],
        "zero is a missing reading, not an underload"
    );
}

#[test]
fn collection_rate_bands() {
    let analysis = run(vec![
        row(&[("DCU", "A"), ("Taxa de coleta", "95%")]),
        row(&[("DCU", "B"), ("Taxa de coleta", "94,5")]),
        row(&[("DCU", "C"), ("Taxa de coleta", "98%")]),
        row(&[("DCU", "D"), ("Taxa de coleta", "#N/D")]),
    ]);

    let bands = analysis.collection_rate.as_ref().expect("rate column present");
    assert_eq!(bands.with_rate.len(), 3);
    assert_eq!(ids(&analysis, "between-95-98"), vec!["A"]);
    assert_eq!(ids(&analysis, "below-95"), vec!["B"]);
    assert_eq!(ids(&analysis, "above-98"), vec!["C"]);
}

#[test]
fn infinite_rates_fall_in_no_band() {
    let analysis = run(vec![
        row(&[("DCU", "A"), ("Taxa de coleta", "inf")]),
        row(&[("DCU", "B"), ("Taxa de coleta", "infinity%")]),
        row(&[("DCU", "C"), ("Taxa de coleta", "99%")]),
    ]);

    let bands = analysis.collection_rate.as_ref().expect("rate column present");
    assert_eq!(bands.with_rate.len(), 1);
    assert_eq!(ids(&analysis, "above-98"), vec!["C"]);
    assert!(ids(&analysis, "below-95").is_empty());
}

#[test]
fn overflowing_reading_is_overloaded() {
    let analysis = run(vec![row(&[("DCU", "A"), ("Meters 01.01.2024", "99999999999999999999")])]);
    assert_eq!(ids(&analysis, "overloaded"), vec!["A"]);
    assert!(analysis.load.no_reading.is_empty());
}

#[test]
fn no_rate_column_means_no_bands() {
    let analysis = run(vec![row(&[("DCU", "A"), ("Meters 01.01.2024", "10")])]);
    assert!(analysis.collection_rate.is_none());
    assert!(ids(&analysis, "below-95").is_empty());
}

#[test]
fn deviation_ties_keep_input_order() {
    let analysis = run(vec![
        row(&[("DCU", "first"), ("Meters 01.01.2024", "5"), ("Meters 02.01.2024", "15")]),
        row(&[("DCU", "second"), ("Meters 01.01.2024", "15"), ("Meters 02.01.2024", "5")]),
        row(&[("DCU", "third"), ("Meters 01.01.2024", "5"), ("Meters 02.01.2024", "15")]),
    ]);

    let ranked: Vec<&str> = analysis
        .top_deviations
        .iter()
        .map(|h| h.id.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(ranked, vec!["first", "second", "third"]);
    assert!(analysis.top_deviations.iter().all(|h| h.average == 10.0));
    assert!(analysis.top_deviations.iter().all(|h| h.deviation == 5.0));
    assert!(analysis.top_deviations.iter().all(|h| h.deviation_percent == 50.0));
}

#[test]
fn ranking_skips_zero_averages_and_caps_at_top_n() {
    let mut rows = vec![row(&[("DCU", "silent"), ("Meters 01.01.2024", "0")])];
    for i in 0..12 {
        rows.push(row(&[
            ("DCU", &format!("D{}", i)),
            ("Meters 01.01.2024", &format!("{}", 100 + i)),
        ]));
    }

    let analysis = run(rows);
    assert_eq!(analysis.history.len(), 13);
    assert_eq!(analysis.top_deviations.len(), 10);
    assert!(analysis.top_deviations.iter().all(|h| h.id.as_deref() != Some("silent")));
    assert_eq!(analysis.trend.len(), 1);
    assert_eq!(analysis.trend[0].values.len(), 10);
}

#[test]
fn annotations_are_grouped_and_filtered() {
    let analysis = run(vec![
        row(&[("DCU", "A"), ("Comentário", "Sem sinal")]),
        row(&[("DCU", "B"), ("Comentário", "Troca")]),
        row(&[("DCU", "C"), ("Comentário", "Sem sinal")]),
        row(&[("DCU", "D"), ("Comentário", "Interno: revisar")]),
        row(&[("DCU", "E"), ("Comentário", "null")]),
        row(&[("DCU", "F"), ("Comentário", "")]),
    ]);

    let groups: Vec<(&str, usize)> = analysis
        .annotations
        .iter()
        .map(|g| (g.name.as_str(), g.count))
        .collect();
    assert_eq!(groups, vec![("Sem sinal", 2), ("Troca", 1)]);
}

#[test]
fn attention_and_in_study_cases() {
    let analysis = run(vec![
        row(&[
            ("DCU", "A"),
            ("Status", "offline"),
            ("Meters 01.01.2024", "10"),
            ("Comentário", "Em estudo"),
            ("Status da Análise", "Identificado"),
        ]),
        row(&[
            ("DCU", "B"),
            ("Status", "não registrado"),
            ("Meters 01.01.2024", "10"),
            ("Comentário", "em estudo"),
            ("Status da Análise", "solucionado"),
        ]),
        row(&[("DCU", "C"), ("Status", "online"), ("Meters 01.01.2024", "#N/D")]),
        row(&[("DCU", "D"), ("Status", "online"), ("Meters 01.01.2024", "300")]),
    ]);

    assert_eq!(analysis.attention.total, 3);
    assert_eq!(analysis.attention.share, 75.0);
    assert_eq!(ids(&analysis, "attention"), vec!["A", "B", "C"]);

    assert_eq!(ids(&analysis, "in-study"), vec!["A", "B"]);
    assert_eq!(analysis.in_study.share, 67, "2 of 3 attention cases, rounded");
    assert_eq!(analysis.in_study.identified.len(), 1);
    assert_eq!(analysis.in_study.identified[0].reason, AttentionReason::Offline);
    assert_eq!(analysis.in_study.solved.len(), 1);
    assert_eq!(analysis.in_study.solved[0].reason, AttentionReason::Unregistered);
    assert!(analysis.in_study.in_analysis.is_empty());

    assert_eq!(analysis.meters_by_status.operational, 300);
    assert_eq!(analysis.meters_by_status.unreachable, 10);
    assert_eq!(analysis.meters_by_status.unregistered, 10);
}

#[test]
fn lowest_rates_exclude_in_study_entities() {
    let analysis = run(vec![
        row(&[("DCU", "A"), ("Taxa de coleta", "90%"), ("Meters 01.01.2024", "100")]),
        row(&[("DCU", "B"), ("Taxa de coleta", "80%"), ("Comentário", "em estudo")]),
        row(&[("DCU", "C"), ("Taxa de coleta", "85%"), ("Meters 01.01.2024", "0")]),
    ]);

    let lowest: Vec<&str> = analysis
        .lowest_rates
        .iter()
        .map(|e| e.id.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(lowest, vec!["C", "A"]);

    let scatter: Vec<&str> = analysis
        .load_vs_rate
        .iter()
        .map(|e| e.id.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(scatter, vec!["A"], "only entities with meters are plotted");
}

#[test]
fn map_points_apply_the_denylist() {
    let analysis = run(vec![
        row(&[("DCU", "A"), ("LAT", "-19.9"), ("LONG", "-43.9"), ("Status", "online")]),
        row(&[("DCU", "B"), ("LAT", "-20.1"), ("LONG", "-44.0")]),
        row(&[("DCU", "C"), ("LAT", "0"), ("LONG", "-44.0")]),
    ]);

    let config = AnalysisConfig {
        map_denylist: vec!["B".to_string()],
        ..AnalysisConfig::default()
    };
    let points = analysis.map_points(&config);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].id.as_deref(), Some("A"));
    assert_eq!(points[0].state.as_deref(), Some("online"));

    assert_eq!(analysis.map_points(&AnalysisConfig::default()).len(), 2);
}

#[test]
fn every_subset_name_resolves() {
    let analysis = run(vec![row(&[("DCU", "A")])]);
    for name in SUBSET_NAMES {
        assert!(analysis.selection(name).is_some(), "subset {} should resolve", name);
    }
    assert!(analysis.selection("everything").is_none());
    assert_eq!(ids(&analysis, "all"), vec!["A"]);
}

#[test]
fn empty_input_has_no_analysis() {
    assert!(analyze(Vec::new().into(), &AnalysisConfig::default()).is_none());
}

#[test]
fn analysis_serializes_records_and_partitions() {
    let analysis = run(vec![row(&[("DCU", "A"), ("Status", "online"), ("Meters 01.01.2024", "900")])]);
    let json = serde_json::to_value(&analysis).expect("analysis serializes");

    assert_eq!(json["records"][0]["DCU"], "A");
    assert_eq!(json["load"]["overloaded"], serde_json::json!([0]));
    assert_eq!(json["latest_column"]["token"], "01.01.2024");
}
