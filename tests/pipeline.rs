use std::fs;
use std::path::PathBuf;

use plpred::config::ModelConfig;
use plpred::error::{OddsRejection, SkipReason};
use plpred::fixtures::{FixtureEntry, FixtureRecord, parse_fixture_records};
use plpred::markets::{MarketSpec, Selection};
use plpred::pipeline;
use plpred::ratings::RatingStore;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("fixture file should be readable")
}

fn store() -> RatingStore {
    RatingStore::from_json_str(&read_fixture("ratings.json")).expect("ratings should parse")
}

fn records() -> Vec<FixtureEntry> {
    parse_fixture_records(&read_fixture("fixtures.json")).expect("fixtures should parse")
}

#[test]
fn worked_example_backs_the_home_win() {
    let report = pipeline::run(&store(), records(), &ModelConfig::default()).unwrap();

    let pred = &report.predictions[0];
    assert!((pred.expected_goals.home - 2.12355).abs() < 1e-9);
    assert!((pred.expected_goals.away - 0.972).abs() < 1e-9);
    let home = pred
        .probability(&MarketSpec::MatchResult, Selection::Home)
        .unwrap();
    assert!((home - 0.6284).abs() < 1e-3);

    let pick = report.tips[0].tip.pick().expect("value on the home win");
    assert_eq!(pick.market, MarketSpec::MatchResult);
    assert_eq!(pick.selection, Selection::Home);
    assert!((pick.edge - (home - 1.0 / 1.8)).abs() < 1e-12);
    assert!(pick.edge > 0.02);
}

#[test]
fn skips_and_rejections_are_reported_not_fatal() {
    let report = pipeline::run(&store(), records(), &ModelConfig::default()).unwrap();

    assert_eq!(report.predictions.len(), 3);
    assert_eq!(report.tips.len(), 3);
    assert_eq!(report.anomalies, 0);

    let skipped: Vec<(usize, &SkipReason)> =
        report.skipped.iter().map(|s| (s.index, &s.reason)).collect();
    assert_eq!(
        skipped,
        vec![
            (
                2,
                &SkipReason::UnknownTeam {
                    team: "Everton".to_string()
                }
            ),
            (3, &SkipReason::MissingField { field: "kickoff" }),
        ]
    );

    // Aliased names resolve; the malformed over price is dropped on its own.
    assert_eq!(report.predictions[1].home_team, "Man Utd");
    assert_eq!(report.rejected_odds.len(), 1);
    assert_eq!(report.rejected_odds[0].index, 1);
    assert_eq!(report.rejected_odds[0].rejected.selection.as_deref(), Some("over"));
    assert_eq!(report.rejected_odds[0].rejected.reason, OddsRejection::NotNumeric);
    assert!(report.tips[1].tip.is_no_bet());

    assert_eq!(report.tips[2].home_team, "Chelsea");
    assert!(report.tips[2].tip.is_no_bet());
}

#[test]
fn report_json_shape() {
    let report = pipeline::run(&store(), records(), &ModelConfig::default()).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["predictions"][0]["homeTeam"], "Arsenal");
    assert!(json["predictions"][0]["markets"]["totals_2.5"]["over"].is_number());
    assert_eq!(json["tips"][0]["market"], "match_result");
    assert_eq!(json["tips"][0]["selection"], "home");
    assert_eq!(json["tips"][2]["tip"], "No Bet");
    assert_eq!(json["skipped"][0]["reason"]["kind"], "unknownTeam");
    assert_eq!(json["rejectedOdds"][0]["reason"], "notNumeric");
}

#[test]
fn csv_and_json_ratings_agree() {
    let from_csv = RatingStore::load_path(&fixture_path("ratings.csv")).unwrap();
    let from_json = RatingStore::load_path(&fixture_path("ratings.json")).unwrap();
    assert_eq!(from_csv.ratings(), from_json.ratings());
}

fn many_records(n: usize) -> Vec<FixtureRecord> {
    let teams = ["Arsenal", "Chelsea", "Manchester United", "Tottenham Hotspur"];
    (0..n)
        .map(|i| FixtureRecord {
            home_team: Some(teams[i % 4].to_string()),
            away_team: Some(teams[(i + 1 + (i / 4) % 3) % 4].to_string()),
            kickoff: Some(format!("2025-09-{:02}T15:00:00Z", i % 28 + 1)),
            odds: None,
        })
        .collect()
}

#[test]
fn parallel_run_keeps_input_order() {
    let input = many_records(240);
    let expected: Vec<(String, String)> = input
        .iter()
        .map(|r| (r.home_team.clone().unwrap(), r.away_team.clone().unwrap()))
        .collect();

    let cfg = ModelConfig {
        parallelism: Some(8),
        ..ModelConfig::default()
    };
    let report = pipeline::run(&store(), input, &cfg).unwrap();
    let got: Vec<(String, String)> = report
        .predictions
        .iter()
        .map(|p| (p.home_team.clone(), p.away_team.clone()))
        .collect();

    assert_eq!(report.skipped.len(), 0);
    assert_eq!(got, expected);
}

#[test]
fn output_is_byte_identical_across_pool_sizes() {
    let serial = ModelConfig {
        parallelism: Some(1),
        ..ModelConfig::default()
    };
    let wide = ModelConfig {
        parallelism: Some(6),
        ..ModelConfig::default()
    };
    let mut input = records();
    input.extend(many_records(60).into_iter().map(FixtureEntry::from));

    let a = pipeline::run(&store(), input.clone(), &serial).unwrap();
    let b = pipeline::run(&store(), input, &wide).unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn bad_market_config_fails_whole_run() {
    let cfg = ModelConfig {
        max_goals: 4,
        markets: vec![MarketSpec::totals(5.5).unwrap()],
        ..ModelConfig::default()
    };
    assert!(pipeline::run(&store(), records(), &cfg).is_err());
}

#[test]
fn one_bad_record_does_not_sink_the_batch() {
    let raw = r#"[
        {"homeTeam":"Arsenal","awayTeam":"Chelsea","kickoff":"2025-08-17T13:00:00Z",
         "odds":{"match_result":{"home":1.8},"btts":null}},
        {"homeTeam":42,"awayTeam":"Chelsea","kickoff":"2025-08-17T13:00:00Z"}
    ]"#;
    let entries = parse_fixture_records(raw).expect("outer shape is valid");
    let report = pipeline::run(&store(), entries, &ModelConfig::default()).unwrap();

    assert_eq!(report.predictions.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].index, 1);
    assert_eq!(report.skipped[0].home_team, None);
    assert_eq!(report.skipped[0].away_team.as_deref(), Some("Chelsea"));
    assert!(matches!(report.skipped[0].reason, SkipReason::Malformed { .. }));

    // The null market is rejected on its own; the home price still yields a tip.
    assert_eq!(report.rejected_odds.len(), 1);
    assert_eq!(report.rejected_odds[0].rejected.market, "btts");
    assert_eq!(report.rejected_odds[0].rejected.selection, None);
    assert_eq!(report.rejected_odds[0].rejected.reason, OddsRejection::NotAMarket);
    assert_eq!(report.tips[0].tip.pick().unwrap().selection, Selection::Home);
}

#[test]
fn unreadable_outer_shape_is_fatal() {
    assert!(parse_fixture_records(r#"{"matches": []}"#).is_err());
    assert!(parse_fixture_records("not json").is_err());
}
