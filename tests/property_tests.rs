//! Property-Based Tests for Export Acceptance
//!
//! Uses proptest for invariants of the pure helpers:
//! - URL joining never doubles or drops separators
//! - SQL fixture parsing keeps exactly the executable lines
//! - date-derived names stay consistent with each other

use proptest::prelude::*;

// =============================================================================
// url_path_join Property Tests
// =============================================================================

use export_acceptance::target::{Target, url_path_join};

/// Path segments without slashes, as config values usually are.
fn segment_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.-]{1,12}"
}

fn base_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("s3://bucket".to_string()),
        Just("s3://bucket/".to_string()),
        Just("s3://bucket/prefix/".to_string()),
        Just("/tmp/out".to_string()),
        "[a-z]{1,8}".prop_map(|b| format!("s3://{}/out", b)),
    ]
}

proptest! {
    /// Joined URL ends with the last segment
    #[test]
    fn join_ends_with_last_segment(
        base in base_strategy(),
        parts in prop::collection::vec(segment_strategy(), 1..5),
    ) {
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        let joined = url_path_join(&base, &refs);
        let expected_tail = format!("/{}", parts[parts.len() - 1]);
        prop_assert!(joined.ends_with(&expected_tail));
    }

    /// No empty path segments apart from the scheme separator
    #[test]
    fn join_has_no_double_slash(
        base in base_strategy(),
        parts in prop::collection::vec(segment_strategy(), 0..5),
    ) {
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        let joined = url_path_join(&base, &refs);
        let after_scheme = joined.split_once("://").map_or(joined.as_str(), |(_, rest)| rest);
        prop_assert!(!after_scheme.contains("//"));
    }

    /// Trailing slashes on segments do not change the result
    #[test]
    fn join_ignores_surrounding_slashes(
        base in base_strategy(),
        part in segment_strategy(),
    ) {
        let slashed = format!("/{}/", part);
        prop_assert_eq!(
            url_path_join(&base, &[part.as_str()]),
            url_path_join(&base, &[slashed.as_str()])
        );
    }

    /// Joined S3 URLs still parse to the same bucket
    #[test]
    fn join_preserves_bucket(
        bucket in "[a-z][a-z0-9-]{2,20}",
        parts in prop::collection::vec("[A-Za-z0-9_-]{1,12}", 1..4),
    ) {
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        let joined = url_path_join(&format!("s3://{}/", bucket), &refs);
        match Target::parse(&joined) {
            Ok(Target::S3(location)) => {
                prop_assert_eq!(location.bucket, bucket);
                prop_assert_eq!(location.key, parts.join("/"));
            }
            other => prop_assert!(false, "unexpected parse result {:?}", other),
        }
    }
}

// =============================================================================
// SQL Fixture Parsing Property Tests
// =============================================================================

use export_acceptance::database::parse_sql_statements;

fn sql_line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("   ".to_string()),
        "-- [a-z ]{0,20}",
        "INSERT INTO t VALUES \\([0-9]{1,4}\\);",
        Just("DROP TABLE IF EXISTS t;".to_string()),
    ]
}

proptest! {
    /// Every parsed statement is a non-comment, non-blank source line
    #[test]
    fn parse_keeps_only_statements(lines in prop::collection::vec(sql_line_strategy(), 0..30)) {
        let text = lines.join("\n");
        let statements = parse_sql_statements(&text);

        let expected = lines
            .iter()
            .filter(|l| !l.starts_with("--") && !l.trim().is_empty())
            .count();
        prop_assert_eq!(statements.len(), expected);

        for statement in &statements {
            prop_assert_eq!(&statement.text, &lines[statement.line - 1]);
        }
    }

    /// Line numbers strictly increase
    #[test]
    fn parse_line_numbers_increase(lines in prop::collection::vec(sql_line_strategy(), 0..30)) {
        let statements = parse_sql_statements(&lines.join("\n"));
        for pair in statements.windows(2) {
            prop_assert!(pair[0].line < pair[1].line);
        }
    }
}

// =============================================================================
// Layout Property Tests
// =============================================================================

use chrono::{TimeZone, Utc};
use export_acceptance::config::{AcceptanceConfig, HarnessSettings};
use export_acceptance::layout::ExportLayout;

fn config() -> AcceptanceConfig {
    AcceptanceConfig::from_json(
        r#"{
            "identifier": "prop",
            "tasks_output_url": "s3://tasks/out",
            "credentials_file_url": "/creds.json",
            "job_flow_name": "flow",
            "tasks_branch": "main",
            "tasks_log_path": "/logs",
            "connection_user": "hadoop",
            "exporter_output_bucket": "exports"
        }"#,
    )
    .unwrap()
}

proptest! {
    /// The day prefix is the day of the export date
    #[test]
    fn external_prefix_matches_export_date(
        year in 2000i32..2100,
        month in 1u32..=12,
        day in 1u32..=28,
        hour in 0u32..24,
    ) {
        let now = Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap();
        let layout = ExportLayout::new(&HarnessSettings::default(), &config(), now);
        let package = layout.package(now);
        prop_assert_eq!(layout.external_prefix.len(), 2);
        let day_suffix = format!("-{}", layout.external_prefix);
        prop_assert!(package.export_date.ends_with(&day_suffix));
        let expected_archive = format!("edx-{}.zip", package.export_date);
        prop_assert_eq!(package.archive_filename, expected_archive);
    }

    /// The package day never changes the day prefix chosen at start
    #[test]
    fn package_day_independent_of_prefix(
        start_day in 1u32..=27,
        later_hours in 0i64..48,
    ) {
        let start = Utc.with_ymd_and_hms(2014, 3, start_day, 12, 0, 0).unwrap();
        let finished = start + chrono::Duration::hours(later_hours);
        let layout = ExportLayout::new(&HarnessSettings::default(), &config(), start);
        let package = layout.package(finished);
        prop_assert_eq!(layout.external_prefix, format!("{:02}", start_day));
        let expected_id = format!("edx-{}", finished.format("%Y-%m-%d"));
        prop_assert_eq!(package.export_id, expected_id);
    }
}
