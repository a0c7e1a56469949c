use variant_query::catalog::Catalog;
use variant_query::config::CliOverrides;
use variant_query::engine::{Engine, Value};
use variant_query::executor::{Destination, OutputOptions, SelectRequest, VariantQuery};

use super::common::TestProject;

fn run_query<R>(
    project: &TestProject,
    overrides: CliOverrides,
    f: impl FnOnce(&mut VariantQuery<'_>) -> R,
) -> (R, String) {
    let context = project.context(overrides);
    let (mut engine, mut catalog) = context.open().unwrap();
    let mut out = Vec::new();
    let result = {
        let mut query = VariantQuery::new(&mut engine, &mut catalog, &context.config, &mut out);
        f(&mut query)
    };
    (result, String::from_utf8(out).unwrap())
}

fn request(conditions: &[&str], samples: &[&str]) -> SelectRequest {
    SelectRequest {
        conditions: conditions.iter().map(|c| c.to_string()).collect(),
        samples: samples.iter().map(|s| s.to_string()).collect(),
        ..SelectRequest::new("variant")
    }
}

#[test]
fn test_count_variants_in_attached_source() {
    let project = TestProject::new();
    let mut req = request(&["dbSNP.name IS NOT NULL"], &[]);
    req.count = true;

    let (selected, out) = run_query(&project, CliOverrides::default(), |q| q.select(&req));
    assert_eq!(selected.unwrap().count, Some(3));
    assert_eq!(out, "3\n");

    let (excluded, out) = run_query(&project, CliOverrides::default(), |q| q.exclude(&req));
    assert_eq!(excluded.unwrap().count, Some(5));
    assert_eq!(out, "5\n");
}

#[test]
fn test_sample_filter_inline_and_batched_agree() {
    let project = TestProject::new();
    for samples in [&["aff = 1"][..], &["sample_name LIKE 'U%'"][..]] {
        let mut req = request(&[], samples);
        req.count = true;

        let (inline, _) = run_query(&project, CliOverrides::default(), |q| q.select(&req));
        let batched_settings = CliOverrides {
            inline_threshold: Some(1),
            batch_size: Some(1),
            ..Default::default()
        };
        let (batched, _) = run_query(&project, batched_settings, |q| q.select(&req));
        assert_eq!(inline.unwrap().count, Some(3));
        assert_eq!(batched.unwrap().count, Some(3));
    }
}

#[test]
fn test_exclude_by_samples_streams_complement() {
    let project = TestProject::new();
    let mut req = request(&[], &["aff = 1"]);
    req.output = vec!["variant_id".into()];
    req.options.order_by = vec!["variant_id".into()];

    let (report, out) = run_query(&project, CliOverrides::default(), |q| q.exclude(&req));
    assert_eq!(report.unwrap().records, Some(5));
    assert_eq!(out, "4\n5\n6\n7\n8\n");
}

#[test]
fn test_materialized_table_survives_reopen() {
    let project = TestProject::new();
    let mut req = request(&["dbSNP.name LIKE 'rs%'"], &[]);
    req.to_table = Some(Destination::new("with rs").with_description("in dbSNP"));

    let (report, out) = run_query(&project, CliOverrides::default(), |q| q.select(&req));
    assert_eq!(report.unwrap().count, Some(3));
    assert!(out.is_empty());

    let context = project.context(CliOverrides::default());
    let (mut engine, catalog) = context.open().unwrap();
    assert!(catalog.is_variant_table("_E_with_20rs"));
    assert_eq!(engine.num_of_rows("_E_with_20rs").unwrap(), 3);
    assert_eq!(
        engine
            .query_scalar(
                "SELECT description FROM project_table_info WHERE table_name = '_E_with_20rs'"
            )
            .unwrap(),
        Value::Text("in dbSNP".into())
    );

    let options = OutputOptions {
        delimiter: Some(",".into()),
        order_by: vec!["variant_id".into(), "dbSNP.name".into()],
        all_matches: true,
        ..Default::default()
    };
    let (records, out) = run_query(&project, CliOverrides::default(), |q| {
        q.output("with rs", &["variant_id", "dbSNP.name"], &options)
    });
    assert_eq!(records.unwrap(), 4);
    assert_eq!(out, "1,rs1\n2,rs2\n2,rs22\n5,rs5\n");
}

#[test]
fn test_output_one_record_per_variant_unless_all_requested() {
    let project = TestProject::new();
    let mut options = OutputOptions {
        delimiter: Some("\\t".into()),
        ..Default::default()
    };
    let fields = ["variant_id", "pos", "dbSNP.name"];

    let (records, out) =
        run_query(&project, CliOverrides::default(), |q| q.output("variant", &fields, &options));
    assert_eq!(records.unwrap(), 8);
    assert_eq!(out.lines().count(), 8);
    assert!(out.lines().all(|l| l.split('\t').count() == 3));
    assert_eq!(out.lines().filter(|l| l.ends_with("\t.")).count(), 5);

    options.all_matches = true;
    let (records, _) =
        run_query(&project, CliOverrides::default(), |q| q.output("variant", &fields, &options));
    assert_eq!(records.unwrap(), 9);
}
