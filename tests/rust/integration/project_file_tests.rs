use std::fs;

use variant_query::config::CliOverrides;
use variant_query::context::{ContextError, QueryContext};

use super::common::{TestProject, PROJECT_YAML};

#[test]
fn test_relative_paths_resolved_against_project_file() {
    let project = TestProject::new();
    let context = project.context(CliOverrides::default());
    let dir = project.dir.path();

    assert_eq!(context.project.database, Some(dir.join("project.db")));
    assert_eq!(
        context.project.genotype.as_ref().and_then(|g| g.file.clone()),
        Some(dir.join("geno.db"))
    );
    assert_eq!(context.project.annotations[0].file, Some(dir.join("dbsnp.db")));
    assert_eq!(context.project_file.as_deref(), Some(project.project_file.as_path()));
}

#[test]
fn test_config_file_then_command_line_overrides() {
    let project = TestProject::new();
    let config_file = project.dir.path().join("vtq.yaml");
    fs::write(&config_file, "inline_threshold: 3\nna: NA\n").unwrap();

    let context = QueryContext::load(
        &project.project_file,
        Some(&config_file),
        CliOverrides {
            batch_size: Some(5),
            no_progress: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(context.config.inline_threshold, 3);
    assert_eq!(context.config.batch_size, 5);
    assert_eq!(context.config.na, "NA");
    assert_eq!(context.config.pretty_cache_rows, 100);
    assert!(!context.config.show_progress);

    let settings = context.sample_filter_settings();
    assert_eq!(settings.inline_threshold, 3);
    assert_eq!(settings.batch_size, 5);
    assert_eq!(context.format_options().na, "NA");
}

#[test]
fn test_out_of_range_override_rejected() {
    let project = TestProject::new();
    let result = QueryContext::load(
        &project.project_file,
        None,
        CliOverrides {
            batch_size: Some(0),
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(ContextError::Config(_))));
}

#[test]
fn test_project_without_database_cannot_be_opened() {
    let project = TestProject::new();
    let file = project.dir.path().join("nodb.yaml");
    fs::write(&file, "name: nodb\n").unwrap();

    let context = QueryContext::load(&file, None, CliOverrides::default()).unwrap();
    match context.open() {
        Err(ContextError::NoDatabase(name)) => assert_eq!(name, "nodb"),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("project without database opened"),
    }
}

#[test]
fn test_missing_annotation_table_reported() {
    let project = TestProject::new();
    let file = project.dir.path().join("broken.yaml");
    fs::write(&file, PROJECT_YAML.replace("name: dbSNP", "name: dbNSFP\n    table: dbNSFP")).unwrap();

    let context = QueryContext::load(&file, None, CliOverrides::default()).unwrap();
    assert!(matches!(context.open(), Err(ContextError::Catalog(_))));
}
