use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use variant_query::config::CliOverrides;
use variant_query::context::QueryContext;
use variant_query::engine::SqliteEngine;

pub const PROJECT_YAML: &str = r#"
name: integration
database: project.db
build: hg19
genotype:
  schema: geno
  file: geno.db
annotations:
  - name: dbSNP
    file: dbsnp.db
    link: { type: variant, columns: [chr, pos] }
"#;

/// Variants 1-8 on chr 1 at `pos = id * 10`.
///
/// dbSNP has one record at 10 and 50 and two at 20. Samples 1 and 2 are
/// affected (`aff = 1`) and carry variants 1, 2 and 3; samples 3 and 4 carry
/// 5, 6 and 7.
pub struct TestProject {
    pub dir: TempDir,
    pub project_file: PathBuf,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();

        let mut project = SqliteEngine::open(dir.path().join("project.db")).unwrap();
        let mut setup = String::from(
            "CREATE TABLE variant (variant_id INTEGER PRIMARY KEY, chr TEXT, pos INT, ref TEXT, alt TEXT);
             CREATE TABLE sample (sample_id INTEGER PRIMARY KEY, sample_name TEXT, aff INT);
             INSERT INTO sample VALUES (1, 'A1', 1), (2, 'A2', 1), (3, 'U1', 2), (4, 'U2', 2);\n",
        );
        for id in 1..=8 {
            setup.push_str(&format!(
                "INSERT INTO variant VALUES ({}, '1', {}, 'C', 'T');\n",
                id,
                id * 10
            ));
        }
        project.execute_batch(&setup).unwrap();

        let mut dbsnp = SqliteEngine::open(dir.path().join("dbsnp.db")).unwrap();
        dbsnp
            .execute_batch(
                "CREATE TABLE dbSNP (chr TEXT, pos INT, name TEXT);
                 INSERT INTO dbSNP VALUES ('1', 10, 'rs1'), ('1', 20, 'rs2'), ('1', 20, 'rs22'),
                                          ('1', 50, 'rs5');",
            )
            .unwrap();

        let mut geno = SqliteEngine::open(dir.path().join("geno.db")).unwrap();
        geno.execute_batch(
            "CREATE TABLE genotype_1 (variant_id INT);
             CREATE TABLE genotype_2 (variant_id INT);
             CREATE TABLE genotype_3 (variant_id INT);
             CREATE TABLE genotype_4 (variant_id INT);
             INSERT INTO genotype_1 VALUES (1), (2);
             INSERT INTO genotype_2 VALUES (2), (3);
             INSERT INTO genotype_3 VALUES (5);
             INSERT INTO genotype_4 VALUES (6), (7);",
        )
        .unwrap();

        let project_file = dir.path().join("project.yaml");
        fs::write(&project_file, PROJECT_YAML).unwrap();
        TestProject { dir, project_file }
    }

    pub fn context(&self, overrides: CliOverrides) -> QueryContext {
        QueryContext::load(
            &self.project_file,
            None,
            CliOverrides {
                no_progress: true,
                ..overrides
            },
        )
        .unwrap()
    }
}
