//! Sample membership filters
//!
//! A phenotype predicate selects samples; each sample has a genotype table
//! listing the variants called in it. The filter keeps variants called in at
//! least one selected sample, in one of three ways depending on set size:
//!
//! | samples                      | filter                                                      |
//! |------------------------------|-------------------------------------------------------------|
//! | none                         | constant `0`, no genotype table is read                     |
//! | fewer than `inline_threshold`| `t.variant_id IN (SELECT variant_id FROM g1 UNION ...)`     |
//! | otherwise                    | batched inserts into a temporary table, `IN` over that      |
//!
//! All three produce the same variant set.

use std::collections::BTreeSet;

use super::errors::QueryError;
use crate::catalog::Catalog;
use crate::config::CompilerConfig;
use crate::engine::{Engine, EngineError};
use crate::progress::Progress;

/// Session temporary table collecting variants of large sample sets.
pub const SAMPLE_VARIANTS_TABLE: &str = "__variants_from_samples";

/// Ids of selected samples, always iterated in ascending order, with the
/// phenotype condition that selected them when there was one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSet {
    ids: BTreeSet<i64>,
    condition: Option<String>,
}

impl SampleSet {
    pub fn new(ids: BTreeSet<i64>) -> Self {
        SampleSet {
            ids,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.ids.iter().copied()
    }
}

impl FromIterator<i64> for SampleSet {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        SampleSet::new(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStrategy {
    Empty,
    Inline,
    Batched { batches: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFilterSettings {
    pub inline_threshold: usize,
    pub batch_size: usize,
    pub show_progress: bool,
}

impl Default for SampleFilterSettings {
    fn default() -> Self {
        SampleFilterSettings::from(&CompilerConfig::default())
    }
}

impl From<&CompilerConfig> for SampleFilterSettings {
    fn from(config: &CompilerConfig) -> Self {
        SampleFilterSettings {
            inline_threshold: config.inline_threshold.max(1),
            batch_size: config.batch_size.max(1),
            show_progress: config.show_progress,
        }
    }
}

/// A compiled sample filter. Owns the temporary table of the batched strategy,
/// which must be released with [`SampleFilter::release`] once the statement
/// using the predicate has run.
#[derive(Debug)]
#[must_use = "a batched sample filter holds a temporary table that must be released"]
pub struct SampleFilter {
    predicate: String,
    temp_table: Option<String>,
    strategy: SampleStrategy,
}

impl SampleFilter {
    /// WHERE term restricting the target table.
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn strategy(&self) -> SampleStrategy {
        self.strategy
    }

    pub fn temp_table(&self) -> Option<&str> {
        self.temp_table.as_deref()
    }

    /// Drop the temporary table, if any.
    pub fn release(self, engine: &mut dyn Engine) -> Result<(), EngineError> {
        if let Some(table) = &self.temp_table {
            drop_temp_table(engine, table)?;
            log::debug!("Dropped temporary table {}", table);
        }
        Ok(())
    }
}

fn drop_temp_table(engine: &mut dyn Engine, table: &str) -> Result<(), EngineError> {
    engine.execute(&format!("DROP TABLE IF EXISTS temp.{};", table))?;
    Ok(())
}

pub struct SampleSetResolver<'a> {
    catalog: &'a dyn Catalog,
    settings: SampleFilterSettings,
}

impl<'a> SampleSetResolver<'a> {
    pub fn new(catalog: &'a dyn Catalog, settings: SampleFilterSettings) -> Self {
        SampleSetResolver { catalog, settings }
    }

    /// Samples satisfying a phenotype predicate.
    pub fn resolve_samples(
        &self,
        engine: &mut dyn Engine,
        predicate: &str,
    ) -> Result<SampleSet, QueryError> {
        let ids = self.catalog.sample_ids_matching(engine, predicate)?;
        log::info!("{} samples are selected by condition: {}", ids.len(), predicate);
        Ok(SampleSet::new(ids).with_condition(predicate))
    }

    pub fn strategy_for(&self, samples: &SampleSet) -> SampleStrategy {
        match samples.len() {
            0 => SampleStrategy::Empty,
            n if n < self.settings.inline_threshold => SampleStrategy::Inline,
            n => SampleStrategy::Batched {
                batches: n.div_ceil(self.settings.batch_size),
            },
        }
    }

    /// Build the WHERE term keeping variants of `target` called in any of `samples`.
    pub fn compile_sample_filter(
        &self,
        engine: &mut dyn Engine,
        samples: &SampleSet,
        target: &str,
    ) -> Result<SampleFilter, QueryError> {
        let strategy = self.strategy_for(samples);
        match strategy {
            SampleStrategy::Empty => {
                match samples.condition() {
                    Some(condition) => {
                        log::warn!("No sample is selected by condition: {}", condition)
                    }
                    None => log::warn!("No sample is selected, no variant will be matched"),
                }
                Ok(SampleFilter {
                    predicate: "0".to_string(),
                    temp_table: None,
                    strategy,
                })
            }
            SampleStrategy::Inline => {
                self.catalog.prepare_genotype_store(engine)?;
                let union = self.union_of(samples.ids());
                Ok(SampleFilter {
                    predicate: format!("{}.variant_id IN ({})", target, union),
                    temp_table: None,
                    strategy,
                })
            }
            SampleStrategy::Batched { batches } => {
                self.catalog.prepare_genotype_store(engine)?;
                self.collect_in_batches(engine, samples, batches)?;
                Ok(SampleFilter {
                    predicate: format!(
                        "{}.variant_id IN (SELECT variant_id FROM {})",
                        target, SAMPLE_VARIANTS_TABLE
                    ),
                    temp_table: Some(SAMPLE_VARIANTS_TABLE.to_string()),
                    strategy,
                })
            }
        }
    }

    fn union_of<I: IntoIterator<Item = i64>>(&self, ids: I) -> String {
        ids.into_iter()
            .map(|id| {
                format!(
                    "SELECT variant_id FROM {}",
                    self.catalog.genotype_table_name(id)
                )
            })
            .collect::<Vec<_>>()
            .join("\nUNION ")
    }

    fn collect_in_batches(
        &self,
        engine: &mut dyn Engine,
        samples: &SampleSet,
        batches: usize,
    ) -> Result<(), QueryError> {
        drop_temp_table(engine, SAMPLE_VARIANTS_TABLE)?;
        engine.execute(&format!(
            "CREATE TEMPORARY TABLE {} (variant_id INT);",
            SAMPLE_VARIANTS_TABLE
        ))?;

        let result = self.insert_batches(engine, samples, batches);
        if result.is_err() {
            if let Err(e) = drop_temp_table(engine, SAMPLE_VARIANTS_TABLE) {
                log::warn!("Failed to drop {}: {}", SAMPLE_VARIANTS_TABLE, e);
            }
        }
        result
    }

    fn insert_batches(
        &self,
        engine: &mut dyn Engine,
        samples: &SampleSet,
        batches: usize,
    ) -> Result<(), QueryError> {
        let ids: Vec<i64> = samples.ids().collect();
        let progress = Progress::new(
            "Collecting sample variants",
            ids.len() as u64,
            self.settings.show_progress,
        );
        log::debug!(
            "Collecting variants of {} samples in {} batches of up to {}",
            ids.len(),
            batches,
            self.settings.batch_size
        );
        for chunk in ids.chunks(self.settings.batch_size) {
            let sql = format!(
                "INSERT INTO {} {};",
                SAMPLE_VARIANTS_TABLE,
                self.union_of(chunk.iter().copied())
            );
            engine
                .execute(&sql)
                .map_err(|e| QueryError::execution(&sql, e))?;
            progress.inc(chunk.len() as u64);
        }
        progress.finish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_compiler::tests::fixture::Fixture;

    fn settings(inline_threshold: usize, batch_size: usize) -> SampleFilterSettings {
        SampleFilterSettings {
            inline_threshold,
            batch_size,
            show_progress: false,
        }
    }

    #[test]
    fn test_strategy_selection() {
        let fx = Fixture::new();
        let resolver = SampleSetResolver::new(&fx.catalog, settings(50, 64));
        let set = |n: i64| (1..=n).collect::<SampleSet>();
        assert_eq!(resolver.strategy_for(&set(0)), SampleStrategy::Empty);
        assert_eq!(resolver.strategy_for(&set(1)), SampleStrategy::Inline);
        assert_eq!(resolver.strategy_for(&set(49)), SampleStrategy::Inline);
        assert_eq!(
            resolver.strategy_for(&set(50)),
            SampleStrategy::Batched { batches: 1 }
        );
        assert_eq!(
            resolver.strategy_for(&set(65)),
            SampleStrategy::Batched { batches: 2 }
        );
    }

    #[test]
    fn test_inline_union_in_ascending_order() {
        let mut fx = Fixture::with_samples(3);
        let resolver = SampleSetResolver::new(&fx.catalog, settings(50, 64));
        let samples: SampleSet = [3, 1, 2].into_iter().collect();
        let filter = resolver
            .compile_sample_filter(&mut fx.engine, &samples, "variant")
            .unwrap();
        assert_eq!(
            filter.predicate(),
            "variant.variant_id IN (SELECT variant_id FROM genotype_1\n\
             UNION SELECT variant_id FROM genotype_2\n\
             UNION SELECT variant_id FROM genotype_3)"
        );
        assert!(filter.temp_table().is_none());
        filter.release(&mut fx.engine).unwrap();
    }

    #[test]
    fn test_batched_filter_creates_and_releases_temp_table() {
        let mut fx = Fixture::with_samples(10);
        let resolver = SampleSetResolver::new(&fx.catalog, settings(2, 4));
        let samples: SampleSet = (1..=10).collect();
        let filter = resolver
            .compile_sample_filter(&mut fx.engine, &samples, "variant")
            .unwrap();
        assert_eq!(filter.strategy(), SampleStrategy::Batched { batches: 3 });
        assert_eq!(
            fx.engine
                .count_containing(&format!("INSERT INTO {}", SAMPLE_VARIANTS_TABLE)),
            3
        );
        assert!(fx.engine.has_table(SAMPLE_VARIANTS_TABLE).unwrap());
        filter.release(&mut fx.engine).unwrap();
        assert!(!fx.engine.has_table(SAMPLE_VARIANTS_TABLE).unwrap());
    }

    #[test]
    fn test_failed_batch_drops_temp_table() {
        let mut fx = Fixture::with_samples(4);
        let resolver = SampleSetResolver::new(&fx.catalog, settings(1, 2));
        // sample 99 has no genotype table
        let samples: SampleSet = [1, 2, 3, 99].into_iter().collect();
        let err = resolver
            .compile_sample_filter(&mut fx.engine, &samples, "variant")
            .unwrap_err();
        assert!(matches!(err, QueryError::Execution { .. }));
        assert!(!fx.engine.has_table(SAMPLE_VARIANTS_TABLE).unwrap());
    }

    #[test]
    fn test_resolve_samples_by_phenotype() {
        let mut fx = Fixture::with_samples(6);
        let resolver = SampleSetResolver::new(&fx.catalog, SampleFilterSettings::default());
        let samples = resolver.resolve_samples(&mut fx.engine, "aff = 1").unwrap();
        assert_eq!(samples.ids().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert!(resolver
            .resolve_samples(&mut fx.engine, "aff = 7")
            .unwrap()
            .is_empty());
    }
}
