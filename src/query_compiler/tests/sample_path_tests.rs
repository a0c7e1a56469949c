//! Sample filters give the same variants whichever strategy compiles them.

use std::collections::BTreeSet;

use test_case::test_case;

use super::fixture::{Fixture, NUM_VARIANTS};
use crate::engine::Engine;
use crate::query_compiler::{
    SampleFilterSettings, SampleSet, SampleSetResolver, SampleStrategy, SAMPLE_VARIANTS_TABLE,
};

const MAX_SAMPLES: i64 = 200;

/// Variant `PRIVATE_VARIANT_BASE + i` is carried by sample `i` and no other.
const PRIVATE_VARIANT_BASE: i64 = 1000;

fn private_variant(sample: i64) -> i64 {
    PRIVATE_VARIANT_BASE + sample
}

/// Give every sample a variant of its own, so a sample dropped by any
/// strategy changes the result.
fn add_private_variants(fx: &mut Fixture, samples: i64) {
    let values = (1..=samples)
        .map(|i| format!("({}, '3', {}, 'A', 'T', 'chr3', {})", private_variant(i), i, i))
        .collect::<Vec<_>>()
        .join(", ");
    fx.engine
        .execute(&format!("INSERT INTO variant VALUES {}", values))
        .unwrap();
    for i in 1..=samples {
        fx.engine
            .execute(&format!(
                "INSERT INTO genotype_{} VALUES ({})",
                i,
                private_variant(i)
            ))
            .unwrap();
    }
    fx.engine.clear();
}

/// Variants called in samples `1..=n`, computed from the fixture layout.
fn expected_variants(n: i64) -> Vec<i64> {
    let mut ids = BTreeSet::new();
    for i in 1..=n {
        ids.insert((i - 1) % NUM_VARIANTS + 1);
        ids.insert((3 * i) % NUM_VARIANTS + 1);
    }
    ids.into_iter().collect()
}

fn matched_variants(fx: &mut Fixture, settings: SampleFilterSettings, n: i64) -> (Vec<i64>, SampleStrategy) {
    let samples: SampleSet = (1..=n).collect();
    let resolver = SampleSetResolver::new(&fx.catalog, settings);
    let filter = resolver
        .compile_sample_filter(&mut fx.engine, &samples, "variant")
        .unwrap();
    let ids = fx.ids(&format!(
        "SELECT variant.variant_id FROM variant WHERE ({}) ORDER BY variant.variant_id",
        filter.predicate()
    ));
    let strategy = filter.strategy();
    filter.release(&mut fx.engine).unwrap();
    (ids, strategy)
}

#[test_case(0 ; "no samples")]
#[test_case(1 ; "single sample")]
#[test_case(49 ; "below threshold")]
#[test_case(50 ; "at threshold")]
#[test_case(65 ; "one more than a batch")]
#[test_case(200 ; "many samples")]
fn test_strategies_agree(n: i64) {
    let mut fx = Fixture::with_samples(MAX_SAMPLES);
    add_private_variants(&mut fx, MAX_SAMPLES);
    let mut expected = expected_variants(n);
    expected.extend((1..=n).map(private_variant));
    let size = n.max(1) as usize;
    // First sample of the last of four batches.
    let last_batch_start = (3 * size.div_ceil(4) + 1) as i64;

    let inline = SampleFilterSettings {
        inline_threshold: MAX_SAMPLES as usize + 1,
        batch_size: 64,
        show_progress: false,
    };
    let one_batch = SampleFilterSettings {
        inline_threshold: 1,
        batch_size: size,
        show_progress: false,
    };
    let four_batches = SampleFilterSettings {
        inline_threshold: 1,
        batch_size: size.div_ceil(4),
        show_progress: false,
    };

    let (ids, strategy) = matched_variants(&mut fx, inline, n);
    assert_eq!(ids, expected);
    if n > 0 {
        assert_eq!(strategy, SampleStrategy::Inline);
        assert!(ids.contains(&private_variant(n)));
    }

    let (ids, strategy) = matched_variants(&mut fx, one_batch, n);
    assert_eq!(ids, expected);
    if n > 0 {
        assert_eq!(strategy, SampleStrategy::Batched { batches: 1 });
        assert!(ids.contains(&private_variant(n)));
    }

    let (ids, strategy) = matched_variants(&mut fx, four_batches, n);
    assert_eq!(ids, expected);
    if n >= 4 {
        assert!(ids.contains(&private_variant(last_batch_start)));
        assert!(ids.contains(&private_variant(n)));
    }
    match strategy {
        SampleStrategy::Empty => assert_eq!(n, 0),
        SampleStrategy::Batched { batches } if n >= 4 => assert_eq!(batches, 4),
        SampleStrategy::Batched { batches } => assert_eq!(batches, n as usize),
        SampleStrategy::Inline => panic!("threshold 1 never inlines"),
    }
}

#[test]
fn test_default_settings_switch_at_fifty() {
    let mut fx = Fixture::with_samples(50);
    let settings = SampleFilterSettings {
        show_progress: false,
        ..Default::default()
    };
    let (ids, strategy) = matched_variants(&mut fx, settings, 49);
    assert_eq!(strategy, SampleStrategy::Inline);
    assert_eq!(ids, expected_variants(49));
    let (ids, strategy) = matched_variants(&mut fx, settings, 50);
    assert_eq!(strategy, SampleStrategy::Batched { batches: 1 });
    assert_eq!(ids, expected_variants(50));
}

#[test]
fn test_empty_sample_set_scans_no_genotype_table() {
    let mut fx = Fixture::with_samples(5);
    let resolver = SampleSetResolver::new(&fx.catalog, SampleFilterSettings::default());
    let samples = resolver.resolve_samples(&mut fx.engine, "aff = 9").unwrap();
    assert!(samples.is_empty());
    assert_eq!(samples.condition(), Some("aff = 9"));

    let filter = resolver
        .compile_sample_filter(&mut fx.engine, &samples, "variant")
        .unwrap();
    assert_eq!(filter.predicate(), "0");
    let ids = fx.ids(&format!(
        "SELECT variant.variant_id FROM variant WHERE ({})",
        filter.predicate()
    ));
    filter.release(&mut fx.engine).unwrap();

    assert!(ids.is_empty());
    assert_eq!(fx.engine.count_containing("genotype_"), 0);
    assert_eq!(fx.engine.count_containing(SAMPLE_VARIANTS_TABLE), 0);
}

#[test]
fn test_phenotype_predicate_on_filename() {
    let mut fx = Fixture::with_samples(6);
    let resolver = SampleSetResolver::new(&fx.catalog, SampleFilterSettings::default());
    let samples = resolver
        .resolve_samples(&mut fx.engine, "filename = 'batch2.vcf'")
        .unwrap();
    assert_eq!(samples.ids().collect::<Vec<_>>(), vec![2, 4, 6]);
    assert_eq!(samples.condition(), Some("filename = 'batch2.vcf'"));
    assert_eq!((2..=6).step_by(2).collect::<SampleSet>().condition(), None);
}
