//! BatchSampler tests.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::SeedableRng;

use pose_sync::image_index::ImageItem;
use pose_sync::sampler::{append_unique, BatchSampler, SamplerContext, ViewKind};

fn pool(n: usize) -> Vec<ImageItem> {
    (0..n)
        .map(|i| ImageItem::new(format!("img-{i}"), format!("{i}.jpg")))
        .collect()
}

fn ids(items: &[ImageItem]) -> HashSet<String> {
    items.iter().map(|i| i.id.clone()).collect()
}

#[test]
fn batches_do_not_repeat_within_a_pass() {
    let sampler = BatchSampler::new();
    let ctx = SamplerContext::new("set-1", ViewKind::All);
    let pool = pool(6);
    let mut rng = StdRng::seed_from_u64(7);

    let mut seen = HashSet::new();
    for _ in 0..3 {
        let batch = sampler.pick_next_with(&ctx, &pool, 2, &mut rng);
        assert_eq!(batch.len(), 2);
        for id in ids(&batch) {
            assert!(seen.insert(id), "item repeated within a pass");
        }
    }
    assert_eq!(seen, ids(&pool));
    assert_eq!(sampler.seen_count(&ctx), 6);
}

#[test]
fn short_final_batch_tops_up_from_a_new_pass() {
    let sampler = BatchSampler::new();
    let ctx = SamplerContext::new("set-1", ViewKind::All);
    let pool = pool(10);
    let mut rng = StdRng::seed_from_u64(42);

    let first = ids(&sampler.pick_next_with(&ctx, &pool, 4, &mut rng));
    let second = ids(&sampler.pick_next_with(&ctx, &pool, 4, &mut rng));
    assert!(first.is_disjoint(&second));

    let leftover: HashSet<String> = ids(&pool)
        .difference(&first.union(&second).cloned().collect())
        .cloned()
        .collect();
    assert_eq!(leftover.len(), 2);

    let third = sampler.pick_next_with(&ctx, &pool, 4, &mut rng);
    let third_ids = ids(&third);
    assert_eq!(third.len(), 4);
    assert_eq!(third_ids.len(), 4);
    assert!(leftover.is_subset(&third_ids));
    assert_eq!(sampler.seen_count(&ctx), 4);
}

#[test]
fn asking_for_more_than_the_pool_returns_the_pool() {
    let sampler = BatchSampler::new();
    let ctx = SamplerContext::new("set-1", ViewKind::All);
    let pool = pool(3);

    let batch = sampler.pick_next(&ctx, &pool, 10);
    assert_eq!(ids(&batch), ids(&pool));
}

#[test]
fn views_and_sets_keep_separate_history() {
    let sampler = BatchSampler::new();
    let all = SamplerContext::new("set-1", ViewKind::All);
    let favorites = SamplerContext::new("set-1", ViewKind::Favorites);
    let custom = SamplerContext::new("set-1", ViewKind::Custom("portrait".into()));
    let other_set = SamplerContext::new("set-2", ViewKind::All);
    let pool = pool(8);

    sampler.pick_next(&all, &pool, 3);
    sampler.pick_next(&favorites, &pool, 1);
    assert_eq!(sampler.seen_count(&all), 3);
    assert_eq!(sampler.seen_count(&favorites), 1);
    assert_eq!(sampler.seen_count(&custom), 0);
    assert_eq!(sampler.seen_count(&other_set), 0);

    sampler.pick_next(&other_set, &pool, 2);
    sampler.reset_entity("set-1");
    assert_eq!(sampler.seen_count(&all), 0);
    assert_eq!(sampler.seen_count(&favorites), 0);
    assert_eq!(sampler.seen_count(&other_set), 2);

    sampler.reset(&other_set);
    assert_eq!(sampler.seen_count(&other_set), 0);
}

#[test]
fn changed_pool_starts_a_new_pass() {
    let sampler = BatchSampler::new();
    let ctx = SamplerContext::new("set-1", ViewKind::All);
    let mut items = pool(5);
    let mut rng = StdRng::seed_from_u64(1);

    sampler.pick_next_with(&ctx, &items, 3, &mut rng);
    assert_eq!(sampler.seen_count(&ctx), 3);

    items.push(ImageItem::new("img-new", "new.jpg"));
    sampler.pick_next_with(&ctx, &items, 2, &mut rng);
    assert_eq!(sampler.seen_count(&ctx), 2);
}

#[test]
fn clear_forgets_everything() {
    let sampler = BatchSampler::new();
    let ctx = SamplerContext::new("set-1", ViewKind::All);
    sampler.pick_next(&ctx, &pool(4), 2);
    sampler.clear();
    assert_eq!(sampler.seen_count(&ctx), 0);
}

#[test]
fn append_unique_keeps_existing_order_and_skips_known_ids() {
    let existing = vec![
        ImageItem::new("a", "a"),
        ImageItem::new("b", "b"),
    ];
    let incoming = vec![
        ImageItem::new("b", "b again"),
        ImageItem::new("c", "c"),
        ImageItem::new("c", "c again"),
    ];

    let merged = append_unique(&existing, &incoming);
    let order: Vec<&str> = merged.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);
    assert_eq!(merged[1].name, "b");
    assert_eq!(merged[2].name, "c");
}
