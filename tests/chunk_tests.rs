//! Chunk state and damage tests

#[cfg(test)]
mod tests {
    use ground_engine::generator::ChunkGenerator;
    use ground_engine::polygon::{self, Polygons};
    use ground_engine::{Chunk, ChunkCache, ChunkId, ChunkState, DamageMerge, Point, TerrainConfig};

    const SEED: u64 = 42;
    const SIZE: i32 = 512;

    fn make_generator() -> ChunkGenerator {
        ChunkGenerator::new(SEED, &TerrainConfig::default())
    }

    fn built_chunk(id: ChunkId, gen: &ChunkGenerator) -> Chunk {
        let mut chunk = Chunk::new(id);
        chunk.rebuild(gen);
        chunk
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn new_chunk_is_empty_until_generated() {
        let gen = make_generator();
        let mut chunk = Chunk::new(ChunkId::new(0, 0));
        assert_eq!(chunk.state(), ChunkState::Empty);
        assert!(chunk.solid().is_none());
        assert!(!chunk.should_save());

        chunk.ensure_generated(&gen);
        assert_eq!(chunk.state(), ChunkState::Generated);
        assert!(chunk.needs_rebuild());

        assert!(chunk.rebuild(&gen));
        assert!(!chunk.needs_rebuild());
        assert!(!chunk.rebuild(&gen), "clean chunk should not rebuild");
    }

    #[test]
    fn mesh_matches_triangles() {
        let gen = make_generator();
        let chunk = built_chunk(ChunkId::new(0, 0), &gen);
        assert_eq!(chunk.mesh().foreground.len(), chunk.foreground_triangles().len() * 3);
        assert_eq!(chunk.mesh().background.len(), chunk.background_triangles().len() * 3);
        assert!(!chunk.decorations().is_empty());
    }

    // -----------------------------------------------------------------------
    // Damage
    // -----------------------------------------------------------------------

    #[test]
    fn damage_removes_exactly_the_overlap() {
        let gen = make_generator();
        let region = Polygons::rect(200, 0, 250, 2000);

        for y in 0..4 {
            let id = ChunkId::new(0, y);
            let mut chunk = built_chunk(id, &gen);
            let before = chunk.foreground_area();
            let b = id.bounds(SIZE);
            let local = Polygons::rect(200, b.top, 250, b.bottom);
            let expected = polygon::intersection(chunk.solid().expect("generated"), &local).area();

            assert!(chunk.apply_damage(&region, &gen, DamageMerge::Union));
            chunk.rebuild(&gen);
            let removed = before - chunk.foreground_area();
            assert!(
                (removed - expected).abs() < 16.0,
                "chunk {}: removed {} expected {}",
                id,
                removed,
                expected
            );
        }
    }

    #[test]
    fn damage_outside_chunk_is_ignored() {
        let gen = make_generator();
        let mut chunk = built_chunk(ChunkId::new(0, 1), &gen);
        let far = Polygons::rect(5000, 5000, 5100, 5100);
        assert!(!chunk.apply_damage(&far, &gen, DamageMerge::Union));
        assert!(!chunk.should_save());
        assert!(!chunk.needs_rebuild());
    }

    #[test]
    fn damage_before_generation_generates_first() {
        let gen = make_generator();
        let mut chunk = Chunk::new(ChunkId::new(0, 2));
        assert!(chunk.apply_damage(&Polygons::rect(10, 1030, 60, 1080), &gen, DamageMerge::Union));
        assert_eq!(chunk.state(), ChunkState::Generated);
        assert!(chunk.should_save());
        assert!(!chunk.is_solid(Point::new(30, 1050), &gen));
    }

    #[test]
    fn damage_is_clipped_to_the_chunk() {
        let gen = make_generator();
        let mut chunk = Chunk::new(ChunkId::new(0, 1));
        chunk.apply_damage(&Polygons::rect(-100, 500, 100, 600), &gen, DamageMerge::Union);
        let (min, max) = chunk.damage().bounds().expect("damage bounds");
        assert_eq!(min, Point::new(0, 512));
        assert_eq!(max, Point::new(100, 600));
    }

    #[test]
    fn union_damage_is_monotonic() {
        let gen = make_generator();
        let mut chunk = Chunk::new(ChunkId::new(0, 1));
        let mut previous = 0.0;
        for (x, y) in [(10, 600), (40, 620), (10, 600), (300, 900)] {
            chunk.apply_damage(&Polygons::rect(x, y, x + 64, y + 64), &gen, DamageMerge::Union);
            let area = chunk.damage().area();
            assert!(area >= previous, "damage shrank from {} to {}", previous, area);
            previous = area;
        }
    }

    #[test]
    fn xor_damage_twice_restores_the_terrain() {
        let gen = make_generator();
        let id = ChunkId::new(0, 0);
        let mut chunk = built_chunk(id, &gen);
        let original = chunk.derived().clone();
        let region = Polygons::rect(100, 200, 180, 400);

        chunk.apply_damage(&region, &gen, DamageMerge::Xor);
        chunk.rebuild(&gen);
        assert_ne!(chunk.derived(), &original);

        chunk.apply_damage(&region, &gen, DamageMerge::Xor);
        chunk.rebuild(&gen);
        assert!(chunk.damage().is_empty());
        assert_eq!(chunk.derived(), &original);
    }

    #[test]
    fn is_solid_sees_unbuilt_damage() {
        let gen = make_generator();
        let mut chunk = built_chunk(ChunkId::new(0, 1), &gen);
        let p = Point::new(256, 700);

        chunk.apply_damage(&Polygons::rect(200, 650, 300, 750), &gen, DamageMerge::Union);
        assert!(chunk.needs_rebuild());
        assert!(!chunk.is_solid(p, &gen));
        chunk.rebuild(&gen);
        assert!(!chunk.is_solid(p, &gen));
    }

    // -----------------------------------------------------------------------
    // Cache
    // -----------------------------------------------------------------------

    #[test]
    fn cache_returns_same_chunk() {
        let cache = ChunkCache::new();
        let a = cache.get_or_create(ChunkId::new(3, -2));
        let b = cache.get_or_create(ChunkId::new(3, -2));
        assert!(std::sync::Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_never_evicts_damaged_chunks() {
        let gen = make_generator();
        let cache = ChunkCache::new();
        let damaged = ChunkId::new(0, 1);
        let clean = ChunkId::new(1, 1);

        cache
            .get_or_create(damaged)
            .lock()
            .apply_damage(&Polygons::rect(0, 520, 50, 560), &gen, DamageMerge::Union);
        cache.get_or_create(clean).lock().ensure_generated(&gen);

        assert!(!cache.evict_if_clean(damaged));
        assert!(cache.evict_if_clean(clean));
        assert!(cache.contains(damaged));
        assert!(!cache.contains(clean));

        let saved = cache.damaged_chunks();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, damaged);
    }

    #[test]
    fn evicted_chunk_is_flagged() {
        let cache = ChunkCache::new();
        let id = ChunkId::new(7, 7);
        let handle = cache.get_or_create(id);
        assert!(cache.evict_if_clean(id));
        assert!(handle.lock().is_evicted());
        let fresh = cache.get_or_create(id);
        assert!(!fresh.lock().is_evicted());
    }

    #[test]
    fn active_chunk_is_not_evicted() {
        let cache = ChunkCache::new();
        let id = ChunkId::new(0, 0);
        cache.get_or_create(id).lock().set_active(true);
        assert!(!cache.evict_if_clean(id));
    }
}
