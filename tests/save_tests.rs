//! Save format and configuration tests

#[cfg(test)]
mod tests {
    use ground_engine::config;
    use ground_engine::polygon::Polygons;
    use ground_engine::save::{self, SavedChunk, WorldSave};
    use ground_engine::{
        ChunkId, ChunkState, DamageMerge, InMemoryWorld, Point, TerrainConfig, TerrainEngine,
        TerrainError, Vec2,
    };
    use tokio_test::assert_ok;

    const SEED: u64 = 42;

    fn damaged_engine(world: &InMemoryWorld) -> TerrainEngine {
        let engine =
            TerrainEngine::new(SEED, TerrainConfig::default(), world.world()).expect("engine");
        engine.apply_damage(&Polygons::rect(200, 0, 250, 2000));
        engine.apply_damage(&Polygons::rect(-700, 300, -600, 400));
        engine
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("ground-engine-{}-{}", std::process::id(), name))
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    #[test]
    fn empty_save_is_twelve_bytes() {
        let data = assert_ok!(save::encode(&WorldSave {
            seed: 7,
            chunks: Vec::new(),
        }));
        assert_eq!(data.len(), 12);
        assert_eq!(&data[..8], &7i64.to_le_bytes());
        assert_eq!(&data[8..], &0i32.to_le_bytes());
    }

    #[test]
    fn chunk_record_layout() {
        let save = WorldSave {
            seed: u64::MAX,
            chunks: vec![SavedChunk {
                id: ChunkId::new(-1, 2),
                damage: Polygons::rect(0, 0, 3, 4),
            }],
        };
        let data = assert_ok!(save::encode(&save));
        // seed + count + id + polygon count + point count + 4 points
        assert_eq!(data.len(), 8 + 4 + 8 + 4 + 4 + 4 * 8);
        assert_eq!(&data[..8], &(-1i64).to_le_bytes());
        assert_eq!(&data[12..20], &ChunkId::new(-1, 2).pack().to_le_bytes());
        assert_eq!(&data[24..28], &4i32.to_le_bytes());
    }

    #[test]
    fn snapshot_round_trips() {
        let world = InMemoryWorld::with_terrain_props();
        let snapshot = damaged_engine(&world).snapshot();
        assert_eq!(snapshot.seed, SEED);
        assert_eq!(snapshot.chunks.len(), 5);

        let data = assert_ok!(save::encode(&snapshot));
        let decoded = assert_ok!(save::decode(&data));
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn undamaged_world_saves_no_chunks() {
        let world = InMemoryWorld::with_terrain_props();
        let engine =
            TerrainEngine::new(SEED, TerrainConfig::default(), world.world()).expect("engine");
        engine.set_active_area(Vec2::new(256.0, 256.0));
        assert!(engine.snapshot().chunks.is_empty());
    }

    // -----------------------------------------------------------------------
    // Decoding errors
    // -----------------------------------------------------------------------

    #[test]
    fn truncated_save_is_rejected() {
        let world = InMemoryWorld::with_terrain_props();
        let data = assert_ok!(save::encode(&damaged_engine(&world).snapshot()));
        for cut in [0, 5, 11, data.len() - 3] {
            assert!(
                matches!(save::decode(&data[..cut]), Err(TerrainError::TruncatedSave(_))),
                "cut at {} should be truncated",
                cut
            );
        }
    }

    #[test]
    fn negative_count_is_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(&1i64.to_le_bytes());
        data.extend_from_slice(&(-1i32).to_le_bytes());
        assert!(matches!(save::decode(&data), Err(TerrainError::InvalidSave(_))));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut data = assert_ok!(save::encode(&WorldSave {
            seed: 1,
            chunks: Vec::new(),
        }))
        .to_vec();
        data.push(0);
        assert!(matches!(save::decode(&data), Err(TerrainError::InvalidSave(_))));
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    #[test]
    fn loaded_world_matches_the_saved_one() {
        let world = InMemoryWorld::with_terrain_props();
        let original = damaged_engine(&world);
        let snapshot = original.snapshot();

        let restored_world = InMemoryWorld::with_terrain_props();
        let restored =
            TerrainEngine::from_save(&snapshot, TerrainConfig::default(), restored_world.world())
                .expect("restore");
        assert_eq!(restored.seed(), SEED);
        assert_eq!(restored.chunk_state(ChunkId::new(0, 1)), Some(ChunkState::Empty));

        for p in [
            Point::new(225, 700),
            Point::new(225, 1500),
            Point::new(260, 700),
            Point::new(-650, 390),
            Point::new(-500, 390),
        ] {
            assert_eq!(restored.is_solid(p), original.is_solid(p), "at {:?}", p);
        }
        assert_eq!(restored.snapshot(), snapshot);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn first_update_after_load_is_synchronous() {
        let world = InMemoryWorld::with_terrain_props();
        let snapshot = damaged_engine(&world).snapshot();

        let restored_world = InMemoryWorld::with_terrain_props();
        let restored =
            TerrainEngine::from_save(&snapshot, TerrainConfig::default(), restored_world.world())
                .expect("restore");
        restored.set_active_area(Vec2::new(256.0, 256.0));

        assert_eq!(restored.pending_placements(), 0);
        for id in restored.active_set().iter() {
            assert_eq!(restored.chunk_state(id), Some(ChunkState::Placed), "chunk {}", id);
        }
        restored.settle().await;
    }

    #[test]
    fn save_file_round_trip() {
        let world = InMemoryWorld::with_terrain_props();
        let snapshot = damaged_engine(&world).snapshot();
        let path = temp_path("roundtrip.bin");

        assert_ok!(save::write_to_path(&snapshot, &path));
        let read = assert_ok!(save::read_from_path(&path));
        assert_eq!(read, snapshot);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_save_file_is_an_io_error() {
        let result = save::read_from_path(&temp_path("does-not-exist.bin"));
        assert!(matches!(result, Err(TerrainError::Io(_))));
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    #[test]
    fn default_config_is_valid() {
        assert_ok!(config::validate(&TerrainConfig::default()));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let even = TerrainConfig {
            active_chunks: 2,
            ..Default::default()
        };
        let zero = TerrainConfig {
            chunk_size: 0,
            ..Default::default()
        };
        let flat = TerrainConfig {
            cave_divisor: 0.0,
            ..Default::default()
        };
        for config in [even, zero, flat] {
            assert!(matches!(
                config::validate(&config),
                Err(TerrainError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn config_file_overrides_defaults() {
        let path = temp_path("terrain.toml");
        std::fs::write(
            &path,
            "chunk_size = 256\nactive_chunks = 5\ndamage_merge = \"xor\"\nmultithreaded = false\n",
        )
        .expect("write config");

        let loaded = assert_ok!(config::load(Some(&path)));
        assert_eq!(loaded.chunk_size, 256);
        assert_eq!(loaded.active_chunks, 5);
        assert_eq!(loaded.damage_merge, DamageMerge::Xor);
        assert!(!loaded.multithreaded);
        assert_eq!(loaded.surface_step, TerrainConfig::default().surface_step);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn invalid_config_file_is_rejected() {
        let path = temp_path("bad.toml");
        std::fs::write(&path, "active_chunks = 4\n").expect("write config");
        assert!(config::load(Some(&path)).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
