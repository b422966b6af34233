use matter_core::{CellCoord, ShapeKind, Topology};
use matter_system_analytics::deadlock_heatmap;
use matter_system_orchestrator::SimulationConfig;

fn config() -> SimulationConfig {
    SimulationConfig {
        width: 9,
        height: 9,
        seed: 3,
        ..SimulationConfig::default()
    }
}

#[test]
fn heatmap_is_reproducible_and_bounded_by_the_grid() {
    let first = deadlock_heatmap(&config(), ShapeKind::Heart, 6, Topology::VonNeumann, 3)
        .expect("heatmap");
    let second = deadlock_heatmap(&config(), ShapeKind::Heart, 6, Topology::VonNeumann, 3)
        .expect("heatmap");

    assert_eq!(first, second);
    assert_eq!(first.runs(), 3);
    assert_eq!(first.dimensions(), (9, 9));
    assert_eq!(first.counts().len(), 9);
    assert!(first.counts().iter().all(|row| row.len() == 9));

    let stranded: u32 = first.counts().iter().flatten().sum();
    assert!(stranded <= 6 * 3);
    for (cell, count) in first.hotspots() {
        assert!(count <= first.max());
        assert_ne!(cell, CellCoord::new(0, 0), "walls never hold elements");
    }
}

#[test]
fn heatmap_serializes_raw_and_normalised_grids() {
    let heatmap = deadlock_heatmap(&config(), ShapeKind::Square, 4, Topology::Moore, 1)
        .expect("heatmap");
    let json = serde_json::to_value(&heatmap).expect("json");

    assert_eq!(json["runs"], 1);
    assert_eq!(json["counts"].as_array().map(Vec::len), Some(9));
    assert_eq!(json["normalised"].as_array().map(Vec::len), Some(9));
    assert!(json["max"].is_u64());
}
