use super::*;

fn unit_square() -> (Vec<[f32; 2]>, Vec<[u32; 3]>) {
    (
        vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        vec![[0, 1, 2], [0, 2, 3]],
    )
}

#[test]
fn every_triangle_is_reachable_from_ring_zero_or_one() {
    let (uvs, triangles) = unit_square();
    let grid = UvGrid::build(&uvs, &triangles);
    let center = grid.cell_of([0.5, 0.5]);
    let mut seen = std::collections::BTreeSet::new();
    for ring in 0..4 {
        grid.for_ring(center, ring, |cell| {
            seen.extend(cell.iter().copied());
        });
    }
    assert_eq!(seen, std::collections::BTreeSet::from([0u32, 1u32]));
}

#[test]
fn cell_of_clamps_out_of_range_queries() {
    let (uvs, triangles) = unit_square();
    let grid = UvGrid::build(&uvs, &triangles);
    // Far off the chart on every side; both must land on a valid cell.
    let _ = grid.cell_of([-10.0, -10.0]);
    let _ = grid.cell_of([10.0, 10.0]);
}

#[test]
fn rings_beyond_the_grid_report_exhaustion() {
    let (uvs, triangles) = unit_square();
    let grid = UvGrid::build(&uvs, &triangles);
    let center = grid.cell_of([0.5, 0.5]);
    let mut ring = 0;
    while grid.for_ring(center, ring, |_| {}) {
        ring += 1;
        assert!(ring < 1000, "ring search never exhausted");
    }
}

#[test]
fn ring_min_distance_is_a_lower_bound() {
    let (uvs, triangles) = unit_square();
    let grid = UvGrid::build(&uvs, &triangles);
    assert_eq!(grid.ring_min_distance(0), 0.0);
    assert_eq!(grid.ring_min_distance(1), 0.0);
    assert!(grid.ring_min_distance(2) > 0.0);
    assert!(grid.ring_min_distance(3) > grid.ring_min_distance(2));
}

#[test]
fn degenerate_input_still_builds() {
    // A single point cloud with no area and no triangles.
    let grid = UvGrid::build(&[[0.25, 0.25]], &[]);
    let _ = grid.cell_of([0.25, 0.25]);
    let grid = UvGrid::build(&[], &[]);
    let _ = grid.cell_of([0.0, 0.0]);
}
