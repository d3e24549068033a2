//! Uniform UV-space acceleration grid.
//!
//! Triangles are binned by their UV bounding box. Queries walk outward in
//! Chebyshev rings from the query cell until the best hit so far is provably
//! closer than anything a farther ring could contain, which keeps the
//! nearest-triangle search well under the naive O(queries × triangles).

pub(crate) struct UvGrid {
    min: [f32; 2],
    cell_size: f32,
    nx: usize,
    ny: usize,
    cells: Vec<Vec<u32>>,
}

impl UvGrid {
    pub(crate) fn build(uvs: &[[f32; 2]], triangles: &[[u32; 3]]) -> Self {
        let mut min = [f32::INFINITY; 2];
        let mut max = [f32::NEG_INFINITY; 2];
        for uv in uvs {
            for axis in 0..2 {
                min[axis] = min[axis].min(uv[axis]);
                max[axis] = max[axis].max(uv[axis]);
            }
        }
        if uvs.is_empty() {
            min = [0.0; 2];
            max = [1.0; 2];
        }

        let side = ((triangles.len() as f32).sqrt().ceil() as usize).clamp(1, 256);
        let extent = (max[0] - min[0]).max(max[1] - min[1]).max(f32::MIN_POSITIVE);
        let cell_size = extent / side as f32;
        let nx = side;
        let ny = side;

        let mut cells = vec![Vec::new(); nx * ny];
        for (t, tri) in triangles.iter().enumerate() {
            let mut lo = [f32::INFINITY; 2];
            let mut hi = [f32::NEG_INFINITY; 2];
            for &v in tri {
                let uv = uvs[v as usize];
                for axis in 0..2 {
                    lo[axis] = lo[axis].min(uv[axis]);
                    hi[axis] = hi[axis].max(uv[axis]);
                }
            }
            let (x0, y0) = clamp_cell(lo, min, cell_size, nx, ny);
            let (x1, y1) = clamp_cell(hi, min, cell_size, nx, ny);
            for y in y0..=y1 {
                for x in x0..=x1 {
                    cells[y * nx + x].push(t as u32);
                }
            }
        }

        Self {
            min,
            cell_size,
            nx,
            ny,
            cells,
        }
    }

    /// Cell coordinates containing `uv`, clamped to the grid.
    pub(crate) fn cell_of(&self, uv: [f32; 2]) -> (usize, usize) {
        clamp_cell(uv, self.min, self.cell_size, self.nx, self.ny)
    }

    /// Triangle indices binned in cell `(x, y)`.
    pub(crate) fn cell(&self, x: usize, y: usize) -> &[u32] {
        &self.cells[y * self.nx + x]
    }

    /// Visit the cells of the Chebyshev ring at distance `ring` around
    /// `(cx, cy)`; returns `false` when the ring lies entirely off-grid.
    pub(crate) fn for_ring(
        &self,
        (cx, cy): (usize, usize),
        ring: usize,
        mut visit: impl FnMut(&[u32]),
    ) -> bool {
        if ring == 0 {
            visit(self.cell(cx, cy));
            return true;
        }
        let reach = cx
            .max(self.nx - 1 - cx)
            .max(cy)
            .max(self.ny - 1 - cy);
        if ring > reach {
            return false;
        }
        let x_lo = cx.saturating_sub(ring);
        let x_hi = (cx + ring).min(self.nx - 1);
        let y_lo = cy.saturating_sub(ring);
        let y_hi = (cy + ring).min(self.ny - 1);
        for y in y_lo..=y_hi {
            for x in x_lo..=x_hi {
                if x.abs_diff(cx) == ring || y.abs_diff(cy) == ring {
                    visit(self.cell(x, y));
                }
            }
        }
        true
    }

    /// Lower bound on the UV distance from a point in the center cell to any
    /// point in a cell of the given ring.
    pub(crate) fn ring_min_distance(&self, ring: usize) -> f32 {
        if ring <= 1 {
            0.0
        } else {
            (ring - 1) as f32 * self.cell_size
        }
    }

}

fn clamp_cell(
    uv: [f32; 2],
    min: [f32; 2],
    cell_size: f32,
    nx: usize,
    ny: usize,
) -> (usize, usize) {
    let fx = ((uv[0] - min[0]) / cell_size).floor();
    let fy = ((uv[1] - min[1]) / cell_size).floor();
    let x = (fx.max(0.0) as usize).min(nx - 1);
    let y = (fy.max(0.0) as usize).min(ny - 1);
    (x, y)
}

#[cfg(test)]
#[path = "../../tests/unit/mapping/grid.rs"]
mod tests;
