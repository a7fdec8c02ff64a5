//! Felzenszwalb & Huttenlocher 3D Euclidean Distance Transform
//!
//! Computes exact squared Euclidean distances (in cells) from every lattice
//! cell to the nearest seed cell. The 3D problem separates into 1D passes
//! along x, y and z, each solved with the "marching parabolas" (lower
//! envelope) technique in linear time.
//!
//! Reference: Felzenszwalb & Huttenlocher, "Distance Transforms of Sampled
//! Functions", Theory of Computing (2012).
//!
//! With the `rayon` feature the x and y passes run in parallel over z-slabs
//! and the z pass over the lines of a transposed copy. Every line is
//! transformed by the same sequential code either way, so the output does
//! not depend on the feature or the thread count.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Sentinel value representing "infinite" distance (no seed in range).
pub const INF: f32 = f32::MAX / 2.0;

// ---------------------------------------------------------------------------
// 1D Distance Transform
// ---------------------------------------------------------------------------

/// Scratch buffers for the 1D transform, sized for the longest line.
struct Envelope {
    f: Vec<f32>,
    v: Vec<usize>,
    z: Vec<f32>,
}

impl Envelope {
    fn new(max_len: usize) -> Self {
        Self {
            f: vec![0.0; max_len],
            v: vec![0; max_len],
            z: vec![0.0; max_len + 1],
        }
    }

    /// Replace `line[i]` with min over j of `line[j] + (i - j)^2`.
    fn transform(&mut self, line: &mut [f32]) {
        let n = line.len();
        if n == 0 {
            return;
        }
        let f = &mut self.f[..n];
        f.copy_from_slice(line);
        let v = &mut self.v[..n];
        let z = &mut self.z[..=n];

        let parabola = |q: usize, f: &[f32]| f[q] + (q * q) as f32;

        let mut k = 0usize;
        v[0] = 0;
        z[0] = -INF;
        z[1] = INF;

        for q in 1..n {
            let fq = parabola(q, f);
            let mut s = (fq - parabola(v[k], f)) / (2.0 * (q - v[k]) as f32);
            while k > 0 && s <= z[k] {
                k -= 1;
                s = (fq - parabola(v[k], f)) / (2.0 * (q - v[k]) as f32);
            }
            k += 1;
            v[k] = q;
            z[k] = s;
            z[k + 1] = INF;
        }

        k = 0;
        for (q, out) in line.iter_mut().enumerate() {
            while z[k + 1] < q as f32 {
                k += 1;
            }
            let d = q.abs_diff(v[k]) as f32;
            *out = (d * d + f[v[k]]).min(INF);
        }
    }
}

// ---------------------------------------------------------------------------
// 3D Distance Transform
// ---------------------------------------------------------------------------

/// A 3D lattice storing squared Euclidean distances in cells.
pub struct DistanceField {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    /// Index = x + y * width + z * width * height.
    /// Values are squared distances to the nearest seed, or [`INF`].
    pub data: Vec<f32>,
}

impl DistanceField {
    /// Compute the distance field of a binary seed mask.
    ///
    /// `seeds[i]` is `true` for occupied cells.
    pub fn from_seeds(width: usize, height: usize, depth: usize, seeds: &[bool]) -> Self {
        assert_eq!(seeds.len(), width * height * depth);

        let mut data: Vec<f32> = seeds.iter().map(|&s| if s { 0.0 } else { INF }).collect();
        if data.is_empty() {
            return Self {
                width,
                height,
                depth,
                data,
            };
        }

        let slab = width * height;

        // --- Pass 1 & 2: x then y, independently per z-slab ---
        for_each_chunk(&mut data, slab, |slab_data| {
            let mut env = Envelope::new(width.max(height));
            for row in slab_data.chunks_mut(width) {
                env.transform(row);
            }
            let mut column = vec![0.0f32; height];
            for x in 0..width {
                for (y, c) in column.iter_mut().enumerate() {
                    *c = slab_data[y * width + x];
                }
                env.transform(&mut column);
                for (y, c) in column.iter().enumerate() {
                    slab_data[y * width + x] = *c;
                }
            }
        });

        // --- Pass 3: z, on a copy where z lines are contiguous ---
        if depth > 1 {
            let mut transposed = vec![0.0f32; data.len()];
            transpose_blocked(&data, &mut transposed, slab, depth);
            for_each_chunk(&mut transposed, depth, |line| {
                Envelope::new(depth).transform(line);
            });
            transpose_blocked(&transposed, &mut data, depth, slab);
        }

        Self {
            width,
            height,
            depth,
            data,
        }
    }

    /// Distances in cells in index order, `None` where no seed exists.
    pub fn distances(&self) -> impl Iterator<Item = Option<f32>> + '_ {
        self.data.iter().map(|&sq| (sq < INF).then(|| sq.sqrt()))
    }
}

/// Run `f` over disjoint consecutive chunks of `len` elements.
fn for_each_chunk<F>(data: &mut [f32], len: usize, f: F)
where
    F: Fn(&mut [f32]) + Send + Sync,
{
    #[cfg(feature = "rayon")]
    data.par_chunks_mut(len).for_each(f);
    #[cfg(not(feature = "rayon"))]
    data.chunks_mut(len).for_each(f);
}

/// Transpose a row-major `h x w` matrix into a row-major `w x h` matrix.
fn transpose_blocked(src: &[f32], dst: &mut [f32], w: usize, h: usize) {
    const BLOCK: usize = 64;
    for by in (0..h).step_by(BLOCK) {
        for bx in (0..w).step_by(BLOCK) {
            let y_end = (by + BLOCK).min(h);
            let x_end = (bx + BLOCK).min(w);
            for y in by..y_end {
                for x in bx..x_end {
                    dst[x * h + y] = src[y * w + x];
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
