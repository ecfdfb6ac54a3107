//! Permutohedral-lattice approximation of high-dimensional Gaussian
//! filtering.
//!
//! The filters in this crate are normalized convolutions with the kernel
//! `exp(-||f_i - f_j||^2 / 2)` over embedded feature vectors. Evaluating
//! that kernel pairwise is O(sites^2); the lattice evaluates it in linear
//! time by splatting each site onto the vertices of its enclosing simplex in
//! the hyperplane H_d, blurring along the d+1 lattice directions with a
//! `[1/4, 1/2, 1/4]` kernel, and slicing back with the same barycentric
//! weights. A homogeneous weight channel is filtered alongside the data and
//! divided out at slice time, which makes the result a weighted average and
//! cancels the lattice's global scale.
//!
//! Splat geometry (simplex vertices and barycentric weights) depends only on
//! the feature embedding, so it is planned once per embedding and replayed
//! for every filtering pass; the mean-field loop reuses one plan across all
//! iterations.
//!
//! Lookups and traversals run in vertex insertion order; the sequential path
//! is bit-reproducible for identical inputs.

use crate::features::FeatureEmbedding;
use std::collections::HashMap;

const NO_NEIGHBOR: u32 = u32::MAX;

/// One splat target: lattice vertex slot and barycentric weight.
#[derive(Clone, Copy, Debug)]
struct SplatEntry {
    vertex: u32,
    weight: f32,
}

/// Precomputed splat/blur geometry for one feature embedding.
pub struct LatticePlan {
    feature_dims: usize,
    sites: usize,
    vertex_count: usize,
    /// `sites * (feature_dims + 1)` entries, site-major.
    entries: Vec<SplatEntry>,
    /// Per blur axis, per vertex: slots of the two neighbours along that
    /// axis (`NO_NEIGHBOR` where the populated set ends).
    blur_neighbors: Vec<[u32; 2]>,
}

impl LatticePlan {
    /// Embed every site of `embedding` into the lattice.
    pub fn new(embedding: &FeatureEmbedding) -> Self {
        let d = embedding.dims();
        let sites = embedding.sites();
        let simplex = d + 1;

        // Diagonal of the elevation matrix, scaled so the splat/blur/slice
        // chain approximates a unit-sigma Gaussian in the embedded space.
        let inv_std_dev = (d as f32 + 1.0) * (2.0f32 / 3.0).sqrt();
        let scale: Vec<f32> = (0..d)
            .map(|i| inv_std_dev / (((i + 1) * (i + 2)) as f32).sqrt())
            .collect();

        // Canonical simplex coordinates; row `r` holds the offsets of the
        // vertex with remainder `r`, indexed by coordinate rank.
        let mut canonical = vec![0i32; simplex * simplex];
        for i in 0..simplex {
            for j in 0..=(d - i) {
                canonical[i * simplex + j] = i as i32;
            }
            for j in (d - i + 1)..simplex {
                canonical[i * simplex + j] = i as i32 - simplex as i32;
            }
        }

        let mut table: HashMap<Vec<i32>, u32> = HashMap::new();
        let mut keys: Vec<i32> = Vec::new();
        let mut entries = Vec::with_capacity(sites * simplex);

        let mut elevated = vec![0.0f32; simplex];
        let mut greedy = vec![0i32; simplex];
        let mut rank = vec![0i32; simplex];
        let mut barycentric = vec![0.0f32; simplex + 1];
        let mut key = vec![0i32; d];

        let inv_simplex = 1.0 / simplex as f32;
        for site in 0..sites {
            let pos = embedding.site(site);

            // Elevate onto the hyperplane sum(x) = 0.
            elevated[d] = -(d as f32) * pos[d - 1] * scale[d - 1];
            for i in (1..d).rev() {
                elevated[i] = elevated[i + 1] - i as f32 * pos[i - 1] * scale[i - 1]
                    + (i as f32 + 2.0) * pos[i] * scale[i];
            }
            elevated[0] = elevated[1] + 2.0 * pos[0] * scale[0];

            // Round to the nearest remainder-zero lattice point.
            let mut coord_sum = 0i32;
            for i in 0..simplex {
                let v = elevated[i] * inv_simplex;
                let up = v.ceil() * simplex as f32;
                let down = v.floor() * simplex as f32;
                greedy[i] = if up - elevated[i] < elevated[i] - down {
                    up as i32
                } else {
                    down as i32
                };
                coord_sum += greedy[i];
            }
            // greedy coordinates are multiples of d+1, so this is exact
            coord_sum /= simplex as i32;

            // Rank differential between this simplex and the canonical one.
            rank.fill(0);
            for i in 0..d {
                let di = elevated[i] - greedy[i] as f32;
                for j in (i + 1)..simplex {
                    if di < elevated[j] - greedy[j] as f32 {
                        rank[i] += 1;
                    } else {
                        rank[j] += 1;
                    }
                }
            }

            // Walk off-hyperplane roundings back onto sum(x) = 0.
            if coord_sum > 0 {
                for i in 0..simplex {
                    if rank[i] >= simplex as i32 - coord_sum {
                        greedy[i] -= simplex as i32;
                        rank[i] += coord_sum - simplex as i32;
                    } else {
                        rank[i] += coord_sum;
                    }
                }
            } else if coord_sum < 0 {
                for i in 0..simplex {
                    if rank[i] < -coord_sum {
                        greedy[i] += simplex as i32;
                        rank[i] += simplex as i32 + coord_sum;
                    } else {
                        rank[i] += coord_sum;
                    }
                }
            }

            // Barycentric coordinates of the embedded point in its simplex.
            barycentric.fill(0.0);
            for i in 0..simplex {
                let delta = (elevated[i] - greedy[i] as f32) * inv_simplex;
                barycentric[d - rank[i] as usize] += delta;
                barycentric[simplex - rank[i] as usize] -= delta;
            }
            barycentric[0] += 1.0 + barycentric[simplex];

            // Register the simplex vertices (last coordinate is implicit).
            for remainder in 0..simplex {
                for i in 0..d {
                    key[i] = greedy[i] + canonical[remainder * simplex + rank[i] as usize];
                }
                let vertex = match table.get(key.as_slice()) {
                    Some(&slot) => slot,
                    None => {
                        let slot = table.len() as u32;
                        keys.extend_from_slice(&key);
                        table.insert(key.clone(), slot);
                        slot
                    }
                };
                entries.push(SplatEntry {
                    vertex,
                    weight: barycentric[remainder],
                });
            }
        }

        // Resolve blur neighbours up front: along axis j the neighbours of a
        // vertex differ by +1 in every coordinate except -d in the j-th (and
        // the mirror image).
        let vertex_count = table.len();
        let mut blur_neighbors = vec![[NO_NEIGHBOR; 2]; simplex * vertex_count];
        let mut n1 = vec![0i32; d];
        let mut n2 = vec![0i32; d];
        for axis in 0..simplex {
            for vertex in 0..vertex_count {
                let vkey = &keys[vertex * d..(vertex + 1) * d];
                for k in 0..d {
                    n1[k] = vkey[k] + 1;
                    n2[k] = vkey[k] - 1;
                }
                if axis < d {
                    n1[axis] = vkey[axis] - d as i32;
                    n2[axis] = vkey[axis] + d as i32;
                }
                let pair = &mut blur_neighbors[axis * vertex_count + vertex];
                pair[0] = table.get(n1.as_slice()).copied().unwrap_or(NO_NEIGHBOR);
                pair[1] = table.get(n2.as_slice()).copied().unwrap_or(NO_NEIGHBOR);
            }
        }

        Self {
            feature_dims: d,
            sites,
            vertex_count,
            entries,
            blur_neighbors,
        }
    }

    /// Number of populated lattice vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Filter `channels` class planes through the lattice.
    ///
    /// `values` and `out` are class-major (`channels` blocks of `sites`
    /// values). Every output site is a weighted average of input sites under
    /// the approximated Gaussian kernel; constants pass through unchanged.
    pub fn filter(&self, values: &[f32], channels: usize, out: &mut [f32]) {
        debug_assert_eq!(values.len(), channels * self.sites);
        debug_assert_eq!(out.len(), channels * self.sites);

        let simplex = self.feature_dims + 1;
        let vd = channels + 1;
        let mut verts = vec![0.0f32; self.vertex_count * vd];

        // Splat values plus a homogeneous weight channel.
        for site in 0..self.sites {
            for entry in &self.entries[site * simplex..(site + 1) * simplex] {
                let base = entry.vertex as usize * vd;
                for class in 0..channels {
                    verts[base + class] += entry.weight * values[class * self.sites + site];
                }
                verts[base + channels] += entry.weight;
            }
        }

        // Blur along each of the d+1 lattice directions; vertices outside
        // the populated set contribute zero.
        let mut scratch = vec![0.0f32; verts.len()];
        for axis in 0..simplex {
            let neighbors =
                &self.blur_neighbors[axis * self.vertex_count..(axis + 1) * self.vertex_count];
            for vertex in 0..self.vertex_count {
                let [left, right] = neighbors[vertex];
                let base = vertex * vd;
                for k in 0..vd {
                    let l = if left == NO_NEIGHBOR {
                        0.0
                    } else {
                        verts[left as usize * vd + k]
                    };
                    let r = if right == NO_NEIGHBOR {
                        0.0
                    } else {
                        verts[right as usize * vd + k]
                    };
                    scratch[base + k] = 0.5 * verts[base + k] + 0.25 * (l + r);
                }
            }
            std::mem::swap(&mut verts, &mut scratch);
        }

        // Slice back and divide by the filtered homogeneous weight.
        let mut col = vec![0.0f32; vd];
        for site in 0..self.sites {
            col.fill(0.0);
            for entry in &self.entries[site * simplex..(site + 1) * simplex] {
                let base = entry.vertex as usize * vd;
                for (k, value) in col.iter_mut().enumerate() {
                    *value += entry.weight * verts[base + k];
                }
            }
            let inv = 1.0 / col[channels];
            for class in 0..channels {
                out[class * self.sites + site] = col[class] * inv;
            }
        }
    }
}
