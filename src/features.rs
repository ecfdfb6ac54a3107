//! Feature embeddings driving the lattice filters.
//!
//! Every spatial site gets a small feature vector: its integer coordinates
//! divided by the spatial sigma, optionally followed by the auxiliary
//! feature channels divided by the colour sigma. The lattice approximates a
//! unit-sigma Gaussian in this embedded space, so the sigmas enter here and
//! nowhere else.

/// Per-site feature vectors, stored site-major.
#[derive(Clone, Debug)]
pub struct FeatureEmbedding {
    dims: usize,
    sites: usize,
    data: Vec<f32>,
}

impl FeatureEmbedding {
    /// Number of components per site.
    #[inline]
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of spatial sites.
    #[inline]
    pub fn sites(&self) -> usize {
        self.sites
    }

    /// The feature vector of one site.
    #[inline]
    pub fn site(&self, site: usize) -> &[f32] {
        &self.data[site * self.dims..(site + 1) * self.dims]
    }
}

/// Purely spatial embedding: scaled integer coordinates in row-major order.
pub fn spatial_embedding(spatial: &[usize], sigma: f32) -> FeatureEmbedding {
    build(spatial, sigma, None)
}

/// Bilateral embedding: scaled coordinates followed by scaled feature
/// channels.
///
/// `channels` is channel-major (`channels` blocks of `sites` values), the
/// memory order of one batch element of a standard-layout feature volume.
pub fn bilateral_embedding(
    spatial: &[usize],
    spatial_sigma: f32,
    channels: &[f32],
    channel_count: usize,
    color_sigma: f32,
) -> FeatureEmbedding {
    build(spatial, spatial_sigma, Some((channels, channel_count, color_sigma)))
}

fn build(
    spatial: &[usize],
    spatial_sigma: f32,
    colors: Option<(&[f32], usize, f32)>,
) -> FeatureEmbedding {
    let axes = spatial.len();
    let sites: usize = spatial.iter().product();
    let channel_count = colors.map_or(0, |(_, count, _)| count);
    let dims = axes + channel_count;

    let inv_spatial = 1.0 / spatial_sigma;
    let inv_color = colors.map_or(0.0, |(_, _, sigma)| 1.0 / sigma);
    let mut data = Vec::with_capacity(sites * dims);
    let mut coords = vec![0usize; axes];
    for site in 0..sites {
        for &coord in &coords {
            data.push(coord as f32 * inv_spatial);
        }
        if let Some((channels, count, _)) = colors {
            for channel in 0..count {
                data.push(channels[channel * sites + site] * inv_color);
            }
        }
        // advance the row-major multi-index
        for axis in (0..axes).rev() {
            coords[axis] += 1;
            if coords[axis] < spatial[axis] {
                break;
            }
            coords[axis] = 0;
        }
    }

    FeatureEmbedding { dims, sites, data }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spatial_coordinates_scale_with_sigma() {
        let emb = spatial_embedding(&[2, 3], 2.0);
        assert_eq!(emb.dims(), 2);
        assert_eq!(emb.sites(), 6);
        // row-major: site 4 is (1, 1)
        assert_eq!(emb.site(4), &[0.5, 0.5]);
        assert_eq!(emb.site(5), &[0.5, 1.0]);
    }

    #[test]
    fn bilateral_appends_scaled_channels() {
        // one axis of 3 sites, two channels
        let channels = [1.0f32, 1.0, 0.5, 0.0, 2.0, 4.0];
        let emb = bilateral_embedding(&[3], 5.0, &channels, 2, 0.5);
        assert_eq!(emb.dims(), 3);
        assert_eq!(emb.site(2), &[0.4, 1.0, 8.0]);
    }

    #[test]
    fn one_dimensional_embedding() {
        let emb = spatial_embedding(&[4], 1.0);
        for site in 0..4 {
            assert_eq!(emb.site(site), &[site as f32]);
        }
    }
}
