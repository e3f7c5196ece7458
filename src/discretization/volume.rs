use std::sync::atomic::{AtomicU64, Ordering};

use glam::DVec3;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;
use serde::Serialize;

use super::grid::{GridError, VoxelGrid};

pub const WHITE_MATTER_CONDUCTIVITY: f64 = 0.14;
pub const GRAY_MATTER_CONDUCTIVITY: f64 = 0.33;
pub const CSF_CONDUCTIVITY: f64 = 1.79;
/// Lower bound applied to every voxel [S/m].
pub const CONDUCTIVITY_FLOOR: f64 = 0.01;

const CORE_RADIUS: f64 = 0.2;
const MIXED_RADIUS: f64 = 0.35;
const CORTEX_RADIUS: f64 = 0.45;
const HETEROGENEITY_STD: f64 = 0.1;
const HETEROGENEITY_BOUNDS: (f64, f64) = (0.8, 1.2);

/// Coarse tissue label. Used for generation and display, never by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TissueClass {
    Csf = 0,
    WhiteMatter = 1,
    GrayMatter = 2,
}

impl TissueClass {
    pub fn base_conductivity(self) -> f64 {
        match self {
            TissueClass::Csf => CSF_CONDUCTIVITY,
            TissueClass::WhiteMatter => WHITE_MATTER_CONDUCTIVITY,
            TissueClass::GrayMatter => GRAY_MATTER_CONDUCTIVITY,
        }
    }
}

/// Identity of a volume instance; the solver cache is keyed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VolumeId(u64);

impl VolumeId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        VolumeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VolumeOptions {
    /// Multiplicative per-voxel noise on non-CSF tissue.
    pub heterogeneity: bool,
}

impl Default for VolumeOptions {
    fn default() -> Self {
        Self {
            heterogeneity: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassStats {
    pub class: TissueClass,
    pub voxels: usize,
    pub mean_conductivity: f64,
}

/// Conductivity distribution of the simulated medium.
///
/// Immutable once built. A different pattern needs a new instance, which also
/// gets a new [`VolumeId`].
#[derive(Debug)]
pub struct ConductivityVolume {
    id: VolumeId,
    grid: VoxelGrid,
    conductivity: Vec<f64>,
    tissue: Vec<TissueClass>,
}

impl ConductivityVolume {
    /// Layered core/shell volume with heterogeneity, reproducible from `seed`.
    pub fn build(dims: [usize; 3], extent: [f64; 3], seed: u64) -> Result<Self, GridError> {
        Self::build_with(dims, extent, seed, VolumeOptions::default())
    }

    pub fn build_with(
        dims: [usize; 3],
        extent: [f64; 3],
        seed: u64,
        options: VolumeOptions,
    ) -> Result<Self, GridError> {
        let grid = VoxelGrid::new(dims, extent)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut volume = Self::generate(grid, &mut rng);
        if options.heterogeneity {
            volume.apply_heterogeneity(&mut rng);
        }
        Ok(volume)
    }

    /// Homogeneous medium, every voxel labelled gray matter.
    pub fn uniform(grid: VoxelGrid, sigma: f64) -> Self {
        let n = grid.n_voxels();
        Self::from_values(grid, vec![sigma; n], vec![TissueClass::GrayMatter; n])
    }

    /// Volume from explicit voxel values in flat grid order.
    ///
    /// # Panics
    /// If either vector length differs from the voxel count.
    pub fn from_values(grid: VoxelGrid, conductivity: Vec<f64>, tissue: Vec<TissueClass>) -> Self {
        assert_eq!(conductivity.len(), grid.n_voxels(), "conductivity length");
        assert_eq!(tissue.len(), grid.n_voxels(), "tissue length");
        let conductivity = conductivity
            .into_iter()
            .map(|s| {
                if s.is_nan() {
                    CONDUCTIVITY_FLOOR
                } else {
                    s.max(CONDUCTIVITY_FLOOR)
                }
            })
            .collect();
        Self {
            id: VolumeId::next(),
            grid,
            conductivity,
            tissue,
        }
    }

    /// Radial band assignment around the volume centre.
    fn generate<R: Rng>(grid: VoxelGrid, rng: &mut R) -> Self {
        let n = grid.n_voxels();
        let mut conductivity = Vec::with_capacity(n);
        let mut tissue = Vec::with_capacity(n);
        let [nx, ny, nz] = grid.dims;

        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let r = (DVec3::new(unit(i, nx), unit(j, ny), unit(k, nz))
                        - DVec3::splat(0.5))
                    .length();
                    let class = if r < CORE_RADIUS {
                        TissueClass::WhiteMatter
                    } else if r < MIXED_RADIUS {
                        let gray_probability = (r - CORE_RADIUS) / (MIXED_RADIUS - CORE_RADIUS);
                        if rng.gen_range(0.0..1.0) < gray_probability {
                            TissueClass::GrayMatter
                        } else {
                            TissueClass::WhiteMatter
                        }
                    } else if r < CORTEX_RADIUS {
                        TissueClass::GrayMatter
                    } else {
                        TissueClass::Csf
                    };
                    tissue.push(class);
                    conductivity.push(class.base_conductivity());
                }
            }
        }

        Self {
            id: VolumeId::next(),
            grid,
            conductivity,
            tissue,
        }
    }

    /// Bounded multiplicative noise on tissue voxels, then the positivity floor.
    ///
    /// One factor is drawn for every voxel, CSF included, so the random stream
    /// does not depend on the band layout.
    fn apply_heterogeneity<R: Rng>(&mut self, rng: &mut R) {
        let (lo, hi) = HETEROGENEITY_BOUNDS;
        for (sigma, class) in self.conductivity.iter_mut().zip(&self.tissue) {
            let z: f64 = rng.sample(StandardNormal);
            let factor = (1.0 + HETEROGENEITY_STD * z).clamp(lo, hi);
            if *class != TissueClass::Csf {
                *sigma *= factor;
            }
        }
        for sigma in &mut self.conductivity {
            *sigma = sigma.max(CONDUCTIVITY_FLOOR);
        }
    }

    pub fn id(&self) -> VolumeId {
        self.id
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Voxel conductivities in flat grid order [S/m].
    pub fn conductivity(&self) -> &[f64] {
        &self.conductivity
    }

    pub fn tissue_classes(&self) -> &[TissueClass] {
        &self.tissue
    }

    #[inline]
    pub fn sigma(&self, i: usize, j: usize, k: usize) -> f64 {
        self.conductivity[self.grid.idx(i, j, k)]
    }

    /// Conductivity at a physical point (mm); CSF outside the grid.
    pub fn conductivity_at(&self, x: f64, y: f64, z: f64) -> f64 {
        self.grid
            .locate_index(DVec3::new(x, y, z))
            .map_or(CSF_CONDUCTIVITY, |idx| self.conductivity[idx])
    }

    /// Tissue class at a physical point (mm); CSF outside the grid.
    pub fn tissue_class_at(&self, x: f64, y: f64, z: f64) -> TissueClass {
        self.grid
            .locate_index(DVec3::new(x, y, z))
            .map_or(TissueClass::Csf, |idx| self.tissue[idx])
    }

    pub fn coordinates(&self) -> [Vec<f64>; 3] {
        self.grid.coordinates()
    }

    /// Voxel count and mean conductivity of each class present.
    pub fn class_statistics(&self) -> Vec<ClassStats> {
        [
            TissueClass::Csf,
            TissueClass::WhiteMatter,
            TissueClass::GrayMatter,
        ]
        .into_iter()
        .filter_map(|class| {
            let (count, sum) = self
                .tissue
                .iter()
                .zip(&self.conductivity)
                .filter(|(c, _)| **c == class)
                .fold((0usize, 0.0), |(n, s), (_, sigma)| (n + 1, s + sigma));
            (count > 0).then(|| ClassStats {
                class,
                voxels: count,
                mean_conductivity: sum / count as f64,
            })
        })
        .collect()
    }
}

/// Grid-normalised coordinate in `[0, 1]`.
fn unit(i: usize, n: usize) -> f64 {
    if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 }
}
