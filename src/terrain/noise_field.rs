//! Seeded fractal noise used to seed density fields

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

/// Highest octave count a field is expected to serve
pub const MAX_OCTAVES: u32 = 8;

/// Deterministic scalar noise.
///
/// Same seed, coordinates and octave count must give the same value on every
/// run. Output lies in [-1, 1].
pub trait NoiseField: Send + Sync {
    /// Re-seed the field; subsequent samples come from the new seed's domain
    fn reseed(&mut self, seed: u32);

    /// 2D fractal sample (used for ground height, independent of the vertical axis)
    fn fbm2(&self, x: f32, z: f32, octaves: u32) -> f32;

    /// 3D fractal sample
    fn fbm3(&self, x: f32, y: f32, z: f32, octaves: u32) -> f32;
}

/// Fractal Brownian motion over Perlin noise
pub struct PerlinNoiseField {
    seed: u32,
    /// One prepared Fbm per octave count, index 0 = 1 octave
    layers: Vec<Fbm<Perlin>>,
}

impl PerlinNoiseField {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            layers: Self::build_layers(seed),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    fn build_layers(seed: u32) -> Vec<Fbm<Perlin>> {
        (1..=MAX_OCTAVES)
            .map(|octaves| {
                Fbm::<Perlin>::new(seed)
                    .set_octaves(octaves as usize)
                    .set_persistence(0.5)
                    .set_lacunarity(2.0)
            })
            .collect()
    }

    fn layer(&self, octaves: u32) -> &Fbm<Perlin> {
        let octaves = octaves.clamp(1, MAX_OCTAVES);
        &self.layers[(octaves - 1) as usize]
    }
}

impl Default for PerlinNoiseField {
    fn default() -> Self {
        Self::new(0)
    }
}

impl NoiseField for PerlinNoiseField {
    fn reseed(&mut self, seed: u32) {
        if seed != self.seed {
            self.seed = seed;
            self.layers = Self::build_layers(seed);
        }
    }

    fn fbm2(&self, x: f32, z: f32, octaves: u32) -> f32 {
        let value = self.layer(octaves).get([x as f64, z as f64]);
        (value as f32).clamp(-1.0, 1.0)
    }

    fn fbm3(&self, x: f32, y: f32, z: f32, octaves: u32) -> f32 {
        let value = self.layer(octaves).get([x as f64, y as f64, z as f64]);
        (value as f32).clamp(-1.0, 1.0)
    }
}
