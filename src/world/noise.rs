//! Fixed-table 2D gradient noise used for biome classification.
//!
//! The permutation table is a constant shared by every caller, so two peers
//! that agree on a seed also agree on the biome map without exchanging it.

const PERMUTATION: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209, 76,
    132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173,
    186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212, 207, 206,
    59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44, 154, 163,
    70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232,
    178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162,
    241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157, 184, 84, 204,
    176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29, 24, 72, 243, 141,
    128, 195, 78, 66, 215, 61, 156, 180,
];

/// Table duplicated to 512 entries so `p[i + 1]` never needs a wrap.
const P: [u8; 512] = {
    let mut p = [0u8; 512];
    let mut i = 0;
    while i < 512 {
        p[i] = PERMUTATION[i & 255];
        i += 1;
    }
    p
};

/// One octave of a fractal sum: sampling frequency and amplitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Octave {
    pub frequency: f64,
    pub amplitude: f64,
}

/// Octaves used for the biome map.
pub const BIOME_OCTAVES: [Octave; 4] = [
    Octave { frequency: 0.01, amplitude: 0.5 },
    Octave { frequency: 0.02, amplitude: 0.25 },
    Octave { frequency: 0.04, amplitude: 0.125 },
    Octave { frequency: 0.08, amplitude: 0.0625 },
];

/// Stateless noise sampler. Zero-sized; copy it freely across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoiseField;

impl NoiseField {
    pub fn new() -> Self {
        NoiseField
    }

    /// Gradient noise at `(x, y)`, in `[-1, 1]`.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let xi = (x.floor() as i64 & 255) as usize;
        let yi = (y.floor() as i64 & 255) as usize;
        let xf = x - x.floor();
        let yf = y - y.floor();
        let u = fade(xf);
        let v = fade(yf);

        let a = P[xi] as usize + yi;
        let b = P[xi + 1] as usize + yi;

        let bottom = lerp(u, grad(P[a], xf, yf), grad(P[b], xf - 1.0, yf));
        let top = lerp(
            u,
            grad(P[a + 1], xf, yf - 1.0),
            grad(P[b + 1], xf - 1.0, yf - 1.0),
        );
        lerp(v, bottom, top).clamp(-1.0, 1.0)
    }

    /// Weighted sum of several octaves.
    pub fn fractal(&self, x: f64, y: f64, octaves: &[Octave]) -> f64 {
        octaves
            .iter()
            .map(|o| self.sample(x * o.frequency, y * o.frequency) * o.amplitude)
            .sum()
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

fn grad(hash: u8, x: f64, y: f64) -> f64 {
    let h = hash & 7;
    let (u, v) = if h < 4 { (x, y) } else { (y, x) };
    let u = if h & 1 == 0 { u } else { -u };
    let v = if h & 2 == 0 { v } else { -v };
    u + v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_at_lattice_points() {
        let noise = NoiseField::new();
        for (x, y) in [(0.0, 0.0), (3.0, 7.0), (-12.0, 40.0), (255.0, 256.0)] {
            assert_eq!(noise.sample(x, y), 0.0, "lattice point ({}, {})", x, y);
        }
    }

    #[test]
    fn samples_stay_in_range() {
        let noise = NoiseField::new();
        for i in 0..2000 {
            let x = i as f64 * 0.137 - 50.0;
            let y = i as f64 * 0.291 + 13.0;
            let v = noise.sample(x, y);
            assert!((-1.0..=1.0).contains(&v), "sample {} out of range", v);
        }
    }

    #[test]
    fn deterministic_across_instances() {
        let a = NoiseField::new();
        let b = NoiseField;
        for i in 0..100 {
            let x = i as f64 * 1.7;
            let y = i as f64 * 0.3;
            assert_eq!(a.sample(x, y), b.sample(x, y));
        }
    }

    #[test]
    fn wraps_every_256_units() {
        let noise = NoiseField::new();
        assert_eq!(noise.sample(0.5, 0.25), noise.sample(256.5, 0.25));
        assert_eq!(noise.sample(0.5, 0.25), noise.sample(0.5, 256.25));
    }

    #[test]
    fn fractal_is_bounded_by_amplitude_sum() {
        let noise = NoiseField::new();
        let bound: f64 = BIOME_OCTAVES.iter().map(|o| o.amplitude).sum();
        for i in 0..500 {
            let v = noise.fractal(i as f64 * 3.1, i as f64 * 1.9, &BIOME_OCTAVES);
            assert!(v.abs() <= bound);
        }
    }

    #[test]
    fn table_is_duplicated() {
        for i in 0..256 {
            assert_eq!(P[i], P[i + 256]);
        }
    }
}
