use crate::{Error, PolarSampling, Rgb, ShapeParams, SphereColoring, SphereParams};
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use std::f32::consts::PI;

/// Flat per-particle attribute buffers, ready to be uploaded as-is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldBuffers {
  pub positions: Vec<f32>,
  pub colors: Vec<f32>,
  pub sizes: Vec<f32>,
}

impl FieldBuffers {
  fn with_capacity(count: usize) -> Self {
    Self {
      positions: Vec::with_capacity(count * 3),
      colors: Vec::with_capacity(count * 3),
      sizes: Vec::with_capacity(count),
    }
  }

  fn push(&mut self, position: [f32; 3], color: Rgb, size: f32) {
    self.positions.extend_from_slice(&position);
    self.colors.extend_from_slice(&[color.r, color.g, color.b]);
    self.sizes.push(size);
  }

  pub fn len(&self) -> usize {
    self.sizes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sizes.is_empty()
  }
}

/// One spiral-galaxy particle before it is flattened into buffers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpiralSample {
  pub radius: f32,
  /// Exact position on the spiral arm.
  pub arm: [f32; 3],
  pub jitter: [f32; 3],
}

impl SpiralSample {
  pub fn position(&self) -> [f32; 3] {
    [
      self.arm[0] + self.jitter[0],
      self.arm[1] + self.jitter[1],
      self.arm[2] + self.jitter[2],
    ]
  }
}

fn validate_shape(shape: &ShapeParams) -> Result<(), Error> {
  if shape.branches == 0 {
    return Err(Error::ZeroBranches);
  }
  if !shape.radius.is_finite() || shape.radius < 0.0 {
    return Err(Error::InvalidShape(format!("radius {}", shape.radius)));
  }
  let finite = [shape.spin, shape.randomness, shape.randomness_power];
  if finite.iter().any(|v| !v.is_finite()) {
    return Err(Error::InvalidShape(
      "spin and randomness must be finite".to_string(),
    ));
  }
  Ok(())
}

fn signed_jitter<R: Rng + ?Sized>(rng: &mut R, power: f32, scale: f32) -> f32 {
  let magnitude = rng.gen::<f32>().powf(power) * scale;
  if rng.gen_bool(0.5) {
    magnitude
  } else {
    -magnitude
  }
}

/// Places particle `index` on its spiral arm. `shape` must already be valid.
pub fn sample_spiral<R: Rng + ?Sized>(index: usize, shape: &ShapeParams, rng: &mut R) -> SpiralSample {
  let radius = rng.gen::<f32>() * shape.radius;
  let spin_angle = radius * shape.spin;
  let branches = shape.branches as usize;
  let branch_angle = (index % branches) as f32 / branches as f32 * 2.0 * PI;
  let angle = branch_angle + spin_angle;

  let scale = shape.randomness * radius;
  let jitter = [
    signed_jitter(rng, shape.randomness_power, scale),
    signed_jitter(rng, shape.randomness_power, scale),
    signed_jitter(rng, shape.randomness_power, scale),
  ];

  SpiralSample {
    radius,
    arm: [angle.cos() * radius, 0.0, angle.sin() * radius],
    jitter,
  }
}

/// Colour of a particle at `radius`, running from the inside to the outside stop.
pub fn radial_color(shape: &ShapeParams, radius: f32) -> Rgb {
  let t = if shape.radius > 0.0 {
    (radius / shape.radius).clamp(0.0, 1.0)
  } else {
    0.0
  };
  shape.inside_color.lerp(shape.outside_color, t)
}

/// Generates `count` spiral-galaxy particles.
pub fn generate<R: Rng + ?Sized>(
  count: usize,
  shape: &ShapeParams,
  rng: &mut R,
) -> Result<FieldBuffers, Error> {
  validate_shape(shape)?;

  let sizes = Uniform::new(0.5f32, 2.5);
  let mut buffers = FieldBuffers::with_capacity(count);
  for i in 0..count {
    let sample = sample_spiral(i, shape, rng);
    let color = radial_color(shape, sample.radius);
    buffers.push(sample.position(), color, sizes.sample(rng));
  }
  Ok(buffers)
}

impl PolarSampling {
  pub fn sample_phi<R: Rng + ?Sized>(self, rng: &mut R) -> f32 {
    let u = rng.gen::<f32>();
    match self {
      PolarSampling::Uniform => (2.0 * u - 1.0).clamp(-1.0, 1.0).acos(),
      PolarSampling::Biased => u * PI,
    }
  }
}

pub fn ambient_palette() -> [Rgb; 6] {
  [
    Rgb::from_u32(0xffeb3b), // yellow
    Rgb::from_u32(0xff9800), // orange
    Rgb::from_u32(0x4caf50), // green
    Rgb::from_u32(0x00bcd4), // teal
    Rgb::from_u32(0x3f51b5), // indigo
    Rgb::from_u32(0x9c27b0), // purple
  ]
}

/// Generates a spherical shell of points for starfields and ambient clouds.
pub fn generate_sphere<R: Rng + ?Sized>(params: &SphereParams, rng: &mut R) -> Result<FieldBuffers, Error> {
  let band = [params.min_radius, params.max_radius, params.min_size, params.max_size];
  if band.iter().any(|v| !v.is_finite() || *v < 0.0) {
    return Err(Error::InvalidShape(
      "sphere radii and sizes must be finite and non-negative".to_string(),
    ));
  }
  if params.min_radius > params.max_radius || params.min_size > params.max_size {
    return Err(Error::InvalidShape("sphere band is inverted".to_string()));
  }

  let radii = Uniform::new_inclusive(params.min_radius, params.max_radius);
  let sizes = Uniform::new_inclusive(params.min_size, params.max_size);
  let palette = ambient_palette();
  let mut buffers = FieldBuffers::with_capacity(params.count as usize);

  for _ in 0..params.count {
    let radius = radii.sample(rng);
    let theta = rng.gen::<f32>() * 2.0 * PI;
    let phi = params.sampling.sample_phi(rng);
    let position = [
      radius * phi.sin() * theta.cos(),
      radius * phi.sin() * theta.sin(),
      radius * phi.cos(),
    ];

    let color = match params.coloring {
      SphereColoring::StarTint => Rgb::new(
        0.8 + rng.gen::<f32>() * 0.2,
        0.8 + rng.gen::<f32>() * 0.2,
        0.9 + rng.gen::<f32>() * 0.1,
      ),
      SphereColoring::Palette => palette[rng.gen_range(0..palette.len())],
    };

    buffers.push(position, color, sizes.sample(rng));
  }
  Ok(buffers)
}

/// Picks the inside/outside stops a new galaxy is drawn with.
pub fn random_galaxy_colors<R: Rng + ?Sized>(rng: &mut R) -> (Rgb, Rgb) {
  let inside = if rng.gen_bool(0.5) { 0xff6030 } else { 0x00aaff };
  let outside = if rng.gen_bool(0.5) { 0x1b3984 } else { 0x8800ff };
  (Rgb::from_u32(inside), Rgb::from_u32(outside))
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;
  use rand::{rngs::SmallRng, SeedableRng};

  fn small_shape() -> ShapeParams {
    ShapeParams {
      count: 1000,
      radius: 5.0,
      branches: 5,
      spin: 1.0,
      randomness: 0.2,
      randomness_power: 3.0,
      ..ShapeParams::default()
    }
  }

  #[test]
  fn scenario_thousand_particles_are_finite() {
    let mut rng = SmallRng::seed_from_u64(42);
    let buffers = generate(1000, &small_shape(), &mut rng).unwrap();
    assert_eq!(buffers.positions.len(), 3000);
    assert!(buffers.positions.iter().all(|v| v.is_finite()));
  }

  #[test]
  fn empty_field_is_valid() {
    let mut rng = SmallRng::seed_from_u64(1);
    let buffers = generate(0, &small_shape(), &mut rng).unwrap();
    assert!(buffers.is_empty());
    assert!(buffers.positions.is_empty() && buffers.colors.is_empty());
  }

  #[test]
  fn zero_branches_fails_fast() {
    let mut rng = SmallRng::seed_from_u64(1);
    let shape = ShapeParams {
      branches: 0,
      ..small_shape()
    };
    assert_eq!(generate(10, &shape, &mut rng), Err(Error::ZeroBranches));
  }

  #[test]
  fn negative_radius_is_rejected() {
    let mut rng = SmallRng::seed_from_u64(1);
    let shape = ShapeParams {
      radius: -1.0,
      ..small_shape()
    };
    assert!(matches!(generate(10, &shape, &mut rng), Err(Error::InvalidShape(_))));
  }

  #[test]
  fn same_seed_same_field() {
    let a = generate(200, &small_shape(), &mut SmallRng::seed_from_u64(7)).unwrap();
    let b = generate(200, &small_shape(), &mut SmallRng::seed_from_u64(7)).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn zero_randomness_stays_on_arm_plane() {
    let mut rng = SmallRng::seed_from_u64(3);
    let shape = ShapeParams {
      randomness: 0.0,
      ..small_shape()
    };
    let buffers = generate(300, &shape, &mut rng).unwrap();
    for p in buffers.positions.chunks_exact(3) {
      assert_eq!(p[1], 0.0);
      assert!(p[0].hypot(p[2]) <= shape.radius + 1e-4);
    }
  }

  #[test]
  fn particles_cycle_through_branches() {
    let mut rng = SmallRng::seed_from_u64(9);
    let shape = ShapeParams {
      spin: 0.0,
      randomness: 0.0,
      branches: 4,
      ..small_shape()
    };
    for i in 0..8 {
      let s = sample_spiral(i, &shape, &mut rng);
      let expected = (i % 4) as f32 / 4.0 * 2.0 * PI;
      if s.radius > 1e-3 {
        let angle = s.arm[2].atan2(s.arm[0]).rem_euclid(2.0 * PI);
        let diff = (angle - expected).abs();
        assert!(diff < 1e-3 || (2.0 * PI - diff) < 1e-3, "particle {i}: {angle} vs {expected}");
      }
    }
  }

  #[test]
  fn star_tint_stays_in_band() {
    let mut rng = SmallRng::seed_from_u64(11);
    let params = SphereParams {
      count: 500,
      ..SphereParams::starfield()
    };
    let buffers = generate_sphere(&params, &mut rng).unwrap();
    assert_eq!(buffers.len(), 500);
    for (p, c) in buffers.positions.chunks_exact(3).zip(buffers.colors.chunks_exact(3)) {
      let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
      assert!((99.9..=1000.1).contains(&r));
      assert!(c[0] >= 0.8 && c[1] >= 0.8 && c[2] >= 0.9);
      assert!(c.iter().all(|v| *v <= 1.0));
    }
  }

  #[test]
  fn ambient_cloud_uses_palette() {
    let mut rng = SmallRng::seed_from_u64(12);
    let buffers = generate_sphere(&SphereParams::ambient(), &mut rng).unwrap();
    let palette = ambient_palette();
    for c in buffers.colors.chunks_exact(3) {
      assert!(palette.iter().any(|p| p.r == c[0] && p.g == c[1] && p.b == c[2]));
    }
    assert!(buffers.sizes.iter().all(|s| (1.0..=6.0).contains(s)));
  }

  #[test]
  fn uniform_sampling_balances_hemispheres_and_poles() {
    let mut rng = SmallRng::seed_from_u64(5);
    let n = 20_000;
    let uniform_caps = (0..n)
      .filter(|_| PolarSampling::Uniform.sample_phi(&mut rng).cos().abs() > 0.9)
      .count() as f32
      / n as f32;
    let biased_caps = (0..n)
      .filter(|_| PolarSampling::Biased.sample_phi(&mut rng).cos().abs() > 0.9)
      .count() as f32
      / n as f32;
    // Caps with |cos phi| > 0.9 hold 10% of a uniform sphere's surface.
    assert!((uniform_caps - 0.1).abs() < 0.02, "uniform caps {uniform_caps}");
    assert!(biased_caps > 0.25, "biased caps {biased_caps}");
  }

  #[test]
  fn inverted_sphere_band_is_rejected() {
    let mut rng = SmallRng::seed_from_u64(1);
    let params = SphereParams {
      min_radius: 10.0,
      max_radius: 1.0,
      ..SphereParams::ambient()
    };
    assert!(generate_sphere(&params, &mut rng).is_err());
  }

  proptest! {
    #[test]
    fn buffer_lengths_match_count(count in 0usize..400, seed: u64) {
      let mut rng = SmallRng::seed_from_u64(seed);
      let buffers = generate(count, &small_shape(), &mut rng).unwrap();
      prop_assert_eq!(buffers.positions.len(), 3 * count);
      prop_assert_eq!(buffers.colors.len(), 3 * count);
      prop_assert_eq!(buffers.sizes.len(), count);
      prop_assert!(buffers.sizes.iter().all(|s| (0.5..2.5).contains(s)));
    }

    #[test]
    fn colors_lie_between_stops(seed: u64) {
      let mut rng = SmallRng::seed_from_u64(seed);
      let shape = small_shape();
      for i in 0..50 {
        let sample = sample_spiral(i, &shape, &mut rng);
        let c = radial_color(&shape, sample.radius);
        let t = sample.radius / shape.radius;
        prop_assert!((0.0..=1.0).contains(&t));
        for (v, (a, b)) in [c.r, c.g, c.b].into_iter().zip([
          (shape.inside_color.r, shape.outside_color.r),
          (shape.inside_color.g, shape.outside_color.g),
          (shape.inside_color.b, shape.outside_color.b),
        ]) {
          prop_assert!((0.0..=1.0).contains(&v));
          prop_assert!((v - (a + (b - a) * t)).abs() < 1e-5);
        }
      }
    }

    #[test]
    fn arm_radius_within_shape(seed: u64, radius in 0.0f32..50.0) {
      let mut rng = SmallRng::seed_from_u64(seed);
      let shape = ShapeParams { radius, ..small_shape() };
      for i in 0..50 {
        let s = sample_spiral(i, &shape, &mut rng);
        let p = s.position();
        let pre = (p[0] - s.jitter[0]).hypot(p[2] - s.jitter[2]);
        prop_assert!(pre <= radius * (1.0 + 1e-5) + 1e-5);
        prop_assert!((pre - s.radius).abs() <= 1e-3 * (1.0 + radius));
      }
    }
  }
}
