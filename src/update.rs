use crate::driver::FrameTime;
use crate::field::{FieldId, FieldList, Motion, ParticleField};
use crate::initialize::{generate, random_galaxy_colors};
use crate::{DriftMode, Error, ShapeParams};
use cgmath::Vector3;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution};
use std::f32::consts::PI;

/// Frame rate at which both drift modes produce the same motion.
pub const REFERENCE_FPS: f32 = 60.0;

const GALAXY_SPIN: f32 = 0.005;
const FLOAT_AMPLITUDE: f32 = 0.001;
const JITTER_AMPLITUDE: f32 = 0.01;
const AMBIENT_SPIN: f32 = 0.05;

fn drift_scale(mode: DriftMode, delta: f32) -> f32 {
  match mode {
    DriftMode::PerFrame => 1.0,
    DriftMode::TimeScaled => delta * REFERENCE_FPS,
  }
}

/// Advances one field by one frame. `field_index` is the field's position in
/// its list; later fields spin and float faster.
pub fn tick(field: &mut ParticleField, time: FrameTime, field_index: usize, mode: DriftMode) {
  match field.motion() {
    Motion::Drift => drift(field, time, field_index, mode),
    Motion::Jitter => jitter(field, time, mode),
    Motion::Static => {}
  }
}

fn drift(field: &mut ParticleField, time: FrameTime, field_index: usize, mode: DriftMode) {
  let i = (field_index + 1) as f32;
  field.orientation.y += time.delta * GALAXY_SPIN * i;

  let scale = drift_scale(mode, time.delta);
  if scale == 0.0 {
    return;
  }
  field.origin.y += (time.elapsed * 0.2 * i).sin() * FLOAT_AMPLITUDE * scale;
  field.origin.x += (time.elapsed * 0.1 * i).cos() * FLOAT_AMPLITUDE * scale;
}

/// Wobbles every particle in place. Runs over the whole buffer each frame, so
/// it must not allocate.
fn jitter(field: &mut ParticleField, time: FrameTime, mode: DriftMode) {
  field.orientation.y += time.delta * AMBIENT_SPIN;

  let scale = drift_scale(mode, time.delta);
  if scale == 0.0 {
    return;
  }
  let amplitude = JITTER_AMPLITUDE * scale;
  let t = time.elapsed;
  for (i, p) in field.positions_mut().chunks_exact_mut(3).enumerate() {
    let phase = i as f32 * 0.01;
    p[0] += (t * 0.1 + phase).sin() * amplitude;
    p[1] += (t * 0.1 + phase).cos() * amplitude;
    p[2] += (t * 0.2 + phase).sin() * amplitude;
  }
}

/// Builds a galaxy field at `origin` with a random tilt and spin.
pub fn build_galaxy<R: Rng + ?Sized>(
  id: FieldId,
  origin: Vector3<f32>,
  shape: &ShapeParams,
  randomize_colors: bool,
  rng: &mut R,
) -> Result<ParticleField, Error> {
  let shape = if randomize_colors {
    let (inside, outside) = random_galaxy_colors(rng);
    shape.with_colors(inside, outside)
  } else {
    *shape
  };
  let buffers = generate(shape.count as usize, &shape, rng)?;

  let mut field = ParticleField::new(id, buffers, Motion::Drift)?;
  field.origin = origin;
  field.orientation = Vector3::new(
    rng.gen::<f32>() * PI,
    rng.gen::<f32>() * 2.0 * PI,
    rng.gen::<f32>() * PI / 4.0,
  );
  field.point_size = shape.point_size;
  field.opacity = 0.8;
  Ok(field)
}

/// Uniform point in a cube of edge `spread` centred on `center`.
pub fn scatter<R: Rng + ?Sized>(rng: &mut R, center: Vector3<f32>, spread: f32) -> Vector3<f32> {
  center
    + Vector3::new(
      (rng.gen::<f32>() - 0.5) * spread,
      (rng.gen::<f32>() - 0.5) * spread,
      (rng.gen::<f32>() - 0.5) * spread,
    )
}

/// Per-frame Bernoulli spawn of new galaxies, bounded by the list's capacity.
#[derive(Copy, Clone, Debug)]
pub struct SpawnPolicy {
  trial: Bernoulli,
  spread: f32,
}

impl SpawnPolicy {
  pub fn new(probability: f64, spread: f32) -> Result<Self, Error> {
    let trial = Bernoulli::new(probability).map_err(|_| Error::InvalidProbability(probability))?;
    Ok(Self { trial, spread })
  }

  /// Runs one trial. The trial is drawn every call, cap or not, so the random
  /// stream does not depend on how full the list is.
  pub fn maybe_spawn<R: Rng + ?Sized>(
    &self,
    fields: &mut FieldList,
    shape: &ShapeParams,
    randomize_colors: bool,
    rng: &mut R,
  ) -> Result<Option<FieldId>, Error> {
    if !self.trial.sample(rng) || fields.is_full() {
      return Ok(None);
    }
    let origin = scatter(rng, Vector3::new(0.0, 0.0, 0.0), self.spread);
    let id = fields.next_id();
    let field = build_galaxy(id, origin, shape, randomize_colors, rng)?;
    fields.push(field).map(Some)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::initialize::FieldBuffers;
  use rand::{rngs::SmallRng, SeedableRng};
  use test_case::test_case;

  fn tiny_shape() -> ShapeParams {
    ShapeParams {
      count: 16,
      ..ShapeParams::default()
    }
  }

  fn cloud(count: usize) -> ParticleField {
    let mut list = FieldList::new(1);
    let positions = (0..count * 3).map(|v| v as f32).collect();
    let buffers = FieldBuffers {
      positions,
      colors: vec![1.0; count * 3],
      sizes: vec![1.0; count],
    };
    ParticleField::new(list.next_id(), buffers, Motion::Jitter).unwrap()
  }

  fn galaxy(rng: &mut SmallRng) -> ParticleField {
    let mut list = FieldList::new(1);
    build_galaxy(list.next_id(), Vector3::new(1.0, 2.0, 3.0), &tiny_shape(), true, rng).unwrap()
  }

  #[test]
  fn zero_delta_changes_nothing() {
    let mut rng = SmallRng::seed_from_u64(1);
    let mut g = galaxy(&mut rng);
    let mut c = cloud(50);
    let (origin, orientation) = (g.origin, g.orientation);
    let positions = c.positions().to_vec();
    let time = FrameTime {
      elapsed: 12.5,
      delta: 0.0,
    };
    for index in 0..4 {
      tick(&mut g, time, index, DriftMode::TimeScaled);
      tick(&mut c, time, index, DriftMode::TimeScaled);
    }
    assert_eq!(g.origin, origin);
    assert_eq!(g.orientation, orientation);
    assert_eq!(c.positions(), positions.as_slice());
    assert!(!c.take_dirty());
  }

  #[test]
  fn per_frame_drift_moves_even_without_delta() {
    let mut rng = SmallRng::seed_from_u64(1);
    let mut g = galaxy(&mut rng);
    let origin = g.origin;
    let time = FrameTime {
      elapsed: 0.0,
      delta: 0.0,
    };
    tick(&mut g, time, 0, DriftMode::PerFrame);
    // cos(0) * 0.001 on x, sin(0) on y.
    assert!((g.origin.x - origin.x - 0.001).abs() < 1e-6);
    assert_eq!(g.origin.y, origin.y);
  }

  #[test_case(0, 0.005 ; "first field")]
  #[test_case(2, 0.015 ; "third field")]
  fn later_fields_spin_faster(index: usize, expected: f32) {
    let mut rng = SmallRng::seed_from_u64(2);
    let mut g = galaxy(&mut rng);
    let before = g.orientation.y;
    let time = FrameTime {
      elapsed: 1.0,
      delta: 1.0,
    };
    tick(&mut g, time, index, DriftMode::TimeScaled);
    assert!((g.orientation.y - before - expected).abs() < 1e-6);
  }

  #[test]
  fn modes_agree_at_reference_frame_rate() {
    let mut rng = SmallRng::seed_from_u64(3);
    let mut a = galaxy(&mut rng);
    let mut b = a.clone();
    let time = FrameTime {
      elapsed: 3.0,
      delta: 1.0 / REFERENCE_FPS,
    };
    tick(&mut a, time, 1, DriftMode::PerFrame);
    tick(&mut b, time, 1, DriftMode::TimeScaled);
    assert!((a.origin - b.origin).x.abs() < 1e-6);
    assert!((a.origin - b.origin).y.abs() < 1e-6);
  }

  #[test]
  fn jitter_mutates_in_place() {
    let mut c = cloud(10);
    let before = c.positions().to_vec();
    let ptr = c.positions().as_ptr();
    let time = FrameTime {
      elapsed: 0.0,
      delta: 1.0 / REFERENCE_FPS,
    };
    tick(&mut c, time, 0, DriftMode::TimeScaled);
    assert_eq!(c.positions().as_ptr(), ptr);
    assert_eq!(c.count(), 10);
    assert!(c.take_dirty());
    // Particle 0 at t = 0: sin(0), cos(0), sin(0).
    assert!((c.positions()[0] - before[0]).abs() < 1e-6);
    assert!((c.positions()[1] - before[1] - 0.01).abs() < 1e-6);
  }

  #[test]
  fn static_fields_are_untouched() {
    let mut list = FieldList::new(1);
    let buffers = FieldBuffers {
      positions: vec![1.0; 3],
      colors: vec![1.0; 3],
      sizes: vec![1.0],
    };
    let mut f = ParticleField::new(list.next_id(), buffers, Motion::Static).unwrap();
    let time = FrameTime {
      elapsed: 5.0,
      delta: 0.5,
    };
    tick(&mut f, time, 3, DriftMode::PerFrame);
    assert_eq!(f.orientation, Vector3::new(0.0, 0.0, 0.0));
    assert_eq!(f.positions(), &[1.0, 1.0, 1.0]);
  }

  #[test]
  fn invalid_probability_is_rejected() {
    assert!(matches!(SpawnPolicy::new(1.5, 1.0), Err(Error::InvalidProbability(_))));
    assert!(SpawnPolicy::new(0.0, 1.0).is_ok());
  }

  #[test]
  fn spawn_never_exceeds_cap() {
    let mut rng = SmallRng::seed_from_u64(4);
    let policy = SpawnPolicy::new(1.0, 100.0).unwrap();
    let mut fields = FieldList::new(3);
    for _ in 0..20 {
      policy.maybe_spawn(&mut fields, &tiny_shape(), true, &mut rng).unwrap();
      assert!(fields.len() <= 3);
    }
    assert_eq!(fields.len(), 3);
  }

  #[test]
  fn spawn_rate_matches_probability() {
    let mut rng = SmallRng::seed_from_u64(5);
    let p = 0.01;
    let ticks = 20_000;
    let policy = SpawnPolicy::new(p, 100.0).unwrap();
    let shape = ShapeParams {
      count: 1,
      ..ShapeParams::default()
    };
    let mut fields = FieldList::new(usize::MAX);
    for _ in 0..ticks {
      policy.maybe_spawn(&mut fields, &shape, false, &mut rng).unwrap();
    }
    // Mean 200, standard deviation about 14.
    let spawned = fields.len() as f64;
    let expected = ticks as f64 * p;
    assert!((spawned - expected).abs() < 60.0, "spawned {spawned}");
  }

  #[test]
  fn spawned_galaxies_land_in_spread() {
    let mut rng = SmallRng::seed_from_u64(6);
    let policy = SpawnPolicy::new(1.0, 100.0).unwrap();
    let mut fields = FieldList::new(10);
    for _ in 0..10 {
      policy.maybe_spawn(&mut fields, &tiny_shape(), true, &mut rng).unwrap();
    }
    for f in fields.iter() {
      assert!(f.origin.x.abs() <= 50.0 && f.origin.y.abs() <= 50.0 && f.origin.z.abs() <= 50.0);
      assert_eq!(f.count(), 16);
    }
  }
}
