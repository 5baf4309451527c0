use crate::scene::Scene;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Time handed to the frame updater.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FrameTime {
  /// Seconds since the driver started.
  pub elapsed: f32,
  /// Seconds since the previous tick.
  pub delta: f32,
}

/// Source of frame timestamps, in seconds.
pub trait Clock {
  fn now(&mut self) -> f32;
}

/// Wall clock backed by [`Instant`].
pub struct MonotonicClock {
  start: Instant,
}

impl MonotonicClock {
  pub fn new() -> Self {
    Self {
      start: Instant::now(),
    }
  }
}

impl Default for MonotonicClock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock for MonotonicClock {
  fn now(&mut self) -> f32 {
    self.start.elapsed().as_secs_f32()
  }
}

/// Deterministic clock that advances one fixed step per reading.
pub struct FixedStepClock {
  step: f32,
  ticks: u64,
}

impl FixedStepClock {
  pub fn new(step: f32) -> Self {
    Self {
      step: step.max(0.0),
      ticks: 0,
    }
  }
}

impl Clock for FixedStepClock {
  fn now(&mut self) -> f32 {
    let now = self.ticks as f32 * self.step;
    self.ticks += 1;
    now
  }
}

/// Where a finished frame goes.
pub trait DrawTarget {
  fn draw(&mut self, scene: &mut Scene);
}

/// Draw target that only counts frames, for headless runs.
#[derive(Debug, Default)]
pub struct NullTarget {
  pub frames: u64,
  pub particles: usize,
}

impl DrawTarget for NullTarget {
  fn draw(&mut self, scene: &mut Scene) {
    self.frames += 1;
    self.particles = scene.particle_count();
    for field in scene.iter_fields_mut() {
      field.take_dirty();
    }
  }
}

/// Owns the frame loop: camera, fields, spawning, then one draw per tick.
pub struct Driver<C: Clock> {
  clock: C,
  start: f32,
  last: f32,
  frames: u64,
}

impl<C: Clock> Driver<C> {
  pub fn new(mut clock: C) -> Self {
    let start = clock.now();
    Self {
      clock,
      start,
      last: start,
      frames: 0,
    }
  }

  pub fn frames(&self) -> u64 {
    self.frames
  }

  pub fn tick<T: DrawTarget + ?Sized>(&mut self, scene: &mut Scene, target: &mut T) -> FrameTime {
    let now = self.clock.now();
    let time = FrameTime {
      elapsed: now - self.start,
      delta: (now - self.last).max(0.0),
    };
    self.last = now;

    scene.rig.integrate(time.delta);
    scene.update_fields(time);
    scene.maybe_spawn();
    target.draw(scene);

    self.frames += 1;
    time
  }

  /// Ticks up to `frames` times, or until `stop` is raised.
  pub fn run_for<T: DrawTarget + ?Sized>(
    &mut self,
    scene: &mut Scene,
    target: &mut T,
    frames: u64,
    stop: &AtomicBool,
  ) -> u64 {
    let mut ran = 0;
    while ran < frames {
      if stop.load(Ordering::Relaxed) {
        info!("stopped after {ran} frames");
        break;
      }
      let time = self.tick(scene, target);
      ran += 1;
      if ran % 600 == 0 {
        debug!(
          "frame {ran}: t={:.2}s, {} fields",
          time.elapsed,
          scene.fields.len()
        );
      }
    }
    ran
  }
}
