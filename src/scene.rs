use crate::camera::CameraRig;
use crate::driver::FrameTime;
use crate::field::{FieldId, FieldList, Motion, ParticleField};
use crate::initialize::generate_sphere;
use crate::update::{build_galaxy, scatter, tick, SpawnPolicy};
use crate::{Error, SceneParams, SphereParams};
use cgmath::{EuclideanSpace, Vector3};
use log::{debug, info, warn};
use rand::{rngs::SmallRng, SeedableRng};

/// Everything one frame reads and writes: the galaxies, the backdrop
/// layers, the camera rig and the random stream.
pub struct Scene {
  pub params: SceneParams,
  pub rig: CameraRig,
  pub fields: FieldList,
  pub starfield: Option<ParticleField>,
  pub ambient: Option<ParticleField>,
  spawn: SpawnPolicy,
  rng: SmallRng,
}

impl Scene {
  /// Builds the initial galaxies and backdrop from `seed`.
  ///
  /// Invalid galaxy or spawn parameters are errors; a backdrop layer that
  /// fails to build is logged and left out.
  pub fn new(params: SceneParams, seed: u64, aspect: f32) -> Result<Self, Error> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let spawn = SpawnPolicy::new(params.spawn_probability, params.spawn_spread)?;
    let mut fields = FieldList::new(params.max_fields);

    let initial = (params.galaxies as usize).min(params.max_fields);
    if initial < params.galaxies as usize {
      warn!(
        "requested {} galaxies, capped at {}",
        params.galaxies, params.max_fields
      );
    }
    for _ in 0..initial {
      let origin = scatter(&mut rng, Vector3::new(0.0, 0.0, 0.0), params.initial_spread);
      let id = fields.next_id();
      let galaxy = build_galaxy(id, origin, &params.shape, params.randomize_colors, &mut rng)?;
      fields.push(galaxy)?;
    }

    let starfield = params
      .starfield
      .and_then(|sphere| backdrop(&mut fields, &sphere, Motion::Static, &mut rng, "starfield"));
    let ambient = params
      .ambient
      .and_then(|sphere| backdrop(&mut fields, &sphere, Motion::Jitter, &mut rng, "ambient cloud"));

    let rig = CameraRig::init(&params.camera, aspect);
    let scene = Self {
      params,
      rig,
      fields,
      starfield,
      ambient,
      spawn,
      rng,
    };
    info!(
      "scene ready: {} galaxies, {} particles",
      scene.fields.len(),
      scene.particle_count()
    );
    Ok(scene)
  }

  /// Runs the frame updater over every field. Galaxies get their list index.
  pub fn update_fields(&mut self, time: FrameTime) {
    let drift = self.params.drift;
    for (index, field) in self.fields.iter_mut().enumerate() {
      tick(field, time, index, drift);
    }
    for field in self.starfield.iter_mut().chain(self.ambient.iter_mut()) {
      tick(field, time, 0, drift);
    }
  }

  /// One spawn trial. Failures are logged and the frame goes on.
  pub fn maybe_spawn(&mut self) -> Option<FieldId> {
    match self.spawn.maybe_spawn(
      &mut self.fields,
      &self.params.shape,
      self.params.randomize_colors,
      &mut self.rng,
    ) {
      Ok(Some(id)) => {
        debug!("spawned {:?}, {} fields active", id, self.fields.len());
        Some(id)
      }
      Ok(None) => None,
      Err(err) => {
        warn!("spawn failed: {err}");
        None
      }
    }
  }

  /// Spawns a galaxy close to the camera.
  pub fn spawn_near_camera(&mut self) -> Result<FieldId, Error> {
    if self.fields.is_full() {
      return Err(Error::FieldLimit {
        max: self.fields.max_fields(),
      });
    }
    let center = self.rig.camera().position.to_vec();
    let origin = scatter(&mut self.rng, center, self.params.near_spread);
    let id = self.fields.next_id();
    let galaxy = build_galaxy(
      id,
      origin,
      &self.params.shape,
      self.params.randomize_colors,
      &mut self.rng,
    )?;
    self.fields.push(galaxy)?;
    debug!("spawned {:?} near camera", id);
    Ok(id)
  }

  /// Every drawable field, backdrop first.
  pub fn iter_fields(&self) -> impl Iterator<Item = &ParticleField> {
    self
      .starfield
      .iter()
      .chain(self.fields.iter())
      .chain(self.ambient.iter())
  }

  pub fn iter_fields_mut(&mut self) -> impl Iterator<Item = &mut ParticleField> {
    self
      .starfield
      .iter_mut()
      .chain(self.fields.iter_mut())
      .chain(self.ambient.iter_mut())
  }

  pub fn particle_count(&self) -> usize {
    self.iter_fields().map(ParticleField::count).sum()
  }
}

fn backdrop(
  fields: &mut FieldList,
  sphere: &SphereParams,
  motion: Motion,
  rng: &mut SmallRng,
  name: &str,
) -> Option<ParticleField> {
  let built = generate_sphere(sphere, rng)
    .and_then(|buffers| ParticleField::new(fields.next_id(), buffers, motion));
  match built {
    Ok(mut field) => {
      field.point_size = sphere.point_size;
      field.opacity = sphere.opacity;
      field.attenuate = sphere.attenuate;
      Some(field)
    }
    Err(err) => {
      warn!("skipping {name}: {err}");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{ShapeParams, SphereParams};

  fn small_params() -> SceneParams {
    SceneParams {
      galaxies: 3,
      max_fields: 5,
      shape: ShapeParams {
        count: 32,
        ..ShapeParams::default()
      },
      starfield: Some(SphereParams {
        count: 64,
        ..SphereParams::starfield()
      }),
      ambient: Some(SphereParams {
        count: 16,
        ..SphereParams::ambient()
      }),
      ..SceneParams::default()
    }
  }

  #[test]
  fn builds_initial_fields() {
    let scene = Scene::new(small_params(), 1, 1.0).unwrap();
    assert_eq!(scene.fields.len(), 3);
    assert_eq!(scene.particle_count(), 3 * 32 + 64 + 16);
    assert_eq!(scene.iter_fields().count(), 5);
  }

  #[test]
  fn broken_backdrop_is_skipped() {
    let mut params = small_params();
    params.starfield = Some(SphereParams {
      min_radius: 10.0,
      max_radius: 1.0,
      ..SphereParams::starfield()
    });
    let scene = Scene::new(params, 1, 1.0).unwrap();
    assert!(scene.starfield.is_none());
    assert!(scene.ambient.is_some());
  }

  #[test]
  fn zero_branches_is_an_error() {
    let mut params = small_params();
    params.shape.branches = 0;
    assert_eq!(Scene::new(params, 1, 1.0).err(), Some(Error::ZeroBranches));
  }

  #[test]
  fn initial_galaxies_are_capped() {
    let mut params = small_params();
    params.galaxies = 50;
    let scene = Scene::new(params, 1, 1.0).unwrap();
    assert_eq!(scene.fields.len(), 5);
  }

  #[test]
  fn spawn_near_camera_respects_cap() {
    let mut scene = Scene::new(small_params(), 2, 1.0).unwrap();
    let camera = scene.rig.camera().position;
    let id = scene.spawn_near_camera().unwrap();
    let spawned = scene.fields.get(id).unwrap();
    assert!((spawned.origin.x - camera.x).abs() <= 5.0);
    scene.spawn_near_camera().unwrap();
    assert_eq!(scene.spawn_near_camera(), Err(Error::FieldLimit { max: 5 }));
  }

  #[test]
  fn same_seed_same_scene() {
    let a = Scene::new(small_params(), 9, 1.0).unwrap();
    let b = Scene::new(small_params(), 9, 1.0).unwrap();
    let pa: Vec<_> = a.iter_fields().flat_map(|f| f.positions().to_vec()).collect();
    let pb: Vec<_> = b.iter_fields().flat_map(|f| f.positions().to_vec()).collect();
    assert_eq!(pa, pb);
  }
}
