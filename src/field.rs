use crate::initialize::FieldBuffers;
use crate::Error;
use cgmath::{Matrix4, Rad, Vector3};

/// Stable identity of a field, used to pair it with its GPU buffers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u64);

/// How the frame updater animates a field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Motion {
  /// Galaxy spin plus a slow floating drift of the origin.
  Drift,
  /// Per-particle micro-jitter of the position buffer plus a slow spin.
  Jitter,
  Static,
}

/// One generated set of points sharing an origin and orientation.
///
/// The attribute buffers keep the length they were generated with; the
/// updater only ever mutates them in place.
#[derive(Clone, Debug)]
pub struct ParticleField {
  id: FieldId,
  motion: Motion,
  positions: Vec<f32>,
  colors: Vec<f32>,
  sizes: Vec<f32>,
  pub origin: Vector3<f32>,
  /// Euler angles in radians, applied X then Y then Z.
  pub orientation: Vector3<f32>,
  pub point_size: f32,
  pub opacity: f32,
  pub attenuate: bool,
  dirty: bool,
}

impl ParticleField {
  /// Wraps generated buffers. Fails unless there are three position and three
  /// colour components per size entry.
  pub fn new(id: FieldId, buffers: FieldBuffers, motion: Motion) -> Result<Self, Error> {
    let count = buffers.sizes.len();
    if buffers.positions.len() != count * 3 || buffers.colors.len() != count * 3 {
      return Err(Error::InvalidShape(format!(
        "{} positions and {} colours for {count} sizes",
        buffers.positions.len(),
        buffers.colors.len()
      )));
    }
    Ok(Self {
      id,
      motion,
      positions: buffers.positions,
      colors: buffers.colors,
      sizes: buffers.sizes,
      origin: Vector3::new(0.0, 0.0, 0.0),
      orientation: Vector3::new(0.0, 0.0, 0.0),
      point_size: 1.0,
      opacity: 0.8,
      attenuate: true,
      dirty: false,
    })
  }

  pub fn id(&self) -> FieldId {
    self.id
  }

  pub fn motion(&self) -> Motion {
    self.motion
  }

  pub fn count(&self) -> usize {
    self.sizes.len()
  }

  pub fn positions(&self) -> &[f32] {
    &self.positions
  }

  /// Mutable view of the position buffer; marks the field for re-upload.
  pub fn positions_mut(&mut self) -> &mut [f32] {
    self.dirty = true;
    &mut self.positions
  }

  pub fn colors(&self) -> &[f32] {
    &self.colors
  }

  pub fn sizes(&self) -> &[f32] {
    &self.sizes
  }

  /// Returns whether positions changed since the last call, and clears the flag.
  pub fn take_dirty(&mut self) -> bool {
    std::mem::take(&mut self.dirty)
  }

  pub fn model_matrix(&self) -> Matrix4<f32> {
    Matrix4::from_translation(self.origin)
      * Matrix4::from_angle_x(Rad(self.orientation.x))
      * Matrix4::from_angle_y(Rad(self.orientation.y))
      * Matrix4::from_angle_z(Rad(self.orientation.z))
  }
}

/// Ordered, bounded list of galaxy fields. A field's position in the list is
/// the `field_index` the drift formulas use.
#[derive(Debug)]
pub struct FieldList {
  fields: Vec<ParticleField>,
  max_fields: usize,
  next_id: u64,
}

impl FieldList {
  pub fn new(max_fields: usize) -> Self {
    Self {
      fields: Vec::new(),
      max_fields,
      next_id: 0,
    }
  }

  /// Issues a fresh id. Ids are never reused, also for fields drawn outside the list.
  pub fn next_id(&mut self) -> FieldId {
    let id = FieldId(self.next_id);
    self.next_id += 1;
    id
  }

  pub fn push(&mut self, field: ParticleField) -> Result<FieldId, Error> {
    if self.is_full() {
      return Err(Error::FieldLimit {
        max: self.max_fields,
      });
    }
    let id = field.id();
    self.fields.push(field);
    Ok(id)
  }

  /// Detaches a field, handing back ownership of its buffers.
  pub fn remove(&mut self, id: FieldId) -> Option<ParticleField> {
    let index = self.fields.iter().position(|f| f.id() == id)?;
    Some(self.fields.remove(index))
  }

  pub fn get(&self, id: FieldId) -> Option<&ParticleField> {
    self.fields.iter().find(|f| f.id() == id)
  }

  pub fn len(&self) -> usize {
    self.fields.len()
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  pub fn is_full(&self) -> bool {
    self.fields.len() >= self.max_fields
  }

  pub fn max_fields(&self) -> usize {
    self.max_fields
  }

  pub fn iter(&self) -> std::slice::Iter<'_, ParticleField> {
    self.fields.iter()
  }

  pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ParticleField> {
    self.fields.iter_mut()
  }
}
