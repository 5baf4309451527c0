use crate::CameraParams;
use cgmath::{InnerSpace, Matrix4, Point3, Vector3};
use std::f32::consts::FRAC_PI_2;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

/// First-person camera. Yaw and pitch of zero look down -z.
#[derive(Copy, Clone, Debug)]
pub struct Camera {
  pub position: Point3<f32>,
  pub yaw: f32,
  pub pitch: f32,
  pub aspect: f32,
  pub fovy: f32,
  pub znear: f32,
  pub zfar: f32,
}

impl Camera {
  pub fn new(params: &CameraParams, aspect: f32) -> Self {
    let mut camera = Self {
      position: params.eye.into(),
      yaw: 0.0,
      pitch: 0.0,
      aspect,
      fovy: params.fovy,
      znear: params.znear,
      zfar: params.zfar,
    };
    camera.look_at(params.target.into());
    camera
  }

  /// Turns the camera toward `target`. No-op when `target` is the eye itself.
  pub fn look_at(&mut self, target: Point3<f32>) {
    let dir = target - self.position;
    if dir.magnitude2() <= f32::EPSILON {
      return;
    }
    let dir = dir.normalize();
    self.yaw = (-dir.x).atan2(-dir.z);
    self.pitch = dir.y.clamp(-1.0, 1.0).asin();
  }

  pub fn forward(&self) -> Vector3<f32> {
    let (sy, cy) = self.yaw.sin_cos();
    let (sp, cp) = self.pitch.sin_cos();
    Vector3::new(-sy * cp, sp, -cy * cp).normalize()
  }

  /// `forward x world_up`, or the yaw-only right vector when looking straight
  /// up or down.
  pub fn right(&self) -> Vector3<f32> {
    let right = self.forward().cross(Vector3::unit_y());
    if right.magnitude2() > 1e-8 {
      right.normalize()
    } else {
      let (sy, cy) = self.yaw.sin_cos();
      Vector3::new(cy, 0.0, -sy)
    }
  }

  pub fn view_matrix(&self) -> Matrix4<f32> {
    let forward = self.forward();
    let up = self.right().cross(forward);
    Matrix4::look_to_rh(self.position, forward, up)
  }

  pub fn projection_matrix(&self) -> Matrix4<f32> {
    let proj = cgmath::perspective(cgmath::Deg(self.fovy), self.aspect, self.znear, self.zfar);
    OPENGL_TO_WGPU_MATRIX * proj
  }

  pub fn build_view_projection_matrix(&self) -> Matrix4<f32> {
    self.projection_matrix() * self.view_matrix()
  }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
  view: [[f32; 4]; 4],
  proj: [[f32; 4]; 4],
  viewport: [f32; 4],
}

impl CameraUniform {
  pub fn new() -> Self {
    use cgmath::SquareMatrix;
    Self {
      view: Matrix4::identity().into(),
      proj: Matrix4::identity().into(),
      viewport: [1.0, 1.0, 0.0, 0.0],
    }
  }

  pub fn update(&mut self, camera: &Camera, width: u32, height: u32) {
    self.view = camera.view_matrix().into();
    self.proj = camera.projection_matrix().into();
    self.viewport = [width.max(1) as f32, height.max(1) as f32, 0.0, 0.0];
  }
}

impl Default for CameraUniform {
  fn default() -> Self {
    Self::new()
  }
}

/// Logical inputs the rig reacts to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Key {
  Forward,
  Backward,
  Left,
  Right,
  Sprint,
}

/// Turns key flags and drag deltas into camera motion.
///
/// Movement is pure velocity: the camera moves only while a key is held and
/// stops the frame it is released.
#[derive(Debug)]
pub struct CameraRig {
  camera: Camera,
  speed: f32,
  sprint_speed: f32,
  speed_factor: f32,
  sensitivity: f32,
  is_forward_pressed: bool,
  is_backward_pressed: bool,
  is_left_pressed: bool,
  is_right_pressed: bool,
  is_sprint_pressed: bool,
}

impl CameraRig {
  pub fn init(params: &CameraParams, aspect: f32) -> Self {
    Self::with_camera(Camera::new(params, aspect), params)
  }

  pub fn with_camera(camera: Camera, params: &CameraParams) -> Self {
    Self {
      camera,
      speed: params.speed,
      sprint_speed: params.sprint_speed,
      speed_factor: params.speed_factor,
      sensitivity: params.look_sensitivity,
      is_forward_pressed: false,
      is_backward_pressed: false,
      is_left_pressed: false,
      is_right_pressed: false,
      is_sprint_pressed: false,
    }
  }

  pub fn camera(&self) -> &Camera {
    &self.camera
  }

  pub fn on_key_down(&mut self, key: Key) {
    self.set_key(key, true);
  }

  pub fn on_key_up(&mut self, key: Key) {
    self.set_key(key, false);
  }

  fn set_key(&mut self, key: Key, is_pressed: bool) {
    match key {
      Key::Forward => self.is_forward_pressed = is_pressed,
      Key::Backward => self.is_backward_pressed = is_pressed,
      Key::Left => self.is_left_pressed = is_pressed,
      Key::Right => self.is_right_pressed = is_pressed,
      Key::Sprint => self.is_sprint_pressed = is_pressed,
    }
  }

  pub fn speed(&self) -> f32 {
    if self.is_sprint_pressed {
      self.sprint_speed
    } else {
      self.speed
    }
  }

  /// Mouse or single-touch drag in pixels.
  pub fn on_drag_delta(&mut self, dx: f32, dy: f32) {
    self.camera.yaw -= dx * self.sensitivity;
    self.camera.pitch = (self.camera.pitch - dy * self.sensitivity).clamp(-FRAC_PI_2, FRAC_PI_2);
  }

  pub fn integrate(&mut self, delta: f32) {
    let step = self.speed() * delta * self.speed_factor;
    if step == 0.0 {
      return;
    }
    let forward = self.camera.forward();
    let right = self.camera.right();

    if self.is_forward_pressed {
      self.camera.position += forward * step;
    }
    if self.is_backward_pressed {
      self.camera.position -= forward * step;
    }
    if self.is_right_pressed {
      self.camera.position += right * step;
    }
    if self.is_left_pressed {
      self.camera.position -= right * step;
    }
  }

  pub fn resize(&mut self, width: u32, height: u32) {
    if width > 0 && height > 0 {
      self.camera.aspect = width as f32 / height as f32;
    }
  }
}
