pub mod camera;
pub mod driver;
pub mod error;
pub mod field;
pub mod initialize;
pub mod render;
pub mod scene;
pub mod state;
pub mod update;

pub use error::Error;

/// Linear RGB colour with channels in `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rgb {
  pub r: f32,
  pub g: f32,
  pub b: f32,
}

impl Rgb {
  pub fn new(r: f32, g: f32, b: f32) -> Self {
    Self { r, g, b }
  }

  /// `0xRRGGBB`, each byte mapped straight onto `[0, 1]`.
  pub fn from_u32(hex: u32) -> Self {
    let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
    Self::new(channel(16), channel(8), channel(0))
  }

  /// Parses `#rrggbb` (the leading `#` is optional).
  pub fn from_hex(hex: &str) -> Result<Self, Error> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
      return Err(Error::InvalidColor(hex.to_string()));
    }
    u32::from_str_radix(digits, 16)
      .map(Self::from_u32)
      .map_err(|_| Error::InvalidColor(hex.to_string()))
  }

  /// Plain per-channel interpolation, no gamma handling.
  pub fn lerp(self, other: Self, t: f32) -> Self {
    Self {
      r: self.r + (other.r - self.r) * t,
      g: self.g + (other.g - self.g) * t,
      b: self.b + (other.b - self.b) * t,
    }
  }
}

/// Shape of one spiral galaxy field.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShapeParams {
  pub count: u32,
  pub radius: f32,
  pub branches: u32,
  pub spin: f32,
  pub randomness: f32,
  pub randomness_power: f32,
  pub inside_color: Rgb,
  pub outside_color: Rgb,
  pub point_size: f32,
}

impl Default for ShapeParams {
  fn default() -> Self {
    Self {
      count: 80_000,
      radius: 5.0,
      branches: 5,
      spin: 1.0,
      randomness: 0.2,
      randomness_power: 3.0,
      inside_color: Rgb::from_u32(0xff6030),
      outside_color: Rgb::from_u32(0x1b3984),
      point_size: 0.01,
    }
  }
}

impl ShapeParams {
  pub fn with_colors(self, inside_color: Rgb, outside_color: Rgb) -> Self {
    Self {
      inside_color,
      outside_color,
      ..self
    }
  }
}

/// How the polar angle of a sphere-shell point is drawn.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PolarSampling {
  /// `phi = acos(2u - 1)`, uniform over the sphere surface.
  Uniform,
  /// `phi = u * pi`, which crowds points toward the poles. Kept for the
  /// ambient cloud, which has always been generated this way.
  Biased,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SphereColoring {
  /// Near-white with a slight blue bias.
  StarTint,
  /// Uniform pick from the six-colour ambient palette.
  Palette,
}

/// Shape of a starfield or ambient cloud.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SphereParams {
  pub count: u32,
  pub min_radius: f32,
  pub max_radius: f32,
  pub sampling: PolarSampling,
  pub coloring: SphereColoring,
  pub min_size: f32,
  pub max_size: f32,
  pub point_size: f32,
  pub opacity: f32,
  /// When false `point_size` is in pixels instead of world units.
  pub attenuate: bool,
}

impl SphereParams {
  pub fn starfield() -> Self {
    Self {
      count: 15_000,
      min_radius: 100.0,
      max_radius: 1000.0,
      sampling: PolarSampling::Uniform,
      coloring: SphereColoring::StarTint,
      min_size: 1.0,
      max_size: 1.0,
      point_size: 1.5,
      opacity: 0.8,
      attenuate: false,
    }
  }

  pub fn ambient() -> Self {
    Self {
      count: 500,
      min_radius: 15.0,
      max_radius: 15.0,
      sampling: PolarSampling::Biased,
      coloring: SphereColoring::Palette,
      min_size: 1.0,
      max_size: 6.0,
      point_size: 0.05,
      opacity: 0.8,
      attenuate: true,
    }
  }
}

/// Whether per-frame drift is scaled by the frame delta.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DriftMode {
  /// Amplitude multiplied by `delta * 60`: identical to per-frame drift at
  /// 60 fps and zero for a zero delta.
  #[default]
  TimeScaled,
  /// Fixed amplitude per rendered frame, so drift speed follows frame rate.
  PerFrame,
}

pub struct CameraParams {
  pub speed: f32,
  pub sprint_speed: f32,
  pub speed_factor: f32,
  pub look_sensitivity: f32,
  pub fovy: f32,
  pub znear: f32,
  pub zfar: f32,
  pub eye: [f32; 3],
  pub target: [f32; 3],
}

impl Default for CameraParams {
  fn default() -> Self {
    Self {
      speed: 0.5,
      sprint_speed: 1.5,
      speed_factor: 2.0,
      look_sensitivity: 0.01,
      fovy: 75.0,
      znear: 0.1,
      zfar: 1000.0,
      eye: [0.0, 2.0, 6.0],
      target: [0.0, 0.0, 0.0],
    }
  }
}

pub struct SceneParams {
  pub galaxies: u32,
  pub max_fields: usize,
  pub spawn_probability: f64,
  /// Initial galaxies are placed in a cube of this edge length.
  pub initial_spread: f32,
  /// Edge length of the cube random spawns land in.
  pub spawn_spread: f32,
  /// Edge length of the cube around the camera for explicit spawns.
  pub near_spread: f32,
  pub randomize_colors: bool,
  pub drift: DriftMode,
  pub shape: ShapeParams,
  pub starfield: Option<SphereParams>,
  pub ambient: Option<SphereParams>,
  pub camera: CameraParams,
}

impl Default for SceneParams {
  fn default() -> Self {
    Self {
      galaxies: 5,
      max_fields: 15,
      spawn_probability: 0.0005,
      initial_spread: 40.0,
      spawn_spread: 100.0,
      near_spread: 10.0,
      randomize_colors: true,
      drift: DriftMode::default(),
      shape: ShapeParams::default(),
      starfield: Some(SphereParams::starfield()),
      ambient: Some(SphereParams::ambient()),
      camera: CameraParams::default(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_hex_colors() {
    let c = Rgb::from_hex("#ff6030").unwrap();
    assert_eq!(c, Rgb::new(1.0, 96.0 / 255.0, 48.0 / 255.0));
    assert_eq!(Rgb::from_hex("1b3984").unwrap(), Rgb::from_u32(0x1b3984));
  }

  #[test]
  fn rejects_malformed_hex() {
    for bad in ["", "#fff", "#gg0000", "#ff00001", "+f6030"] {
      assert_eq!(Rgb::from_hex(bad), Err(Error::InvalidColor(bad.to_string())));
    }
  }

  #[test]
  fn lerp_is_linear_per_channel() {
    let a = Rgb::new(0.0, 1.0, 0.5);
    let b = Rgb::new(1.0, 0.0, 0.5);
    assert_eq!(a.lerp(b, 0.0), a);
    assert_eq!(a.lerp(b, 1.0), b);
    assert_eq!(a.lerp(b, 0.25), Rgb::new(0.25, 0.75, 0.5));
  }
}
