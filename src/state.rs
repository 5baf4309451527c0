use crate::camera::Key;
use crate::driver::{Driver, FixedStepClock, MonotonicClock, NullTarget};
use crate::render::{FrameTarget, Renderer};
use crate::scene::Scene;
use crate::SceneParams;
use anyhow::{anyhow, Context as _};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use winit::event::{ElementState, MouseButton, Touch, TouchPhase};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::{
  dpi::{PhysicalPosition, PhysicalSize},
  event::{Event, KeyEvent, StartCause, WindowEvent},
  event_loop::{EventLoop, EventLoopWindowTarget},
  window::Window,
};

struct EventLoopWrapper {
  event_loop: EventLoop<()>,
  window: Arc<Window>,
}

impl EventLoopWrapper {
  pub fn new(title: &str) -> anyhow::Result<Self> {
    let event_loop = EventLoop::new()?;
    let builder = winit::window::WindowBuilder::new()
      .with_title(title)
      .with_resizable(true);
    let window = Arc::new(builder.build(&event_loop)?);

    Ok(Self { event_loop, window })
  }
}

struct SurfaceWrapper {
  surface: Option<wgpu::Surface<'static>>,
  config: Option<wgpu::SurfaceConfiguration>,
}

impl SurfaceWrapper {
  fn new() -> Self {
    Self {
      surface: None,
      config: None,
    }
  }

  fn resume(&mut self, context: &State, window: Arc<Window>) -> anyhow::Result<()> {
    let window_size = window.inner_size();
    let width = window_size.width.max(1);
    let height = window_size.height.max(1);
    let surface = context.instance.create_surface(window)?;
    let mut config = surface
      .get_default_config(&context.adapter, width, height)
      .ok_or_else(|| anyhow!("surface is not supported by the adapter"))?;
    let view_format = config.format.add_srgb_suffix();
    config.view_formats.push(view_format);
    surface.configure(&context.device, &config);
    self.surface = Some(surface);
    self.config = Some(config);
    Ok(())
  }

  fn resize(&mut self, context: &State, size: PhysicalSize<u32>) {
    let (Some(surface), Some(config)) = (self.surface.as_ref(), self.config.as_mut()) else {
      return;
    };
    config.width = size.width.max(1);
    config.height = size.height.max(1);
    surface.configure(&context.device, config);
  }

  /// Next frame, or `None` when this frame has to be skipped.
  fn acquire(&self, context: &State) -> Option<wgpu::SurfaceTexture> {
    let surface = self.surface.as_ref()?;

    match surface.get_current_texture() {
      Ok(frame) => Some(frame),
      Err(wgpu::SurfaceError::Timeout) => {
        warn!("surface timed out, skipping frame");
        None
      }
      Err(err) => {
        warn!("surface {err:?}, reconfiguring");
        surface.configure(&context.device, self.config.as_ref()?);
        None
      }
    }
  }

  fn config(&self) -> Option<&wgpu::SurfaceConfiguration> {
    self.config.as_ref()
  }
}

struct State {
  instance: wgpu::Instance,
  adapter: wgpu::Adapter,
  device: wgpu::Device,
  queue: wgpu::Queue,
}

impl State {
  async fn init() -> anyhow::Result<Self> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
      #[cfg(not(target_arch = "wasm32"))]
      backends: wgpu::Backends::PRIMARY,
      ..Default::default()
    });

    let adapter = instance
      .request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
      })
      .await
      .ok_or_else(|| anyhow!("no suitable graphics adapter"))?;

    let (device, queue) = adapter
      .request_device(
        &wgpu::DeviceDescriptor {
          label: None,
          required_features: wgpu::Features::empty(),
          required_limits: wgpu::Limits::default(),
          memory_hints: Default::default(),
        },
        None,
      )
      .await
      .context("requesting device")?;
    info!("using adapter {:?}", adapter.get_info().name);

    Ok(Self {
      instance,
      adapter,
      device,
      queue,
    })
  }
}

fn map_key(code: KeyCode) -> Option<Key> {
  match code {
    KeyCode::KeyW | KeyCode::ArrowUp => Some(Key::Forward),
    KeyCode::KeyS | KeyCode::ArrowDown => Some(Key::Backward),
    KeyCode::KeyA | KeyCode::ArrowLeft => Some(Key::Left),
    KeyCode::KeyD | KeyCode::ArrowRight => Some(Key::Right),
    KeyCode::ShiftLeft => Some(Key::Sprint),
    _ => None,
  }
}

/// Mouse and single-finger drag tracking.
#[derive(Default)]
struct DragState {
  mouse_down: bool,
  cursor: Option<PhysicalPosition<f64>>,
  touches: HashSet<u64>,
  touch: Option<PhysicalPosition<f64>>,
}

impl DragState {
  /// Returns the drag delta this event produces, if any.
  fn on_event(&mut self, event: &WindowEvent) -> Option<(f32, f32)> {
    match event {
      WindowEvent::MouseInput {
        state,
        button: MouseButton::Left,
        ..
      } => {
        self.mouse_down = *state == ElementState::Pressed;
        None
      }
      WindowEvent::CursorMoved { position, .. } => self.cursor_moved(*position),
      WindowEvent::Touch(Touch {
        phase, location, id, ..
      }) => self.touch(*phase, *id, *location),
      _ => None,
    }
  }

  fn cursor_moved(&mut self, position: PhysicalPosition<f64>) -> Option<(f32, f32)> {
    let previous = self.cursor.replace(position);
    if self.mouse_down {
      previous.map(|p| delta(p, position))
    } else {
      None
    }
  }

  fn touch(&mut self, phase: TouchPhase, id: u64, location: PhysicalPosition<f64>) -> Option<(f32, f32)> {
    match phase {
      TouchPhase::Started => {
        self.touches.insert(id);
        self.touch = (self.touches.len() == 1).then_some(location);
        None
      }
      TouchPhase::Moved if self.touches.len() == 1 => {
        let previous = self.touch.replace(location);
        previous.map(|p| delta(p, location))
      }
      TouchPhase::Moved => None,
      TouchPhase::Ended | TouchPhase::Cancelled => {
        self.touches.remove(&id);
        self.touch = None;
        None
      }
    }
  }
}

fn delta(from: PhysicalPosition<f64>, to: PhysicalPosition<f64>) -> (f32, f32) {
  ((to.x - from.x) as f32, (to.y - from.y) as f32)
}

/// Applies keyboard input to the scene. Returns true when the event was used.
fn handle_key(scene: &mut Scene, event: &KeyEvent) -> bool {
  let PhysicalKey::Code(code) = event.physical_key else {
    return false;
  };
  let is_pressed = event.state == ElementState::Pressed;
  if code == KeyCode::Space {
    if is_pressed && !event.repeat {
      match scene.spawn_near_camera() {
        Ok(id) => info!("spawned {:?} near camera", id),
        Err(err) => warn!("not spawning: {err}"),
      }
    }
    return true;
  }
  match map_key(code) {
    Some(key) if is_pressed => scene.rig.on_key_down(key),
    Some(key) => scene.rig.on_key_up(key),
    None => return false,
  }
  true
}

async fn start(params: SceneParams, seed: u64) -> anyhow::Result<()> {
  let window_loop = EventLoopWrapper::new("Galaxy Fields")?;
  let size = window_loop.window.inner_size();
  let aspect = size.width.max(1) as f32 / size.height.max(1) as f32;
  let mut scene = Scene::new(params, seed, aspect)?;
  let context = State::init().await?;
  let mut surface = SurfaceWrapper::new();
  let mut renderer: Option<Renderer> = None;
  let mut driver = None;
  let mut drag = DragState::default();

  window_loop.event_loop.run(
    move |event, target: &EventLoopWindowTarget<()>| match event {
      Event::NewEvents(StartCause::Init) => {
        if let Err(err) = surface.resume(&context, window_loop.window.clone()) {
          error!("cannot create surface: {err:#}");
          target.exit();
          return;
        }
        if renderer.is_none() {
          if let Some(config) = surface.config() {
            renderer = Some(Renderer::init(config, &context.device));
          }
        }
        window_loop.window.request_redraw();
      }
      Event::WindowEvent { event, window_id } if window_id == window_loop.window.id() => {
        if let Some((dx, dy)) = drag.on_event(&event) {
          scene.rig.on_drag_delta(dx, dy);
          return;
        }
        match event {
          WindowEvent::CloseRequested
          | WindowEvent::KeyboardInput {
            event:
              KeyEvent {
                state: ElementState::Pressed,
                physical_key: PhysicalKey::Code(KeyCode::Escape),
                ..
              },
            ..
          } => target.exit(),
          WindowEvent::KeyboardInput { event, .. } => {
            handle_key(&mut scene, &event);
          }
          WindowEvent::Resized(size) => {
            debug!("resized to {}x{}", size.width, size.height);
            surface.resize(&context, size);
            scene.rig.resize(size.width, size.height);
            if let Some(renderer) = renderer.as_mut() {
              renderer.resize(size.width, size.height);
            }
          }
          WindowEvent::RedrawRequested => {
            window_loop.window.request_redraw();
            let Some(renderer) = renderer.as_mut() else {
              return;
            };
            let Some(frame) = surface.acquire(&context) else {
              return;
            };
            let Some(format) = surface.config().map(|c| c.view_formats[0]) else {
              return;
            };
            let view = frame.texture.create_view(&wgpu::TextureViewDescriptor {
              format: Some(format),
              ..wgpu::TextureViewDescriptor::default()
            });
            let mut frame_target = FrameTarget {
              renderer,
              device: &context.device,
              queue: &context.queue,
              view: &view,
            };
            frame_driver(&mut driver).tick(&mut scene, &mut frame_target);
            frame.present();
          }
          _ => {}
        }
      }
      _ => {}
    },
  )?;
  Ok(())
}

/// The wall clock starts on the first redraw, so window and pipeline setup
/// never shows up as one long frame.
fn frame_driver(slot: &mut Option<Driver<MonotonicClock>>) -> &mut Driver<MonotonicClock> {
  slot.get_or_insert_with(|| Driver::new(MonotonicClock::new()))
}

/// Opens a window and renders until it is closed.
pub fn run(params: SceneParams, seed: u64) -> anyhow::Result<()> {
  pollster::block_on(start(params, seed))
}

/// Runs the frame loop without a window at a fixed step, until `frames`
/// ticks have run or Ctrl-C is pressed.
pub fn run_headless(params: SceneParams, seed: u64, frames: u64, fps: f32) -> anyhow::Result<()> {
  let stop = Arc::new(AtomicBool::new(false));
  let handler_stop = Arc::clone(&stop);
  ctrlc::set_handler(move || handler_stop.store(true, Ordering::Relaxed))
    .context("installing Ctrl-C handler")?;

  let mut scene = Scene::new(params, seed, 16.0 / 9.0)?;
  let mut driver = Driver::new(FixedStepClock::new(1.0 / fps.max(1.0)));
  let mut target = NullTarget::default();
  let ran = driver.run_for(&mut scene, &mut target, frames, &stop);

  let position = scene.rig.camera().position;
  info!(
    "headless run done: {ran} frames, {} galaxies, {} particles, camera at ({:.2}, {:.2}, {:.2})",
    scene.fields.len(),
    target.particles,
    position.x,
    position.y,
    position.z
  );
  Ok(())
}
