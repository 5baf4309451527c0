use crate::camera::CameraUniform;
use crate::driver::DrawTarget;
use crate::field::{FieldId, ParticleField};
use crate::scene::Scene;
use log::debug;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use wgpu::{util::DeviceExt, PipelineCompilationOptions};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct FieldUniform {
  model: [[f32; 4]; 4],
  point_size: f32,
  opacity: f32,
  attenuate: f32,
  _pad: f32,
}

impl FieldUniform {
  fn from_field(field: &ParticleField) -> Self {
    Self {
      model: field.model_matrix().into(),
      point_size: field.point_size,
      opacity: field.opacity,
      attenuate: if field.attenuate { 1.0 } else { 0.0 },
      _pad: 0.0,
    }
  }
}

/// Two triangles spanning [-1, 1]^2; every particle is one instance of it.
#[rustfmt::skip]
const QUAD: [f32; 12] = [
  -1.0, -1.0,   1.0, -1.0,   1.0,  1.0,
  -1.0, -1.0,   1.0,  1.0,  -1.0,  1.0,
];

/// GPU mirror of one field.
struct GpuField {
  positions: wgpu::Buffer,
  colors: wgpu::Buffer,
  sizes: wgpu::Buffer,
  uniform: wgpu::Buffer,
  bind_group: wgpu::BindGroup,
  count: u32,
}

impl GpuField {
  fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, field: &ParticleField) -> Self {
    let vertex = |label: &str, contents: &[f32], usage: wgpu::BufferUsages| {
      device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(contents),
        usage: wgpu::BufferUsages::VERTEX | usage,
      })
    };
    let positions = vertex("Field Positions", field.positions(), wgpu::BufferUsages::COPY_DST);
    let colors = vertex("Field Colors", field.colors(), wgpu::BufferUsages::empty());
    let sizes = vertex("Field Sizes", field.sizes(), wgpu::BufferUsages::empty());

    let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Field Uniform"),
      contents: bytemuck::cast_slice(&[FieldUniform::from_field(field)]),
      usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      layout,
      entries: &[wgpu::BindGroupEntry {
        binding: 0,
        resource: uniform.as_entire_binding(),
      }],
      label: Some("field_bind_group"),
    });

    Self {
      positions,
      colors,
      sizes,
      uniform,
      bind_group,
      count: field.count() as u32,
    }
  }
}

pub struct Renderer {
  render_pipeline: wgpu::RenderPipeline,
  camera_uniform: CameraUniform,
  camera_buffer: wgpu::Buffer,
  camera_bind_group: wgpu::BindGroup,
  field_bind_group_layout: wgpu::BindGroupLayout,
  quad_buffer: wgpu::Buffer,
  fields: HashMap<FieldId, GpuField>,
  width: u32,
  height: u32,
}

impl Renderer {
  #[must_use]
  pub fn init(config: &wgpu::SurfaceConfiguration, device: &wgpu::Device) -> Self {
    let draw_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
      label: Some("points"),
      source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("shaders/points.wgsl"))),
    });

    let camera_uniform = CameraUniform::new();
    let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Camera Buffer"),
      contents: bytemuck::cast_slice(&[camera_uniform]),
      usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let uniform_layout = |label: &'static str| {
      device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
          binding: 0,
          visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
          ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
          },
          count: None,
        }],
        label: Some(label),
      })
    };
    let camera_bind_group_layout = uniform_layout("camera_bind_group_layout");
    let field_bind_group_layout = uniform_layout("field_bind_group_layout");
    let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      layout: &camera_bind_group_layout,
      entries: &[wgpu::BindGroupEntry {
        binding: 0,
        resource: camera_buffer.as_entire_binding(),
      }],
      label: Some("camera_bind_group"),
    });

    let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
      label: Some("render"),
      bind_group_layouts: &[&camera_bind_group_layout, &field_bind_group_layout],
      push_constant_ranges: &[],
    });
    let position_buffer = wgpu::VertexBufferLayout {
      array_stride: 3 * 4,
      step_mode: wgpu::VertexStepMode::Instance,
      attributes: &wgpu::vertex_attr_array![0 => Float32x3],
    };
    let color_buffer = wgpu::VertexBufferLayout {
      array_stride: 3 * 4,
      step_mode: wgpu::VertexStepMode::Instance,
      attributes: &wgpu::vertex_attr_array![1 => Float32x3],
    };
    let size_buffer = wgpu::VertexBufferLayout {
      array_stride: 4,
      step_mode: wgpu::VertexStepMode::Instance,
      attributes: &wgpu::vertex_attr_array![2 => Float32],
    };
    let quad_layout = wgpu::VertexBufferLayout {
      array_stride: 2 * 4,
      step_mode: wgpu::VertexStepMode::Vertex,
      attributes: &wgpu::vertex_attr_array![3 => Float32x2],
    };
    // Additive blending, no depth: overlapping particles brighten.
    let additive = wgpu::BlendState {
      color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
      },
      alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
      },
    };
    let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
      label: Some("Render Pipeline"),
      layout: Some(&render_pipeline_layout),
      vertex: wgpu::VertexState {
        module: &draw_shader,
        entry_point: "main_vs",
        compilation_options: PipelineCompilationOptions::default(),
        buffers: &[position_buffer, color_buffer, size_buffer, quad_layout],
      },
      fragment: Some(wgpu::FragmentState {
        module: &draw_shader,
        entry_point: "main_fs",
        compilation_options: PipelineCompilationOptions::default(),
        targets: &[Some(wgpu::ColorTargetState {
          format: config.view_formats[0],
          blend: Some(additive),
          write_mask: wgpu::ColorWrites::ALL,
        })],
      }),
      primitive: wgpu::PrimitiveState::default(),
      depth_stencil: None,
      multisample: wgpu::MultisampleState::default(),
      multiview: None,
      cache: None,
    });

    let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Quad Buffer"),
      contents: bytemuck::cast_slice(&QUAD),
      usage: wgpu::BufferUsages::VERTEX,
    });

    Renderer {
      render_pipeline,
      camera_uniform,
      camera_buffer,
      camera_bind_group,
      field_bind_group_layout,
      quad_buffer,
      fields: HashMap::new(),
      width: config.width,
      height: config.height,
    }
  }

  pub fn resize(&mut self, width: u32, height: u32) {
    self.width = width.max(1);
    self.height = height.max(1);
  }

  /// Brings GPU buffers in line with the scene: creates mirrors for new
  /// fields, re-uploads moved positions and drops mirrors of removed fields.
  fn sync(&mut self, scene: &mut Scene, device: &wgpu::Device, queue: &wgpu::Queue) {
    let mut live = HashSet::new();
    for field in scene.iter_fields_mut() {
      live.insert(field.id());
      let dirty = field.take_dirty();
      if field.count() == 0 {
        continue;
      }
      match self.fields.get(&field.id()) {
        Some(gpu) => {
          if dirty {
            queue.write_buffer(&gpu.positions, 0, bytemuck::cast_slice(field.positions()));
          }
          queue.write_buffer(
            &gpu.uniform,
            0,
            bytemuck::cast_slice(&[FieldUniform::from_field(field)]),
          );
        }
        None => {
          debug!("uploading {:?} ({} particles)", field.id(), field.count());
          let gpu = GpuField::new(device, &self.field_bind_group_layout, field);
          self.fields.insert(field.id(), gpu);
        }
      }
    }
    self.fields.retain(|id, _| live.contains(id));
  }

  pub fn render(
    &mut self,
    view: &wgpu::TextureView,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    scene: &mut Scene,
  ) {
    self.sync(scene, device, queue);
    self
      .camera_uniform
      .update(scene.rig.camera(), self.width, self.height);
    queue.write_buffer(
      &self.camera_buffer,
      0,
      bytemuck::cast_slice(&[self.camera_uniform]),
    );

    let color_attachments = [Some(wgpu::RenderPassColorAttachment {
      view,
      resolve_target: None,
      ops: wgpu::Operations {
        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
        store: wgpu::StoreOp::Store,
      },
    })];
    let render_pass_descriptor = wgpu::RenderPassDescriptor {
      label: None,
      color_attachments: &color_attachments,
      depth_stencil_attachment: None,
      timestamp_writes: None,
      occlusion_query_set: None,
    };
    let mut command_encoder =
      device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    {
      let mut rpass = command_encoder.begin_render_pass(&render_pass_descriptor);
      rpass.set_pipeline(&self.render_pipeline);
      rpass.set_bind_group(0, &self.camera_bind_group, &[]);
      rpass.set_vertex_buffer(3, self.quad_buffer.slice(..));
      for field in scene.iter_fields() {
        let Some(gpu) = self.fields.get(&field.id()) else {
          continue;
        };
        rpass.set_bind_group(1, &gpu.bind_group, &[]);
        rpass.set_vertex_buffer(0, gpu.positions.slice(..));
        rpass.set_vertex_buffer(1, gpu.colors.slice(..));
        rpass.set_vertex_buffer(2, gpu.sizes.slice(..));
        rpass.draw(0..6, 0..gpu.count);
      }
    }
    queue.submit(Some(command_encoder.finish()));
  }
}

/// One frame's worth of GPU handles, so the driver can draw without knowing
/// about wgpu.
pub struct FrameTarget<'a> {
  pub renderer: &'a mut Renderer,
  pub device: &'a wgpu::Device,
  pub queue: &'a wgpu::Queue,
  pub view: &'a wgpu::TextureView,
}

impl DrawTarget for FrameTarget<'_> {
  fn draw(&mut self, scene: &mut Scene) {
    self.renderer.render(self.view, self.device, self.queue, scene);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn field_uniform_matches_shader_layout() {
    // mat4x4 + four scalars, 16-byte aligned.
    assert_eq!(std::mem::size_of::<FieldUniform>(), 80);
    assert_eq!(std::mem::size_of::<CameraUniform>(), 144);
  }

  #[test]
  fn quad_covers_unit_square() {
    for corner in QUAD.chunks_exact(2) {
      assert_eq!(corner[0].abs(), 1.0);
      assert_eq!(corner[1].abs(), 1.0);
    }
  }
}
