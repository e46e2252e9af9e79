//! GPU resources and render pipeline for one particle field.
//!
//! A [`FieldGpu`] owns everything a field needs on the device: the shared
//! quad geometry, the per-particle instance buffer, the uniform buffer, the
//! source image texture and the touch raster texture. Resources are released
//! explicitly with [`FieldGpu::destroy`] rather than waiting for drop.
//!
//! Each particle is one instance of a 4-vertex quad. The vertex shader reads
//! the source texture at the particle's pixel to get its grey level and the
//! touch texture to get its displacement.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::params::FieldParams;
use crate::sampler::{Bitmap, ParticleInstance};

/// Shader uniforms for a field. Layout matches `Uniforms` in `particles.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct FieldUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub time: f32,
    pub random: f32,
    pub depth: f32,
    pub size: f32,
    pub brightness: f32,
    pub density: f32,
    pub texture_size: [f32; 2],
    pub color: [f32; 3],
    /// Fit scale applied to particle positions.
    pub scale: f32,
}

impl FieldUniforms {
    pub fn new(params: &FieldParams, view_proj: Mat4, scale: f32) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            time: params.time,
            random: params.randomness,
            depth: params.depth,
            size: params.size,
            brightness: params.brightness,
            density: params.density,
            texture_size: params.texture_size.to_array(),
            color: params.color.to_array(),
            scale,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct QuadVertex {
    corner: [f32; 2],
    uv: [f32; 2],
}

const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { corner: [-0.5, 0.5], uv: [0.0, 0.0] },
    QuadVertex { corner: [0.5, 0.5], uv: [1.0, 0.0] },
    QuadVertex { corner: [-0.5, -0.5], uv: [0.0, 1.0] },
    QuadVertex { corner: [0.5, -0.5], uv: [1.0, 1.0] },
];

const QUAD_INDICES: [u16; 6] = [0, 2, 1, 2, 3, 1];

/// WGSL source of the particle shader.
pub const PARTICLE_SHADER: &str = include_str!("particles.wgsl");

const SOURCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const TOUCH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Device-side state of one particle field.
pub struct FieldGpu {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    quad_vertices: wgpu::Buffer,
    quad_indices: wgpu::Buffer,
    /// `None` when the field has no visible particles.
    instances: Option<wgpu::Buffer>,
    num_instances: u32,
    source_texture: wgpu::Texture,
    touch_texture: wgpu::Texture,
    touch_size: u32,
}

impl FieldGpu {
    /// Upload a field's image and instances and build its pipeline.
    ///
    /// The caller is responsible for keeping `bitmap` within the device's
    /// texture size limit.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        bitmap: &Bitmap,
        instances: &[ParticleInstance],
        touch_size: u32,
    ) -> Self {
        let quad_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Field Quad Vertices"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let quad_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Field Quad Indices"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let instance_buffer = if instances.is_empty() {
            None
        } else {
            Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Field Instances"),
                contents: bytemuck::cast_slice(instances),
                usage: wgpu::BufferUsages::VERTEX,
            }))
        };

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Field Uniforms"),
            size: std::mem::size_of::<FieldUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let source_texture = create_texture(
            device,
            "Field Source Texture",
            bitmap.width(),
            bitmap.height(),
            SOURCE_FORMAT,
        );
        write_texture(queue, &source_texture, bitmap.as_rgba(), bitmap.width(), bitmap.height(), 4);

        let touch_texture = create_texture(device, "Field Touch Texture", touch_size, touch_size, TOUCH_FORMAT);
        let blank = vec![0u8; touch_size as usize * touch_size as usize];
        write_texture(queue, &touch_texture, &blank, touch_size, touch_size, 1);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Field Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let (pipeline, bind_group) = create_render_pipeline(
            device,
            &uniform_buffer,
            &source_texture,
            &touch_texture,
            &sampler,
            surface_format,
        );

        tracing::debug!(
            instances = instances.len(),
            width = bitmap.width(),
            height = bitmap.height(),
            touch_size,
            "field GPU resources created"
        );

        Self {
            pipeline,
            bind_group,
            uniform_buffer,
            quad_vertices,
            quad_indices,
            instances: instance_buffer,
            num_instances: instances.len() as u32,
            source_texture,
            touch_texture,
            touch_size,
        }
    }

    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &FieldUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Replace the touch raster. `pixels` must be `touch_size * touch_size` bytes.
    pub fn write_touch(&self, queue: &wgpu::Queue, pixels: &[u8]) {
        let expected = self.touch_size as usize * self.touch_size as usize;
        if pixels.len() != expected {
            tracing::warn!(expected, actual = pixels.len(), "touch raster size mismatch, skipping upload");
            return;
        }
        write_texture(queue, &self.touch_texture, pixels, self.touch_size, self.touch_size, 1);
    }

    /// Record the instanced draw. Does nothing for an empty field.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(instances) = &self.instances else {
            return;
        };
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.quad_vertices.slice(..));
        pass.set_vertex_buffer(1, instances.slice(..));
        pass.set_index_buffer(self.quad_indices.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..self.num_instances);
    }

    /// Release device memory now.
    pub fn destroy(self) {
        self.quad_vertices.destroy();
        self.quad_indices.destroy();
        if let Some(instances) = &self.instances {
            instances.destroy();
        }
        self.uniform_buffer.destroy();
        self.source_texture.destroy();
        self.touch_texture.destroy();
        tracing::debug!("field GPU resources destroyed");
    }
}

fn create_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn write_texture(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    data: &[u8],
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * bytes_per_pixel),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn create_render_pipeline(
    device: &wgpu::Device,
    uniform_buffer: &wgpu::Buffer,
    source_texture: &wgpu::Texture,
    touch_texture: &wgpu::Texture,
    sampler: &wgpu::Sampler,
    surface_format: wgpu::TextureFormat,
) -> (wgpu::RenderPipeline, wgpu::BindGroup) {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Field Particle Shader"),
        source: wgpu::ShaderSource::Wgsl(PARTICLE_SHADER.into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Field Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            texture_entry(1),
            texture_entry(2),
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    let source_view = source_texture.create_view(&wgpu::TextureViewDescriptor::default());
    let touch_view = touch_texture.create_view(&wgpu::TextureViewDescriptor::default());

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Field Bind Group"),
        layout: &bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&source_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&touch_view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Field Pipeline Layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let quad_layout = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<QuadVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
    };
    let instance_layout = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<ParticleInstance>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &wgpu::vertex_attr_array![2 => Uint32, 3 => Float32x3, 4 => Float32],
    };

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Field Render Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[quad_layout, instance_layout],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    (pipeline, bind_group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    use crate::params::ParamValues;

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<FieldUniforms>(), 112);
        assert_eq!(std::mem::size_of::<FieldUniforms>() % 16, 0);
        assert_eq!(std::mem::offset_of!(FieldUniforms, brightness), 80);
        assert_eq!(std::mem::offset_of!(FieldUniforms, texture_size), 88);
        assert_eq!(std::mem::offset_of!(FieldUniforms, color), 96);
        assert_eq!(std::mem::offset_of!(FieldUniforms, scale), 108);
    }

    #[test]
    fn test_instance_stride() {
        assert_eq!(std::mem::size_of::<ParticleInstance>(), 20);
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
    }

    #[test]
    fn test_uniforms_from_params() {
        let params = FieldParams::from_values(&ParamValues::default(), 320, 180);
        let uniforms = FieldUniforms::new(&params, Mat4::IDENTITY, 0.5);
        assert_eq!(uniforms.random, params.randomness);
        assert_eq!(uniforms.texture_size, Vec2::new(320.0, 180.0).to_array());
        assert_eq!(uniforms.color, [1.0, 1.0, 0.95]);
        assert_eq!(uniforms.scale, 0.5);
    }

    #[test]
    fn test_quad_indices_in_range() {
        assert!(QUAD_INDICES.iter().all(|&i| (i as usize) < QUAD_VERTICES.len()));
    }
}
