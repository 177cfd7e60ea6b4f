use crate::renderer::buffer::GpuBuffer;
use pointstream::types::POINT_STRIDE;
use pointstream::DrawUniforms;
use wgpu::util::DeviceExt;

/// Must match `Uniforms` in `points.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointsUniform {
    /// Canvas size in device pixels.
    pub canvas: [f32; 2],
    pub pan: [f32; 2],
    pub scale: f32,
    /// Diameter in device pixels.
    pub point_size: f32,
    pub _pad: [f32; 2],
    pub color: [f32; 4],
}

impl From<&DrawUniforms> for PointsUniform {
    fn from(u: &DrawUniforms) -> Self {
        Self {
            canvas: [u.canvas[0].max(1.0), u.canvas[1].max(1.0)],
            pan: u.pan,
            scale: u.scale,
            point_size: u.point_size,
            _pad: [0.0; 2],
            color: u.color,
        }
    }
}

pub struct PointPipeline {
    pub pipeline: wgpu::RenderPipeline,
    uniform_buf: wgpu::Buffer,
    bind: wgpu::BindGroup,
    quad_vb: wgpu::Buffer,
}

impl PointPipeline {
    pub fn new(device: &wgpu::Device, color_fmt: wgpu::TextureFormat) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Points UBO Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<PointsUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let uniform_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Points UBO"),
            contents: bytemuck::bytes_of(&PointsUniform::initial()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Points Bind Group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buf.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/points.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/points.wgsl").into()),
        });

        // Sprite corners in [-1, 1]; the shader scales them to the point size.
        let quad_corners: [[f32; 2]; 6] = [
            [-1.0, -1.0],
            [1.0, -1.0],
            [1.0, 1.0],
            [-1.0, -1.0],
            [1.0, 1.0],
            [-1.0, 1.0],
        ];

        let quad_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Points Quad VB"),
            contents: bytemuck::cast_slice(&quad_corners),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let vbuf_layouts = [
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    shader_location: 0,
                    offset: 0,
                    format: wgpu::VertexFormat::Float32x2,
                }],
            },
            // One world position per instance, straight out of the point store.
            wgpu::VertexBufferLayout {
                array_stride: POINT_STRIDE,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &[wgpu::VertexAttribute {
                    shader_location: 1,
                    offset: 0,
                    format: wgpu::VertexFormat::Float32x2,
                }],
            },
        ];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Points PipelineLayout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Points Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &vbuf_layouts,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_fmt,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            pipeline,
            uniform_buf,
            bind,
            quad_vb,
        }
    }

    pub fn update_uniforms(&self, queue: &wgpu::Queue, uniforms: &DrawUniforms) {
        let data = PointsUniform::from(uniforms);
        queue.write_buffer(&self.uniform_buf, 0, bytemuck::bytes_of(&data));
    }

    /// Draw the first `count` positions of `instances`.
    pub fn draw<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>, instances: &'a GpuBuffer, count: u32) {
        if count == 0 {
            return;
        }
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind, &[]);
        rpass.set_vertex_buffer(0, self.quad_vb.slice(..));
        rpass.set_vertex_buffer(1, instances.slice(count as u64 * POINT_STRIDE));
        rpass.draw(0..6, 0..count);
    }
}

impl PointsUniform {
    fn initial() -> Self {
        Self {
            canvas: [1.0, 1.0],
            pan: [0.0; 2],
            scale: 1.0,
            point_size: 1.0,
            _pad: [0.0; 2],
            color: [0.0; 4],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<PointsUniform>(), 48);
        assert_eq!(std::mem::offset_of!(PointsUniform, scale), 16);
        assert_eq!(std::mem::offset_of!(PointsUniform, color), 32);
    }

    #[test]
    fn conversion_guards_an_empty_canvas() {
        let u = PointsUniform::from(&DrawUniforms {
            canvas: [0.0, 600.0],
            pan: [3.0, 4.0],
            scale: 0.5,
            point_size: 8.0,
            color: [0.15, 0.45, 0.35, 0.9],
        });
        assert_eq!(u.canvas, [1.0, 600.0]);
        assert_eq!(u.pan, [3.0, 4.0]);
        assert_eq!(u.point_size, 8.0);
        assert_eq!(u.color[3], 0.9);
    }
}
