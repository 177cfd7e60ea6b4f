//! Frame execution. Owns the GPU context, the point pipeline, the per-frame visible
//! buffer and the egui renderer, and turns a [`FramePlan`] into one submitted frame.

pub mod buffer;
pub mod context;
pub mod pipelines;

use self::{buffer::GpuBuffer, context::GfxContext, pipelines::points::PointPipeline};
use pointstream::{DrawSource, FramePlan, Point, PointStore, RenderStyle, VisibleBuffer};
use std::sync::Arc;
use winit::window::Window;

/// Tessellated egui output for one frame.
pub struct UiFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

pub struct Renderer {
    pub gfx: GfxContext,
    pub points: PointPipeline,
    visible: VisibleBuffer<GpuBuffer>,
    pub egui_renderer: egui_wgpu::Renderer,
    clear_color: wgpu::Color,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, style: &RenderStyle) -> anyhow::Result<Self> {
        let gfx = GfxContext::new(window).await?;
        let points = PointPipeline::new(&gfx.device, gfx.config.format);
        let visible = VisibleBuffer::new(GpuBuffer::new(
            gfx.device.clone(),
            gfx.queue.clone(),
            "Visible Points",
        ));
        let egui_renderer = egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1);

        let [r, g, b] = style.clear_color;
        Ok(Self {
            gfx,
            points,
            visible,
            egui_renderer,
            clear_color: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            },
        })
    }

    /// Fresh, unallocated buffers for the full and coarse point sets.
    pub fn point_buffers(&self) -> (GpuBuffer, GpuBuffer) {
        let make = |label| GpuBuffer::new(self.gfx.device.clone(), self.gfx.queue.clone(), label);
        (make("Full Points"), make("Coarse Points"))
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.gfx.resize(new_size);
    }

    /// Execute `plan` plus the UI overlay. Returns the number of points drawn.
    pub fn render(
        &mut self,
        plan: &FramePlan,
        store: &PointStore<GpuBuffer>,
        visible_points: &[Point],
        ui: UiFrame,
    ) -> Result<usize, wgpu::SurfaceError> {
        let frame = self.gfx.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.gfx.config.width, self.gfx.config.height],
            pixels_per_point: ui.pixels_per_point,
        };

        for (id, delta) in &ui.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.gfx.device, &self.gfx.queue, *id, delta);
        }
        let ui_cmds = self.egui_renderer.update_buffers(
            &self.gfx.device,
            &self.gfx.queue,
            &mut encoder,
            &ui.primitives,
            &screen_descriptor,
        );

        if let DrawSource::Visible { .. } = plan.source {
            self.visible.upload(visible_points);
        }
        let (instances, count) = match plan.source {
            DrawSource::Visible { .. } => (Some(self.visible.buffer()), self.visible.count()),
            DrawSource::Range { level, count } => (Some(store.buffer(level)), count),
            DrawSource::Empty => (None, 0),
        };

        self.points.update_uniforms(&self.gfx.queue, &plan.uniforms);

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Points Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(instances) = instances {
                self.points.draw(&mut pass, instances, count as u32);
            }

            self.egui_renderer
                .render(&mut pass, &ui.primitives, &screen_descriptor);
        }

        self.gfx
            .queue
            .submit(ui_cmds.into_iter().chain(std::iter::once(encoder.finish())));
        frame.present();

        for id in &ui.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        Ok(count)
    }
}
