use crate::{
    config::Config,
    input::InputAdapter,
    renderer::{buffer::GpuBuffer, Renderer, UiFrame},
    ui::{self, ControlsState, PanelView, UiAction},
};
use anyhow::Result;
use pointstream::{Coordinator, RenderScheduler, ViewportController};
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{event::WindowEvent, window::Window};

/// egui repaint requests further out than this are treated as "no repaint needed".
const REPAINT_HORIZON: Duration = Duration::from_secs(60);

pub struct App {
    window: Arc<Window>,
    pub renderer: Renderer,
    pub viewport: ViewportController,
    pub scheduler: RenderScheduler,
    pub coordinator: Coordinator<GpuBuffer>,
    input: InputAdapter,
    controls: ControlsState,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    repaint_at: Option<Instant>,
}

impl App {
    pub async fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let stream = config.stream_config();
        let style = config.render_style();

        let renderer = Renderer::new(window.clone(), &style).await?;
        let (full, coarse) = renderer.point_buffers();
        let coordinator = Coordinator::new(stream.clone(), full, coarse);

        let mut viewport = ViewportController::new(&stream, style.max_device_pixel_ratio);
        let size = renderer.gfx.size;
        viewport.resize(size.width, size.height, window.scale_factor() as f32);

        let scheduler = RenderScheduler::new(&stream, &style);
        let controls = ControlsState::new(&stream, &style, config.initial_points);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        let mut app = Self {
            window,
            renderer,
            viewport,
            scheduler,
            coordinator,
            input: InputAdapter::new(),
            controls,
            egui_ctx,
            egui_state,
            repaint_at: None,
        };

        if config.initial_points > 0 {
            app.coordinator
                .generate(config.initial_points, &mut app.scheduler)?;
        }

        Ok(app)
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer.resize(new_size);
            self.viewport.resize(
                new_size.width,
                new_size.height,
                self.window.scale_factor() as f32,
            );
            self.scheduler.mark_dirty();
        }
    }

    /// Restore the surface after it was lost or went stale.
    pub fn reconfigure(&mut self) {
        self.renderer.gfx.reconfigure();
        self.scheduler.mark_dirty();
    }

    /// Returns true if the event was consumed by the UI or the viewport.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(&self.window, event);
        if response.repaint {
            self.scheduler.mark_dirty();
        }
        if response.consumed {
            return true;
        }

        match event {
            WindowEvent::Resized(physical_size) => {
                self.resize(*physical_size);
                false
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                self.resize(self.window.inner_size());
                false
            }
            _ => self
                .input
                .handle_event(event, &mut self.viewport, &mut self.scheduler),
        }
    }

    /// One frame tick: commit streamed batches and update rates. Does not draw.
    pub fn tick(&mut self, now: Instant) {
        self.coordinator.poll(&mut self.scheduler);

        if self.repaint_at.is_some_and(|at| now >= at) {
            self.repaint_at = None;
            self.scheduler.mark_dirty();
        }

        self.scheduler.tick(now);
    }

    pub fn needs_redraw(&self) -> bool {
        self.scheduler.is_dirty()
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        // Redraws requested by the system need a complete frame too.
        self.scheduler.mark_dirty();

        let ui = self.run_ui();

        let (full, coarse) = self.coordinator.layers();
        let Some(plan) = self.scheduler.begin_frame(&self.viewport, full, coarse) else {
            return Ok(());
        };

        match self.renderer.render(
            &plan,
            self.coordinator.store(),
            self.scheduler.visible_points(),
            ui,
        ) {
            Ok(drawn) => {
                self.scheduler.end_frame(drawn);
                Ok(())
            }
            Err(err) => {
                self.scheduler.abort_frame();
                Err(err)
            }
        }
    }

    fn run_ui(&mut self) -> UiFrame {
        let raw_input = self.egui_state.take_egui_input(&self.window);
        self.egui_ctx.begin_frame(raw_input);

        let config = self.coordinator.config();
        let view = PanelView {
            status: self.coordinator.status(),
            max_total: config.max_total_points,
            coarse_rate: config.coarse_rate,
            batch_size: config.batch_size,
        };
        let actions = ui::draw_controls(&self.egui_ctx, &mut self.controls, &view);
        if self.controls.show_overlay {
            ui::draw_overlay(&self.egui_ctx, &self.scheduler.stats());
        }

        let output = self.egui_ctx.end_frame();
        self.egui_state
            .handle_platform_output(&self.window, output.platform_output);

        if let Some(vp) = output.viewport_output.get(&self.egui_ctx.viewport_id()) {
            if vp.repaint_delay < REPAINT_HORIZON {
                self.repaint_at = Some(Instant::now() + vp.repaint_delay);
            }
        }

        for action in actions {
            self.apply(action);
        }

        let primitives = self
            .egui_ctx
            .tessellate(output.shapes, output.pixels_per_point);

        UiFrame {
            primitives,
            textures_delta: output.textures_delta,
            pixels_per_point: output.pixels_per_point,
        }
    }

    fn apply(&mut self, action: UiAction) {
        log::debug!("UI action: {:?}", action);
        match action {
            UiAction::Generate(total) => {
                if let Err(err) = self.coordinator.generate(total, &mut self.scheduler) {
                    log::error!("Failed to start generation: {}", err);
                }
            }
            UiAction::AddMore(total) => {
                if let Err(err) = self.coordinator.add_more(total, &mut self.scheduler) {
                    log::error!("Failed to start generation: {}", err);
                }
            }
            UiAction::Stop => self.coordinator.stop(),
            UiAction::Clear => self.coordinator.clear(&mut self.scheduler),
            UiAction::SetCoarseRate(rate) => {
                self.controls.coarse_rate = self.coordinator.set_coarse_rate(rate, &mut self.scheduler);
            }
            UiAction::SetBatchSize(size) => {
                self.controls.batch_size = self.coordinator.set_batch_size(size);
            }
            UiAction::SetDrawMode(mode) => self.scheduler.set_draw_mode(mode),
            UiAction::SetAutoLod(enabled) => self.scheduler.set_auto_lod(enabled),
            UiAction::SetPointSize(size) => {
                self.controls.point_size = self.scheduler.set_point_size(size);
            }
        }
    }
}
