//! Control panel and debug overlay.
//!
//! The panel does not mutate the scene; it returns [`UiAction`]s that the app applies.

use pointstream::config::{clamp_count, MAX_BATCH_SIZE, POINT_SIZE_MAX, POINT_SIZE_MIN};
use pointstream::{DrawMode, FrameStats, RenderStyle, Status, StreamConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiAction {
    Generate(usize),
    AddMore(usize),
    Stop,
    Clear,
    SetCoarseRate(usize),
    SetBatchSize(usize),
    SetDrawMode(DrawMode),
    SetAutoLod(bool),
    SetPointSize(f32),
}

/// Form values. Edits stay here until a button or toggle turns them into an action.
#[derive(Debug, Clone)]
pub struct ControlsState {
    pub total: usize,
    pub add_count: usize,
    pub coarse_rate: usize,
    pub batch_size: usize,
    pub point_size: f32,
    pub draw_mode: DrawMode,
    pub auto_lod: bool,
    pub show_overlay: bool,
}

impl ControlsState {
    pub fn new(config: &StreamConfig, style: &RenderStyle, initial_total: usize) -> Self {
        let mut state = Self {
            total: initial_total,
            add_count: 100_000,
            coarse_rate: config.coarse_rate,
            batch_size: config.batch_size,
            point_size: style.point_size,
            draw_mode: DrawMode::Auto,
            auto_lod: true,
            show_overlay: true,
        };
        state.clamp_to(config.max_total_points);
        state
    }

    /// Force every field into the range the controls accept.
    pub fn clamp_to(&mut self, max_total: usize) {
        self.total = clamp_count(self.total, 1, max_total);
        self.add_count = clamp_count(self.add_count, 1, max_total);
        self.coarse_rate = clamp_count(self.coarse_rate, 1, max_total);
        self.batch_size = clamp_count(self.batch_size, 1, MAX_BATCH_SIZE);
        self.point_size = RenderStyle::clamp_point_size(self.point_size);
    }
}

/// Read-only facts the panel displays.
#[derive(Debug, Clone, Copy)]
pub struct PanelView {
    pub status: Status,
    pub max_total: usize,
    pub coarse_rate: usize,
    pub batch_size: usize,
}

pub fn draw_controls(ctx: &egui::Context, state: &mut ControlsState, view: &PanelView) -> Vec<UiAction> {
    let mut actions = Vec::new();
    let max_total = view.max_total.max(1);

    egui::SidePanel::left("controls")
        .resizable(false)
        .default_width(220.0)
        .show(ctx, |ui| {
            ui.heading("Point stream");
            ui.label(view.status.text());
            ui.label(format!("Coarse: {} points", view.status.coarse_count));
            ui.separator();

            ui.horizontal(|ui| {
                ui.label("Total");
                ui.add(egui::DragValue::new(&mut state.total).clamp_range(1..=max_total).speed(1000));
            });
            ui.horizontal(|ui| {
                if ui.button("Generate").clicked() {
                    actions.push(UiAction::Generate(state.total));
                }
                if ui
                    .add_enabled(view.status.generating, egui::Button::new("Stop"))
                    .clicked()
                {
                    actions.push(UiAction::Stop);
                }
                if ui.button("Clear").clicked() {
                    actions.push(UiAction::Clear);
                }
            });

            let at_capacity = view.status.loaded_count >= max_total;
            ui.horizontal(|ui| {
                ui.add(egui::DragValue::new(&mut state.add_count).clamp_range(1..=max_total).speed(1000));
                if ui
                    .add_enabled(!at_capacity, egui::Button::new("Add More"))
                    .clicked()
                {
                    actions.push(UiAction::AddMore(state.add_count));
                }
            });
            ui.separator();

            ui.horizontal(|ui| {
                ui.label("Coarse 1/");
                ui.add(egui::DragValue::new(&mut state.coarse_rate).clamp_range(1..=max_total));
                if ui
                    .add_enabled(state.coarse_rate != view.coarse_rate, egui::Button::new("Apply"))
                    .clicked()
                {
                    actions.push(UiAction::SetCoarseRate(state.coarse_rate));
                }
            });
            ui.horizontal(|ui| {
                ui.label("Batch");
                let r = ui.add(egui::DragValue::new(&mut state.batch_size).clamp_range(1..=MAX_BATCH_SIZE));
                if r.changed() && state.batch_size != view.batch_size {
                    actions.push(UiAction::SetBatchSize(state.batch_size));
                }
            });
            ui.separator();

            let before = state.draw_mode;
            egui::ComboBox::from_label("Draw mode")
                .selected_text(state.draw_mode.to_string())
                .show_ui(ui, |ui| {
                    for mode in [DrawMode::Auto, DrawMode::Coarse, DrawMode::Full] {
                        ui.selectable_value(&mut state.draw_mode, mode, mode.to_string());
                    }
                });
            if state.draw_mode != before {
                actions.push(UiAction::SetDrawMode(state.draw_mode));
            }

            if ui.checkbox(&mut state.auto_lod, "Auto LOD").changed() {
                actions.push(UiAction::SetAutoLod(state.auto_lod));
            }
            if ui
                .add(egui::Slider::new(&mut state.point_size, POINT_SIZE_MIN..=POINT_SIZE_MAX).text("Point size"))
                .changed()
            {
                actions.push(UiAction::SetPointSize(state.point_size));
            }
            ui.checkbox(&mut state.show_overlay, "Debug overlay");
        });

    actions
}

pub fn draw_overlay(ctx: &egui::Context, stats: &FrameStats) {
    egui::Area::new(egui::Id::new("debug_overlay"))
        .anchor(egui::Align2::RIGHT_TOP, [-8.0, 8.0])
        .interactable(false)
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.monospace(format!(
                    "FPS: {:.0} (ticks {:.0})",
                    stats.fps, stats.ticks_per_second
                ));
                ui.monospace(format!("Points: {}", stats.points_drawn));
                ui.monospace(format!(
                    "Mode: {}",
                    stats.lod.map(|l| l.label()).unwrap_or("-")
                ));
            });
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controls_start_inside_their_ranges() {
        let config = StreamConfig {
            max_total_points: 50_000,
            ..Default::default()
        };
        let state = ControlsState::new(&config, &RenderStyle::default(), 250_000);
        assert_eq!(state.total, 50_000);
        assert_eq!(state.add_count, 50_000);
        assert_eq!(state.coarse_rate, 100);
        assert_eq!(state.point_size, 4.0);

        let zero = ControlsState::new(&config, &RenderStyle::default(), 0);
        assert_eq!(zero.total, 1);
    }
}
