//! Entry point for the scatter viewer.

use anyhow::Result;
use clap::Parser;
use scatter_viewer::{app::App, config::Config};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use winit::{
    event::{ElementState, Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

/// Frame tick period. Ticks on a clean scene do no rendering work.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::debug!("{:?}", config);

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Scatter Viewer")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 800))
            .build(&event_loop)?,
    );

    // Graphics failures are fatal and reported once.
    let mut app = match pollster::block_on(App::new(window.clone(), &config)) {
        Ok(app) => app,
        Err(err) => {
            log::error!("{:#}", err);
            return Err(err);
        }
    };

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => {
            if app.handle_event(&event) {
                return;
            }

            match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::KeyboardInput { event, .. }
                    if event.state == ElementState::Pressed
                        && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
                {
                    elwt.exit()
                }
                WindowEvent::RedrawRequested => match app.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        app.reconfigure();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("GPU out of memory, exiting");
                        elwt.exit();
                    }
                    Err(e) => log::error!("Render error: {:?}", e),
                },
                _ => {}
            }
        }
        Event::AboutToWait => {
            let now = Instant::now();
            app.tick(now);
            if app.needs_redraw() {
                window.request_redraw();
            }
            elwt.set_control_flow(ControlFlow::WaitUntil(now + FRAME_INTERVAL));
        }
        _ => {}
    })?;

    Ok(())
}
