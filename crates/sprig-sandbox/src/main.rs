use anyhow::Result;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use sprig_engine::core::{App, AppControl, FrameCtx};
use sprig_engine::device::{Gpu, GpuInit};
use sprig_engine::logging::{LoggingConfig, init_logging};
use sprig_engine::paint::Color;
use sprig_engine::particle::{ParticleFactor, ParticleSource, ParticleSourceConfig, ParticleSystem};
use sprig_engine::render::{DrawArgs, Renderer, Texture, TextureOptions, WgpuBackend};
use sprig_engine::window::{Runtime, RuntimeConfig};

const CAPTURE_PATH: &str = "capture.png";
const CHECKER_SIZE: u32 = 64;
const CHECKER_CELL: u32 = 8;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: "sprig sandbox".to_string(),
        initial_size: LogicalSize::new(960.0, 640.0),
    };

    Runtime::run(config, GpuInit::default(), Sandbox::new())
}

struct Sandbox {
    renderer: Option<Renderer<WgpuBackend>>,
    checker: Option<Texture>,
    fountain: ParticleSystem,
    spin: f32,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            renderer: None,
            checker: None,
            fountain: ParticleSystem::new([
                ParticleSource::new(flame()),
                ParticleSource::new(sparks()),
            ]),
            spin: 0.0,
        }
    }
}

fn flame() -> ParticleSourceConfig {
    ParticleSourceConfig {
        capacity: 256,
        geometry: 6.0,
        color: Color::from_rgb8(255, 140, 40).with_alpha(0.8),
        size: ParticleFactor::new(2.0, 5.0),
        interval: ParticleFactor::new(0.005, 0.02),
        lifetime: ParticleFactor::new(1.0, 2.0),
        velocity_x: ParticleFactor::new(-40.0, 40.0),
        velocity_y: ParticleFactor::new(-160.0, -60.0),
    }
}

fn sparks() -> ParticleSourceConfig {
    ParticleSourceConfig {
        capacity: 64,
        geometry: 2.0,
        color: Color::WHITE,
        size: ParticleFactor::new(1.0, 2.0),
        interval: ParticleFactor::fixed(0.05),
        lifetime: ParticleFactor::new(0.3, 0.8),
        velocity_x: ParticleFactor::new(-120.0, 120.0),
        velocity_y: ParticleFactor::new(-120.0, 120.0),
    }
}

/// RGBA8 checkerboard, first row on top.
fn checkerboard(size: u32, cell: u32) -> Vec<u8> {
    let light = [230, 230, 240, 255];
    let dark = [60, 70, 110, 255];

    (0..size * size)
        .flat_map(|i| {
            let (x, y) = (i % size, i / size);
            if (x / cell + y / cell) % 2 == 0 { light } else { dark }
        })
        .collect()
}

impl App for Sandbox {
    fn on_init(&mut self, gpu: &Gpu<'_>) -> Result<()> {
        let mut renderer = Renderer::for_gpu(gpu)?;

        let pixels = checkerboard(CHECKER_SIZE, CHECKER_CELL);
        self.checker = Some(renderer.create_texture(
            &pixels,
            CHECKER_SIZE,
            CHECKER_SIZE,
            TextureOptions { smoothing: false },
        ));

        let center = renderer.screen_size() / 2.0;
        self.fountain.set_origin(center.x, center.y);

        if !gpu.supports_capture() {
            log::warn!("F12 capture will fail on this surface");
        }

        self.renderer = Some(renderer);
        Ok(())
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.fountain.set_origin(position.x as f32, position.y as f32);
            }

            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Escape) => return AppControl::Exit,
                    PhysicalKey::Code(KeyCode::F12) => {
                        if let Some(renderer) = self.renderer.as_mut() {
                            renderer.request_capture(CAPTURE_PATH);
                        }
                    }
                    _ => {}
                }
            }

            _ => {}
        }

        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let dt = ctx.time.dt;
        self.fountain.update(dt);
        self.spin = (self.spin + dt * 0.8) % std::f32::consts::TAU;

        let Self {
            renderer,
            checker,
            fountain,
            spin,
        } = self;
        let (Some(renderer), Some(checker)) = (renderer.as_mut(), checker.as_ref()) else {
            return AppControl::Continue;
        };

        let center = renderer.screen_size() / 2.0;
        let pulse = 1.5 + 0.5 * spin.sin();
        let args = DrawArgs::new().scale(pulse, pulse).rotate(*spin).centered(true);

        ctx.render(renderer, Color::from_rgb8(18, 18, 24), |r| {
            r.draw_rect_fill(0.0, center.y * 2.0 - 24.0, center.x * 2.0, 24.0, Color::from_rgb8(40, 44, 60));
            r.draw_texture(checker, center.x, center.y, Some(&args));
            r.draw_texture(checker, 16.0, 16.0, None);
            fountain.render(r);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_alternates_cells() {
        let px = checkerboard(4, 2);
        assert_eq!(px.len(), 4 * 4 * 4);

        let at = |x: usize, y: usize| &px[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(at(0, 0), at(1, 1));
        assert_ne!(at(0, 0), at(2, 0));
        assert_ne!(at(0, 0), at(0, 2));
        assert_eq!(at(0, 0), at(2, 2));
    }

    #[test]
    fn fountain_sources_are_valid() {
        for config in [flame(), sparks()] {
            assert!(config.capacity > 0);
            assert!(config.interval.min() >= 0.0);
        }
    }
}
