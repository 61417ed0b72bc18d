// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Pyre Sandbox
// Renders a procedurally generated scene. Pass a RON file to override the
// renderer configuration.

use anyhow::{Context, Result};
use pyre_agents::{
    ClusterForwardRenderer, EntityDescription, FrameView, LoadEvent, RendererContext,
    SceneDescription, SceneLoader,
};
use pyre_core::math::{Camera, LinearRgba, Vec3};
use pyre_core::platform::PyreWindow;
use pyre_core::renderer::{Light, LightSet};
use pyre_core::scene::{MeshData, Scene, TextureData, Transform};
use pyre_core::RendererConfig;
use pyre_infra::{DeviceManager, WinitWindow, WinitWindowBuilder};
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::WindowId;

const GRID: i32 = 4;

fn procedural_scene() -> Result<SceneDescription> {
    let mut description = SceneDescription {
        materials: vec![
            ("floor".to_string(), TextureData::solid(4, 4, [90, 90, 96, 255]).into()),
            ("crate".to_string(), TextureData::solid(4, 4, [176, 120, 64, 255]).into()),
        ],
        entities: vec![EntityDescription {
            name: "floor".to_string(),
            mesh: MeshData::plane(40.0),
            transform: Transform::from_translation(Vec3::new(0.0, -1.0, 0.0)),
            materials: vec!["floor".to_string()],
            base_color: LinearRgba::WHITE,
        }],
    };
    for x in -GRID..=GRID {
        for z in -GRID..=GRID {
            description.entities.push(EntityDescription {
                name: format!("crate {x},{z}"),
                mesh: MeshData::cube(),
                transform: Transform::from_translation(Vec3::new(x as f32 * 3.0, 0.0, z as f32 * 3.0)),
                materials: vec!["crate".to_string()],
                base_color: LinearRgba::new(1.0, 1.0 - (x + GRID) as f32 * 0.08, 1.0, 1.0),
            });
        }
    }
    Ok(description)
}

fn lights(capacity: u32) -> Result<LightSet> {
    let mut lights = LightSet::with_capacity(capacity);
    for i in 0..capacity.min(32) {
        let angle = i as f32 * std::f32::consts::TAU / 32.0;
        let color = LinearRgba::new(0.5 + 0.5 * angle.cos(), 0.5 + 0.5 * angle.sin(), 0.8, 1.0);
        lights.push(Light::point(Vec3::new(angle.cos() * 10.0, 1.5, angle.sin() * 10.0), 6.0, color, 4.0))?;
    }
    Ok(lights)
}

struct Running {
    // The swap chain presents into this window; it must outlive the renderer.
    window: WinitWindow,
    context: Arc<RendererContext>,
    renderer: ClusterForwardRenderer,
    loader: SceneLoader,
}

struct Sandbox {
    config: RendererConfig,
    scene: Arc<Scene>,
    started: Instant,
    running: Option<Running>,
}

impl Sandbox {
    fn start(&self, event_loop: &ActiveEventLoop) -> Result<Running> {
        let window = WinitWindowBuilder::new()
            .with_title("Pyre Sandbox")
            .with_dimensions(1600, 900)
            .build(event_loop)
            .context("Failed to create the window")?;
        let (width, height) = window.inner_size();

        let mut devices = DeviceManager::new(&self.config)?;
        let adapter = devices.adapter_info();
        log::info!("Rendering on {} ({:?})", adapter.name, adapter.device_type);
        let swap_chain = devices
            .create_swap_chain(
                window.clone_handle_arc(),
                width,
                height,
                self.config.buffer_count,
                self.config.back_buffer_format,
            )
            .context("Failed to create the swap chain")?;
        let context = RendererContext::new(devices.graphics_device(), Box::new(swap_chain), self.config.clone())
            .context("Failed to create the renderer context")?;
        context.upload_lights(&lights(self.config.max_lights)?)?;

        let renderer = ClusterForwardRenderer::new(Arc::clone(&context))?;
        let loader = SceneLoader::spawn(Arc::clone(&context), Arc::clone(&self.scene), procedural_scene)?;
        Ok(Running {
            window,
            context,
            renderer,
            loader,
        })
    }

    fn view(&self) -> FrameView {
        let t = self.started.elapsed().as_secs_f32() * 0.2;
        FrameView {
            camera: Camera {
                position: Vec3::new(t.cos() * 18.0, 8.0, t.sin() * 18.0),
                ..Camera::default()
            },
            ..FrameView::default()
        }
    }

    fn redraw(&mut self) -> Result<()> {
        let view = self.view();
        let Some(running) = self.running.as_mut() else {
            return Ok(());
        };
        for event in running.loader.events().try_iter() {
            match event {
                LoadEvent::Progress { loaded, total, name } => log::debug!("Loaded {name} ({loaded}/{total})"),
                LoadEvent::Finished { entities } => log::info!("Scene ready with {entities} entities"),
                LoadEvent::Failed(reason) => anyhow::bail!("Scene loading failed: {reason}"),
            }
        }
        let stats = running.renderer.render_frame(self.scene.as_ref(), &view, None)?;
        if stats.frame_index % 600 == 0 {
            log::info!(
                "Frame {}: {} draws, {} dispatches, {} triangles",
                stats.frame_index,
                stats.draw_calls,
                stats.dispatches,
                stats.triangles
            );
        }
        running.window.request_redraw();
        Ok(())
    }
}

impl ApplicationHandler for Sandbox {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        log::info!("Application resumed. Initializing the renderer...");
        match self.start(event_loop) {
            Ok(running) => {
                running.window.request_redraw();
                self.running = Some(running);
            }
            Err(e) => {
                log::error!("Startup failed: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(running) = self.running.as_ref() else {
            return;
        };
        if running.window.id() != id {
            return;
        }
        let result = match event {
            WindowEvent::CloseRequested => {
                log::info!("Shutdown requested, exiting event loop...");
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(size) => running
                .context
                .resize(size.width, size.height)
                .context("Resize failed"),
            WindowEvent::RedrawRequested => self.redraw(),
            _ => Ok(()),
        };
        if let Err(e) = result {
            log::error!("{e:#}");
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut running) = self.running.take() {
            if let Err(e) = running.loader.wait() {
                log::warn!("Scene loader ended with an error: {e}");
            }
            if let Err(e) = running.context.wait_for_idle() {
                log::warn!("Failed to drain the GPU before exit: {e}");
            }
        }
        log::info!("Sandbox shut down.");
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("wgpu_hal", log::LevelFilter::Warn)
        .filter_module("wgpu_core", log::LevelFilter::Error)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => RendererConfig::load(&path).with_context(|| format!("Failed to load {path}"))?,
        None => RendererConfig::default(),
    };

    let event_loop = EventLoop::new().context("Failed to create the event loop")?;
    let mut sandbox = Sandbox {
        config,
        scene: Arc::new(Scene::new()),
        started: Instant::now(),
        running: None,
    };
    event_loop.run_app(&mut sandbox)?;
    Ok(())
}
