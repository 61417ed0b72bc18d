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

//! End-to-end frames recorded against the mock device.

use pyre_agents::{ClusterForwardRenderer, FrameStage, FrameView, MeshShaderRenderer, RendererContext};
use pyre_core::config::RendererConfig;
use pyre_core::math::{LinearRgba, Vec3};
use pyre_core::renderer::api::{Command, CommandList, CommandListType, DeviceCapabilities, PipelineStateId, Vertex};
use pyre_core::renderer::{GraphicsDevice, PipelineError, RenderError, ResourceError};
use pyre_core::scene::{Entity, MeshData, Scene, TextureData, Transform};
use pyre_core::testing::{MockDevice, MockSwapChain};
use std::sync::Arc;

fn config() -> RendererConfig {
    RendererConfig {
        vertex_capacity: 10_000,
        index_capacity: 60_000,
        shadow_map_size: (128, 128),
        max_lights: 16,
        ..Default::default()
    }
}

fn setup(device: MockDevice, config: RendererConfig) -> anyhow::Result<(Arc<MockDevice>, Arc<RendererContext>)> {
    let device = Arc::new(device);
    let swap_chain = MockSwapChain::new(&device, 3, 320, 180, config.back_buffer_format)?;
    let context = RendererContext::new(device.clone(), Box::new(swap_chain), config)?;
    Ok((device, context))
}

fn cube_scene(context: &RendererContext, material: &str) -> anyhow::Result<Scene> {
    let mesh = context.upload_mesh(&MeshData::cube())?;
    let scene = Scene::new();
    scene.push(Entity {
        name: "cube".to_string(),
        mesh,
        transform: Transform::from_translation(Vec3::new(0.0, 0.0, -3.0)),
        materials: vec![material.to_string()],
        base_color: LinearRgba::WHITE,
    });
    scene.set_ready(true);
    Ok(scene)
}

/// Indexed draws recorded while `pipeline` was bound.
fn draws_with(lists: &[(CommandListType, CommandList)], pipeline: PipelineStateId) -> Vec<(u32, i32)> {
    let mut draws = Vec::new();
    for (_, list) in lists {
        let mut bound = None;
        for command in list.commands() {
            match command {
                Command::SetPipelineState(id) => bound = Some(*id),
                Command::DrawIndexedInstanced {
                    index_count,
                    base_vertex,
                    ..
                } if bound == Some(pipeline) => draws.push((*index_count, *base_vertex)),
                _ => {}
            }
        }
    }
    draws
}

#[test]
fn textured_cube_is_drawn_once_by_the_lit_pass() -> anyhow::Result<()> {
    let (device, context) = setup(MockDevice::new(), config())?;
    context.load_material("checker", TextureData::solid(2, 2, [255, 0, 255, 255]))?;
    let scene = cube_scene(&context, "checker")?;
    let mut renderer = ClusterForwardRenderer::new(context)?;
    device.clear_executed();

    let stats = renderer.render_frame(&scene, &FrameView::default(), None)?;

    let lit = renderer.lit_pipeline().expect("lit pipeline").pipeline;
    assert_eq!(draws_with(&device.executed_lists(), lit), vec![(36, 0)]);
    assert_eq!(stats.frame_index, 0);
    assert!(stats.draw_calls >= 3);
    assert_eq!(renderer.frame_index(), 1);
    Ok(())
}

#[test]
fn light_culling_runs_on_the_compute_queue() -> anyhow::Result<()> {
    let (device, context) = setup(MockDevice::new(), config())?;
    let scene = cube_scene(&context, "missing")?;
    let mut renderer = ClusterForwardRenderer::new(context)?;
    device.clear_executed();

    let stats = renderer.render_frame(&scene, &FrameView::default(), None)?;

    let cull = renderer.light_cull_pipeline().expect("light cull pipeline").pipeline;
    let lists = device.executed_lists();
    let (list_type, compute) = lists
        .iter()
        .find(|(_, list)| list.commands().contains(&Command::SetPipelineState(cull)))
        .expect("light cull list");
    assert_eq!(*list_type, CommandListType::Compute);
    assert_eq!(compute.stats().dispatches, 1);
    assert!(stats.dispatches >= 1);
    Ok(())
}

#[test]
fn missing_material_falls_back_to_the_default() -> anyhow::Result<()> {
    let (device, context) = setup(MockDevice::new(), config())?;
    let scene = cube_scene(&context, "does-not-exist")?;
    let mut renderer = ClusterForwardRenderer::new(Arc::clone(&context))?;
    device.clear_executed();

    renderer.render_frame(&scene, &FrameView::default(), None)?;

    let lit = renderer.lit_pipeline().expect("lit pipeline").pipeline;
    assert_eq!(draws_with(&device.executed_lists(), lit).len(), 1);
    let materials = context.materials();
    assert!(!materials.contains("does-not-exist"));
    assert!(materials.resolve(Some("does-not-exist")).fallback);
    Ok(())
}

#[test]
fn unready_scene_is_cleared_and_presented_without_draws() -> anyhow::Result<()> {
    let (device, context) = setup(MockDevice::new(), config())?;
    let scene = cube_scene(&context, "missing")?;
    scene.set_ready(false);
    let mut renderer = ClusterForwardRenderer::new(context)?;
    device.clear_executed();

    renderer.render_frame(&scene, &FrameView::default(), None)?;

    let lit = renderer.lit_pipeline().expect("lit pipeline").pipeline;
    assert!(draws_with(&device.executed_lists(), lit).is_empty());
    assert!(device
        .executed_commands()
        .iter()
        .any(|c| matches!(c, Command::ClearRenderTarget { .. })));
    assert_eq!(renderer.frame_index(), 1);
    Ok(())
}

#[test]
fn geometry_appends_back_to_back() -> anyhow::Result<()> {
    let (_device, context) = setup(MockDevice::new(), config())?;
    let mesh = |name: &str, count: u32| {
        let vertices = vec![Vertex::default(); count as usize];
        MeshData::new(name, vertices, (0..3).collect(), &[1])
    };

    let first = context.upload_mesh(&mesh("first", 1000)?)?;
    assert_eq!(context.geometry().vertices().count(), 1000);
    let second = context.upload_mesh(&mesh("second", 2000)?)?;
    assert_eq!(context.geometry().vertices().count(), 3000);
    assert_eq!((first.base_vertex, second.base_vertex), (0, 1000));

    let err = context.upload_mesh(&mesh("too-big", 8000)?).unwrap_err();
    assert!(matches!(err, RenderError::ResourceError(ResourceError::OutOfBounds)));
    assert_eq!(context.geometry().vertices().count(), 3000);
    Ok(())
}

#[test]
fn parallel_light_culling_makes_the_graphics_queue_wait() -> anyhow::Result<()> {
    let config = RendererConfig {
        serialize_light_cull: false,
        ..config()
    };
    let (device, context) = setup(MockDevice::new(), config)?;
    let scene = cube_scene(&context, "missing")?;
    let mut renderer = ClusterForwardRenderer::new(context)?;

    renderer.render_frame(&scene, &FrameView::default(), None)?;

    assert!(device
        .queue_waits()
        .iter()
        .any(|(queue, _, _)| *queue == CommandListType::Direct));
    Ok(())
}

#[test]
fn serialized_light_culling_blocks_on_the_cpu() -> anyhow::Result<()> {
    let (device, context) = setup(MockDevice::new(), config())?;
    let scene = cube_scene(&context, "missing")?;
    let mut renderer = ClusterForwardRenderer::new(context)?;

    renderer.render_frame(&scene, &FrameView::default(), None)?;

    assert!(device.queue_waits().is_empty());
    Ok(())
}

#[test]
fn gui_hook_records_inside_a_marked_region() -> anyhow::Result<()> {
    let (device, context) = setup(MockDevice::new(), config())?;
    let scene = Scene::new();
    let mut renderer = ClusterForwardRenderer::new(context)?;
    device.clear_executed();

    let mut calls = 0;
    let mut hook = |list: &mut CommandList| {
        calls += 1;
        list.set_viewport_and_scissor(16, 16);
    };
    renderer.render_frame(&scene, &FrameView::default(), Some(&mut hook))?;
    assert_eq!(calls, 1);

    let commands = device.executed_commands();
    let begin = commands
        .iter()
        .position(|c| *c == Command::BeginEvent("GUI".to_string()))
        .expect("GUI marker");
    assert!(commands[begin..].contains(&Command::EndEvent));
    Ok(())
}

#[test]
fn frames_survive_a_resize() -> anyhow::Result<()> {
    let (_device, context) = setup(MockDevice::new(), config())?;
    let scene = cube_scene(&context, "missing")?;
    let mut renderer = ClusterForwardRenderer::new(Arc::clone(&context))?;

    renderer.render_frame(&scene, &FrameView::default(), None)?;
    context.resize(640, 360)?;
    let stats = renderer.render_frame(&scene, &FrameView::default(), None)?;

    assert_eq!(context.targets().size(), (640, 360));
    assert_eq!(stats.frame_index, 1);
    Ok(())
}

#[test]
fn failed_frame_returns_its_allocators() -> anyhow::Result<()> {
    let (device, context) = setup(MockDevice::new(), config())?;
    let scene = cube_scene(&context, "missing")?;
    let mut renderer = ClusterForwardRenderer::new(Arc::clone(&context))?;
    renderer.render_frame(&scene, &FrameView::default(), None)?;
    let allocators = device.allocator_count();

    device.fail_next_submission(CommandListType::Compute);
    let failed = renderer.render_frame(&scene, &FrameView::default(), None);
    assert!(matches!(failed, Err(RenderError::RenderingFailed(_))));
    assert_eq!(renderer.frame_index(), 1);

    for _ in 0..2 {
        renderer.render_frame(&scene, &FrameView::default(), None)?;
    }
    assert_eq!(device.allocator_count(), allocators);
    assert_eq!(renderer.frame_index(), 3);
    Ok(())
}

#[test]
fn skybox_draws_behind_the_scene() -> anyhow::Result<()> {
    let (device, context) = setup(MockDevice::new(), config())?;
    let faces: [TextureData; 6] = std::array::from_fn(|_| TextureData::solid(4, 4, [40, 80, 160, 255]));
    let scene = Scene::new();
    let mut renderer = ClusterForwardRenderer::new(Arc::clone(&context))?.with_skybox(&faces)?;
    context.reset_scene()?;
    device.clear_executed();

    renderer.render_frame(&scene, &FrameView::default(), None)?;

    let draws = device
        .executed_commands()
        .iter()
        .filter(|c| matches!(c, Command::DrawIndexedInstanced { index_count: 36, .. }))
        .count();
    assert_eq!(draws, 1);
    Ok(())
}

#[test]
fn mesh_renderer_requires_mesh_shaders() -> anyhow::Result<()> {
    let capabilities = DeviceCapabilities {
        mesh_shaders: false,
        ..MockDevice::new().capabilities()
    };
    let (_device, context) = setup(MockDevice::with_capabilities(capabilities), config())?;
    let err = MeshShaderRenderer::new(context).unwrap_err();
    assert!(matches!(
        err,
        RenderError::ResourceError(ResourceError::Pipeline(PipelineError::FeatureNotSupported(_)))
    ));
    Ok(())
}

#[test]
fn mesh_renderer_dispatches_uploaded_meshlets() -> anyhow::Result<()> {
    let (device, context) = setup(MockDevice::new(), config())?;
    let cube = MeshData::cube();
    let mesh = context.upload_mesh(&cube)?;
    context.upload_meshlets(&cube, &mesh)?;
    let scene = Scene::new();
    scene.push(Entity {
        name: "cube".to_string(),
        mesh,
        transform: Transform::default(),
        materials: Vec::new(),
        base_color: LinearRgba::WHITE,
    });
    scene.set_ready(true);
    let mut renderer = MeshShaderRenderer::new(context)?;
    device.clear_executed();

    let stats = renderer.render_frame(&scene, &FrameView::default(), None)?;

    assert!(renderer.mesh_pipeline().is_some());
    assert!(device
        .executed_commands()
        .iter()
        .any(|c| matches!(c, Command::DispatchMesh { .. })));
    assert!(stats.dispatches >= 1);
    Ok(())
}

#[test]
fn frame_stages_run_in_declaration_order() {
    let names: Vec<_> = FrameStage::ALL.iter().map(|s| s.name()).collect();
    assert_eq!(names.first(), Some(&"DepthOnlyPass"));
    assert_eq!(names.len(), 5);
}
