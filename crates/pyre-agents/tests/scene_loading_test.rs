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

//! Background scene loading.

use pyre_agents::{ClusterForwardRenderer, EntityDescription, FrameView, LoadEvent, RendererContext, SceneDescription, SceneLoader};
use pyre_core::config::RendererConfig;
use pyre_core::math::{LinearRgba, Vec3};
use pyre_core::scene::{MeshData, Scene, SceneView, TextureData, Transform};
use pyre_core::renderer::api::TextureFormat;
use pyre_core::testing::{MockDevice, MockSwapChain};
use pyre_lanes::MaterialTextures;
use std::path::PathBuf;
use std::sync::Arc;

fn setup() -> anyhow::Result<(Arc<MockDevice>, Arc<RendererContext>)> {
    let config = RendererConfig {
        vertex_capacity: 4096,
        index_capacity: 8192,
        shadow_map_size: (64, 64),
        max_lights: 8,
        ..Default::default()
    };
    let device = Arc::new(MockDevice::new());
    let swap_chain = MockSwapChain::new(&device, 2, 128, 72, config.back_buffer_format)?;
    let context = RendererContext::new(device.clone(), Box::new(swap_chain), config)?;
    Ok((device, context))
}

fn description() -> SceneDescription {
    let entity = |name: &str, mesh: MeshData, x: f32| EntityDescription {
        name: name.to_string(),
        mesh,
        transform: Transform::from_translation(Vec3::new(x, 0.0, 0.0)),
        materials: vec!["stone".to_string()],
        base_color: LinearRgba::WHITE,
    };
    SceneDescription {
        materials: vec![("stone".to_string(), TextureData::solid(2, 2, [128, 128, 128, 255]).into())],
        entities: vec![entity("floor", MeshData::plane(10.0), 0.0), entity("crate", MeshData::cube(), 2.0)],
    }
}

#[test]
fn loader_reports_progress_then_readiness() -> anyhow::Result<()> {
    let (_device, context) = setup()?;
    let scene = Arc::new(Scene::new());
    let mut loader = SceneLoader::spawn(Arc::clone(&context), Arc::clone(&scene), description())?;

    assert_eq!(loader.wait()?, 2);
    assert!(loader.is_ready());
    assert!(scene.is_ready());
    assert_eq!(scene.len(), 2);
    assert!(context.materials().contains("stone"));

    let events: Vec<_> = loader.events().try_iter().collect();
    assert_eq!(
        events,
        vec![
            LoadEvent::Progress {
                loaded: 1,
                total: 2,
                name: "floor".to_string()
            },
            LoadEvent::Progress {
                loaded: 2,
                total: 2,
                name: "crate".to_string()
            },
            LoadEvent::Finished { entities: 2 },
        ]
    );

    let mut bases = Vec::new();
    scene.for_each_drawable(&mut |drawable| bases.push(drawable.mesh.base_vertex));
    assert_eq!(bases, vec![0, 4]);
    Ok(())
}

#[test]
fn unreadable_material_texture_does_not_stop_loading() -> anyhow::Result<()> {
    let (_device, context) = setup()?;
    let scene = Arc::new(Scene::new());
    let mut description = description();
    description.materials[0].1 = MaterialTextures {
        diffuse: TextureData::solid(2, 2, [128, 128, 128, 255]),
        roughness: None,
        normal: Some(TextureData::Native {
            path: PathBuf::from("/nonexistent/stone_normal.dds"),
            format: TextureFormat::Bc5RgUnorm,
            width: 4,
            height: 4,
        }),
    };
    let mut loader = SceneLoader::spawn(Arc::clone(&context), Arc::clone(&scene), description)?;

    assert_eq!(loader.wait()?, 2);
    assert!(scene.is_ready());
    let materials = context.materials();
    let stone = materials.resolve(Some("stone"));
    assert!(!stone.fallback);
    assert_eq!(stone.textures[2], materials.default_binding().textures[2]);
    Ok(())
}

#[test]
fn failing_source_leaves_the_scene_unready() -> anyhow::Result<()> {
    let (_device, context) = setup()?;
    let scene = Arc::new(Scene::new());
    let source = || -> anyhow::Result<SceneDescription> { anyhow::bail!("scene.obj not found") };
    let mut loader = SceneLoader::spawn(context, Arc::clone(&scene), source)?;

    assert!(loader.wait().is_err());
    assert!(!loader.is_ready());
    assert!(scene.is_empty());
    let event = loader.events().recv()?;
    assert!(matches!(event, LoadEvent::Failed(message) if message.contains("scene.obj not found")));
    assert!(loader.wait().is_err());
    Ok(())
}

#[test]
fn oversized_scene_fails_after_partial_upload() -> anyhow::Result<()> {
    let (_device, context) = setup()?;
    let scene = Arc::new(Scene::new());
    let mut description = description();
    description.entities.push(EntityDescription {
        name: "too-big".to_string(),
        mesh: MeshData::new("too-big", vec![Default::default(); 5000], vec![0, 1, 2], &[1])?,
        transform: Transform::default(),
        materials: Vec::new(),
        base_color: LinearRgba::WHITE,
    });
    let mut loader = SceneLoader::spawn(context, Arc::clone(&scene), description)?;

    assert!(loader.wait().is_err());
    assert!(!scene.is_ready());
    assert_eq!(scene.len(), 2);
    Ok(())
}

#[test]
fn loaded_scene_renders_with_meshlets() -> anyhow::Result<()> {
    let (_device, context) = setup()?;
    let scene = Arc::new(Scene::new());
    let mut loader = SceneLoader::with_meshlets(Arc::clone(&context), Arc::clone(&scene), description())?;
    loader.wait()?;
    assert_eq!(context.meshlets().len(), 2);

    let mut renderer = ClusterForwardRenderer::new(context)?;
    let stats = renderer.render_frame(scene.as_ref(), &FrameView::default(), None)?;
    assert!(stats.draw_calls >= 6);
    Ok(())
}

#[test]
fn renderer_config_file_sizes_the_mega_buffers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("renderer.ron");
    std::fs::write(
        &path,
        "(vertex_capacity: 20, index_capacity: 64, shadow_map_size: (32, 32), max_lights: 4, msaa_samples: 1)",
    )?;
    let config = RendererConfig::load(&path)?;

    let device = Arc::new(MockDevice::new());
    let swap_chain = MockSwapChain::new(&device, 3, 64, 64, config.back_buffer_format)?;
    let context = RendererContext::new(device, Box::new(swap_chain), config)?;
    let scene = Arc::new(Scene::new());
    let mut loader = SceneLoader::spawn(Arc::clone(&context), Arc::clone(&scene), description())?;

    // The plane fits, the cube's 24 vertices do not.
    assert!(loader.wait().is_err());
    assert_eq!(context.geometry().vertices().capacity(), 20);
    assert_eq!(scene.len(), 1);
    Ok(())
}
