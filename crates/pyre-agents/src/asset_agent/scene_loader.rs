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

use crate::render_agent::RendererContext;
use crossbeam_channel::{Receiver, Sender};
use pyre_core::math::LinearRgba;
use pyre_core::renderer::RenderError;
use pyre_core::scene::{Entity, MeshData, Scene, Transform};
use pyre_lanes::MaterialTextures;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// One entity to upload.
#[derive(Debug)]
pub struct EntityDescription {
    /// Debug name.
    pub name: String,
    /// CPU-side geometry.
    pub mesh: MeshData,
    /// Placement in the world.
    pub transform: Transform,
    /// Material names indexed by sub-mesh material index.
    pub materials: Vec<String>,
    /// Multiplied with the diffuse texture.
    pub base_color: LinearRgba,
}

/// Everything a scene needs before it can be drawn.
#[derive(Debug, Default)]
pub struct SceneDescription {
    /// Named materials, loaded before any entity.
    pub materials: Vec<(String, MaterialTextures)>,
    /// Entities, uploaded in order.
    pub entities: Vec<EntityDescription>,
}

/// Produces a [`SceneDescription`] on the loading thread.
///
/// File parsing belongs here; the loader only uploads what it is handed.
pub trait SceneSource: Send + 'static {
    /// Builds the scene. Called once.
    fn load(&mut self) -> anyhow::Result<SceneDescription>;
}

impl SceneSource for SceneDescription {
    fn load(&mut self) -> anyhow::Result<SceneDescription> {
        Ok(std::mem::take(self))
    }
}

impl<F> SceneSource for F
where
    F: FnMut() -> anyhow::Result<SceneDescription> + Send + 'static,
{
    fn load(&mut self) -> anyhow::Result<SceneDescription> {
        self()
    }
}

/// Progress reported by a [`SceneLoader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    /// An entity is resident.
    Progress {
        /// Entities uploaded so far.
        loaded: usize,
        /// Entities in the scene.
        total: usize,
        /// Name of the entity just uploaded.
        name: String,
    },
    /// Every upload retired and the scene is ready.
    Finished {
        /// Number of entities pushed to the scene.
        entities: usize,
    },
    /// Loading stopped. The scene stays not ready.
    Failed(String),
}

/// Uploads a scene on a background thread.
///
/// Uploads block on their own copy fence, so an entity is pushed to the scene only
/// once its geometry is resident. The ready flag is raised after the last one.
/// The render thread is never synchronized with the loader beyond that flag.
#[derive(Debug)]
pub struct SceneLoader {
    events: Receiver<LoadEvent>,
    ready: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<usize, RenderError>>>,
}

impl SceneLoader {
    /// Starts loading `source` into `scene`.
    pub fn spawn(
        context: Arc<RendererContext>,
        scene: Arc<Scene>,
        source: impl SceneSource,
    ) -> Result<Self, RenderError> {
        Self::spawn_inner(context, scene, Box::new(source), false)
    }

    /// Like [`spawn`](Self::spawn), also building and uploading meshlets for every
    /// mesh so a [`MeshShaderRenderer`](crate::MeshShaderRenderer) can draw them.
    pub fn with_meshlets(
        context: Arc<RendererContext>,
        scene: Arc<Scene>,
        source: impl SceneSource,
    ) -> Result<Self, RenderError> {
        Self::spawn_inner(context, scene, Box::new(source), true)
    }

    fn spawn_inner(
        context: Arc<RendererContext>,
        scene: Arc<Scene>,
        mut source: Box<dyn SceneSource>,
        meshlets: bool,
    ) -> Result<Self, RenderError> {
        let (sender, events) = crossbeam_channel::unbounded();
        let ready = scene.ready_flag();
        scene.set_ready(false);

        let handle = thread::Builder::new()
            .name("pyre-scene-loader".to_string())
            .spawn(move || {
                let result = source
                    .load()
                    .map_err(|e| RenderError::Internal(format!("scene source failed: {e:#}")))
                    .and_then(|description| upload_scene(&context, &scene, description, meshlets, &sender));
                match &result {
                    Ok(entities) => {
                        scene.set_ready(true);
                        log::info!("Scene loaded: {entities} entities");
                        let _ = sender.send(LoadEvent::Finished { entities: *entities });
                    }
                    Err(e) => {
                        log::error!("Scene loading failed: {e}");
                        let _ = sender.send(LoadEvent::Failed(e.to_string()));
                    }
                }
                result
            })
            .map_err(|e| RenderError::Internal(format!("failed to spawn the scene loader: {e}")))?;

        Ok(Self {
            events,
            ready,
            handle: Some(handle),
        })
    }

    /// The progress channel. Events stay queued until received.
    pub fn events(&self) -> &Receiver<LoadEvent> {
        &self.events
    }

    /// Whether the scene is ready to draw.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Blocks until the loader thread ends and returns the number of entities.
    ///
    /// Calling it twice is an error.
    pub fn wait(&mut self) -> Result<usize, RenderError> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| RenderError::Internal("scene loader already joined".to_string()))?;
        handle
            .join()
            .map_err(|_| RenderError::Internal("scene loader panicked".to_string()))?
    }
}

fn upload_scene(
    context: &RendererContext,
    scene: &Scene,
    description: SceneDescription,
    meshlets: bool,
    events: &Sender<LoadEvent>,
) -> Result<usize, RenderError> {
    for (name, textures) in description.materials {
        if !context.load_material(&name, textures)? {
            log::warn!("Material '{name}' loaded with default textures in place of unreadable ones");
        }
    }

    let total = description.entities.len();
    for (index, entity) in description.entities.into_iter().enumerate() {
        let mesh = context.upload_mesh(&entity.mesh)?;
        if meshlets {
            context.upload_meshlets(&entity.mesh, &mesh)?;
        }
        scene.push(Entity {
            name: entity.name.clone(),
            mesh,
            transform: entity.transform,
            materials: entity.materials,
            base_color: entity.base_color,
        });
        log::trace!("Uploaded '{}' ({}/{total})", entity.name, index + 1);
        let _ = events.send(LoadEvent::Progress {
            loaded: index + 1,
            total,
            name: entity.name,
        });
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_is_taken_once() {
        let mut description = SceneDescription {
            materials: Vec::new(),
            entities: vec![EntityDescription {
                name: "cube".to_string(),
                mesh: MeshData::cube(),
                transform: Transform::default(),
                materials: Vec::new(),
                base_color: LinearRgba::WHITE,
            }],
        };
        assert_eq!(description.load().unwrap().entities.len(), 1);
        assert!(description.load().unwrap().entities.is_empty());
    }

    #[test]
    fn closures_are_sources() {
        let mut source = || -> anyhow::Result<SceneDescription> { anyhow::bail!("missing file") };
        let err = SceneSource::load(&mut source).unwrap_err();
        assert_eq!(err.to_string(), "missing file");
    }
}
