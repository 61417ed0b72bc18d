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

//! The resources shared by every renderer and the loading thread.

use super::mega_buffer::MegaBuffers;
use super::targets::{self, RenderTargets};
use super::uploader::SyncUploader;
use pyre_core::config::RendererConfig;
use pyre_core::renderer::api::TextureFormat;
use pyre_core::renderer::meshlet::build_meshlets;
use pyre_core::renderer::{
    ClusterGrid, CommandQueueManager, DescriptorHeaps, GraphicsDevice, LightSet, RenderError,
    SwapChain,
};
use pyre_core::scene::{GpuMesh, MeshData};
use pyre_lanes::{GeometryViews, LightBuffers, MaterialTable, MaterialTextures, MeshletBuffers};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Device-level and scene-level GPU state, shared between the render thread and
/// the scene loader.
///
/// Every mutable part sits behind its own mutex. When more than one is held, they
/// are taken in this order: geometry, meshlets, materials, heaps, lights, targets,
/// swap chain.
#[derive(Debug)]
pub struct RendererContext {
    device: Arc<dyn GraphicsDevice>,
    queues: Arc<CommandQueueManager>,
    uploader: SyncUploader,
    config: RendererConfig,
    geometry: Mutex<MegaBuffers>,
    // Keyed by the owning mesh's base vertex.
    meshlets: Mutex<HashMap<u32, MeshletBuffers>>,
    materials: Mutex<MaterialTable>,
    heaps: Mutex<DescriptorHeaps>,
    lights: Mutex<LightBuffers>,
    targets: Mutex<RenderTargets>,
    swap_chain: Mutex<Box<dyn SwapChain>>,
}

impl RendererContext {
    /// Validates `config`, then creates the queues, descriptor heaps, mega-buffers,
    /// default materials, light buffers and window-sized targets.
    ///
    /// # Errors
    ///
    /// [`RenderError::InitializationFailed`] for an invalid configuration; any
    /// allocation failure is returned as is.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        swap_chain: Box<dyn SwapChain>,
        config: RendererConfig,
    ) -> Result<Arc<Self>, RenderError> {
        config
            .validate()
            .map_err(|err| RenderError::InitializationFailed(err.to_string()))?;

        let queues = Arc::new(CommandQueueManager::new(Arc::clone(&device))?);
        let uploader = SyncUploader::new(Arc::clone(&device), Arc::clone(&queues));
        let mut heaps = DescriptorHeaps::new(device.as_ref(), &config.descriptor_heaps)?;
        let geometry = MegaBuffers::new(
            device.as_ref(),
            &mut heaps,
            config.vertex_capacity,
            config.index_capacity,
        )?;
        let materials = MaterialTable::new(device.as_ref(), &mut heaps, &uploader)?;
        let lights = LightBuffers::new(
            device.as_ref(),
            &mut heaps,
            config.max_lights,
            ClusterGrid::new(config.cluster_grid),
        )?;
        let targets = RenderTargets::new(device.as_ref(), &mut heaps, &config, swap_chain.as_ref())?;
        log::info!(
            "Renderer context ready: {} frames in flight, {} max lights",
            config.buffer_count,
            config.max_lights
        );

        Ok(Arc::new(Self {
            device,
            queues,
            uploader,
            config,
            geometry: Mutex::new(geometry),
            meshlets: Mutex::new(HashMap::new()),
            materials: Mutex::new(materials),
            heaps: Mutex::new(heaps),
            lights: Mutex::new(lights),
            targets: Mutex::new(targets),
            swap_chain: Mutex::new(swap_chain),
        }))
    }

    /// Appends `mesh` to the mega-buffers. Blocks until the copy retired, so the
    /// returned location can be drawn immediately.
    pub fn upload_mesh(&self, mesh: &MeshData) -> Result<GpuMesh, RenderError> {
        lock(&self.geometry).upload_mesh(&self.uploader, mesh)
    }

    /// Uploads a mesh that stays resident across [`RendererContext::reset_scene`].
    ///
    /// Every mesh uploaded before it is pinned as well.
    pub fn upload_static_mesh(&self, mesh: &MeshData) -> Result<GpuMesh, RenderError> {
        let mut geometry = lock(&self.geometry);
        let location = geometry.upload_mesh(&self.uploader, mesh)?;
        geometry.pin();
        Ok(location)
    }

    /// Builds and uploads the meshlets of a mesh already resident at `location`.
    pub fn upload_meshlets(&self, mesh: &MeshData, location: &GpuMesh) -> Result<(), RenderError> {
        let data = build_meshlets(&mesh.indices);
        let buffers = {
            let mut heaps = lock(&self.heaps);
            MeshletBuffers::new(self.device.as_ref(), &mut heaps, &self.uploader, &mesh.name, &data)?
        };
        if let Some(previous) = lock(&self.meshlets).insert(location.base_vertex, buffers) {
            previous.destroy(self.device.as_ref())?;
        }
        Ok(())
    }

    /// Loads the textures of material `name`. Returns whether every texture loaded;
    /// unreadable ones are replaced by defaults.
    pub fn load_material(&self, name: &str, textures: impl Into<MaterialTextures>) -> Result<bool, RenderError> {
        let mut materials = lock(&self.materials);
        let mut heaps = lock(&self.heaps);
        materials.request_load(self.device.as_ref(), &mut heaps, &self.uploader, name, textures)
    }

    /// Replaces the point lights.
    pub fn upload_lights(&self, lights: &LightSet) -> Result<(), RenderError> {
        lock(&self.lights).upload(&self.uploader, lights)
    }

    /// Views over the resident geometry, `None` while nothing is loaded.
    pub fn geometry_views(&self) -> Option<GeometryViews> {
        lock(&self.geometry).views()
    }

    /// Acquires the back buffer the next frame renders into.
    pub fn acquire_next_back_buffer(&self) -> Result<u32, RenderError> {
        lock(&self.swap_chain).acquire_next()
    }

    /// Presents the current back buffer.
    pub fn present(&self) -> Result<(), RenderError> {
        lock(&self.swap_chain).present()
    }

    /// Resizes the swap chain and every window-sized target.
    ///
    /// Waits for the GPU to go idle first. A zero extent (a minimized window) is
    /// ignored. The shadow map keeps its size.
    pub fn resize(&self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {width}x{height}");
            return Ok(());
        }
        let mut targets = lock(&self.targets);
        if targets.size() == (width, height) {
            return Ok(());
        }
        self.queues.wait_for_idle()?;
        lock(&self.swap_chain).resize(width, height)?;
        targets.resize(self.device.as_ref(), width, height)?;
        log::info!("Resized render targets to {width}x{height}");
        Ok(())
    }

    /// Forgets the scene geometry so a new scene can be loaded.
    ///
    /// Waits for the GPU to go idle. Entities referring to the old geometry must be
    /// dropped by the caller. Static meshes and materials are kept.
    pub fn reset_scene(&self) -> Result<(), RenderError> {
        self.queues.wait_for_idle()?;
        let mut geometry = lock(&self.geometry);
        geometry.clear();
        for (_, buffers) in lock(&self.meshlets).drain() {
            buffers.destroy(self.device.as_ref())?;
        }
        log::info!("Cleared scene geometry");
        Ok(())
    }

    /// Blocks until every queue is idle.
    pub fn wait_for_idle(&self) -> Result<(), RenderError> {
        self.queues.wait_for_idle()
    }

    /// The device.
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// The direct, compute and copy queues.
    pub fn queues(&self) -> &Arc<CommandQueueManager> {
        &self.queues
    }

    /// The blocking copy-queue uploader.
    pub fn uploader(&self) -> &SyncUploader {
        &self.uploader
    }

    /// The validated configuration.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Format lit geometry is drawn in.
    pub fn scene_format(&self) -> TextureFormat {
        targets::scene_format(self.device.as_ref(), &self.config, self.back_buffer_format())
    }

    /// Format of the swap-chain buffers.
    pub fn back_buffer_format(&self) -> TextureFormat {
        lock(&self.swap_chain).format()
    }

    /// Exclusive access to the mega-buffers.
    pub fn geometry(&self) -> MutexGuard<'_, MegaBuffers> {
        lock(&self.geometry)
    }

    /// Exclusive access to the meshlet buffers.
    pub fn meshlets(&self) -> MutexGuard<'_, HashMap<u32, MeshletBuffers>> {
        lock(&self.meshlets)
    }

    /// Exclusive access to the material table.
    pub fn materials(&self) -> MutexGuard<'_, MaterialTable> {
        lock(&self.materials)
    }

    /// Exclusive access to the descriptor heaps.
    pub fn heaps(&self) -> MutexGuard<'_, DescriptorHeaps> {
        lock(&self.heaps)
    }

    /// Exclusive access to the light buffers.
    pub fn lights(&self) -> MutexGuard<'_, LightBuffers> {
        lock(&self.lights)
    }

    /// Exclusive access to the render targets.
    pub fn targets(&self) -> MutexGuard<'_, RenderTargets> {
        lock(&self.targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyre_core::testing::{MockDevice, MockSwapChain};

    fn small_config() -> RendererConfig {
        RendererConfig {
            vertex_capacity: 1024,
            index_capacity: 4096,
            shadow_map_size: (64, 64),
            max_lights: 8,
            ..Default::default()
        }
    }

    fn context(config: RendererConfig) -> Result<(Arc<MockDevice>, Arc<RendererContext>), RenderError> {
        let device = Arc::new(MockDevice::new());
        let swap_chain = MockSwapChain::new(&device, 3, 64, 32, config.back_buffer_format)?;
        let context = RendererContext::new(device.clone(), Box::new(swap_chain), config)?;
        Ok((device, context))
    }

    #[test]
    fn invalid_config_fails_initialization() {
        let config = RendererConfig {
            buffer_count: 7,
            ..small_config()
        };
        assert!(matches!(context(config), Err(RenderError::InitializationFailed(_))));
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let (device, context) = context(small_config()).unwrap();
        let waits = device.blocking_wait_count();
        context.resize(0, 720).unwrap();
        assert_eq!(context.targets().size(), (64, 32));
        assert_eq!(device.blocking_wait_count(), waits);
    }

    #[test]
    fn resize_waits_for_idle_and_resizes_targets() {
        let (device, context) = context(small_config()).unwrap();
        device.set_auto_complete(false);
        let waits = device.blocking_wait_count();
        context.resize(200, 100).unwrap();
        assert_eq!(context.targets().size(), (200, 100));
        assert_eq!(context.targets().shadow().width(), 64);
        assert!(device.blocking_wait_count() > waits);
    }

    #[test]
    fn reset_scene_rewinds_geometry() {
        let (_device, context) = context(small_config()).unwrap();
        let cube = MeshData::cube();
        let mesh = context.upload_mesh(&cube).unwrap();
        context.upload_meshlets(&cube, &mesh).unwrap();
        assert!(context.geometry_views().is_some());

        context.reset_scene().unwrap();
        assert!(context.geometry_views().is_none());
        assert!(context.meshlets().is_empty());
        assert_eq!(context.upload_mesh(&cube).unwrap().base_vertex, 0);
    }
}
