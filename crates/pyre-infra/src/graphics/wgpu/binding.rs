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

//! Mapping of root signatures onto `wgpu` bind group and pipeline layouts.
//!
//! Every non-constant root parameter becomes one bind group (slot order, constants
//! skipped), all `Constants` parameters share a single push-constant range, and
//! static samplers live in one trailing bind group that is created up front.

use super::conversions::{sampler_descriptor, IntoWgpu};
use pyre_core::renderer::api::{
    BufferId, GpuDescriptorHandle, RootParameter, RootSignatureDescriptor, ShaderVisibility,
};
use pyre_core::renderer::{PipelineError, ResourceError};
use std::borrow::Cow;
use std::sync::Arc;

/// Identifies what a root parameter was bound to, for bind group caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BindingKey {
    /// A buffer bound directly by address.
    Buffer { buffer: BufferId, offset: u64 },
    /// A descriptor table starting at the given handle.
    Table(GpuDescriptorHandle),
}

/// The `wgpu` objects backing one root signature.
#[derive(Debug)]
pub(crate) struct RootSignatureEntry {
    pub descriptor: RootSignatureDescriptor<'static>,
    /// Layout of each parameter's bind group, indexed by slot; `None` for constants.
    pub group_layouts: Vec<Option<Arc<wgpu::BindGroupLayout>>>,
    pub layout: Arc<wgpu::PipelineLayout>,
    /// The static sampler group and its index.
    pub sampler_group: Option<(u32, Arc<wgpu::BindGroup>)>,
    pub push_constant_stages: wgpu::ShaderStages,
}

fn owned_descriptor(descriptor: &RootSignatureDescriptor) -> RootSignatureDescriptor<'static> {
    RootSignatureDescriptor {
        label: descriptor
            .label
            .as_ref()
            .map(|label| Cow::Owned(label.to_string())),
        parameters: descriptor.parameters.clone(),
        static_samplers: descriptor.static_samplers.clone(),
    }
}

/// Bind group layout entries of one root parameter.
pub(crate) fn parameter_layout_entries(parameter: &RootParameter) -> Vec<wgpu::BindGroupLayoutEntry> {
    let visibility = parameter.visibility().into_wgpu();
    let entry = |binding: u32, ty: wgpu::BindingType| wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty,
        count: None,
    };
    match parameter {
        RootParameter::ConstantBuffer { .. } => vec![entry(
            0,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        )],
        RootParameter::ShaderResource { .. } => vec![entry(
            0,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        )],
        RootParameter::DescriptorTable { ranges, .. } => ranges
            .iter()
            .flat_map(|range| std::iter::repeat_n(range.shape, range.count as usize))
            .enumerate()
            .map(|(binding, shape)| entry(binding as u32, shape.into_wgpu()))
            .collect(),
        RootParameter::Constants { .. } => Vec::new(),
    }
}

/// Creates the layouts, push-constant range and sampler group of a root signature.
pub(crate) fn build_root_signature(
    device: &wgpu::Device,
    limits: &wgpu::Limits,
    descriptor: &RootSignatureDescriptor,
) -> Result<RootSignatureEntry, ResourceError> {
    let label = descriptor.label.as_deref().unwrap_or("Pyre Root Signature");

    let group_count =
        descriptor.parameter_group_count() + u32::from(descriptor.sampler_group_index().is_some());
    if group_count > limits.max_bind_groups {
        return Err(PipelineError::LayoutCreationFailed(format!(
            "'{label}' needs {group_count} bind groups but the device allows {}",
            limits.max_bind_groups
        ))
        .into());
    }

    let push_constant_size = descriptor.push_constant_size();
    if push_constant_size > limits.max_push_constant_size {
        return Err(PipelineError::LayoutCreationFailed(format!(
            "'{label}' needs {push_constant_size} bytes of root constants but the device allows {}",
            limits.max_push_constant_size
        ))
        .into());
    }

    let group_layouts: Vec<Option<Arc<wgpu::BindGroupLayout>>> = descriptor
        .parameters
        .iter()
        .enumerate()
        .map(|(slot, parameter)| {
            if matches!(parameter, RootParameter::Constants { .. }) {
                return None;
            }
            let entries = parameter_layout_entries(parameter);
            Some(Arc::new(device.create_bind_group_layout(
                &wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{label} slot {slot}")),
                    entries: &entries,
                },
            )))
        })
        .collect();

    let sampler_group = match descriptor.sampler_group_index() {
        Some(index) => {
            let visibility = descriptor
                .visibility()
                .difference(ShaderVisibility::TASK | ShaderVisibility::MESH)
                .into_wgpu();
            let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = descriptor
                .static_samplers
                .iter()
                .enumerate()
                .map(|(binding, sampler)| wgpu::BindGroupLayoutEntry {
                    binding: binding as u32,
                    visibility,
                    ty: sampler.into_wgpu(),
                    count: None,
                })
                .collect();
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{label} samplers")),
                entries: &layout_entries,
            });
            let samplers: Vec<wgpu::Sampler> = descriptor
                .static_samplers
                .iter()
                .map(|sampler| device.create_sampler(&sampler_descriptor(sampler)))
                .collect();
            let entries: Vec<wgpu::BindGroupEntry> = samplers
                .iter()
                .enumerate()
                .map(|(binding, sampler)| wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource: wgpu::BindingResource::Sampler(sampler),
                })
                .collect();
            let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{label} samplers")),
                layout: &layout,
                entries: &entries,
            });
            Some((index, Arc::new(layout), Arc::new(group)))
        }
        None => None,
    };

    let mut ordered_layouts: Vec<&wgpu::BindGroupLayout> =
        group_layouts.iter().flatten().map(|layout| layout.as_ref()).collect();
    if let Some((_, layout, _)) = &sampler_group {
        ordered_layouts.push(layout.as_ref());
    }

    let push_constant_stages = descriptor.push_constant_visibility().into_wgpu();
    let push_constant_ranges: Vec<wgpu::PushConstantRange> =
        if push_constant_size > 0 && !push_constant_stages.is_empty() {
            vec![wgpu::PushConstantRange {
                stages: push_constant_stages,
                range: 0..push_constant_size,
            }]
        } else {
            Vec::new()
        };

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &ordered_layouts,
        push_constant_ranges: &push_constant_ranges,
    });

    Ok(RootSignatureEntry {
        descriptor: owned_descriptor(descriptor),
        group_layouts,
        layout: Arc::new(layout),
        sampler_group: sampler_group.map(|(index, _, group)| (index, group)),
        push_constant_stages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyre_core::renderer::api::{BindingShape, DescriptorRange, TextureFormat};

    #[test]
    fn tables_flatten_ranges_into_consecutive_bindings() {
        let parameter = RootParameter::DescriptorTable {
            visibility: ShaderVisibility::COMPUTE,
            ranges: vec![
                DescriptorRange::new(BindingShape::Texture { cube: false }, 2),
                DescriptorRange::new(
                    BindingShape::StorageTexture {
                        format: TextureFormat::Rgba16Float,
                    },
                    1,
                ),
            ],
        };
        let entries = parameter_layout_entries(&parameter);
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries.iter().map(|e| e.binding).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(matches!(
            entries[2].ty,
            wgpu::BindingType::StorageTexture { .. }
        ));
        assert_eq!(entries[0].visibility, wgpu::ShaderStages::COMPUTE);
    }

    #[test]
    fn root_buffers_use_a_single_binding() {
        let cbv = parameter_layout_entries(&RootParameter::ConstantBuffer {
            visibility: ShaderVisibility::ALL_GRAPHICS,
        });
        assert_eq!(cbv.len(), 1);
        assert!(matches!(
            cbv[0].ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                ..
            }
        ));
        let constants = parameter_layout_entries(&RootParameter::Constants {
            visibility: ShaderVisibility::VERTEX,
            num_values: 4,
        });
        assert!(constants.is_empty());
    }
}
