//! Two-pass intersection mask compute pipeline.
//!
//! Owns every GPU resource of the mask effect: the compute pipeline, both
//! samplers, the per-pass parameter buffers, the ping-pong intermediate
//! image and a bind-group cache. One instance serves one reflecting
//! surface; all methods must run on the thread that owns command
//! submission.

use std::collections::HashMap;

use glam::{Mat4, UVec2};
use pollster::FutureExt as _;

use reflector_core::{Cache, Transform3};

use crate::error::{RenderError, RenderResult};
use crate::mask_params::{MaskParamsPacker, MaskSettings, ParamBlock, PARAM_FLOATS};

const WORKGROUP_SIZE: u32 = 8;

/// Cache key for one pass's bind group. Rebuilding bind groups every frame
/// is measurable overhead; keying on the views plus the intermediate-image
/// generation reuses them until a texture actually changes.
#[derive(Clone, PartialEq, Eq, Hash)]
struct BindGroupKey {
    color: wgpu::TextureView,
    depth: wgpu::TextureView,
    pass: u32,
    intermediate_generation: u64,
}

struct Intermediate {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    generation: u64,
}

struct GpuResources {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    color_format: wgpu::TextureFormat,
    // One parameter buffer per pass; both passes of a frame are encoded
    // before submission, so they cannot share one buffer
    param_buffers: [wgpu::Buffer; 2],
    nearest_sampler: wgpu::Sampler,
    linear_sampler: wgpu::Sampler,
    intermediate: Option<Intermediate>,
    bind_groups: HashMap<BindGroupKey, wgpu::BindGroup>,
}

/// Masks mirrored-view pixels that poke through the reflection plane.
pub struct IntersectionMaskPipeline {
    /// Host-tweakable effect parameters.
    pub settings: MaskSettings,
    resources: Option<GpuResources>,
    packer: MaskParamsPacker,
    upload_cache: Cache<ParamBlock, ()>,
    next_generation: u64,
}

impl IntersectionMaskPipeline {
    /// Builds the pipeline for render targets of `color_format`.
    ///
    /// The format must be usable as a write-only storage texture; the
    /// shader is specialized to it at compile time.
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
    ) -> RenderResult<Self> {
        let format_name = storage_format_name(color_format)
            .ok_or(RenderError::UnsupportedColorFormat(color_format))?;

        // Shader translation failures on wgpu surface asynchronously; trap
        // them in a validation scope so a broken pipeline becomes an error
        // here instead of invalidating every later submit
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let source = include_str!("shaders/intersect_mask.wgsl")
            .replace("{{STORAGE_FORMAT}}", format_name);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Intersect Mask Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Intersect Mask Bind Group Layout"),
                entries: &[
                    // Parameter block
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    // Write target: intermediate in pass 1, color in pass 2
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::StorageTexture {
                            access: wgpu::StorageTextureAccess::WriteOnly,
                            format: color_format,
                            view_dimension: wgpu::TextureViewDimension::D2,
                        },
                        count: None,
                    },
                    // Depth
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Depth,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // Source color (bound to the pass's read view)
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // Intermediate, sampled (also bound to the read view)
                    wgpu::BindGroupLayoutEntry {
                        binding: 4,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // Linear sampler for color/fill lookups
                    wgpu::BindGroupLayoutEntry {
                        binding: 5,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    // Nearest sampler for depth lookups
                    wgpu::BindGroupLayoutEntry {
                        binding: 6,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Sampler(
                            wgpu::SamplerBindingType::NonFiltering,
                        ),
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Intersect Mask Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Intersect Mask Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        if let Some(error) = device.pop_error_scope().block_on() {
            return Err(RenderError::ShaderCompilationFailed(error.to_string()));
        }

        let param_buffers = std::array::from_fn(|pass| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(if pass == 0 {
                    "Intersect Mask Params (horizontal)"
                } else {
                    "Intersect Mask Params (vertical)"
                }),
                size: (PARAM_FLOATS * std::mem::size_of::<f32>()) as u64,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        let nearest_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Intersect Mask Nearest Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Intersect Mask Linear Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            settings: MaskSettings::default(),
            resources: Some(GpuResources {
                pipeline,
                bind_group_layout,
                color_format,
                param_buffers,
                nearest_sampler,
                linear_sampler,
                intermediate: None,
                bind_groups: HashMap::new(),
            }),
            packer: MaskParamsPacker::new(),
            upload_cache: Cache::new(),
            next_generation: 0,
        })
    }

    /// A pipeline whose `dispatch` is a no-op. The fallback when setup
    /// fails; hosts keep running without the effect.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            settings: MaskSettings::default(),
            resources: None,
            packer: MaskParamsPacker::new(),
            upload_cache: Cache::new(),
            next_generation: 0,
        }
    }

    /// Whether GPU resources exist and dispatches will do work.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.resources.is_some()
    }

    /// Runs both mask passes against `color_view`/`depth_view`.
    ///
    /// Silently no-ops when the effect is disabled, resources are missing
    /// or the size is degenerate; those are all recoverable per-frame
    /// conditions, not errors.
    #[allow(clippy::too_many_arguments)]
    pub fn dispatch(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        size: UVec2,
        camera_inverse_projection: Mat4,
        camera_transform: &Transform3,
    ) {
        if !self.settings.effect_enabled {
            return;
        }
        if self.resources.is_none() || size.x == 0 || size.y == 0 {
            return;
        }

        self.ensure_intermediate(device, size);

        let block = self.packer.pack(
            &self.settings,
            size,
            camera_inverse_projection,
            camera_transform,
        );

        let x_groups = size.x.div_ceil(WORKGROUP_SIZE);
        let y_groups = size.y.div_ceil(WORKGROUP_SIZE);

        let Some(resources) = self.resources.as_mut() else {
            return;
        };
        // No uploads before the intermediate exists; bind groups cannot be
        // built without it
        let Some(generation) = resources.intermediate.as_ref().map(|i| i.generation) else {
            return;
        };

        // Pass 1 (horizontal): upload only when the block moved
        if self.upload_cache.update(block) {
            queue.write_buffer(&resources.param_buffers[0], 0, block.as_bytes());
        }
        // Pass 2 (vertical): the direction flip changes the block every
        // pass, so it always uploads
        let vertical = block.with_pass_direction(true);
        queue.write_buffer(&resources.param_buffers[1], 0, vertical.as_bytes());

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Intersect Mask Encoder"),
        });
        for pass in 0..2u32 {
            let Some(bind_group) = Self::bind_group_for(
                resources,
                device,
                color_view,
                depth_view,
                pass,
                generation,
            ) else {
                return;
            };
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(if pass == 0 {
                    "Intersect Mask Horizontal"
                } else {
                    "Intersect Mask Vertical"
                }),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&resources.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(x_groups, y_groups, 1);
        }
        queue.submit(std::iter::once(encoder.finish()));
    }

    /// Lazily (re)allocates the intermediate image to match `size`.
    ///
    /// The check queries the existing texture's own dimensions rather than
    /// a separately tracked size, so it cannot drift out of sync. A
    /// reallocation bumps the generation and drops bind groups that
    /// referenced the old image.
    pub fn ensure_intermediate(&mut self, device: &wgpu::Device, size: UVec2) {
        let Some(resources) = self.resources.as_mut() else {
            return;
        };
        if let Some(existing) = &resources.intermediate {
            if existing.texture.width() == size.x && existing.texture.height() == size.y {
                return;
            }
        }

        self.next_generation += 1;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Intersect Mask Intermediate"),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: resources.color_format,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        resources.intermediate = Some(Intermediate {
            texture,
            view,
            generation: self.next_generation,
        });
        let generation = self.next_generation;
        resources
            .bind_groups
            .retain(|key, _| key.intermediate_generation == generation);
        log::debug!("intersect mask intermediate resized to {}x{}", size.x, size.y);
    }

    fn bind_group_for(
        resources: &mut GpuResources,
        device: &wgpu::Device,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        pass: u32,
        generation: u64,
    ) -> Option<wgpu::BindGroup> {
        let key = BindGroupKey {
            color: color_view.clone(),
            depth: depth_view.clone(),
            pass,
            intermediate_generation: generation,
        };
        if let Some(existing) = resources.bind_groups.get(&key) {
            return Some(existing.clone());
        }

        let intermediate_view = &resources.intermediate.as_ref()?.view;
        // The write target must never also be bound as a sampled texture:
        // storage writes are exclusive within a dispatch's usage scope, so
        // both sampled slots get the pass's read view
        let (write_view, read_view) = pass_texture_views(pass, color_view, intermediate_view);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Intersect Mask Bind Group"),
            layout: &resources.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: resources.param_buffers[pass as usize].as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(write_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(depth_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(read_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(read_view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&resources.linear_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(&resources.nearest_sampler),
                },
            ],
        });
        resources
            .bind_groups
            .insert(key, bind_group.clone());
        Some(bind_group)
    }

    /// Releases all GPU resources. Idempotent; after shutdown every
    /// `dispatch` is a no-op.
    pub fn shutdown(&mut self) {
        let Some(mut resources) = self.resources.take() else {
            return;
        };
        // Dependency order: bind groups first, then the resources they
        // referenced, the pipeline last
        resources.bind_groups.clear();
        resources.intermediate = None;
        drop(resources);
        self.upload_cache.invalidate();
        self.packer.invalidate();
        log::debug!("intersect mask pipeline shut down");
    }
}

/// Write/read texture pairing for one pass: the horizontal pass writes the
/// intermediate and reads the color, the vertical pass the other way
/// around. The two views are always distinct, keeping the write-only
/// storage binding exclusive.
fn pass_texture_views<'a, T>(pass: u32, color: &'a T, intermediate: &'a T) -> (&'a T, &'a T) {
    if pass == 0 {
        (intermediate, color)
    } else {
        (color, intermediate)
    }
}

/// WGSL storage-texture name for the formats the mask pass supports.
fn storage_format_name(format: wgpu::TextureFormat) -> Option<&'static str> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Some("rgba8unorm"),
        wgpu::TextureFormat::Rgba8Snorm => Some("rgba8snorm"),
        wgpu::TextureFormat::Rgba16Float => Some("rgba16float"),
        wgpu::TextureFormat::Rgba32Float => Some("rgba32float"),
        _ => None,
    }
}
