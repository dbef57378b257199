use std::sync::mpsc;

use wgpu::util::DeviceExt;

use crate::paint::Color;
use crate::render::capture::{BYTES_PER_PIXEL, CaptureError, PixelReadback, RowOrigin};
use crate::render::programs::{ShaderError, validate_program};

use super::{
    DrawCall, DrawUniforms, GraphicsBackend, MeshDesc, MeshHandle, ProgramDesc, ProgramHandle,
    StageKind, TextureHandle, TextureOptions, VertexLayout,
};

// ── resources ─────────────────────────────────────────────────────────────

struct Program {
    label: String,
    layout: VertexLayout,
    pipeline: wgpu::RenderPipeline,
}

struct Mesh {
    vbo: wgpu::Buffer,
    ibo: wgpu::Buffer,
}

struct Texture {
    bind_group: wgpu::BindGroup,
}

/// Color attachment of the frame currently being drawn.
struct FrameTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

// ── blend ─────────────────────────────────────────────────────────────────

fn straight_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::Zero,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn vertex_attributes(layout: VertexLayout) -> &'static [wgpu::VertexAttribute] {
    const POSITION: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
    const POSITION_UV: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    match layout {
        VertexLayout::Position => &POSITION,
        VertexLayout::PositionUv => &POSITION_UV,
    }
}

fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// wgpu implementation of [`GraphicsBackend`].
///
/// Draw calls are queued while a frame is open and encoded into a single render
/// pass on [`flush`](Self::flush). Each queued call gets its own slot in a
/// dynamic-offset uniform buffer, so calls never observe each other's uniforms.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target_format: wgpu::TextureFormat,

    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,

    uniform_stride: u64,
    uniform_capacity: usize,
    uniform_ubo: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_staging: Vec<u8>,

    programs: Vec<Program>,
    meshes: Vec<Mesh>,
    textures: Vec<Texture>,

    viewport: (u32, u32),
    target: Option<FrameTarget>,
    pending: Vec<DrawCall>,
    pending_clear: Option<Color>,

    warned_untextured: bool,
}

impl WgpuBackend {
    const INITIAL_UNIFORM_SLOTS: usize = 64;

    /// Creates a backend drawing into targets of `target_format`.
    ///
    /// Device and queue are cheap reference-counted clones.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target_format: wgpu::TextureFormat,
        viewport: (u32, u32),
    ) -> Self {
        let uniform_size = std::mem::size_of::<DrawUniforms>() as u64;
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let uniform_stride = align_to(uniform_size, alignment.max(1));

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprig draw uniforms bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(uniform_size),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprig texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let (uniform_ubo, uniform_bind_group) = create_uniform_slots(
            device,
            &uniform_layout,
            uniform_stride,
            Self::INITIAL_UNIFORM_SLOTS,
        );

        Self {
            device: device.clone(),
            queue: queue.clone(),
            target_format,
            uniform_layout,
            texture_layout,
            uniform_stride,
            uniform_capacity: Self::INITIAL_UNIFORM_SLOTS,
            uniform_ubo,
            uniform_bind_group,
            uniform_staging: Vec::new(),
            programs: Vec::new(),
            meshes: Vec::new(),
            textures: Vec::new(),
            viewport,
            target: None,
            pending: Vec::new(),
            pending_clear: None,
            warned_untextured: false,
        }
    }

    /// Starts drawing into `texture` (usually the acquired surface texture).
    ///
    /// Anything still queued for a previous target is dropped.
    pub fn begin_frame(&mut self, texture: &wgpu::Texture) {
        if !self.pending.is_empty() {
            log::warn!("dropping {} draw calls queued outside a frame", self.pending.len());
            self.pending.clear();
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.target = Some(FrameTarget {
            texture: texture.clone(),
            view,
        });
    }

    /// Flushes queued draws and releases the frame target.
    pub fn end_frame(&mut self) {
        self.flush();
        self.target = None;
    }

    /// Encodes and submits every queued draw call.
    pub fn flush(&mut self) {
        if self.pending.is_empty() && self.pending_clear.is_none() {
            return;
        }

        let Some(target) = self.target.as_ref() else {
            log::warn!("flush without a frame target; {} draws dropped", self.pending.len());
            self.pending.clear();
            self.pending_clear = None;
            return;
        };

        // Uniform slots are written before the pass borrows anything.
        let required = self.pending.len();
        if required > self.uniform_capacity {
            let new_cap = required.next_power_of_two();
            let (ubo, bind_group) =
                create_uniform_slots(&self.device, &self.uniform_layout, self.uniform_stride, new_cap);
            self.uniform_ubo = ubo;
            self.uniform_bind_group = bind_group;
            self.uniform_capacity = new_cap;
        }

        if required > 0 {
            let stride = self.uniform_stride as usize;
            self.uniform_staging.clear();
            self.uniform_staging.resize(required * stride, 0);
            for (i, call) in self.pending.iter().enumerate() {
                let bytes = bytemuck::bytes_of(&call.uniforms);
                self.uniform_staging[i * stride..i * stride + bytes.len()].copy_from_slice(bytes);
            }
            self.queue.write_buffer(&self.uniform_ubo, 0, &self.uniform_staging);
        }

        let load = match self.pending_clear.take() {
            Some(c) => wgpu::LoadOp::Clear(c.into()),
            None => wgpu::LoadOp::Load,
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sprig draw encoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sprig draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let size = target.texture.size();
            let (vw, vh) = (
                self.viewport.0.clamp(1, size.width),
                self.viewport.1.clamp(1, size.height),
            );
            rpass.set_viewport(0.0, 0.0, vw as f32, vh as f32, 0.0, 1.0);

            for (i, call) in self.pending.iter().enumerate() {
                let (Some(program), Some(mesh)) = (
                    self.programs.get(call.program.index()),
                    self.meshes.get(call.mesh.index()),
                ) else {
                    continue;
                };

                rpass.set_pipeline(&program.pipeline);
                let offset = (i as u64 * self.uniform_stride) as u32;
                rpass.set_bind_group(0, &self.uniform_bind_group, &[offset]);

                if program.layout.is_textured() {
                    let Some(texture) = call.texture.and_then(|t| self.textures.get(t.index()))
                    else {
                        if !self.warned_untextured {
                            log::warn!("textured program '{}' drawn without a texture; skipped", program.label);
                            self.warned_untextured = true;
                        }
                        continue;
                    };
                    rpass.set_bind_group(1, &texture.bind_group, &[]);
                }

                rpass.set_vertex_buffer(0, mesh.vbo.slice(..));
                rpass.set_index_buffer(mesh.ibo.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..call.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.pending.clear();
    }

    fn readback_format(&self) -> Result<bool, CaptureError> {
        // Returns whether channels arrive as BGRA.
        match self.target_format {
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => Ok(false),
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => Ok(true),
            other => Err(CaptureError::UnsupportedFormat(format!("{other:?}"))),
        }
    }
}

fn create_uniform_slots(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u64,
    slots: usize,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let ubo = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("sprig draw uniforms ubo"),
        size: stride * slots as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("sprig draw uniforms bind group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &ubo,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniforms>() as u64),
            }),
        }],
    });

    (ubo, bind_group)
}

impl GraphicsBackend for WgpuBackend {
    fn compile_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramHandle, ShaderError> {
        validate_program(desc)?;

        let mut modules = Vec::with_capacity(desc.stages.len());
        for stage in &desc.stages {
            let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
            let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label),
                source: wgpu::ShaderSource::Wgsl(stage.source.clone()),
            });
            if let Some(err) = pollster::block_on(scope.pop()) {
                return Err(ShaderError::Compile {
                    label: desc.label.to_string(),
                    stage: stage.kind,
                    message: err.to_string(),
                });
            }
            modules.push((stage.kind, stage.entry_point, module));
        }

        // Both stages exist: `validate_program` checked it.
        let find = |kind: StageKind| modules.iter().find(|(k, _, _)| *k == kind);
        let (Some((_, vs_entry, vs_module)), Some((_, fs_entry, fs_module))) =
            (find(StageKind::Vertex), find(StageKind::Fragment))
        else {
            return Err(ShaderError::Link {
                label: desc.label.to_string(),
                message: "missing stage".to_string(),
            });
        };

        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = if desc.layout.is_textured() {
            vec![&self.uniform_layout, &self.texture_layout]
        } else {
            vec![&self.uniform_layout]
        };

        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.label),
                bind_group_layouts: &bind_group_layouts,
                immediate_size: 0,
            });

        let vertex_buffers = [wgpu::VertexBufferLayout {
            array_stride: (desc.layout.components() * std::mem::size_of::<f32>()) as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: vertex_attributes(desc.layout),
        }];

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&pipeline_layout),

                vertex: wgpu::VertexState {
                    module: vs_module,
                    entry_point: Some(vs_entry),
                    compilation_options: Default::default(),
                    buffers: &vertex_buffers,
                },

                fragment: Some(wgpu::FragmentState {
                    module: fs_module,
                    entry_point: Some(fs_entry),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.target_format,
                        blend: Some(straight_alpha_blend()),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),

                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },

                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        if let Some(err) = pollster::block_on(scope.pop()) {
            return Err(ShaderError::Link {
                label: desc.label.to_string(),
                message: err.to_string(),
            });
        }

        self.programs.push(Program {
            label: desc.label.to_string(),
            layout: desc.layout,
            pipeline,
        });
        Ok(ProgramHandle::from_index(self.programs.len() - 1))
    }

    fn program_layout(&self, program: ProgramHandle) -> Option<VertexLayout> {
        self.programs.get(program.index()).map(|p| p.layout)
    }

    fn create_mesh(&mut self, desc: &MeshDesc<'_>) -> MeshHandle {
        let vbo = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(desc.label),
            contents: bytemuck::cast_slice(desc.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let ibo = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(desc.label),
            contents: bytemuck::cast_slice(desc.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        self.meshes.push(Mesh { vbo, ibo });
        MeshHandle::from_index(self.meshes.len() - 1)
    }

    fn create_texture(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        options: TextureOptions,
    ) -> TextureHandle {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("sprig texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        if width > 0 && height > 0 {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * BYTES_PER_PIXEL as u32),
                    rows_per_image: Some(height),
                },
                size,
            );
        }

        let filter = if options.smoothing {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        };

        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sprig texture sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            ..Default::default()
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprig texture bind group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        self.textures.push(Texture { bind_group });
        TextureHandle::from_index(self.textures.len() - 1)
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn clear(&mut self, color: Color) {
        // Draws queued before the clear must land first.
        if !self.pending.is_empty() {
            self.flush();
        }
        self.pending_clear = Some(color);
    }

    fn submit(&mut self, call: &DrawCall) {
        self.pending.push(*call);
    }

    fn read_pixels(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<PixelReadback, CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::EmptyFramebuffer { width, height });
        }
        let bgra = self.readback_format()?;

        self.flush();
        let Some(target) = self.target.as_ref() else {
            return Err(CaptureError::NoTarget);
        };

        if !target.texture.usage().contains(wgpu::TextureUsages::COPY_SRC) {
            return Err(CaptureError::Readback(
                "frame target was not created with COPY_SRC".to_string(),
            ));
        }

        let unpadded_row = width as u64 * BYTES_PER_PIXEL as u64;
        let padded_row = align_to(unpadded_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprig readback buffer"),
            size: padded_row * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sprig readback encoder"),
            });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row as u32),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| CaptureError::Readback(e.to_string()))?;

        rx.recv()
            .map_err(|e| CaptureError::Readback(e.to_string()))?
            .map_err(|e| CaptureError::Readback(e.to_string()))?;

        let mut bytes = Vec::with_capacity((unpadded_row * height as u64) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded_row as usize) {
                bytes.extend_from_slice(&row[..unpadded_row as usize]);
            }
        }
        buffer.unmap();

        if bgra {
            for px in bytes.chunks_exact_mut(BYTES_PER_PIXEL) {
                px.swap(0, 2);
            }
        }

        Ok(PixelReadback {
            width,
            height,
            origin: RowOrigin::Top,
            bytes,
        })
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        match self.target.as_ref() {
            Some(t) => {
                let size = t.texture.size();
                (size.width, size.height)
            }
            None => self.viewport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_up_to_multiple() {
        assert_eq!(align_to(208, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(12, 4), 12);
    }

    #[test]
    fn attribute_lists_follow_layout() {
        assert_eq!(vertex_attributes(VertexLayout::Position).len(), 1);
        let uv = vertex_attributes(VertexLayout::PositionUv);
        assert_eq!(uv.len(), 2);
        assert_eq!(uv[1].offset, 8);
        assert_eq!(uv[1].shader_location, 1);
    }
}
