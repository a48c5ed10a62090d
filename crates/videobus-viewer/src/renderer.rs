//! GPU frame renderer
//!
//! This module implements the fixed texture-blit pipeline that puts frames on
//! screen: a full-screen quad, a pass-through vertex shader, and a fragment
//! shader sampling the current frame texture. Frame uploads normalize the
//! source pixel format into the texture's four-channel storage; draws clear
//! to black and render the quad into the caller-supplied viewport rectangle.
//!
//! All resources here are owned by the render thread. The renderer is built
//! once per surface lifetime and every method must be called from the thread
//! that created it.

use crate::frame::{PixelFormat, UploadFormat, VideoFrame};
use crate::viewport::Viewport;
use wgpu::util::DeviceExt;
use thiserror::Error;

/// Errors from frame upload and draw
///
/// Initialization failure is not an error value: a renderer that fails to
/// build its pipeline reports [`RenderState::Failed`] and degrades to no-op
/// draws instead.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The frame's pixel format has no GPU upload layout
    #[error("pixel format {} is not supported by the renderer", format.name())]
    UnsupportedFormat {
        /// The offending format tag
        format: PixelFormat,
    },

    /// The frame's buffer is shorter than its geometry requires
    #[error("frame buffer holds {actual} bytes, geometry requires {expected}")]
    FrameTooShort {
        /// Bytes required by width x height x bytes-per-pixel
        expected: usize,
        /// Bytes actually present
        actual: usize,
    },

    /// The presentation surface could not provide a texture
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Whether the renderer is able to draw
///
/// A renderer whose pipeline failed to build stays alive in `Failed` state:
/// draws and uploads become no-ops instead of producing undefined output.
/// Showing nothing beats crashing a live video display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Pipeline built, draws render the current frame
    Ready,
    /// Initialization failed, draws are no-ops
    Failed,
}

/// Quad geometry: four vertex positions followed by four texture coordinates
///
/// One buffer, two attribute arrays: positions at byte offset 0, texture
/// coordinates at byte offset 32. The coordinates are flipped vertically so
/// the frame's top-left origin lands upright on screen.
#[rustfmt::skip]
const QUAD_GEOMETRY: [f32; 16] = [
    // Vertex positions
    -1.0, -1.0,
     1.0, -1.0,
     1.0,  1.0,
    -1.0,  1.0,
    // Texture coordinates
    0.0, 1.0,
    1.0, 1.0,
    1.0, 0.0,
    0.0, 0.0,
];

/// Byte offset of the texture coordinates within [`QUAD_GEOMETRY`]
const TEX_COORD_OFFSET: u64 = 8 * 4;

/// The quad's two triangles over the four fan-ordered vertices
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Clear color for the area outside the frame
const BACKGROUND_COLOR: wgpu::Color = wgpu::Color::BLACK;

/// The current frame's GPU-side texture and its binding
struct FrameTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// Renders video frames into a window surface
///
/// Owns the surface, the blit pipeline, the quad geometry, and the texture
/// holding the most recently uploaded frame. A frame that fails to upload
/// leaves the previous texture in place, so the last good frame keeps being
/// displayed.
pub struct BlitRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    state: RenderState,
    pipeline: Option<wgpu::RenderPipeline>,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    geometry_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,

    frame_texture: Option<FrameTexture>,
}

impl BlitRenderer {
    /// Builds the renderer against a configured-for surface
    ///
    /// Creates the quad geometry, compiles the blit shader, and links the
    /// render pipeline. Construction runs under a validation error scope: a
    /// captured error is logged and leaves the renderer in
    /// [`RenderState::Failed`] rather than tearing down the application.
    ///
    /// # Arguments
    /// * `surface` - The window surface to present into
    /// * `adapter` - Adapter the device was created from, for surface capabilities
    /// * `device` - Device owned by the render thread
    /// * `queue` - Queue for uploads and submissions
    /// * `width`, `height` - Initial drawable size in physical pixels
    pub fn new(surface: wgpu::Surface<'static>, adapter: &wgpu::Adapter, device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        let capabilities = surface.get_capabilities(adapter);

        // Source bytes are display-referred already; prefer a non-sRGB
        // surface format so presentation does not re-encode them.
        let surface_format = capabilities
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .copied()
            .unwrap_or(capabilities.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: capabilities.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let geometry_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad geometry"),
            contents: bytemuck::cast_slice(&QUAD_GEOMETRY),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad indices"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("frame sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame bind group layout"),
            entries: &[
                // Frame texture
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
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let shader_module = device.create_shader_module(wgpu::include_wgsl!("blit.wgsl"));

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // Two vertex slots over the single geometry buffer: positions in
        // slot 0, texture coordinates in slot 1 at their byte offset.
        let vertex_layouts = [
            wgpu::VertexBufferLayout {
                array_stride: 2 * 4,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                }],
            },
            wgpu::VertexBufferLayout {
                array_stride: 2 * 4,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                }],
            },
        ];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("blit pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader_module,
                entry_point: Some("vs_main"),
                buffers: &vertex_layouts,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
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
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let init_error = Self::drain_error_scope(&device);
        let state = match init_error {
            None => RenderState::Ready,
            Some(message) => {
                tracing::error!(%message, "blit pipeline construction failed, renderer is degraded");
                RenderState::Failed
            }
        };

        Self {
            surface,
            device,
            queue,
            config,
            pipeline: (state == RenderState::Ready).then_some(pipeline),
            state,
            bind_group_layout,
            sampler,
            geometry_buffer,
            index_buffer,
            frame_texture: None,
        }
    }

    /// Whether the renderer can draw
    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Reconfigures the surface for a new drawable size
    ///
    /// Zero-sized dimensions are ignored; a minimized window keeps the last
    /// valid configuration.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Uploads one frame into the current-frame texture
    ///
    /// Maps the frame's pixel format to its upload layout and copies the
    /// pixels into four-channel texture storage. Three-channel internal
    /// storage is not reliably supported across GPU and driver combinations,
    /// so the storage format is fixed at four channels and RGB sources are
    /// expanded row by row during the upload.
    ///
    /// On any error the current texture is left untouched and the previous
    /// frame remains displayed.
    pub fn upload_frame(&mut self, frame: &VideoFrame) -> Result<(), RenderError> {
        if self.state == RenderState::Failed {
            return Ok(());
        }

        let Some(upload_format) = frame.format.upload_format() else {
            tracing::error!(format = frame.format.name(), "pixel format not supported, frame skipped");
            return Err(RenderError::UnsupportedFormat { format: frame.format });
        };

        let expected = frame.expected_len();
        if frame.data.len() < expected {
            tracing::error!(expected, actual = frame.data.len(), "frame buffer too short, frame skipped");
            return Err(RenderError::FrameTooShort {
                expected,
                actual: frame.data.len(),
            });
        }

        let needs_new_texture = match &self.frame_texture {
            Some(t) => t.width != frame.width || t.height != frame.height,
            None => true,
        };
        if needs_new_texture {
            self.debug_mark();
            self.create_frame_texture(frame.width, frame.height);
            self.debug_check("frame-texture");
        }
        let target = self.frame_texture.as_ref().unwrap();

        // External layout follows the source; internal storage is RGBA.
        let rgba;
        let pixels: &[u8] = match upload_format {
            UploadFormat::Rgba => &frame.data[..expected],
            UploadFormat::Rgb => {
                rgba = expand_rgb_to_rgba(&frame.data[..expected]);
                &rgba
            }
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.width * 4),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );

        Ok(())
    }

    /// Draws the current frame into the given viewport rectangle
    ///
    /// Clears the whole target to opaque black, then renders the quad with
    /// the pass viewport set to `viewport`. The viewport is set on every
    /// draw; each pass starts from the full target again. Before any frame
    /// has been uploaded the pass only clears.
    ///
    /// A renderer in [`RenderState::Failed`] returns without touching the
    /// surface.
    pub fn draw(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        if self.state == RenderState::Failed {
            return Ok(());
        }

        let surface_texture = self.surface.get_current_texture()?;
        let view = surface_texture.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("blit encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(BACKGROUND_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let (Some(pipeline), Some(frame)) = (&self.pipeline, &self.frame_texture) {
                pass.set_viewport(viewport.x as f32, viewport.y as f32, viewport.width as f32, viewport.height as f32, 0.0, 1.0);
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &frame.bind_group, &[]);
                pass.set_vertex_buffer(0, self.geometry_buffer.slice(..TEX_COORD_OFFSET));
                pass.set_vertex_buffer(1, self.geometry_buffer.slice(TEX_COORD_OFFSET..));
                pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
            }
        }

        self.queue.submit(Some(encoder.finish()));
        surface_texture.present();

        Ok(())
    }

    /// Opens an advisory validation scope for [`debug_check`]
    ///
    /// [`debug_check`]: BlitRenderer::debug_check
    pub fn debug_mark(&self) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
    }

    /// Closes the scope from [`debug_mark`] and logs what it captured
    ///
    /// An empty scope is logged explicitly as confirmation of a clean call
    /// sequence. Advisory only; the outcome never changes control flow.
    ///
    /// [`debug_mark`]: BlitRenderer::debug_mark
    pub fn debug_check(&self, tag: &str) {
        match Self::drain_error_scope(&self.device) {
            None => tracing::debug!(tag, "gpu validation clean"),
            Some(message) => tracing::debug!(tag, %message, "gpu validation message"),
        }
    }

    /// Allocates the frame texture and its bind group for a new geometry
    fn create_frame_texture(&mut self, width: u32, height: u32) {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("frame texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        self.frame_texture = Some(FrameTexture {
            texture,
            bind_group,
            width,
            height,
        });
    }

    /// Pops the innermost validation scope and returns its message, if any
    fn drain_error_scope(device: &wgpu::Device) -> Option<String> {
        let scope = device.pop_error_scope();
        let _ = device.poll(wgpu::PollType::Wait);
        pollster::block_on(scope).map(|e| e.to_string())
    }
}

/// Expands tightly packed RGB bytes to RGBA with opaque alpha
fn expand_rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    debug_assert_eq!(rgb.len() % 3, 0);

    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for pixel in rgb.chunks_exact(3) {
        rgba.extend_from_slice(pixel);
        rgba.push(0xff);
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_expansion_interleaves_opaque_alpha() {
        let rgb = [1u8, 2, 3, 4, 5, 6];
        assert_eq!(expand_rgb_to_rgba(&rgb), vec![1, 2, 3, 0xff, 4, 5, 6, 0xff]);
    }

    #[test]
    fn rgb_expansion_of_empty_input_is_empty() {
        assert!(expand_rgb_to_rgba(&[]).is_empty());
    }

    #[test]
    fn quad_texture_coordinates_are_flipped_vertically() {
        // Bottom-left vertex samples the bottom of the image (v = 1),
        // top-left vertex samples the top (v = 0).
        let (pos_y_first, tex_v_first) = (QUAD_GEOMETRY[1], QUAD_GEOMETRY[9]);
        let (pos_y_last, tex_v_last) = (QUAD_GEOMETRY[7], QUAD_GEOMETRY[15]);
        assert!(pos_y_first < 0.0 && tex_v_first == 1.0);
        assert!(pos_y_last > 0.0 && tex_v_last == 0.0);
    }

    #[test]
    fn quad_indices_cover_the_fan_vertices() {
        let mut used: Vec<u16> = QUAD_INDICES.to_vec();
        used.sort_unstable();
        used.dedup();
        assert_eq!(used, vec![0, 1, 2, 3]);
    }
}
