use std::mem::{offset_of, size_of};
use std::sync::{Arc, Mutex};

use eframe::egui::{self, Rect, Vec2};
use eframe::egui_glow::{self, ShaderVersion};
use eframe::glow::{self, HasContext as _};
use log::{info, warn};

use crate::error::ViewError;

use super::{EdgeVertex, FrameBuffers, NodeInstance};

const NODE_VERTEX_SHADER: &str = r#"
in vec2 a_corner;
in vec2 a_center;
in float a_radius;
in float a_selected;
in vec4 a_color;

uniform vec2 u_origin;
uniform vec2 u_screen_size;
uniform float u_zoom;

out vec2 v_local;
out vec4 v_color;
out float v_selected;

void main() {
    float radius = max(a_radius * u_zoom, 1.5);
    if (a_selected > 0.5) {
        radius *= 1.25;
    }
    vec2 screen = u_origin + a_center * u_zoom + a_corner * radius;
    vec2 clip = screen / u_screen_size * 2.0 - 1.0;
    gl_Position = vec4(clip.x, -clip.y, 0.0, 1.0);
    v_local = a_corner;
    v_color = a_color;
    v_selected = a_selected;
}
"#;

const NODE_FRAGMENT_SHADER: &str = r#"
#ifdef GL_ES
precision mediump float;
#endif

in vec2 v_local;
in vec4 v_color;
in float v_selected;

out vec4 out_color;

void main() {
    float dist = length(v_local);
    if (dist > 1.0) {
        discard;
    }
    vec4 color = v_color;
    if (v_selected > 0.5 && dist > 0.78) {
        color = vec4(0.96, 0.81, 0.36, 1.0);
    } else if (dist > 0.86) {
        color = vec4(color.rgb * 0.35, color.a);
    }
    out_color = color;
}
"#;

const EDGE_VERTEX_SHADER: &str = r#"
in vec2 a_position;
in vec4 a_color;

uniform vec2 u_origin;
uniform vec2 u_screen_size;
uniform float u_zoom;

out vec4 v_color;

void main() {
    vec2 screen = u_origin + a_position * u_zoom;
    vec2 clip = screen / u_screen_size * 2.0 - 1.0;
    gl_Position = vec4(clip.x, -clip.y, 0.0, 1.0);
    v_color = a_color;
}
"#;

const EDGE_FRAGMENT_SHADER: &str = r#"
#ifdef GL_ES
precision mediump float;
#endif

in vec4 v_color;

out vec4 out_color;

void main() {
    out_color = v_color;
}
"#;

/// Two triangles covering the unit quad; the fragment shader cuts the circle out of it.
const QUAD_CORNERS: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
];

const CORNER_LOCATION: u32 = 0;
const CENTER_LOCATION: u32 = 1;
const RADIUS_LOCATION: u32 = 2;
const SELECTED_LOCATION: u32 = 3;
const NODE_COLOR_LOCATION: u32 = 4;
const EDGE_POSITION_LOCATION: u32 = 0;
const EDGE_COLOR_LOCATION: u32 = 1;

/// Fails when there is no GL context or its GLSL dialect has no per-instance attributes.
pub(in crate::app) fn check_backend(gl: Option<&glow::Context>) -> Result<ShaderVersion, ViewError> {
    let Some(gl) = gl else {
        return Err(ViewError::UnsupportedBackend(
            "no OpenGL context is available".to_owned(),
        ));
    };

    let version = ShaderVersion::get(gl);
    if !version.is_new_shader_interface() {
        return Err(ViewError::UnsupportedBackend(format!(
            "{} does not support instanced attributes",
            version.version_declaration().trim()
        )));
    }
    Ok(version)
}

struct ProgramUniforms {
    origin: Option<glow::UniformLocation>,
    screen_size: Option<glow::UniformLocation>,
    zoom: Option<glow::UniformLocation>,
}

struct GpuResources {
    node_program: glow::Program,
    edge_program: glow::Program,
    node_uniforms: ProgramUniforms,
    edge_uniforms: ProgramUniforms,
    node_vao: glow::VertexArray,
    edge_vao: glow::VertexArray,
    corner_buffer: glow::Buffer,
    instance_buffer: glow::Buffer,
    edge_buffer: glow::Buffer,
}

#[derive(Clone, Copy, Default)]
struct SceneUniforms {
    origin: Vec2,
    screen_size: Vec2,
    zoom: f32,
}

pub(in crate::app) struct GpuScene {
    resources: Option<GpuResources>,
    uniforms: SceneUniforms,
    node_bytes: Vec<u8>,
    node_count: usize,
    edge_bytes: Vec<u8>,
    edge_vertex_count: usize,
}

impl GpuScene {
    pub(in crate::app) fn new(gl: &glow::Context) -> Result<Self, ViewError> {
        let version = check_backend(Some(gl))?;
        // SAFETY: every handle created here is owned by the scene and deleted in `release`.
        let resources = unsafe { GpuResources::create(gl, version) }
            .map_err(ViewError::UnsupportedBackend)?;
        info!("GPU scene ready ({})", version.version_declaration().trim());

        Ok(Self {
            resources: Some(resources),
            uniforms: SceneUniforms::default(),
            node_bytes: Vec::new(),
            node_count: 0,
            edge_bytes: Vec::new(),
            edge_vertex_count: 0,
        })
    }

    pub(in crate::app) fn stage(&mut self, frame: &FrameBuffers, rect: Rect, pan: Vec2, zoom: f32) {
        self.node_bytes.clear();
        self.node_bytes
            .extend_from_slice(bytemuck::cast_slice(&frame.nodes));
        self.node_count = frame.nodes.len();
        self.edge_bytes.clear();
        self.edge_bytes
            .extend_from_slice(bytemuck::cast_slice(&frame.edges));
        self.edge_vertex_count = frame.edges.len();
        self.uniforms = SceneUniforms {
            origin: rect.size() * 0.5 + pan,
            screen_size: rect.size(),
            zoom,
        };
    }

    fn paint(&self, gl: &glow::Context) {
        let Some(resources) = self.resources.as_ref() else {
            return;
        };
        // SAFETY: the resources are alive until `release`, which also empties `resources`.
        unsafe {
            gl.enable(glow::BLEND);
            gl.blend_func_separate(
                glow::SRC_ALPHA,
                glow::ONE_MINUS_SRC_ALPHA,
                glow::ONE,
                glow::ONE_MINUS_SRC_ALPHA,
            );

            if self.edge_vertex_count > 0 {
                gl.use_program(Some(resources.edge_program));
                self.apply_uniforms(gl, &resources.edge_uniforms);
                gl.bind_vertex_array(Some(resources.edge_vao));
                gl.bind_buffer(glow::ARRAY_BUFFER, Some(resources.edge_buffer));
                gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, &self.edge_bytes, glow::STREAM_DRAW);
                gl.draw_arrays(glow::LINES, 0, self.edge_vertex_count as i32);
            }

            if self.node_count > 0 {
                gl.use_program(Some(resources.node_program));
                self.apply_uniforms(gl, &resources.node_uniforms);
                gl.bind_vertex_array(Some(resources.node_vao));
                gl.bind_buffer(glow::ARRAY_BUFFER, Some(resources.instance_buffer));
                gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, &self.node_bytes, glow::STREAM_DRAW);
                gl.draw_arrays_instanced(
                    glow::TRIANGLES,
                    0,
                    QUAD_CORNERS.len() as i32,
                    self.node_count as i32,
                );
            }

            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.use_program(None);
        }
    }

    unsafe fn apply_uniforms(&self, gl: &glow::Context, locations: &ProgramUniforms) {
        let uniforms = self.uniforms;
        unsafe {
            gl.uniform_2_f32(locations.origin.as_ref(), uniforms.origin.x, uniforms.origin.y);
            gl.uniform_2_f32(
                locations.screen_size.as_ref(),
                uniforms.screen_size.x,
                uniforms.screen_size.y,
            );
            gl.uniform_1_f32(locations.zoom.as_ref(), uniforms.zoom);
        }
    }

    /// Deletes all GL objects. Later paints are no-ops.
    pub(in crate::app) fn release(&mut self, gl: &glow::Context) {
        let Some(resources) = self.resources.take() else {
            return;
        };
        // SAFETY: taken out of the scene, so nothing can use these handles afterwards.
        unsafe { resources.destroy(gl) };
        self.node_bytes = Vec::new();
        self.edge_bytes = Vec::new();
        self.node_count = 0;
        self.edge_vertex_count = 0;
        info!("GPU scene released");
    }
}

impl Drop for GpuScene {
    fn drop(&mut self) {
        if self.resources.is_some() {
            warn!("GPU scene dropped without release; GL objects leak until the context closes");
        }
    }
}

pub(in crate::app) fn paint_callback(rect: Rect, scene: &Arc<Mutex<GpuScene>>) -> egui::PaintCallback {
    let scene = Arc::clone(scene);
    egui::PaintCallback {
        rect,
        callback: Arc::new(egui_glow::CallbackFn::new(move |_info, painter| {
            if let Ok(scene) = scene.lock() {
                scene.paint(painter.gl());
            }
        })),
    }
}

impl GpuResources {
    unsafe fn create(gl: &glow::Context, version: ShaderVersion) -> Result<Self, String> {
        unsafe {
            let node_program = link_program(
                gl,
                version,
                NODE_VERTEX_SHADER,
                NODE_FRAGMENT_SHADER,
                &[
                    (CORNER_LOCATION, "a_corner"),
                    (CENTER_LOCATION, "a_center"),
                    (RADIUS_LOCATION, "a_radius"),
                    (SELECTED_LOCATION, "a_selected"),
                    (NODE_COLOR_LOCATION, "a_color"),
                ],
            )?;
            let edge_program = match link_program(
                gl,
                version,
                EDGE_VERTEX_SHADER,
                EDGE_FRAGMENT_SHADER,
                &[
                    (EDGE_POSITION_LOCATION, "a_position"),
                    (EDGE_COLOR_LOCATION, "a_color"),
                ],
            ) {
                Ok(program) => program,
                Err(error) => {
                    gl.delete_program(node_program);
                    return Err(error);
                }
            };

            let objects = (
                gl.create_vertex_array(),
                gl.create_vertex_array(),
                gl.create_buffer(),
                gl.create_buffer(),
                gl.create_buffer(),
            );
            let (node_vao, edge_vao, corner_buffer, instance_buffer, edge_buffer) = match objects
            {
                (Ok(node_vao), Ok(edge_vao), Ok(corner), Ok(instance), Ok(edge)) => {
                    (node_vao, edge_vao, corner, instance, edge)
                }
                (node_vao, edge_vao, corner, instance, edge) => {
                    let error = [&node_vao, &edge_vao]
                        .into_iter()
                        .find_map(|result| result.as_ref().err())
                        .or_else(|| {
                            [&corner, &instance, &edge]
                                .into_iter()
                                .find_map(|result| result.as_ref().err())
                        })
                        .cloned()
                        .unwrap_or_default();
                    for vao in [node_vao, edge_vao].into_iter().flatten() {
                        gl.delete_vertex_array(vao);
                    }
                    for buffer in [corner, instance, edge].into_iter().flatten() {
                        gl.delete_buffer(buffer);
                    }
                    gl.delete_program(node_program);
                    gl.delete_program(edge_program);
                    return Err(format!("failed to allocate GL objects: {error}"));
                }
            };

            gl.bind_vertex_array(Some(node_vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(corner_buffer));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&QUAD_CORNERS),
                glow::STATIC_DRAW,
            );
            gl.enable_vertex_attrib_array(CORNER_LOCATION);
            gl.vertex_attrib_pointer_f32(CORNER_LOCATION, 2, glow::FLOAT, false, 8, 0);

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(instance_buffer));
            let stride = size_of::<NodeInstance>() as i32;
            for (location, components, offset) in [
                (CENTER_LOCATION, 2, offset_of!(NodeInstance, center)),
                (RADIUS_LOCATION, 1, offset_of!(NodeInstance, radius)),
                (SELECTED_LOCATION, 1, offset_of!(NodeInstance, selected)),
                (NODE_COLOR_LOCATION, 4, offset_of!(NodeInstance, color)),
            ] {
                gl.enable_vertex_attrib_array(location);
                gl.vertex_attrib_pointer_f32(
                    location,
                    components,
                    glow::FLOAT,
                    false,
                    stride,
                    offset as i32,
                );
                gl.vertex_attrib_divisor(location, 1);
            }

            gl.bind_vertex_array(Some(edge_vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(edge_buffer));
            let stride = size_of::<EdgeVertex>() as i32;
            gl.enable_vertex_attrib_array(EDGE_POSITION_LOCATION);
            gl.vertex_attrib_pointer_f32(
                EDGE_POSITION_LOCATION,
                2,
                glow::FLOAT,
                false,
                stride,
                offset_of!(EdgeVertex, position) as i32,
            );
            gl.enable_vertex_attrib_array(EDGE_COLOR_LOCATION);
            gl.vertex_attrib_pointer_f32(
                EDGE_COLOR_LOCATION,
                4,
                glow::FLOAT,
                false,
                stride,
                offset_of!(EdgeVertex, color) as i32,
            );

            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);

            Ok(Self {
                node_uniforms: ProgramUniforms::locate(gl, node_program),
                edge_uniforms: ProgramUniforms::locate(gl, edge_program),
                node_program,
                edge_program,
                node_vao,
                edge_vao,
                corner_buffer,
                instance_buffer,
                edge_buffer,
            })
        }
    }

    unsafe fn destroy(self, gl: &glow::Context) {
        unsafe {
            gl.delete_program(self.node_program);
            gl.delete_program(self.edge_program);
            gl.delete_vertex_array(self.node_vao);
            gl.delete_vertex_array(self.edge_vao);
            gl.delete_buffer(self.corner_buffer);
            gl.delete_buffer(self.instance_buffer);
            gl.delete_buffer(self.edge_buffer);
        }
    }
}

impl ProgramUniforms {
    unsafe fn locate(gl: &glow::Context, program: glow::Program) -> Self {
        unsafe {
            Self {
                origin: gl.get_uniform_location(program, "u_origin"),
                screen_size: gl.get_uniform_location(program, "u_screen_size"),
                zoom: gl.get_uniform_location(program, "u_zoom"),
            }
        }
    }
}

unsafe fn link_program(
    gl: &glow::Context,
    version: ShaderVersion,
    vertex_source: &str,
    fragment_source: &str,
    attributes: &[(u32, &str)],
) -> Result<glow::Program, String> {
    unsafe {
        let program = gl.create_program()?;
        let mut shaders = Vec::with_capacity(2);
        for (kind, source) in [
            (glow::VERTEX_SHADER, vertex_source),
            (glow::FRAGMENT_SHADER, fragment_source),
        ] {
            let shader = gl.create_shader(kind)?;
            gl.shader_source(
                shader,
                &format!("{}\n{source}", version.version_declaration()),
            );
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                gl.delete_shader(shader);
                for shader in shaders {
                    gl.delete_shader(shader);
                }
                gl.delete_program(program);
                return Err(format!("shader compilation failed: {log}"));
            }
            gl.attach_shader(program, shader);
            shaders.push(shader);
        }

        for &(location, name) in attributes {
            gl.bind_attrib_location(program, location, name);
        }
        gl.link_program(program);
        let linked = gl.get_program_link_status(program);
        let log = gl.get_program_info_log(program);

        for shader in shaders {
            gl.detach_shader(program, shader);
            gl.delete_shader(shader);
        }

        if !linked {
            gl.delete_program(program);
            return Err(format!("shader link failed: {log}"));
        }
        Ok(program)
    }
}
