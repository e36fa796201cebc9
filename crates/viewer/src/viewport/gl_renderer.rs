use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use glow::HasContext;

use super::camera::ArcBallCamera;
use super::frame::{DrawItem, FramePlan, Pass};
use super::material::{CompareFunc, Material, Side, StencilOp};
use super::mesh::Geometry;

/// Clip planes the shaders accept
const MAX_CLIP_PLANES: usize = 3;

// ── Render parameters ────────────────────────────────────────

/// Parameters for rendering the viewport
pub struct RenderParams {
    /// Viewport rectangle [x, y, width, height] in pixels
    pub viewport: [f32; 4],
    /// Background color RGB
    pub bg_color: [u8; 3],
    /// Bumped whenever the scene graph is rebuilt
    pub generation: u64,
}

// ── GPU buffers ──────────────────────────────────────────────

enum GpuGeometry {
    Triangles {
        vao: glow::VertexArray,
        buffers: Vec<glow::Buffer>,
        index_count: i32,
    },
    Lines {
        vao: glow::VertexArray,
        buffers: Vec<glow::Buffer>,
        vertex_count: i32,
        has_colors: bool,
    },
    Points {
        vao: glow::VertexArray,
        buffers: Vec<glow::Buffer>,
        vertex_count: i32,
    },
}

impl GpuGeometry {
    unsafe fn delete(self, gl: &glow::Context) {
        let (vao, buffers) = match self {
            GpuGeometry::Triangles { vao, buffers, .. }
            | GpuGeometry::Lines { vao, buffers, .. }
            | GpuGeometry::Points { vao, buffers, .. } => (vao, buffers),
        };
        gl.delete_vertex_array(vao);
        for b in buffers {
            gl.delete_buffer(b);
        }
    }
}

/// Identity of a shared geometry buffer
fn buffer_key(geometry: &Geometry) -> usize {
    match geometry {
        Geometry::Triangles(g) => Arc::as_ptr(g) as usize,
        Geometry::Lines(g) => Arc::as_ptr(g) as usize,
        Geometry::Points(g) => Arc::as_ptr(g) as usize,
    }
}

// ── Main GL renderer ─────────────────────────────────────────

/// Executes a [`FramePlan`] pass by pass.
pub struct GlRenderer {
    mesh_program: glow::Program,
    flat_program: glow::Program,
    /// Uploaded geometry keyed by shared buffer identity
    gpu: HashMap<usize, GpuGeometry>,
    generation: u64,
}

impl GlRenderer {
    pub fn new(gl: &glow::Context) -> Option<Self> {
        let mesh_program = compile_program(gl, MESH_VERT, MESH_FRAG)?;
        let flat_program = compile_program(gl, FLAT_VERT, FLAT_FRAG)?;
        Some(Self {
            mesh_program,
            flat_program,
            gpu: HashMap::new(),
            generation: u64::MAX,
        })
    }

    /// Upload every geometry the plan references; drop the rest.
    fn sync(&mut self, gl: &glow::Context, plan: &FramePlan, generation: u64) {
        if generation != self.generation {
            for (_, g) in self.gpu.drain() {
                unsafe { g.delete(gl) };
            }
            self.generation = generation;
        }

        let mut used = HashSet::new();
        for item in plan_items(plan) {
            let key = buffer_key(&item.geometry);
            used.insert(key);
            if !self.gpu.contains_key(&key) {
                match upload(gl, &item.geometry) {
                    Ok(g) => {
                        self.gpu.insert(key, g);
                    }
                    Err(e) => tracing::error!("Failed to upload geometry for '{}': {e}", item.path),
                }
            }
        }

        let stale: Vec<usize> = self.gpu.keys().filter(|k| !used.contains(k)).copied().collect();
        for key in stale {
            if let Some(g) = self.gpu.remove(&key) {
                unsafe { g.delete(gl) };
            }
        }
    }

    /// Render the plan
    pub fn paint(&mut self, gl: &glow::Context, camera: &ArcBallCamera, params: &RenderParams, plan: &FramePlan) {
        self.sync(gl, plan, params.generation);

        let aspect = params.viewport[2] / params.viewport[3];
        let vp = camera.view_projection(aspect);
        let eye = camera.eye_position();

        unsafe {
            gl.viewport(
                params.viewport[0] as i32,
                params.viewport[1] as i32,
                params.viewport[2] as i32,
                params.viewport[3] as i32,
            );
            gl.scissor(
                params.viewport[0] as i32,
                params.viewport[1] as i32,
                params.viewport[2] as i32,
                params.viewport[3] as i32,
            );
            gl.enable(glow::SCISSOR_TEST);

            gl.clear_color(
                params.bg_color[0] as f32 / 255.0,
                params.bg_color[1] as f32 / 255.0,
                params.bg_color[2] as f32 / 255.0,
                1.0,
            );
            gl.clear_stencil(0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT | glow::STENCIL_BUFFER_BIT);
            gl.enable(glow::PROGRAM_POINT_SIZE);
            gl.depth_func(glow::LEQUAL);

            for pass in &plan.passes {
                match pass {
                    Pass::Opaque(items) | Pass::Transparent(items) => {
                        for item in items {
                            self.draw(gl, item, &vp, eye);
                        }
                    }
                    Pass::Stencil { items, .. } => {
                        for item in items {
                            self.draw(gl, item, &vp, eye);
                        }
                    }
                    Pass::ClearStencil => gl.clear(glow::STENCIL_BUFFER_BIT),
                    Pass::Present => {}
                }
            }

            // Restore state egui expects
            gl.disable(glow::STENCIL_TEST);
            gl.disable(glow::DEPTH_TEST);
            gl.disable(glow::CULL_FACE);
            gl.disable(glow::POLYGON_OFFSET_FILL);
            gl.disable(glow::BLEND);
            gl.depth_mask(true);
            gl.color_mask(true, true, true, true);
            gl.disable(glow::SCISSOR_TEST);
            gl.use_program(None);
        }
    }

    unsafe fn draw(&self, gl: &glow::Context, item: &DrawItem, vp: &glam::Mat4, eye: glam::Vec3) {
        let Some(gpu) = self.gpu.get(&buffer_key(&item.geometry)) else {
            return;
        };
        let m = &item.material;
        apply_material_state(gl, m);

        let program = match gpu {
            GpuGeometry::Triangles { .. } => self.mesh_program,
            _ => self.flat_program,
        };
        gl.use_program(Some(program));
        let model = glam::Mat4::from(item.transform);
        set_uniform_mat4(gl, program, "u_mvp", &(*vp * model));
        set_uniform_mat4(gl, program, "u_model", &model);
        let [r, g, b] = m.color.rgb_f32();
        set_uniform_vec4(gl, program, "u_color", [r, g, b, m.opacity]);
        set_clip_uniforms(gl, program, item, m.clip_intersection);

        match gpu {
            GpuGeometry::Triangles { vao, index_count, .. } => {
                let light_dir = glam::Vec3::new(0.3, 0.8, 0.5).normalize();
                set_uniform_vec3(gl, program, "u_light_dir", &light_dir);
                set_uniform_vec3(gl, program, "u_eye", &eye);
                set_uniform_f32(gl, program, "u_metalness", m.metalness);
                set_uniform_f32(gl, program, "u_roughness", m.roughness);
                gl.bind_vertex_array(Some(*vao));
                gl.draw_elements(glow::TRIANGLES, *index_count, glow::UNSIGNED_INT, 0);
            }
            GpuGeometry::Lines { vao, vertex_count, has_colors, .. } => {
                set_uniform_i32(gl, program, "u_vertex_colors", (m.vertex_colors && *has_colors) as i32);
                gl.line_width(m.line_width);
                gl.bind_vertex_array(Some(*vao));
                gl.draw_arrays(glow::LINES, 0, *vertex_count);
                gl.line_width(1.0);
            }
            GpuGeometry::Points { vao, vertex_count, .. } => {
                set_uniform_i32(gl, program, "u_vertex_colors", 0);
                set_uniform_f32(gl, program, "u_point_size", m.point_size);
                gl.bind_vertex_array(Some(*vao));
                gl.draw_arrays(glow::POINTS, 0, *vertex_count);
            }
        }
        gl.bind_vertex_array(None);
    }

    pub fn destroy(&mut self, gl: &glow::Context) {
        unsafe {
            gl.delete_program(self.mesh_program);
            gl.delete_program(self.flat_program);
            for (_, g) in self.gpu.drain() {
                g.delete(gl);
            }
        }
    }
}

fn plan_items(plan: &FramePlan) -> impl Iterator<Item = &DrawItem> {
    plan.passes.iter().flat_map(|p| match p {
        Pass::Opaque(items) | Pass::Transparent(items) => items.as_slice(),
        Pass::Stencil { items, .. } => items.as_slice(),
        Pass::ClearStencil | Pass::Present => &[][..],
    })
}

// ── Material state ───────────────────────────────────────────

unsafe fn apply_material_state(gl: &glow::Context, m: &Material) {
    if m.depth_test {
        gl.enable(glow::DEPTH_TEST);
    } else {
        gl.disable(glow::DEPTH_TEST);
    }
    gl.depth_mask(m.depth_write);
    gl.color_mask(m.color_write, m.color_write, m.color_write, m.color_write);

    match m.side {
        Side::Front => {
            gl.enable(glow::CULL_FACE);
            gl.cull_face(glow::BACK);
        }
        Side::Back => {
            gl.enable(glow::CULL_FACE);
            gl.cull_face(glow::FRONT);
        }
        Side::Double => gl.disable(glow::CULL_FACE),
    }

    if m.transparent {
        gl.enable(glow::BLEND);
        gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
    } else {
        gl.disable(glow::BLEND);
    }

    match m.polygon_offset {
        Some((factor, units)) => {
            gl.enable(glow::POLYGON_OFFSET_FILL);
            gl.polygon_offset(factor, units);
        }
        None => gl.disable(glow::POLYGON_OFFSET_FILL),
    }

    match m.stencil {
        Some(s) => {
            gl.enable(glow::STENCIL_TEST);
            gl.stencil_mask(0xff);
            gl.stencil_func(compare_func(s.func), s.reference, s.mask);
            gl.stencil_op(stencil_op(s.fail), stencil_op(s.depth_fail), stencil_op(s.pass));
        }
        None => gl.disable(glow::STENCIL_TEST),
    }
}

fn compare_func(f: CompareFunc) -> u32 {
    match f {
        CompareFunc::Always => glow::ALWAYS,
        CompareFunc::Never => glow::NEVER,
        CompareFunc::Equal => glow::EQUAL,
        CompareFunc::NotEqual => glow::NOTEQUAL,
        CompareFunc::Less => glow::LESS,
        CompareFunc::LessEqual => glow::LEQUAL,
        CompareFunc::Greater => glow::GREATER,
        CompareFunc::GreaterEqual => glow::GEQUAL,
    }
}

fn stencil_op(op: StencilOp) -> u32 {
    match op {
        StencilOp::Keep => glow::KEEP,
        StencilOp::Zero => glow::ZERO,
        StencilOp::Replace => glow::REPLACE,
        StencilOp::IncrementWrap => glow::INCR_WRAP,
        StencilOp::DecrementWrap => glow::DECR_WRAP,
    }
}

// ── GPU upload ───────────────────────────────────────────────

unsafe fn upload_f32(gl: &glow::Context, location: u32, components: i32, data: &[f32]) -> Result<glow::Buffer, String> {
    let vbo = gl.create_buffer()?;
    gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
    gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, cast_slice(data), glow::STATIC_DRAW);
    gl.enable_vertex_attrib_array(location);
    gl.vertex_attrib_pointer_f32(location, components, glow::FLOAT, false, components * 4, 0);
    Ok(vbo)
}

fn upload(gl: &glow::Context, geometry: &Geometry) -> Result<GpuGeometry, String> {
    unsafe {
        let vao = gl.create_vertex_array()?;
        gl.bind_vertex_array(Some(vao));
        let gpu = match geometry {
            Geometry::Triangles(mesh) => {
                let positions = upload_f32(gl, 0, 3, &mesh.positions)?;
                let normals = upload_f32(gl, 1, 3, &mesh.normals)?;
                let ibo = gl.create_buffer()?;
                gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ibo));
                gl.buffer_data_u8_slice(glow::ELEMENT_ARRAY_BUFFER, cast_slice(&mesh.indices), glow::STATIC_DRAW);
                GpuGeometry::Triangles {
                    vao,
                    buffers: vec![positions, normals, ibo],
                    index_count: mesh.indices.len() as i32,
                }
            }
            Geometry::Lines(lines) => {
                let mut buffers = vec![upload_f32(gl, 0, 3, &lines.positions)?];
                if let Some(colors) = &lines.colors {
                    buffers.push(upload_f32(gl, 2, 3, colors)?);
                }
                GpuGeometry::Lines {
                    vao,
                    buffers,
                    vertex_count: (lines.positions.len() / 3) as i32,
                    has_colors: lines.colors.is_some(),
                }
            }
            Geometry::Points(points) => GpuGeometry::Points {
                vao,
                buffers: vec![upload_f32(gl, 0, 3, &points.positions)?],
                vertex_count: (points.positions.len() / 3) as i32,
            },
        };
        gl.bind_vertex_array(None);
        Ok(gpu)
    }
}

// ── Shader compilation ───────────────────────────────────────

fn compile_program(gl: &glow::Context, vert_src: &str, frag_src: &str) -> Option<glow::Program> {
    unsafe {
        let program = match gl.create_program() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("Failed to create program: {e}");
                return None;
            }
        };

        let mut shaders = Vec::new();
        for (kind, src, label) in [
            (glow::VERTEX_SHADER, vert_src, "Vertex"),
            (glow::FRAGMENT_SHADER, frag_src, "Fragment"),
        ] {
            let shader = match gl.create_shader(kind) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to create {label} shader: {e}");
                    return None;
                }
            };
            gl.shader_source(shader, src);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                tracing::error!("{label} shader error: {log}");
            }
            gl.attach_shader(program, shader);
            shaders.push(shader);
        }

        gl.link_program(program);
        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            tracing::error!("Program link error: {log}");
        }
        for shader in shaders {
            gl.delete_shader(shader);
        }
        Some(program)
    }
}

// ── Uniform setters ──────────────────────────────────────────

unsafe fn set_clip_uniforms(gl: &glow::Context, program: glow::Program, item: &DrawItem, intersection: bool) {
    let count = item.clip_planes.len().min(MAX_CLIP_PLANES);
    let mut flat = [0.0_f32; MAX_CLIP_PLANES * 4];
    for (i, p) in item.clip_planes.iter().take(count).enumerate() {
        flat[i * 4..i * 4 + 4].copy_from_slice(&p.to_array());
    }
    let loc = gl.get_uniform_location(program, "u_clip_planes");
    gl.uniform_4_f32_slice(loc.as_ref(), &flat);
    set_uniform_i32(gl, program, "u_clip_count", count as i32);
    set_uniform_i32(gl, program, "u_clip_intersection", intersection as i32);
}

unsafe fn set_uniform_mat4(gl: &glow::Context, program: glow::Program, name: &str, mat: &glam::Mat4) {
    let loc = gl.get_uniform_location(program, name);
    gl.uniform_matrix_4_f32_slice(loc.as_ref(), false, &mat.to_cols_array());
}

unsafe fn set_uniform_vec3(gl: &glow::Context, program: glow::Program, name: &str, v: &glam::Vec3) {
    let loc = gl.get_uniform_location(program, name);
    gl.uniform_3_f32(loc.as_ref(), v.x, v.y, v.z);
}

unsafe fn set_uniform_vec4(gl: &glow::Context, program: glow::Program, name: &str, v: [f32; 4]) {
    let loc = gl.get_uniform_location(program, name);
    gl.uniform_4_f32(loc.as_ref(), v[0], v[1], v[2], v[3]);
}

unsafe fn set_uniform_f32(gl: &glow::Context, program: glow::Program, name: &str, v: f32) {
    let loc = gl.get_uniform_location(program, name);
    gl.uniform_1_f32(loc.as_ref(), v);
}

unsafe fn set_uniform_i32(gl: &glow::Context, program: glow::Program, name: &str, v: i32) {
    let loc = gl.get_uniform_location(program, name);
    gl.uniform_1_i32(loc.as_ref(), v);
}

// ── Byte cast helper ─────────────────────────────────────────

fn cast_slice<T: Copy>(slice: &[T]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, std::mem::size_of_val(slice)) }
}

// ── Shaders ──────────────────────────────────────────────────

const MESH_VERT: &str = r#"#version 330 core
uniform mat4 u_mvp;
uniform mat4 u_model;

layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;

out vec3 v_normal;
out vec3 v_world;

void main() {
    vec4 world = u_model * vec4(a_position, 1.0);
    gl_Position = u_mvp * vec4(a_position, 1.0);
    v_normal = mat3(u_model) * a_normal;
    v_world = world.xyz;
}
"#;

const MESH_FRAG: &str = r#"#version 330 core
uniform vec4 u_color;
uniform vec3 u_light_dir;
uniform vec3 u_eye;
uniform float u_metalness;
uniform float u_roughness;

in vec3 v_normal;
in vec3 v_world;

out vec4 frag_color;

uniform vec4 u_clip_planes[3];
uniform int u_clip_count;
uniform int u_clip_intersection;

bool clipped(vec3 p) {
    if (u_clip_count == 0) return false;
    int outside = 0;
    for (int i = 0; i < u_clip_count; i++) {
        if (dot(u_clip_planes[i].xyz, p) + u_clip_planes[i].w < 0.0) outside++;
    }
    return u_clip_intersection == 1 ? outside == u_clip_count : outside > 0;
}

void main() {
    if (clipped(v_world)) discard;
    vec3 n = normalize(v_normal);
    if (!gl_FrontFacing) n = -n;
    vec3 v = normalize(u_eye - v_world);
    vec3 h = normalize(u_light_dir + v);
    float diffuse = max(dot(n, u_light_dir), 0.0);
    float shininess = mix(64.0, 4.0, u_roughness);
    float specular = pow(max(dot(n, h), 0.0), shininess) * (1.0 - u_roughness);
    vec3 base = u_color.rgb * (1.0 - 0.5 * u_metalness);
    vec3 lit = base * (0.3 + 0.7 * diffuse) + vec3(specular) * mix(0.04, 0.5, u_metalness);
    frag_color = vec4(lit, u_color.a);
}
"#;

const FLAT_VERT: &str = r#"#version 330 core
uniform mat4 u_mvp;
uniform mat4 u_model;
uniform float u_point_size;

layout(location = 0) in vec3 a_position;
layout(location = 2) in vec3 a_color;

out vec3 v_color;
out vec3 v_world;

void main() {
    gl_Position = u_mvp * vec4(a_position, 1.0);
    gl_PointSize = u_point_size;
    v_color = a_color;
    v_world = (u_model * vec4(a_position, 1.0)).xyz;
}
"#;

const FLAT_FRAG: &str = r#"#version 330 core
uniform vec4 u_color;
uniform int u_vertex_colors;

in vec3 v_color;
in vec3 v_world;

out vec4 frag_color;

uniform vec4 u_clip_planes[3];
uniform int u_clip_count;
uniform int u_clip_intersection;

bool clipped(vec3 p) {
    if (u_clip_count == 0) return false;
    int outside = 0;
    for (int i = 0; i < u_clip_count; i++) {
        if (dot(u_clip_planes[i].xyz, p) + u_clip_planes[i].w < 0.0) outside++;
    }
    return u_clip_intersection == 1 ? outside == u_clip_count : outside > 0;
}

void main() {
    if (clipped(v_world)) discard;
    vec3 rgb = u_vertex_colors == 1 ? v_color : u_color.rgb;
    frag_color = vec4(rgb, u_color.a);
}
"#;
