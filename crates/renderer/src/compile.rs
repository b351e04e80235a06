use std::borrow::Cow;

use thiserror::Error;
use wgpu::naga;
use wgpu::naga::ShaderStage;

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to parse {stage} shader:\n{diagnostics}")]
    Parse {
        stage: &'static str,
        diagnostics: String,
    },
    #[error("{stage} shader failed validation:\n{diagnostics}")]
    Validate {
        stage: &'static str,
        diagnostics: String,
    },
    #[error("device rejected the {stage} shader module: {message}")]
    Device {
        stage: &'static str,
        message: String,
    },
    #[error("device rejected the render pipeline: {message}")]
    Link { message: String },
}

/// The two compiled stages of the comparison program.
pub(crate) struct ShaderModules {
    pub vertex: wgpu::ShaderModule,
    pub fragment: wgpu::ShaderModule,
}

fn stage_name(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vertex",
        ShaderStage::Fragment => "fragment",
        _ => "compute",
    }
}

/// Parses and validates one stage on the CPU.
fn validate_stage(source: &str, stage: ShaderStage) -> Result<naga::Module, ShaderError> {
    let mut frontend = naga::front::glsl::Frontend::default();
    let module = frontend
        .parse(&naga::front::glsl::Options::from(stage), source)
        .map_err(|errors| ShaderError::Parse {
            stage: stage_name(stage),
            diagnostics: errors.emit_to_string(source),
        })?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|error| ShaderError::Validate {
        stage: stage_name(stage),
        diagnostics: error.emit_to_string(source),
    })?;
    Ok(module)
}

/// Checks both stages without touching a device.
pub fn validate_program() -> Result<(), ShaderError> {
    validate_stage(VERTEX_SHADER_GLSL, ShaderStage::Vertex)?;
    validate_stage(FRAGMENT_SHADER_GLSL, ShaderStage::Fragment)?;
    Ok(())
}

/// Validates, then creates both GPU modules inside a validation error scope.
pub(crate) fn compile_program(device: &wgpu::Device) -> Result<ShaderModules, ShaderError> {
    validate_program().inspect_err(|error| {
        tracing::error!(%error, "shader program failed validation");
    })?;

    let vertex = create_module(device, VERTEX_SHADER_GLSL, ShaderStage::Vertex)?;
    let fragment = create_module(device, FRAGMENT_SHADER_GLSL, ShaderStage::Fragment)?;
    Ok(ShaderModules { vertex, fragment })
}

fn create_module(
    device: &wgpu::Device,
    source: &'static str,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, ShaderError> {
    let name = stage_name(stage);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(if matches!(stage, ShaderStage::Vertex) {
            "inkcrystal quad vertex"
        } else {
            "inkcrystal fragment"
        }),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(source),
            stage,
            defines: &[],
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        tracing::error!(stage = name, %error, "shader module creation failed");
        return Err(ShaderError::Device {
            stage: name,
            message: error.to_string(),
        });
    }
    Ok(module)
}

/// Unit quad as two triangles. `v_uv.y` runs top to bottom so row 0 of an
/// uploaded image lands at the top of the surface.
pub const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[6] = vec2[6](
    vec2(-1.0, -1.0),
    vec2(1.0, -1.0),
    vec2(-1.0, 1.0),
    vec2(-1.0, 1.0),
    vec2(1.0, -1.0),
    vec2(1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    vec2 uv = pos * 0.5 + vec2(0.5, 0.5);
    v_uv = vec2(uv.x, 1.0 - uv.y);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

/// Three-mode comparison program. The uniform block layout must match
/// `InkUniforms` in `gpu/uniforms.rs`; `shading.rs` mirrors the math on the CPU.
pub const FRAGMENT_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform InkParams {
    vec4 resolution;
    float time;
    float slider;
    int mode;
    float progress;
} ink;

layout(set = 1, binding = 0) uniform texture2D ink_old_texture;
layout(set = 1, binding = 1) uniform sampler ink_old_sampler;
layout(set = 1, binding = 2) uniform texture2D ink_new_texture;
layout(set = 1, binding = 3) uniform sampler ink_new_sampler;

vec4 sample_old(vec2 uv) {
    return texture(sampler2D(ink_old_texture, ink_old_sampler), uv);
}

vec4 sample_new(vec2 uv) {
    return texture(sampler2D(ink_new_texture, ink_new_sampler), uv);
}

float ink_hash(vec2 p) {
    return fract(sin(dot(p, vec2(12.9898, 78.233))) * 43758.5453);
}

float ink_noise(vec2 p) {
    vec2 i = floor(p);
    vec2 f = fract(p);
    f = f * f * (3.0 - 2.0 * f);
    float a = ink_hash(i);
    float b = ink_hash(i + vec2(1.0, 0.0));
    float c = ink_hash(i + vec2(0.0, 1.0));
    float d = ink_hash(i + vec2(1.0, 1.0));
    return mix(mix(a, b, f.x), mix(c, d, f.x), f.y);
}

float ink_fbm(vec2 p, int octaves) {
    float v = 0.0;
    float a = 0.5;
    vec2 shift = vec2(100.0);
    mat2 rot = mat2(cos(0.5), sin(0.5), -sin(0.5), cos(0.5));
    for (int i = 0; i < octaves; ++i) {
        v += a * ink_noise(p);
        p = rot * p * 2.0 + shift;
        a *= 0.5;
    }
    return v;
}

vec4 breathing(vec2 uv) {
    float t = ink.time * 0.8;
    float fog = ink_fbm(uv * 3.0 + vec2(t * 0.2, t * 0.1), 5);
    float breath = sin(ink.time * 2.0) * 0.1 + 0.9;
    float ink_mask = smoothstep(0.3, 0.7, fog * breath);

    float jitter = ink_noise(uv * 20.0 + ink.time);
    vec4 blurred = sample_old(uv + vec2(jitter * 0.005));
    float grain = ink_hash(uv * (ink.time * 10.0)) * 0.08;
    blurred = vec4(blurred.rgb + vec3(grain), blurred.a);

    vec4 color = mix(blurred, vec4(0.05, 0.05, 0.05, 1.0), ink_mask * 0.6);
    return vec4(color.rgb, 1.0);
}

vec4 crystallizing(vec2 uv) {
    float n = ink_fbm(uv * 4.0, 4);
    float limit = ink.progress * 1.5 - 0.25;
    float mask = smoothstep(limit - 0.1, limit + 0.1, n + uv.y * 0.2);
    float reveal = 1.0 - mask;

    float edge = smoothstep(0.8, 1.0, 1.0 - abs(mask - 0.5) * 2.0);
    vec4 color = mix(sample_old(uv), sample_new(uv), reveal);
    return color + vec4(0.8, 0.9, 1.0, 0.0) * edge * 0.5;
}

vec4 interactive(vec2 uv) {
    float n = ink_noise(uv * 10.0) * 0.03;
    float split = ink.slider;
    float mask = step(uv.x + n, split);

    vec4 old_raw = sample_old(uv);
    float gray = dot(old_raw.rgb, vec3(0.299, 0.587, 0.114));
    vec3 old_rgb = mix(old_raw.rgb, vec3(gray * 0.8, gray * 0.9, gray + 0.1), 0.2);
    old_rgb += vec3(ink_hash(uv * ink.time * 10.0) * 0.05);
    vec4 old_color = vec4(old_rgb, old_raw.a);

    vec4 new_raw = sample_new(uv);
    vec3 new_rgb = ((new_raw.rgb - 0.5) * 1.1 + 0.5) * 1.05;
    vec4 new_color = vec4(new_rgb, new_raw.a);

    vec4 color = mix(new_color, old_color, mask);
    float dist = abs((uv.x + n) - split);
    color += vec4(0.9, 1.0, 1.0, 1.0) * smoothstep(0.005, 0.0, dist);
    color += vec4(0.4, 0.8, 1.0, 1.0) * smoothstep(0.06, 0.0, dist) * 0.5;
    return color;
}

void main() {
    if (ink.mode == 0) {
        outColor = breathing(v_uv);
    } else if (ink.mode == 1) {
        outColor = crystallizing(v_uv);
    } else {
        outColor = interactive(v_uv);
    }
}
";
