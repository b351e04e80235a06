//! CPU evaluation of the comparison program.
//!
//! Each function here matches its counterpart in the GLSL source in
//! `compile.rs`. Textures are sampled bilinearly with clamp-to-edge
//! addressing, the same as the GPU sampler, and an empty slot reads as
//! transparent black. Used for still-frame export and for checking the
//! visual modes without a GPU.

use image::{Rgba, RgbaImage};

use crate::types::{FrameParams, ShaderMode};

pub type Color = [f32; 4];

const INK: Color = [0.05, 0.05, 0.05, 1.0];
const WAVEFRONT: Color = [0.8, 0.9, 1.0, 0.0];
const SPLIT_CORE: Color = [0.9, 1.0, 1.0, 1.0];
const SPLIT_GLOW: Color = [0.4, 0.8, 1.0, 1.0];

fn fract(x: f32) -> f32 {
    x - x.floor()
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

fn mix_color(a: Color, b: Color, t: f32) -> Color {
    [
        mix(a[0], b[0], t),
        mix(a[1], b[1], t),
        mix(a[2], b[2], t),
        mix(a[3], b[3], t),
    ]
}

fn add_scaled(mut color: Color, other: Color, scale: f32) -> Color {
    for (channel, value) in color.iter_mut().zip(other) {
        *channel += value * scale;
    }
    color
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// GLSL `step(edge, x)`.
pub fn step(edge: f32, x: f32) -> f32 {
    if x < edge {
        0.0
    } else {
        1.0
    }
}

pub fn hash(p: [f32; 2]) -> f32 {
    fract((p[0] * 12.9898 + p[1] * 78.233).sin() * 43758.5453)
}

/// Smooth value noise in `[0, 1)`.
pub fn noise(p: [f32; 2]) -> f32 {
    let i = [p[0].floor(), p[1].floor()];
    let f = [fract(p[0]), fract(p[1])];
    let u = [f[0] * f[0] * (3.0 - 2.0 * f[0]), f[1] * f[1] * (3.0 - 2.0 * f[1])];
    let a = hash(i);
    let b = hash([i[0] + 1.0, i[1]]);
    let c = hash([i[0], i[1] + 1.0]);
    let d = hash([i[0] + 1.0, i[1] + 1.0]);
    mix(mix(a, b, u[0]), mix(c, d, u[0]), u[1])
}

/// Fractal noise; each octave rotates by 0.5 rad, doubles and shifts by 100.
pub fn fbm(mut p: [f32; 2], octaves: u32) -> f32 {
    let (sin, cos) = 0.5f32.sin_cos();
    let mut value = 0.0;
    let mut amplitude = 0.5;
    for _ in 0..octaves {
        value += amplitude * noise(p);
        p = [
            (cos * p[0] - sin * p[1]) * 2.0 + 100.0,
            (sin * p[0] + cos * p[1]) * 2.0 + 100.0,
        ];
        amplitude *= 0.5;
    }
    value
}

/// Bilinear, clamp-to-edge lookup. `None` is an unbound slot.
pub fn sample(texture: Option<&RgbaImage>, uv: [f32; 2]) -> Color {
    let Some(texture) = texture else {
        return [0.0; 4];
    };
    let (width, height) = texture.dimensions();
    if width == 0 || height == 0 {
        return [0.0; 4];
    }
    let x = (uv[0].clamp(0.0, 1.0) * width as f32 - 0.5).max(0.0);
    let y = (uv[1].clamp(0.0, 1.0) * height as f32 - 0.5).max(0.0);
    let x0 = (x.floor() as u32).min(width - 1);
    let y0 = (y.floor() as u32).min(height - 1);
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let tx = x - x0 as f32;
    let ty = y - y0 as f32;

    let texel = |x: u32, y: u32| -> Color {
        let Rgba(raw) = *texture.get_pixel(x, y);
        raw.map(|c| c as f32 / 255.0)
    };
    let top = mix_color(texel(x0, y0), texel(x1, y0), tx);
    let bottom = mix_color(texel(x0, y1), texel(x1, y1), tx);
    mix_color(top, bottom, ty)
}

/// Mode 0. Only the old image is read and alpha is always 1.
pub fn breathing(uv: [f32; 2], params: &FrameParams, old: Option<&RgbaImage>) -> Color {
    let t = params.time * 0.8;
    let fog = fbm([uv[0] * 3.0 + t * 0.2, uv[1] * 3.0 + t * 0.1], 5);
    let breath = (params.time * 2.0).sin() * 0.1 + 0.9;
    let ink_mask = smoothstep(0.3, 0.7, fog * breath);

    let jitter = noise([uv[0] * 20.0 + params.time, uv[1] * 20.0 + params.time]) * 0.005;
    let mut blurred = sample(old, [uv[0] + jitter, uv[1] + jitter]);
    let grain = hash([uv[0] * params.time * 10.0, uv[1] * params.time * 10.0]) * 0.08;
    for channel in &mut blurred[..3] {
        *channel += grain;
    }

    let mut color = mix_color(blurred, INK, ink_mask * 0.6);
    color[3] = 1.0;
    color
}

/// Mask of the crystallization wavefront: 1 shows old, 0 shows new.
pub fn crystal_mask(uv: [f32; 2], progress: f32) -> f32 {
    let n = fbm([uv[0] * 4.0, uv[1] * 4.0], 4);
    let limit = progress * 1.5 - 0.25;
    smoothstep(limit - 0.1, limit + 0.1, n + uv[1] * 0.2)
}

/// Mode 1. The highlight is additive and left unclamped.
pub fn crystallizing(
    uv: [f32; 2],
    params: &FrameParams,
    old: Option<&RgbaImage>,
    new: Option<&RgbaImage>,
) -> Color {
    let mask = crystal_mask(uv, params.progress);
    let reveal = 1.0 - mask;
    let edge = smoothstep(0.8, 1.0, 1.0 - (mask - 0.5).abs() * 2.0);
    let color = mix_color(sample(old, uv), sample(new, uv), reveal);
    add_scaled(color, WAVEFRONT, edge * 0.5)
}

/// Horizontal jitter of the split edge at `uv`.
pub fn split_jitter(uv: [f32; 2]) -> f32 {
    noise([uv[0] * 10.0, uv[1] * 10.0]) * 0.03
}

/// 1 on the old side of the split, 0 on the new side. Equality is old.
pub fn split_mask(x: f32, split: f32) -> f32 {
    step(x, split)
}

/// Desaturated, cool-tinted and grainy: the "before" look.
pub fn style_old(color: Color, uv: [f32; 2], time: f32) -> Color {
    let gray = color[0] * 0.299 + color[1] * 0.587 + color[2] * 0.114;
    let tint = [gray * 0.8, gray * 0.9, gray + 0.1];
    let grain = hash([uv[0] * time * 10.0, uv[1] * time * 10.0]) * 0.05;
    [
        mix(color[0], tint[0], 0.2) + grain,
        mix(color[1], tint[1], 0.2) + grain,
        mix(color[2], tint[2], 0.2) + grain,
        color[3],
    ]
}

/// Contrast and brightness boost: the "after" look.
pub fn style_new(color: Color) -> Color {
    let boost = |c: f32| ((c - 0.5) * 1.1 + 0.5) * 1.05;
    [boost(color[0]), boost(color[1]), boost(color[2]), color[3]]
}

/// Mode 2.
pub fn interactive(
    uv: [f32; 2],
    params: &FrameParams,
    old: Option<&RgbaImage>,
    new: Option<&RgbaImage>,
) -> Color {
    let x = uv[0] + split_jitter(uv);
    let mask = split_mask(x, params.slider);
    let old_color = style_old(sample(old, uv), uv, params.time);
    let new_color = style_new(sample(new, uv));
    let color = mix_color(new_color, old_color, mask);

    let dist = (x - params.slider).abs();
    let color = add_scaled(color, SPLIT_CORE, smoothstep(0.005, 0.0, dist));
    add_scaled(color, SPLIT_GLOW, smoothstep(0.06, 0.0, dist) * 0.5)
}

/// Evaluates the program at one uv, before output clamping.
pub fn shade(
    uv: [f32; 2],
    params: &FrameParams,
    old: Option<&RgbaImage>,
    new: Option<&RgbaImage>,
) -> Color {
    match params.mode {
        ShaderMode::Breathing => breathing(uv, params, old),
        ShaderMode::Crystallizing => crystallizing(uv, params, old, new),
        ShaderMode::Interactive => interactive(uv, params, old, new),
    }
}

/// Renders a full frame at `params.resolution`, sampling pixel centres and
/// clamping to the 8-bit output range like a unorm render target.
pub fn render_frame(
    params: &FrameParams,
    old: Option<&RgbaImage>,
    new: Option<&RgbaImage>,
) -> RgbaImage {
    let (width, height) = params.resolution;
    RgbaImage::from_fn(width, height, |x, y| {
        let uv = [
            (x as f32 + 0.5) / width as f32,
            (y as f32 + 0.5) / height as f32,
        ];
        let color = shade(uv, params, old, new);
        Rgba(color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::TransitionProgress;
    use crate::types::RenderState;

    fn gradient(width: u32, height: u32, alpha: u8) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
                alpha,
            ])
        })
    }

    fn solid(color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(4, 4, Rgba(color))
    }

    #[test]
    fn noise_stays_in_unit_range() {
        for i in 0..200 {
            let p = [i as f32 * 0.37, i as f32 * 0.11 + 3.0];
            let n = noise(p);
            assert!((0.0..=1.0).contains(&n), "noise {n} at {p:?}");
            let f = fbm(p, 5);
            assert!((0.0..0.97).contains(&f), "fbm {f} at {p:?}");
        }
    }

    #[test]
    fn sampling_clamps_to_edges_and_tolerates_empty_slots() {
        let image = gradient(8, 8, 255);
        assert_eq!(sample(Some(&image), [-1.0, -1.0]), sample(Some(&image), [0.0, 0.0]));
        assert_eq!(sample(Some(&image), [2.0, 2.0]), sample(Some(&image), [1.0, 1.0]));
        assert_eq!(sample(None, [0.5, 0.5]), [0.0; 4]);
    }

    #[test]
    fn breathing_darkens_and_stays_opaque() {
        let old = gradient(16, 16, 90);
        let new = solid([0, 255, 0, 255]);
        let params = FrameParams::still(RenderState::Breathing, 2.0, 0.5, (32, 32));

        let frame = render_frame(&params, Some(&old), Some(&new));
        assert!(frame.pixels().all(|p| p.0[3] == 255));

        let copy = RgbaImage::from_fn(32, 32, |x, y| {
            let uv = [(x as f32 + 0.5) / 32.0, (y as f32 + 0.5) / 32.0];
            Rgba(sample(Some(&old), uv).map(|c| (c * 255.0).round() as u8))
        });
        let differing = frame
            .pixels()
            .zip(copy.pixels())
            .filter(|(a, b)| a.0[..3] != b.0[..3])
            .count();
        assert!(differing > 0);
    }

    #[test]
    fn breathing_never_reads_the_new_slot() {
        let old = gradient(8, 8, 255);
        let params = FrameParams::still(RenderState::Breathing, 1.3, 0.5, (8, 8));
        let with_new = render_frame(&params, Some(&old), Some(&solid([255, 0, 255, 255])));
        let without_new = render_frame(&params, Some(&old), None);
        assert_eq!(with_new, without_new);
    }

    #[test]
    fn idle_runs_the_breathing_branch() {
        let params = FrameParams::still(RenderState::Idle, 0.7, 0.5, (4, 4));
        assert_eq!(params.mode, ShaderMode::Breathing);
        assert_eq!(params.progress, 1.0);
    }

    #[test]
    fn crystallizing_starts_on_old_and_converges_to_new() {
        let old = solid([200, 10, 10, 255]);
        let new = solid([10, 10, 200, 255]);

        let start = FrameParams::still(RenderState::Crystallizing, 0.0, 0.5, (16, 16)).with_progress(0.0);
        let first = render_frame(&start, Some(&old), Some(&new));
        assert!(first.pixels().all(|p| p.0 == [200, 10, 10, 255]));

        let mut progress = TransitionProgress::new(0.015);
        progress.advance(RenderState::Breathing);
        let mut uniform = 0.0;
        for _ in 0..80 {
            uniform = progress.advance(RenderState::Crystallizing);
        }
        assert!((progress.raw() - 1.2).abs() < 1e-3);
        assert_eq!(uniform, 1.0);

        let end = FrameParams::still(RenderState::Crystallizing, 0.0, 0.5, (16, 16)).with_progress(uniform);
        let last = render_frame(&end, Some(&old), Some(&new));
        assert!(last.pixels().all(|p| p.0 == [10, 10, 200, 255]));
    }

    #[test]
    fn wavefront_adds_highlight_midway() {
        let old = solid([0, 0, 0, 255]);
        let new = solid([0, 0, 0, 255]);
        let params = FrameParams::still(RenderState::Crystallizing, 0.0, 0.5, (64, 64)).with_progress(0.5);
        let frame = render_frame(&params, Some(&old), Some(&new));
        assert!(frame.pixels().any(|p| p.0[2] > 0));
    }

    #[test]
    fn split_ties_go_to_the_old_side() {
        assert_eq!(split_mask(0.5, 0.5), 1.0);
        assert_eq!(split_mask(0.49, 0.5), 1.0);
        assert_eq!(split_mask(0.51, 0.5), 0.0);

        // The noise lattice is zero at the origin, so there is no jitter.
        assert_eq!(split_jitter([0.0, 0.0]), 0.0);
        let old = solid([255, 0, 0, 255]);
        let new = solid([0, 0, 255, 255]);
        let params = FrameParams::still(RenderState::Interactive, 1.0, 0.0, (4, 4));
        let at_split = interactive([0.0, 0.0], &params, Some(&old), Some(&new));
        let expected = style_old(sample(Some(&old), [0.0, 0.0]), [0.0, 0.0], 1.0);
        // Old styling plus the full core line and half the glow.
        assert!((at_split[0] - (expected[0] + 0.9 + 0.2)).abs() < 1e-5);
    }

    #[test]
    fn interactive_shows_old_left_and_new_right() {
        let old = solid([255, 0, 0, 255]);
        let new = solid([0, 0, 255, 255]);
        let params = FrameParams::still(RenderState::Interactive, 3.0, 0.5, (4, 4));

        let left = shade([0.1, 0.5], &params, Some(&old), Some(&new));
        let right = shade([0.9, 0.5], &params, Some(&old), Some(&new));

        // Red desaturated 20% toward a cool gray, plus at most 0.05 grain.
        assert!(left[0] > 0.84 && left[0] < 0.9, "left {left:?}");
        assert!(left[2] > 0.07 && left[2] < 0.13, "left {left:?}");
        // Blue with contrast and brightness boost.
        assert!((right[2] - 1.1025).abs() < 1e-5, "right {right:?}");
        assert!((right[0] + 0.0525).abs() < 1e-5, "right {right:?}");
    }
}
