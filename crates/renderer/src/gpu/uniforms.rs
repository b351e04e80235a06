use bytemuck::{Pod, Zeroable};

use crate::types::FrameParams;

/// CPU copy of the `InkParams` std140 block.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct InkUniforms {
    pub resolution: [f32; 4],
    pub time: f32,
    pub slider: f32,
    pub mode: i32,
    pub progress: f32,
}

unsafe impl Zeroable for InkUniforms {}
unsafe impl Pod for InkUniforms {}

impl InkUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            resolution: [width as f32, height as f32, 0.0, 0.0],
            time: 0.0,
            slider: 0.5,
            mode: 0,
            progress: 0.0,
        }
    }

    pub fn apply(&mut self, params: &FrameParams) {
        let (width, height) = params.resolution;
        self.resolution[0] = width as f32;
        self.resolution[1] = height as f32;
        self.time = params.time;
        self.slider = params.slider;
        self.mode = params.mode.flag();
        self.progress = params.progress;
    }
}
