//! Tracks the host window's logical size and pixel density and decides when
//! the drawing surface actually needs to be reallocated.

use winit::dpi::{LogicalSize, PhysicalSize};

/// Computes drawing-surface dimensions from container size × pixel density.
///
/// Observations are cheap; the sizer only reports a new size when the
/// effective pixel dimensions change, and it never reports a zero-area size.
#[derive(Debug, Clone)]
pub struct ViewportSizer {
    container: LogicalSize<f64>,
    scale_factor: f64,
    current: Option<PhysicalSize<u32>>,
    pending: Option<PhysicalSize<u32>>,
}

impl ViewportSizer {
    pub fn new(container: LogicalSize<f64>, scale_factor: f64) -> Self {
        let mut sizer = Self {
            container,
            scale_factor: sanitize_scale(scale_factor),
            current: None,
            pending: None,
        };
        sizer.recompute();
        sizer
    }

    /// Host container changed size (window `Resized`).
    pub fn observe_container(&mut self, container: LogicalSize<f64>) -> bool {
        self.container = container;
        self.recompute()
    }

    /// Display density changed (window `ScaleFactorChanged`).
    pub fn observe_scale_factor(&mut self, scale_factor: f64) -> bool {
        self.scale_factor = sanitize_scale(scale_factor);
        self.recompute()
    }

    /// Physical size notification. The window already reports device pixels,
    /// so the size is taken as is; the container is kept in step for later
    /// density changes.
    pub fn observe_physical(&mut self, physical: PhysicalSize<u32>) -> bool {
        self.container = physical.to_logical::<f64>(self.scale_factor);
        if physical.width == 0 || physical.height == 0 {
            tracing::trace!(
                width = physical.width,
                height = physical.height,
                "ignoring zero-sized surface"
            );
            return false;
        }
        self.apply(physical)
    }

    /// Size to allocate on the next frame, if any. Clears the pending flag.
    pub fn take_pending(&mut self) -> Option<PhysicalSize<u32>> {
        self.pending.take()
    }

    /// Size the surface was last (or is about to be) allocated at.
    pub fn current(&self) -> Option<PhysicalSize<u32>> {
        self.current
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn container(&self) -> LogicalSize<f64> {
        self.container
    }

    fn recompute(&mut self) -> bool {
        let Some(target) = pixel_size(self.container, self.scale_factor) else {
            tracing::trace!(
                width = self.container.width,
                height = self.container.height,
                "ignoring zero-sized container"
            );
            return false;
        };
        self.apply(target)
    }

    fn apply(&mut self, target: PhysicalSize<u32>) -> bool {
        if self.current == Some(target) {
            return false;
        }
        self.current = Some(target);
        self.pending = Some(target);
        true
    }
}

/// `floor(logical × density)` per axis; `None` when either axis is empty.
pub fn pixel_size(container: LogicalSize<f64>, scale_factor: f64) -> Option<PhysicalSize<u32>> {
    let scale = sanitize_scale(scale_factor);
    let width = (container.width.max(0.0) * scale).floor();
    let height = (container.height.max(0.0) * scale).floor();
    if width < 1.0 || height < 1.0 {
        return None;
    }
    Some(PhysicalSize::new(
        width.min(u32::MAX as f64) as u32,
        height.min(u32::MAX as f64) as u32,
    ))
}

fn sanitize_scale(scale_factor: f64) -> f64 {
    if scale_factor.is_finite() && scale_factor > 0.0 {
        scale_factor
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_pixel_density() {
        let mut sizer = ViewportSizer::new(LogicalSize::new(400.0, 300.0), 2.0);
        assert_eq!(sizer.take_pending(), Some(PhysicalSize::new(800, 600)));
        assert_eq!(sizer.take_pending(), None);
    }

    #[test]
    fn fractional_sizes_floor() {
        assert_eq!(
            pixel_size(LogicalSize::new(333.3, 100.9), 1.5),
            Some(PhysicalSize::new(499, 151))
        );
    }

    #[test]
    fn identical_notifications_do_not_reallocate() {
        let mut sizer = ViewportSizer::new(LogicalSize::new(640.0, 480.0), 1.0);
        sizer.take_pending();
        for _ in 0..5 {
            assert!(!sizer.observe_container(LogicalSize::new(640.0, 480.0)));
            assert!(!sizer.observe_physical(PhysicalSize::new(640, 480)));
        }
        assert_eq!(sizer.take_pending(), None);
    }

    #[test]
    fn same_effective_pixels_from_different_inputs_are_stable() {
        let mut sizer = ViewportSizer::new(LogicalSize::new(500.0, 500.0), 2.0);
        sizer.take_pending();
        // 1000 px either way.
        sizer.observe_scale_factor(1.0);
        assert!(sizer.take_pending().is_some());
        assert!(!sizer.observe_container(LogicalSize::new(1000.4, 1000.2)));
        assert_eq!(sizer.take_pending(), None);
    }

    #[test]
    fn zero_sized_container_is_ignored() {
        let mut sizer = ViewportSizer::new(LogicalSize::new(640.0, 480.0), 1.0);
        sizer.take_pending();
        assert!(!sizer.observe_container(LogicalSize::new(0.0, 480.0)));
        assert_eq!(sizer.current(), Some(PhysicalSize::new(640, 480)));
        assert_eq!(sizer.take_pending(), None);
    }

    #[test]
    fn starts_without_size_for_empty_container() {
        let mut sizer = ViewportSizer::new(LogicalSize::new(0.0, 0.0), 1.0);
        assert_eq!(sizer.current(), None);
        assert!(sizer.observe_container(LogicalSize::new(10.0, 10.0)));
        assert_eq!(sizer.take_pending(), Some(PhysicalSize::new(10, 10)));
    }

    #[test]
    fn physical_sizes_are_used_exactly_at_fractional_density() {
        for (scale, px) in [(1.75, 230), (1.75, 61), (1.1, 29)] {
            let mut sizer = ViewportSizer::new(LogicalSize::new(10.0, 10.0), scale);
            sizer.take_pending();
            assert!(sizer.observe_physical(PhysicalSize::new(px, px)));
            assert_eq!(sizer.take_pending(), Some(PhysicalSize::new(px, px)), "scale {scale}");
        }
    }

    #[test]
    fn density_change_after_physical_resize_uses_tracked_container() {
        let mut sizer = ViewportSizer::new(LogicalSize::new(100.0, 100.0), 1.0);
        sizer.observe_physical(PhysicalSize::new(300, 200));
        sizer.take_pending();
        assert!(sizer.observe_scale_factor(2.0));
        assert_eq!(sizer.take_pending(), Some(PhysicalSize::new(600, 400)));
        assert!(!sizer.observe_physical(PhysicalSize::new(0, 400)));
        assert_eq!(sizer.current(), Some(PhysicalSize::new(600, 400)));
    }

    #[test]
    fn invalid_scale_falls_back_to_one() {
        let sizer = ViewportSizer::new(LogicalSize::new(10.0, 20.0), f64::NAN);
        assert_eq!(sizer.current(), Some(PhysicalSize::new(10, 20)));
    }
}
