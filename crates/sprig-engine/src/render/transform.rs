//! Draw arguments and model-matrix composition.

use bitflags::bitflags;
use glam::{Mat4, Vec2};

use super::backend::ProgramHandle;

bitflags! {
    /// Optional transform steps applied to a draw.
    #[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
    pub struct DrawFlags: u8 {
        const SCALED = 1;
        const ROTATED = 2;
        const CENTERED = 4;
    }
}

/// Per-call draw configuration.
///
/// A single instance can be reused across many draws (e.g. every glyph of a
/// string). Scale and rotation only take effect when their flag is set; the
/// setters raise the flag only for non-trivial values.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawArgs {
    pub program: Option<ProgramHandle>,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Radians, counter-clockwise about +Z.
    pub rotation: f32,
    pub flags: DrawFlags,
}

impl Default for DrawArgs {
    fn default() -> Self {
        Self {
            program: None,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            flags: DrawFlags::empty(),
        }
    }
}

impl DrawArgs {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default arguments with a uniform scale. A zero scale is ignored.
    pub fn with_uniform_scale(scale: f32) -> Self {
        let mut args = Self::default();
        args.set_scale(scale, scale);
        args
    }

    /// Sets the scale. Ignored when both components are zero.
    pub fn set_scale(&mut self, scale_x: f32, scale_y: f32) {
        if scale_x != 0.0 || scale_y != 0.0 {
            self.scale_x = scale_x;
            self.scale_y = scale_y;
            self.flags |= DrawFlags::SCALED;
        }
    }

    /// Sets the rotation in radians. Ignored when zero.
    pub fn set_rotation(&mut self, radians: f32) {
        if radians != 0.0 {
            self.rotation = radians;
            self.flags |= DrawFlags::ROTATED;
        }
    }

    /// Anchors the draw at its center (`true`) or top-left corner (`false`).
    pub fn set_centered(&mut self, centered: bool) {
        self.flags.set(DrawFlags::CENTERED, centered);
    }

    pub fn set_program(&mut self, program: ProgramHandle) {
        self.program = Some(program);
    }

    #[must_use]
    pub fn scale(mut self, scale_x: f32, scale_y: f32) -> Self {
        self.set_scale(scale_x, scale_y);
        self
    }

    #[must_use]
    pub fn rotate(mut self, radians: f32) -> Self {
        self.set_rotation(radians);
        self
    }

    #[must_use]
    pub fn centered(mut self, centered: bool) -> Self {
        self.set_centered(centered);
        self
    }

    #[must_use]
    pub fn program(mut self, program: ProgramHandle) -> Self {
        self.set_program(program);
        self
    }

    #[inline]
    pub fn is_centered(&self) -> bool {
        self.flags.contains(DrawFlags::CENTERED)
    }

    /// Scale actually applied: `(1, 1)` unless the scaled flag is set.
    #[inline]
    pub fn effective_scale(&self) -> Vec2 {
        if self.flags.contains(DrawFlags::SCALED) {
            Vec2::new(self.scale_x, self.scale_y)
        } else {
            Vec2::ONE
        }
    }

    /// Rotation actually applied, if any.
    #[inline]
    pub fn effective_rotation(&self) -> Option<f32> {
        self.flags
            .contains(DrawFlags::ROTATED)
            .then_some(self.rotation)
    }
}

/// Builds the model matrix of a unit-quad draw.
///
/// Steps, in this exact order:
/// 1. uncentered draws move the anchor by half the size, so `position` is the
///    top-left corner;
/// 2. translate to the anchor multiplied by the scale;
/// 3. scale the unit quad to `size * scale`;
/// 4. rotate about Z in the quad's local space.
pub fn compose_model(position: Vec2, size: Vec2, args: &DrawArgs) -> Mat4 {
    let scale = args.effective_scale();

    let anchor = if args.is_centered() {
        position
    } else {
        position + size * 0.5
    };

    let translation = anchor * scale;
    let extent = size * scale;

    let model = Mat4::from_translation(translation.extend(0.0))
        * Mat4::from_scale(extent.extend(1.0));

    match args.effective_rotation() {
        Some(radians) => model * Mat4::from_rotation_z(radians),
        None => model,
    }
}

/// Orthographic screen matrix: `(0, 0)` top-left, `(width, height)`
/// bottom-right, +Y down.
pub fn screen_matrix(width: f32, height: f32) -> Mat4 {
    Mat4::orthographic_rh(0.0, width, height, 0.0, -1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    const EPS: f32 = 1e-5;

    fn translation(m: Mat4) -> Vec3 {
        m.w_axis.truncate()
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < EPS
    }

    // ── flags ─────────────────────────────────────────────────────────────

    #[test]
    fn trivial_values_do_not_raise_flags() {
        let args = DrawArgs::new().scale(0.0, 0.0).rotate(0.0);
        assert_eq!(args.flags, DrawFlags::empty());
        assert_eq!(args.effective_scale(), Vec2::ONE);
        assert_eq!(args.effective_rotation(), None);
    }

    #[test]
    fn center_can_be_cleared() {
        let mut args = DrawArgs::new().centered(true);
        assert!(args.is_centered());
        args.set_centered(false);
        assert!(!args.is_centered());
    }

    #[test]
    fn uniform_scale_sets_both_axes() {
        let args = DrawArgs::with_uniform_scale(2.0);
        assert_eq!(args.effective_scale(), Vec2::splat(2.0));
        assert!(args.flags.contains(DrawFlags::SCALED));
    }

    // ── composition ───────────────────────────────────────────────────────

    #[test]
    fn centered_draw_translates_to_position() {
        let args = DrawArgs::new().centered(true);
        let m = compose_model(Vec2::new(10.0, 20.0), Vec2::new(8.0, 4.0), &args);
        assert!(approx(translation(m), Vec3::new(10.0, 20.0, 0.0)));
    }

    #[test]
    fn uncentered_draw_translates_by_half_size() {
        let m = compose_model(Vec2::new(10.0, 20.0), Vec2::new(8.0, 4.0), &DrawArgs::new());
        assert!(approx(translation(m), Vec3::new(14.0, 22.0, 0.0)));
    }

    #[test]
    fn unit_quad_covers_the_requested_rect() {
        let m = compose_model(Vec2::new(10.0, 20.0), Vec2::new(8.0, 4.0), &DrawArgs::new());
        let top_left = m * Vec4::new(-0.5, -0.5, 0.0, 1.0);
        let bottom_right = m * Vec4::new(0.5, 0.5, 0.0, 1.0);
        assert!(approx(top_left.truncate(), Vec3::new(10.0, 20.0, 0.0)));
        assert!(approx(bottom_right.truncate(), Vec3::new(18.0, 24.0, 0.0)));
    }

    #[test]
    fn scale_multiplies_position_and_size() {
        let args = DrawArgs::new().scale(2.0, 3.0);
        let m = compose_model(Vec2::new(10.0, 10.0), Vec2::new(4.0, 4.0), &args);
        // anchor (12, 12) scaled by (2, 3)
        assert!(approx(translation(m), Vec3::new(24.0, 36.0, 0.0)));
        assert!((m.x_axis.x - 8.0).abs() < EPS);
        assert!((m.y_axis.y - 12.0).abs() < EPS);
    }

    #[test]
    fn rotation_is_applied_in_local_space() {
        let args = DrawArgs::new()
            .centered(true)
            .scale(1.0, 1.0)
            .rotate(std::f32::consts::FRAC_PI_2);
        let m = compose_model(Vec2::new(100.0, 50.0), Vec2::new(20.0, 10.0), &args);

        // Rotation does not move the anchor.
        assert!(approx(translation(m), Vec3::new(100.0, 50.0, 0.0)));

        // Local +X corner rotates onto local +Y before the non-uniform scale:
        // (0.5, 0) -> (0, 0.5) -> (0, 5) -> (100, 55).
        let p = m * Vec4::new(0.5, 0.0, 0.0, 1.0);
        assert!(approx(p.truncate(), Vec3::new(100.0, 55.0, 0.0)));
    }

    #[test]
    fn rotation_order_differs_from_rotate_then_scale_globally() {
        let args = DrawArgs::new().centered(true).rotate(0.3);
        let size = Vec2::new(40.0, 10.0);
        let m = compose_model(Vec2::ZERO, size, &args);
        let reordered = Mat4::from_rotation_z(0.3) * Mat4::from_scale(size.extend(1.0));
        let corner = Vec4::new(0.5, 0.5, 0.0, 1.0);
        assert!(!approx((m * corner).truncate(), (reordered * corner).truncate()));
    }

    // ── screen ────────────────────────────────────────────────────────────

    #[test]
    fn screen_matrix_maps_corners_to_ndc() {
        let s = screen_matrix(800.0, 600.0);
        let tl = s * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let br = s * Vec4::new(800.0, 600.0, 0.0, 1.0);
        assert!(approx(tl.truncate().truncate().extend(0.0), Vec3::new(-1.0, 1.0, 0.0)));
        assert!(approx(br.truncate().truncate().extend(0.0), Vec3::new(1.0, -1.0, 0.0)));
    }
}
