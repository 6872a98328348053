use crate::layout::WORLD_SIZE;
use crate::models::Vector;

/// Side length of the square canvas, in screen units.
pub const CANVAS_SIZE: f64 = 800.0;

/// Zoom limits and wheel response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomConfig {
    pub initial: f64,
    pub min: f64,
    pub max: f64,
    /// Zoom change per unit of wheel delta.
    pub wheel_sensitivity: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            initial: 4.0,
            min: 0.25,
            max: 16.0,
            wheel_sensitivity: 0.01,
        }
    }
}

/// Maps between screen and world coordinates: `world = origin + screen * zoom`.
///
/// `zoom` is world units per screen unit, so larger values show more of the
/// world. The origin is kept inside the world wherever the canvas fits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    origin: Vector,
    zoom: f64,
    config: ZoomConfig,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ZoomConfig::default())
    }
}

impl Viewport {
    /// A viewport centred on the middle of the world.
    pub fn new(config: ZoomConfig) -> Self {
        let zoom = config.initial.clamp(config.min, config.max);
        let half = CANVAS_SIZE / 2.0 * zoom;
        let mut viewport = Self {
            origin: Vector::new(WORLD_SIZE / 2.0 - half, WORLD_SIZE / 2.0 - half),
            zoom,
            config,
        };
        viewport.set_origin(viewport.origin);
        viewport
    }

    pub fn origin(&self) -> Vector {
        self.origin
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn to_world(&self, screen: Vector) -> Vector {
        self.origin + screen * self.zoom
    }

    pub fn to_screen(&self, world: Vector) -> Vector {
        (world - self.origin) / self.zoom
    }

    /// Sets the origin, clamped so the canvas stays inside the world.
    pub fn set_origin(&mut self, origin: Vector) {
        let limit = WORLD_SIZE - CANVAS_SIZE * self.zoom;
        let clamp = |value: f64| {
            let value = value.max(0.0);
            if value > limit { limit } else { value }
        };
        self.origin = Vector::new(clamp(origin.x), clamp(origin.y));
    }

    /// Moves the origin by a screen-space drag delta.
    pub fn pan(&mut self, screen_delta: Vector) {
        self.set_origin(self.origin + screen_delta * self.zoom);
    }

    /// Applies a wheel delta, keeping the canvas centre fixed in the world.
    pub fn wheel(&mut self, delta_y: f64) {
        let old = self.zoom;
        self.zoom = (old + self.config.wheel_sensitivity * delta_y)
            .clamp(self.config.min, self.config.max);
        let center = Vector::new(CANVAS_SIZE / 2.0, CANVAS_SIZE / 2.0);
        self.set_origin(self.origin + center * (old - self.zoom));
    }

    /// Whether a circle of world `radius` at `world` overlaps the canvas.
    pub fn is_visible(&self, world: Vector, radius: f64) -> bool {
        let screen = self.to_screen(world);
        let r = radius / self.zoom;
        screen.x + r >= 0.0
            && screen.y + r >= 0.0
            && screen.x - r <= CANVAS_SIZE
            && screen.y - r <= CANVAS_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_view_centres_the_world() {
        let viewport = Viewport::default();

        assert_eq!(viewport.origin(), Vector::new(2400.0, 2400.0));
        assert_eq!(viewport.zoom(), 4.0);
        assert_eq!(
            viewport.to_world(Vector::new(400.0, 400.0)),
            Vector::new(4000.0, 4000.0)
        );
    }

    #[test]
    fn screen_and_world_are_inverse() {
        let viewport = Viewport::default();
        let world = Vector::new(3000.0, 5000.0);

        assert_eq!(viewport.to_world(viewport.to_screen(world)), world);
    }

    #[test]
    fn pan_scales_by_zoom_and_clamps() {
        let mut viewport = Viewport::default();

        viewport.pan(Vector::new(10.0, -5.0));
        assert_eq!(viewport.origin(), Vector::new(2440.0, 2380.0));

        viewport.pan(Vector::new(-10_000.0, 10_000.0));
        assert_eq!(viewport.origin(), Vector::new(0.0, 4800.0));
    }

    #[test]
    fn wheel_keeps_centre_fixed() {
        let mut viewport = Viewport::default();
        let centre = viewport.to_world(Vector::new(400.0, 400.0));

        viewport.wheel(100.0);

        assert_eq!(viewport.zoom(), 5.0);
        let after = viewport.to_world(Vector::new(400.0, 400.0));
        assert!(after.distance_to(centre) < 1e-9);
    }

    #[test]
    fn wheel_clamps_zoom() {
        let mut viewport = Viewport::default();

        viewport.wheel(-10_000.0);
        assert_eq!(viewport.zoom(), 0.25);

        viewport.wheel(10_000.0);
        assert_eq!(viewport.zoom(), 16.0);
    }

    #[test]
    fn visibility_accounts_for_radius() {
        let viewport = Viewport::default();

        assert!(viewport.is_visible(Vector::new(4000.0, 4000.0), 20.0));
        // just left of the canvas, but the circle reaches in
        assert!(viewport.is_visible(Vector::new(2390.0, 4000.0), 20.0));
        assert!(!viewport.is_visible(Vector::new(100.0, 100.0), 20.0));
    }
}
