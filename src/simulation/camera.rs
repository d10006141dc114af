/// Fraction of the remaining distance covered per tick.
const SMOOTHING: f64 = 0.1;

/// Top-left corner of the visible window, in tiles. Follows a target with
/// exponential smoothing and never shows past the map edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub x: f64,
    pub y: f64,
    view_width: u32,
    view_height: u32,
}

impl Camera {
    pub fn new(view_width: u32, view_height: u32) -> Self {
        Camera {
            x: 0.0,
            y: 0.0,
            view_width,
            view_height,
        }
    }

    pub fn view_size(&self) -> (u32, u32) {
        (self.view_width, self.view_height)
    }

    fn target(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x - self.view_width as f64 / 2.0,
            y - self.view_height as f64 / 2.0,
        )
    }

    fn clamp(&mut self, map_width: u32, map_height: u32) {
        let max_x = (map_width as f64 - self.view_width as f64).max(0.0);
        let max_y = (map_height as f64 - self.view_height as f64).max(0.0);
        self.x = self.x.clamp(0.0, max_x);
        self.y = self.y.clamp(0.0, max_y);
    }

    /// One smoothing step towards centering `(x, y)`.
    pub fn follow(&mut self, x: f64, y: f64, map_width: u32, map_height: u32) {
        let (tx, ty) = self.target(x, y);
        self.x += (tx - self.x) * SMOOTHING;
        self.y += (ty - self.y) * SMOOTHING;
        self.clamp(map_width, map_height);
    }

    /// Snaps straight to `(x, y)`, used on spawn and teleport.
    pub fn center_on(&mut self, x: f64, y: f64, map_width: u32, map_height: u32) {
        let (tx, ty) = self.target(x, y);
        self.x = tx;
        self.y = ty;
        self.clamp(map_width, map_height);
    }

    /// Converts a point in view-relative tile units to world coordinates.
    pub fn to_world(&self, view_x: f64, view_y: f64) -> (f64, f64) {
        (self.x + view_x, self.y + view_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_on_snaps() {
        let mut cam = Camera::new(20, 10);
        cam.center_on(100.0, 100.0, 1000, 1000);
        assert_eq!((cam.x, cam.y), (90.0, 95.0));
    }

    #[test]
    fn follow_moves_a_tenth_of_the_gap() {
        let mut cam = Camera::new(20, 10);
        cam.center_on(100.0, 100.0, 1000, 1000);
        cam.follow(110.0, 100.0, 1000, 1000);
        assert!((cam.x - 91.0).abs() < 1e-9);
        assert_eq!(cam.y, 95.0);
    }

    #[test]
    fn follow_converges() {
        let mut cam = Camera::new(20, 10);
        for _ in 0..500 {
            cam.follow(300.0, 200.0, 1000, 1000);
        }
        assert!((cam.x - 290.0).abs() < 1e-6);
        assert!((cam.y - 195.0).abs() < 1e-6);
    }

    #[test]
    fn clamped_to_map_edges() {
        let mut cam = Camera::new(20, 10);
        cam.center_on(2.0, 2.0, 100, 100);
        assert_eq!((cam.x, cam.y), (0.0, 0.0));
        cam.center_on(99.0, 99.0, 100, 100);
        assert_eq!((cam.x, cam.y), (80.0, 90.0));
    }

    #[test]
    fn view_larger_than_map_pins_to_origin() {
        let mut cam = Camera::new(50, 50);
        cam.center_on(20.0, 20.0, 32, 32);
        assert_eq!((cam.x, cam.y), (0.0, 0.0));
        assert_eq!(cam.to_world(1.5, 2.5), (1.5, 2.5));
    }
}
