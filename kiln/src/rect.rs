//! Screen rectangles.

/// An axis-aligned rectangle in window coordinates.
///
/// The rectangle covers `[x; x + width[` × `[y; y + height[`.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Rect {
  /// The x position of the lower-left corner.
  pub x: i32,

  /// The y position of the lower-left corner.
  pub y: i32,

  pub width: u32,

  pub height: u32,
}

impl Rect {
  pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
    Rect {
      x,
      y,
      width,
      height,
    }
  }

  /// Rectangle at the origin.
  pub fn from_size(size: [u32; 2]) -> Self {
    Self::new(0, 0, size[0], size[1])
  }

  pub fn right(&self) -> i64 {
    self.x as i64 + self.width as i64
  }

  pub fn top(&self) -> i64 {
    self.y as i64 + self.height as i64
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  pub fn contains(&self, point: [i32; 2]) -> bool {
    let [x, y] = point.map(i64::from);
    x >= self.x as i64 && x < self.right() && y >= self.y as i64 && y < self.top()
  }

  /// Whether the rectangles share some area. Rectangles that only touch don’t intersect.
  pub fn intersects(&self, other: &Rect) -> bool {
    self.intersection(other).is_some()
  }

  /// Common area of both rectangles.
  pub fn intersection(&self, other: &Rect) -> Option<Rect> {
    let left = self.x.max(other.x);
    let bottom = self.y.max(other.y);
    let right = self.right().min(other.right());
    let top = self.top().min(other.top());

    if right <= left as i64 || top <= bottom as i64 {
      return None;
    }

    Some(Rect::new(
      left,
      bottom,
      (right - left as i64) as u32,
      (top - bottom as i64) as u32,
    ))
  }

  pub(crate) fn to_viewport(self) -> [i32; 4] {
    [
      self.x,
      self.y,
      self.width.min(i32::MAX as u32) as i32,
      self.height.min(i32::MAX as u32) as i32,
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn contains_is_half_open() {
    let r = Rect::new(10, 20, 5, 5);

    assert!(r.contains([10, 20]));
    assert!(r.contains([14, 24]));
    assert!(!r.contains([15, 24]));
    assert!(!r.contains([14, 25]));
    assert!(!r.contains([9, 20]));
  }

  #[test]
  fn intersection_on_both_axes() {
    let a = Rect::new(0, 0, 10, 10);

    assert_eq!(a.intersection(&Rect::new(5, 5, 10, 10)), Some(Rect::new(5, 5, 5, 5)));
    assert_eq!(a.intersection(&Rect::new(2, 2, 3, 3)), Some(Rect::new(2, 2, 3, 3)));

    // overlapping on x only
    assert!(!a.intersects(&Rect::new(5, 20, 10, 10)));
    assert!(!a.intersects(&Rect::new(5, -20, 10, 10)));

    // a rectangle spanning `a` vertically
    assert!(a.intersects(&Rect::new(5, -5, 2, 30)));

    // touching edges
    assert!(!a.intersects(&Rect::new(10, 0, 5, 5)));
    assert!(!a.intersects(&Rect::new(0, 10, 5, 5)));

    assert!(a.intersects(&Rect::new(-5, -5, 6, 6)));
    assert!(!a.intersects(&Rect::default()));
  }
}
