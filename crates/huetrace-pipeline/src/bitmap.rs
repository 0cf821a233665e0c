//! Fixed-size binary mask.

/// A `width x height` grid of bits stored row-major (`y * width + x`).
///
/// The backing storage is allocated once and never resized.  Reads
/// outside the grid return `false`, which lets the border tracer probe
/// neighbours of edge pixels without bounds checks of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl Bitmap {
    /// An all-clear bitmap.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width * height],
        }
    }

    /// Build a bitmap by evaluating `f(x, y)` for every pixel.
    #[must_use]
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut bits = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                bits.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            bits,
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// Bit at `(x, y)`; `false` outside the grid.
    #[must_use]
    pub fn get(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some_and(|i| self.bits[i])
    }

    /// Set the bit at `(x, y)`.  Writes outside the grid are ignored.
    pub fn set(&mut self, x: i32, y: i32, value: bool) {
        if let Some(i) = self.index(x, y) {
            self.bits[i] = value;
        }
    }

    /// Invert the bit at `(x, y)`.  Writes outside the grid are ignored.
    pub fn flip(&mut self, x: i32, y: i32) {
        if let Some(i) = self.index(x, y) {
            self.bits[i] = !self.bits[i];
        }
    }

    /// Number of set bits.
    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Whether any bit is set.
    #[must_use]
    pub fn any(&self) -> bool {
        self.bits.iter().any(|&b| b)
    }

    /// First set bit at or after raster index `from`, as `(x, y)`.
    #[must_use]
    pub fn next_set(&self, from: usize) -> Option<(i32, i32)> {
        let offset = self.bits.get(from..)?.iter().position(|&b| b)?;
        let index = from + offset;
        let x = i32::try_from(index % self.width).ok()?;
        let y = i32::try_from(index / self.width).ok()?;
        Some((x, y))
    }

    /// Raster index of `(x, y)`.  The point must lie inside the grid.
    #[must_use]
    pub fn raster_index(&self, x: i32, y: i32) -> usize {
        self.index(x, y).unwrap_or(self.bits.len())
    }
}
