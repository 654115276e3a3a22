/// A dense 2D grid of pairwise results. Rows index the first collection, columns the second.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Grid<T> {
    /// Logically represents a 2D vector. Row-major ordering.
    pub data: Vec<T>,
    pub width: usize,
    pub height: usize,
}

impl<T: Copy> Grid<T> {
    pub fn new(width: usize, height: usize, default: T) -> Grid<T> {
        Grid {
            data: vec![default; width * height],
            width,
            height,
        }
    }

    /// Calculate the index from a given (x, y), meaning (column, row). Doesn't do any bounds
    /// checking.
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// The inverse of `idx`. No bounds checking.
    pub fn xy(&self, idx: usize) -> (usize, usize) {
        let y = idx / self.width;
        let x = idx % self.width;
        (x, y)
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Panics when out of bounds, like slice indexing.
    pub fn get(&self, row: usize, col: usize) -> T {
        assert!(row < self.height && col < self.width);
        self.data[self.idx(col, row)]
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) {
        assert!(row < self.height && col < self.width);
        let idx = self.idx(col, row);
        self.data[idx] = value;
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        // chunks panics on 0
        self.data.chunks(self.width.max(1)).take(self.height)
    }

    pub fn transpose(&self) -> Grid<T> {
        let mut data = Vec::with_capacity(self.data.len());
        for x in 0..self.width {
            for y in 0..self.height {
                data.push(self.data[self.idx(x, y)]);
            }
        }
        Grid {
            data,
            width: self.height,
            height: self.width,
        }
    }

    pub fn to_nested(&self) -> Vec<Vec<T>> {
        self.rows().map(|row| row.to_vec()).collect()
    }
}
