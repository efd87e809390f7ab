use ndarray::{Array2, ArrayView1};
use vecsearch_common::{Result, VecSearchError};

/// Flat inner-product index over unit-normalized vectors.
///
/// Rows are kept in insertion order; the row number is the key that ties a
/// vector to its metadata entry. Scoring is an exhaustive scan.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    vectors: Array2<f32>,
}

impl VectorIndex {
    /// Create new empty index of dimension `dim`
    pub fn new(dim: usize) -> Self {
        Self {
            vectors: Array2::zeros((0, dim)),
        }
    }

    /// Index holding `rows` in order
    pub fn from_rows(dim: usize, rows: Vec<Vec<f32>>) -> Result<Self> {
        let mut index = Self::new(dim);
        for row in &rows {
            index.add(row)?;
        }
        Ok(index)
    }

    /// Index over `values` laid out row by row, `dim` components per row
    pub fn from_flat(dim: usize, values: Vec<f32>) -> Result<Self> {
        if dim == 0 {
            return Err(VecSearchError::validation("Index dimension cannot be 0"));
        }
        if values.len() % dim != 0 {
            return Err(VecSearchError::validation(format!(
                "{} values do not form rows of dimension {}",
                values.len(),
                dim
            )));
        }
        let rows = values.len() / dim;
        let vectors = Array2::from_shape_vec((rows, dim), values)
            .map_err(|e| VecSearchError::internal(format!("Failed to shape vectors: {}", e)))?;
        Ok(Self { vectors })
    }

    /// Append a vector; it receives the next position
    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim() {
            return Err(VecSearchError::validation(format!(
                "Vector dimension {} does not match index dimension {}",
                vector.len(),
                self.dim()
            )));
        }
        self.vectors
            .push_row(ArrayView1::from(vector))
            .map_err(|e| VecSearchError::internal(format!("Failed to append vector: {}", e)))
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    /// Copy of the vector at `position`
    pub fn vector(&self, position: usize) -> Option<Vec<f32>> {
        (position < self.len()).then(|| self.vectors.row(position).to_vec())
    }

    /// All components, row by row
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.vectors.iter().copied()
    }

    /// Exact top-k by inner product.
    ///
    /// Returns `(position, score)` pairs sorted by descending score, ties by
    /// ascending position. At most `min(top_k, len)` pairs.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dim() {
            return Err(VecSearchError::validation(format!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dim()
            )));
        }

        let k = top_k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let scores = self.vectors.dot(&ArrayView1::from(query));
        let mut ranked: Vec<(usize, f32)> = scores
            .iter()
            .map(|&s| if s.is_nan() { f32::NEG_INFINITY } else { s + 0.0 }) // -0.0 -> 0.0
            .enumerate()
            .collect();

        let order = |a: &(usize, f32), b: &(usize, f32)| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0));
        if k < ranked.len() {
            ranked.select_nth_unstable_by(k - 1, order);
            ranked.truncate(k);
        }
        ranked.sort_unstable_by(order);

        Ok(ranked)
    }
}
