//! Dense linear algebra for the path follower.

use std::ops::{Index, IndexMut};

/// Row-major dense matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.cols + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.cols + j]
    }
}

/// LU factorisation with partial pivoting of a square matrix.
#[derive(Debug, Clone)]
pub struct Lu {
    lu: Matrix,
    perm: Vec<usize>,
    det_sign: f64,
}

impl Lu {
    /// Factor `a`. Returns `None` when a pivot is negligible relative to the
    /// largest entry of `a`.
    pub fn factor(a: &Matrix) -> Option<Lu> {
        debug_assert_eq!(a.rows, a.cols);
        let n = a.rows;
        let mut lu = a.clone();
        let mut perm: Vec<usize> = (0..n).collect();
        let mut det_sign = 1.0;
        let tiny = a.max_abs() * 1e-14;
        if !(tiny > 0.0) && n > 0 {
            return None;
        }

        for k in 0..n {
            let (pivot_row, pivot) = (k..n)
                .map(|i| (i, lu[(i, k)].abs()))
                .fold((k, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
            if !(pivot > tiny) {
                return None;
            }
            if pivot_row != k {
                for j in 0..n {
                    lu.data.swap(k * n + j, pivot_row * n + j);
                }
                perm.swap(k, pivot_row);
                det_sign = -det_sign;
            }
            let diag = lu[(k, k)];
            if diag < 0.0 {
                det_sign = -det_sign;
            }
            for i in k + 1..n {
                let factor = lu[(i, k)] / diag;
                lu[(i, k)] = factor;
                if factor != 0.0 {
                    for j in k + 1..n {
                        lu[(i, j)] -= factor * lu[(k, j)];
                    }
                }
            }
        }

        Some(Lu { lu, perm, det_sign })
    }

    /// Sign of the determinant of the factored matrix.
    pub fn det_sign(&self) -> f64 {
        self.det_sign
    }

    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.lu.rows;
        let mut x: Vec<f64> = self.perm.iter().map(|&p| b[p]).collect();
        for i in 0..n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= self.lu[(i, j)] * x[j];
            }
            x[i] = sum;
        }
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in i + 1..n {
                sum -= self.lu[(i, j)] * x[j];
            }
            x[i] = sum / self.lu[(i, i)];
        }
        x
    }
}

pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

pub fn max_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0_f64, |m, x| m.max(x.abs()))
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
