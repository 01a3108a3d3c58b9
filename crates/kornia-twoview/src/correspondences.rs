use crate::error::{check_same_length, TwoViewError};

/// Two aligned sequences of homogeneous 2d points.
///
/// The point at index `i` in the first image corresponds to the point at index `i` in the
/// second image. Both sequences always have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correspondences {
    points1: Vec<[f64; 3]>,
    points2: Vec<[f64; 3]>,
}

impl Correspondences {
    /// Create a correspondence set from two homogeneous point sequences.
    ///
    /// # Errors
    ///
    /// [`TwoViewError::MismatchedLengths`] if the sequences differ in length.
    pub fn new(points1: Vec<[f64; 3]>, points2: Vec<[f64; 3]>) -> Result<Self, TwoViewError> {
        check_same_length(points1.len(), points2.len())?;
        Ok(Self { points1, points2 })
    }

    /// Create a correspondence set from Euclidean pixel coordinates, with `w = 1`.
    pub fn from_euclidean(points1: &[[f64; 2]], points2: &[[f64; 2]]) -> Result<Self, TwoViewError> {
        check_same_length(points1.len(), points2.len())?;
        Ok(Self {
            points1: points1.iter().map(|p| [p[0], p[1], 1.0]).collect(),
            points2: points2.iter().map(|p| [p[0], p[1], 1.0]).collect(),
        })
    }

    /// Append one correspondence.
    pub fn push(&mut self, p1: [f64; 3], p2: [f64; 3]) {
        self.points1.push(p1);
        self.points2.push(p2);
    }

    /// Number of correspondences.
    pub fn len(&self) -> usize {
        self.points1.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.points1.is_empty()
    }

    /// Points in the first image.
    pub fn points1(&self) -> &[[f64; 3]] {
        &self.points1
    }

    /// Points in the second image.
    pub fn points2(&self) -> &[[f64; 3]] {
        &self.points2
    }

    /// Copy the correspondences at `indices` into two new buffers.
    pub fn select(&self, indices: impl IntoIterator<Item = usize>) -> (Vec<[f64; 3]>, Vec<[f64; 3]>) {
        indices
            .into_iter()
            .map(|idx| (self.points1[idx], self.points2[idx]))
            .unzip()
    }

    /// Copy the correspondences flagged in `mask`.
    pub fn select_mask(&self, mask: &[bool]) -> (Vec<[f64; 3]>, Vec<[f64; 3]>) {
        self.select(
            mask.iter()
                .enumerate()
                .filter_map(|(i, &inlier)| inlier.then_some(i)),
        )
    }
}

/// Convert rows of 2 or 3 coordinates into homogeneous points.
///
/// Rows with two coordinates get `w = 1`.
///
/// # Errors
///
/// [`TwoViewError::InvalidPointDimension`] for rows of any other length.
///
/// Example:
/// ```
/// use kornia_twoview::points_from_rows;
///
/// let rows = vec![vec![1.0, 2.0], vec![2.0, 4.0, 2.0]];
/// let points = points_from_rows(&rows).unwrap();
/// assert_eq!(points, vec![[1.0, 2.0, 1.0], [2.0, 4.0, 2.0]]);
/// assert!(points_from_rows(&[vec![1.0, 2.0, 3.0, 4.0]]).is_err());
/// ```
pub fn points_from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Vec<[f64; 3]>, TwoViewError> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| match *row.as_ref() {
            [x, y] => Ok([x, y, 1.0]),
            [x, y, w] => Ok([x, y, w]),
            ref other => Err(TwoViewError::InvalidPointDimension {
                index,
                dim: other.len(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correspondences_new() -> Result<(), TwoViewError> {
        let c = Correspondences::from_euclidean(&[[1.0, 2.0], [3.0, 4.0]], &[[5.0, 6.0], [7.0, 8.0]])?;
        assert_eq!(c.len(), 2);
        assert_eq!(c.points2()[1], [7.0, 8.0, 1.0]);

        let err = Correspondences::new(vec![[0.0; 3]; 3], vec![[0.0; 3]; 2]).unwrap_err();
        assert!(matches!(err, TwoViewError::MismatchedLengths { .. }));
        Ok(())
    }

    #[test]
    fn test_correspondences_select() -> Result<(), TwoViewError> {
        let mut c = Correspondences::default();
        for i in 0..5 {
            let v = i as f64;
            c.push([v, v, 1.0], [-v, v, 1.0]);
        }
        let (a, b) = c.select([4, 1]);
        assert_eq!(a, vec![[4.0, 4.0, 1.0], [1.0, 1.0, 1.0]]);
        assert_eq!(b, vec![[-4.0, 4.0, 1.0], [-1.0, 1.0, 1.0]]);

        let (a, _) = c.select_mask(&[true, false, false, true, false]);
        assert_eq!(a.len(), 2);
        assert_eq!(a[1], [3.0, 3.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_points_from_rows_dimension() {
        let err = points_from_rows(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert_eq!(err, TwoViewError::InvalidPointDimension { index: 1, dim: 1 });
        assert!(err.is_invalid_argument());
    }
}
