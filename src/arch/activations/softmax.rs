use ndarray::Array2;

/// Normalizes every row of `x` into a probability distribution.
///
/// The row's maximum is subtracted before exponentiating so large scores don't overflow.
pub fn softmax(mut x: Array2<f32>) -> Array2<f32> {
    for mut row in x.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |acc, &z| acc.max(z));
        row.mapv_inplace(|z| (z - max).exp());

        let sum = row.sum();
        row.mapv_inplace(|z| z / sum);
    }

    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rows_sum_to_one() {
        let p = softmax(array![[1f32, 2., 3.], [-5., 0., 5.], [0., 0., 0.]]);

        for row in p.rows() {
            assert!((row.sum() - 1.).abs() < 1e-6);
            assert!(row.iter().all(|&x| x >= 0.));
        }

        assert!(p.row(2).iter().all(|&x| (x - 1. / 3.).abs() < 1e-6));
    }

    #[test]
    fn keeps_ordering() {
        let p = softmax(array![[0.5f32, -2., 4.]]);
        assert!(p[[0, 2]] > p[[0, 0]] && p[[0, 0]] > p[[0, 1]]);
    }

    #[test]
    fn large_scores_do_not_overflow() {
        let p = softmax(array![[1000f32, 1000.]]);
        assert_eq!(p, array![[0.5f32, 0.5]]);
    }
}
