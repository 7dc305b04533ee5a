//! Miscellaneous tools.

use std::io::{ self, Write };
use ndarray::{ self as nd, Ix1 };
use ndarray_linalg::Scalar;
use num_complex::Complex64 as C64;

/// Integrate using the composite Simpson rule.
///
/// Arrays of odd length are integrated with the 1/3 rule throughout. Arrays of
/// even length use the 1/3 rule up to the last four points, which are handled
/// with the 3/8 rule.
///
/// *Panics if `y` has length less than 3*.
pub fn simps<S, A>(y: &nd::ArrayBase<S, Ix1>, dx: A::Real) -> A
where
    S: nd::Data<Elem = A>,
    A: Scalar,
{
    let n: usize = y.len();
    assert!(n >= 3, "simps: need at least 3 points to integrate; got {}", n);
    let two = A::from_real(A::real(2.0));
    let three = A::from_real(A::real(3.0));
    let four = A::from_real(A::real(4.0));
    let eight = A::from_real(A::real(8.0));
    let h = A::from_real(dx);
    // number of points covered by 1/3-rule intervals
    let n13 = if n % 2 == 0 { n - 3 } else { n };
    let mut acc = A::zero();
    if n13 >= 3 {
        acc = y[0] + y[n13 - 1];
        y.iter().enumerate().take(n13 - 1).skip(1)
            .for_each(|(i, yi)| {
                acc += if i % 2 == 1 { four * *yi } else { two * *yi };
            });
        acc *= h / three;
    }
    if n % 2 == 0 {
        acc += (y[n - 4] + three * (y[n - 3] + y[n - 2]) + y[n - 1])
            * three * h / eight;
    }
    acc
}

/// Calculate the squared norm of a wavefunction.
///
/// *Panics if `q` has length less than 3*.
pub fn wf_norm<S, A>(q: &nd::ArrayBase<S, Ix1>, dx: A::Real) -> A::Real
where
    S: nd::Data<Elem = A>,
    A: Scalar,
{
    simps(&q.mapv(|qk| qk.square()), dx)
}

/// Calculate the inner product `∫ conj(q) p dx` of two wavefunctions.
///
/// *Panics if either array has length less than 3 or if their lengths
/// differ*.
pub fn wf_dot<S, T, A>(
    q: &nd::ArrayBase<S, Ix1>,
    p: &nd::ArrayBase<T, Ix1>,
    dx: A::Real,
) -> A
where
    S: nd::Data<Elem = A>,
    T: nd::Data<Elem = A>,
    A: Scalar,
{
    let integrand: nd::Array1<A>
        = nd::Zip::from(q).and(p).map_collect(|qk, pk| qk.conj() * *pk);
    simps(&integrand, dx)
}

/// Renormalize a wavefunction in place.
///
/// *Panics if `q` has length less than 3*.
pub fn wf_renormalize<S, A>(q: &mut nd::ArrayBase<S, Ix1>, dx: A::Real)
where
    S: nd::DataMut<Elem = A>,
    A: Scalar,
{
    let norm = A::from_real(wf_norm(q, dx).sqrt());
    q.iter_mut().for_each(|qk| { *qk /= norm; });
}

/// Orthonormalize the rows of `orb` in place by modified Gram-Schmidt under
/// the Simpson inner product.
pub fn orthonormalize<S>(orb: &mut nd::ArrayBase<S, nd::Ix2>, dx: f64)
where S: nd::DataMut<Elem = C64>
{
    let m = orb.nrows();
    for i in 0..m {
        let (done, mut rest) = orb.view_mut().split_at(nd::Axis(0), i);
        let mut phi = rest.row_mut(0);
        for chi in done.rows() {
            let proj: C64 = wf_dot(&chi, &phi, dx);
            nd::Zip::from(&mut phi).and(&chi)
                .for_each(|p, c| { *p -= proj * c; });
        }
        wf_renormalize(&mut phi, dx);
    }
}

/// Compute the matrix of inner products `S[k][l] = ∫ conj(φ_k) φ_l dx`
/// between all rows of `orb`.
pub fn overlap_matrix<S>(orb: &nd::ArrayBase<S, nd::Ix2>, dx: f64)
    -> nd::Array2<C64>
where S: nd::Data<Elem = C64>
{
    let m = orb.nrows();
    nd::Array2::from_shape_fn((m, m), |(k, l)| {
        wf_dot(&orb.row(k), &orb.row(l), dx)
    })
}

/// Return the largest absolute deviation of an overlap matrix from the
/// identity.
pub fn identity_deviation<S>(ovlp: &nd::ArrayBase<S, nd::Ix2>) -> f64
where S: nd::Data<Elem = C64>
{
    ovlp.indexed_iter()
        .map(|((k, l), skl)| {
            if k == l { (*skl - 1.0).norm() } else { skl.norm() }
        })
        .fold(0.0, f64::max)
}

/// Rescale a coefficient vector to unit Euclidean norm in place.
pub fn normalize_coef<S>(c: &mut nd::ArrayBase<S, Ix1>)
where S: nd::DataMut<Elem = C64>
{
    let norm = coef_norm(c);
    c.map_inplace(|ck| { *ck /= norm; });
}

/// Euclidean norm of a coefficient vector.
pub fn coef_norm<S>(c: &nd::ArrayBase<S, Ix1>) -> f64
where S: nd::Data<Elem = C64>
{
    c.iter().map(|ck| ck.norm_sqr()).sum::<f64>().sqrt()
}

// format a single complex number as `(re+imj) `
fn write_complex<W: Write>(out: &mut W, z: C64) -> io::Result<()> {
    write!(out, "({:.15E}{:+.15E}j) ", z.re, z.im)
}

/// Write an array as a single line of parenthesized complex literals.
pub fn write_array<W, S>(out: &mut W, a: &nd::ArrayBase<S, Ix1>)
    -> io::Result<()>
where
    W: Write,
    S: nd::Data<Elem = C64>,
{
    a.iter().try_for_each(|ak| write_complex(out, *ak))?;
    writeln!(out)
}

/// Write a matrix in row-major order as a single line of parenthesized complex
/// literals.
pub fn write_matrix<W, S>(out: &mut W, a: &nd::ArrayBase<S, nd::Ix2>)
    -> io::Result<()>
where
    W: Write,
    S: nd::Data<Elem = C64>,
{
    a.rows().into_iter()
        .try_for_each(|row| row.iter().try_for_each(|ak| write_complex(out, *ak)))?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simps_is_exact_for_cubics() {
        // odd and even point counts, including the bare 3/8 rule
        for &n in &[3_usize, 4, 5, 6, 11, 64] {
            let x: nd::Array1<f64> = nd::Array1::linspace(0.0, 2.0, n);
            let dx = x[1] - x[0];
            let y = x.mapv(|xk| xk.powi(3) - 2.0 * xk + 1.0);
            let int: f64 = simps(&y, dx);
            assert!((int - 2.0).abs() < 1e-12, "n = {}: {}", n, int);
        }
    }

    #[test]
    #[should_panic]
    fn simps_rejects_two_points() {
        let y = nd::array![1.0_f64, 2.0];
        let _: f64 = simps(&y, 0.1);
    }

    #[test]
    fn gram_schmidt_orthonormalizes() {
        let x: nd::Array1<f64> = nd::Array1::linspace(0.0, 1.0, 101);
        let dx = x[1] - x[0];
        let mut orb: nd::Array2<C64> = nd::Array2::zeros((3, x.len()));
        orb.row_mut(0).assign(&x.mapv(|xk| C64::new(1.0, 0.0) + xk));
        orb.row_mut(1).assign(&x.mapv(|xk| C64::new(xk * xk, xk)));
        orb.row_mut(2).assign(&x.mapv(|xk| C64::new(xk.sin(), xk.cos())));
        orthonormalize(&mut orb, dx);
        let S = overlap_matrix(&orb, dx);
        assert!(identity_deviation(&S) < 1e-12);
    }

    #[test]
    fn coef_normalization() {
        let mut c = nd::array![C64::new(3.0, 0.0), C64::new(0.0, 4.0)];
        normalize_coef(&mut c);
        assert!((coef_norm(&c) - 1.0).abs() < 1e-15);
        assert!((c[1] - C64::new(0.0, 0.8)).norm() < 1e-15);
    }

    #[test]
    fn record_line_format() {
        let a = nd::array![C64::new(1.0, -0.5), C64::new(-2.0, 0.25)];
        let mut buf: Vec<u8> = Vec::new();
        write_array(&mut buf, &a).unwrap();
        let line = String::from_utf8(buf).unwrap();
        assert_eq!(
            line,
            "(1.000000000000000E0-5.000000000000000E-1j) \
             (-2.000000000000000E0+2.500000000000000E-1j) \n"
        );
        let m = nd::array![[C64::new(1.0, 0.0), C64::new(0.0, 1.0)],
                           [C64::new(0.0, -1.0), C64::new(2.0, 0.0)]];
        let mut buf: Vec<u8> = Vec::new();
        write_matrix(&mut buf, &m).unwrap();
        let line = String::from_utf8(buf).unwrap();
        assert_eq!(line.trim_end().split(' ').count(), 4);
        assert_eq!(line.matches('\n').count(), 1);
    }
}
