//! Radix-2 evaluation domain over the scalar field, and the per-position
//! blinding used when checking the H section.

use bls12_381::Scalar;
use ff::{Field, PrimeField};

/// How the H section's evaluation points sit relative to the `n`-th roots
/// of unity. Point `j` of the section is `inc · ω_n^j`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HShift {
    /// The odd points of the doubled domain, `inc = ω_{2n}`. Needs a
    /// `2n`-th root of unity, so only available while `log2 n < S`.
    DoubledDomain,
    /// A multiplicative coset of the domain, `inc = g²` where `g` generates
    /// the multiplicative group.
    Coset,
}

impl HShift {
    pub fn for_power(power: u32) -> HShift {
        if power < Scalar::S {
            HShift::DoubledDomain
        } else {
            HShift::Coset
        }
    }

    /// Step between consecutive blinding factors.
    pub fn inc(self, power: u32) -> Scalar {
        match self {
            HShift::DoubledDomain => root_of_unity(power + 1),
            HShift::Coset => Scalar::multiplicative_generator().square(),
        }
    }

    /// First blinding factor, `inc^n - 1`.
    pub fn first(self, power: u32) -> Scalar {
        match self {
            HShift::DoubledDomain => -Scalar::from(2),
            HShift::Coset => {
                Field::pow_vartime(&self.inc(power), [1u64 << power]) - Scalar::one()
            }
        }
    }
}

/// Primitive `2^power`-th root of unity. Panics if `power > S`.
pub fn root_of_unity(power: u32) -> Scalar {
    assert!(power <= Scalar::S);

    let mut omega = Scalar::root_of_unity();
    for _ in power..Scalar::S {
        omega = omega.square();
    }
    omega
}

/// In place forward transform: `a_j ← Σ_i a_i ω^{ij}` with `ω` a primitive
/// `a.len()`-th root of unity.
pub fn fft(a: &mut [Scalar], log_n: u32) {
    let omega = root_of_unity(log_n);
    serial_fft(a, &omega, log_n);
}

fn bitreverse(mut n: u32, l: u32) -> u32 {
    let mut r = 0;
    for _ in 0..l {
        r = (r << 1) | (n & 1);
        n >>= 1;
    }
    r
}

fn serial_fft(a: &mut [Scalar], omega: &Scalar, log_n: u32) {
    let n = a.len() as u32;
    assert_eq!(n, 1 << log_n);

    for k in 0..n {
        let rk = bitreverse(k, log_n);
        if k < rk {
            a.swap(rk as usize, k as usize);
        }
    }

    let mut m = 1;
    for _ in 0..log_n {
        let w_m = Field::pow_vartime(omega, [u64::from(n / (2 * m))]);

        let mut k = 0;
        while k < n {
            let mut w = Scalar::one();
            for j in 0..m {
                let mut t = a[(k + j + m) as usize];
                t *= &w;
                let mut tmp = a[(k + j) as usize];
                tmp -= &t;
                a[(k + j + m) as usize] = tmp;
                a[(k + j) as usize] += &t;
                w *= &w_m;
            }

            k += 2 * m;
        }

        m *= 2;
    }
}
