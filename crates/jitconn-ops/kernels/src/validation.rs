// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Host argument validation
//!
//! Every check runs before an output is allocated and names the offending
//! argument in its error.

use jitconn_connectivity::{DType, Error, Result, MAX_DIMENSION};
use ndarray::ArrayD;

use crate::host::{HostArray, HostFloat};

/// Rank-1 check, returns the length
pub fn check_vector(argument: &str, array: &HostArray) -> Result<usize> {
    if array.ndim() != 1 {
        return Err(Error::RankMismatch {
            argument: argument.to_string(),
            rank: array.ndim(),
        });
    }
    Ok(array.len())
}

/// Rank-1, single-element check
pub fn check_scalar(argument: &str, array: &HostArray) -> Result<()> {
    let len = check_vector(argument, array)?;
    if len != 1 {
        return Err(Error::NotScalar {
            argument: argument.to_string(),
            len,
        });
    }
    Ok(())
}

/// Float dtype of the first weight parameter, which fixes the value type
pub fn weight_dtype(argument: &str, array: &HostArray) -> Result<DType> {
    check_scalar(argument, array)?;
    let dtype = array.dtype();
    if !dtype.is_float() {
        return Err(Error::DTypeMismatch {
            argument: argument.to_string(),
            expected: "float32 or float64",
            actual: dtype,
        });
    }
    Ok(dtype)
}

/// Float view with the operator's value type
pub fn float_array<'a, T: HostFloat>(argument: &str, array: &'a HostArray) -> Result<&'a ArrayD<T>> {
    T::view(array).ok_or_else(|| Error::DTypeMismatch {
        argument: argument.to_string(),
        expected: T::DTYPE.name(),
        actual: array.dtype(),
    })
}

/// Float scalar weight parameter of type `T`
pub fn float_scalar<T: HostFloat>(argument: &str, array: &HostArray) -> Result<T> {
    check_scalar(argument, array)?;
    let values = float_array::<T>(argument, array)?;
    values.iter().next().copied().ok_or_else(|| Error::NotScalar {
        argument: argument.to_string(),
        len: 0,
    })
}

fn integer_scalar(argument: &str, array: &HostArray) -> Result<i128> {
    check_scalar(argument, array)?;
    array.first_integer().ok_or_else(|| Error::DTypeMismatch {
        argument: argument.to_string(),
        expected: "integer",
        actual: array.dtype(),
    })
}

/// Connection length, `1 <= clen <= MAX_DIMENSION`
pub fn conn_len(array: &HostArray) -> Result<u32> {
    let clen = integer_scalar("clen", array)?;
    if clen < 1 || clen > MAX_DIMENSION as i128 {
        return Err(Error::InvalidConnLen {
            clen: clen.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
            max: MAX_DIMENSION,
        });
    }
    Ok(clen as u32)
}

/// Seed, reinterpreted modulo 2^32
pub fn seed(array: &HostArray) -> Result<u32> {
    Ok(integer_scalar("seed", array)? as u32)
}

/// Logical `(rows, cols)` from a length-2 shape
pub fn resolve_shape(shape: &[usize]) -> Result<(usize, usize)> {
    match *shape {
        [rows, cols] => Ok((rows, cols)),
        _ => Err(Error::InvalidShape(shape.to_vec())),
    }
}

/// `(input_len, output_len)` of a logical shape under `transpose`
pub fn operand_lengths(shape: (usize, usize), transpose: bool) -> (usize, usize) {
    if transpose {
        (shape.0, shape.1)
    } else {
        (shape.1, shape.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_rank_and_scalar_checks() {
        let m = HostArray::from(Array2::<f32>::zeros((2, 2)));
        assert_eq!(
            check_vector("vector", &m),
            Err(Error::RankMismatch {
                argument: "vector".to_string(),
                rank: 2
            })
        );
        let v = HostArray::from(vec![1.0f32, 2.0]);
        assert_eq!(check_vector("vector", &v), Ok(2));
        assert!(matches!(
            check_scalar("weight", &v),
            Err(Error::NotScalar { len: 2, .. })
        ));
    }

    #[test]
    fn test_weight_dtype() {
        assert_eq!(weight_dtype("weight", &HostArray::scalar(1.0f64)), Ok(DType::F64));
        let err = weight_dtype("w_low", &HostArray::scalar(1i32)).unwrap_err();
        assert!(err.to_string().contains("w_low"));
        let err = float_scalar::<f32>("w_high", &HostArray::scalar(1.0f64)).unwrap_err();
        assert_eq!(
            err,
            Error::DTypeMismatch {
                argument: "w_high".to_string(),
                expected: "float32",
                actual: DType::F64
            }
        );
        assert_eq!(float_scalar::<f32>("weight", &HostArray::scalar(0.25f32)), Ok(0.25));
    }

    #[test]
    fn test_conn_len_range() {
        assert_eq!(conn_len(&HostArray::scalar(10i32)), Ok(10));
        assert_eq!(conn_len(&HostArray::scalar(1u64)), Ok(1));
        for bad in [0i64, -4, MAX_DIMENSION as i64 + 1] {
            assert!(matches!(
                conn_len(&HostArray::scalar(bad)),
                Err(Error::InvalidConnLen { .. })
            ));
        }
        assert!(matches!(
            conn_len(&HostArray::scalar(3.0f32)),
            Err(Error::DTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_seed_wraps() {
        assert_eq!(seed(&HostArray::scalar(5u32)), Ok(5));
        assert_eq!(seed(&HostArray::scalar(-1i64)), Ok(u32::MAX));
        assert_eq!(seed(&HostArray::scalar((1u64 << 32) + 7)), Ok(7));
        assert!(seed(&HostArray::scalar(true)).is_err());
    }

    #[test]
    fn test_shape() {
        assert_eq!(resolve_shape(&[3, 4]), Ok((3, 4)));
        assert_eq!(resolve_shape(&[3]), Err(Error::InvalidShape(vec![3])));
        assert_eq!(operand_lengths((3, 4), false), (4, 3));
        assert_eq!(operand_lengths((3, 4), true), (3, 4));
    }
}
