//! Sequential or parallel execution over event slices.
//!
//! The `cfg` switch on the `parallel` feature lives here so call sites stay
//! the same either way. Output order always matches input order.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Map a function over a slice, potentially in parallel.
pub(crate) fn map_slice<T, F, R>(slice: &[T], f: F, force_sequential: bool) -> Vec<R>
where
    T: Sync,
    F: Fn(&T) -> R + Sync + Send,
    R: Send,
{
    #[cfg(feature = "parallel")]
    {
        if force_sequential {
            slice.iter().map(f).collect()
        } else {
            slice.par_iter().map(f).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        let _ = force_sequential;
        slice.iter().map(f).collect()
    }
}

/// Map a fallible function over a slice, stopping at the first error.
///
/// When `force_sequential` is true the slice is walked on the calling thread
/// even if the `parallel` feature is enabled.
pub(crate) fn try_map_slice<T, F, R, E>(
    slice: &[T],
    f: F,
    force_sequential: bool,
) -> Result<Vec<R>, E>
where
    T: Sync,
    F: Fn(&T) -> Result<R, E> + Sync + Send,
    R: Send,
    E: Send,
{
    #[cfg(feature = "parallel")]
    {
        if force_sequential {
            slice.iter().map(f).collect()
        } else {
            slice.par_iter().map(f).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        let _ = force_sequential;
        slice.iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_slice_matches_sequential() {
        let input: Vec<f64> = (0..500).map(|i| i as f64 * 0.1).collect();
        assert_eq!(
            map_slice(&input, |x| x.sqrt(), false),
            map_slice(&input, |x| x.sqrt(), true)
        );
    }

    #[test]
    fn test_try_map_slice_preserves_order() {
        let input: Vec<u32> = (0..1000).collect();
        let parallel: Result<Vec<u32>, ()> = try_map_slice(&input, |x| Ok(x * 2), false);
        let sequential: Result<Vec<u32>, ()> = try_map_slice(&input, |x| Ok(x * 2), true);

        assert_eq!(parallel, sequential);
        assert_eq!(parallel.unwrap()[999], 1998);
    }

    #[test]
    fn test_try_map_slice_propagates_error() {
        let input = [1, 2, 3];
        let result: Result<Vec<i32>, &str> =
            try_map_slice(&input, |x| if *x == 2 { Err("two") } else { Ok(*x) }, false);
        assert_eq!(result, Err("two"));
    }
}
