//! C entry points, declared in `include/gambit_c_api.h`.
//!
//! Errors are logged through `tracing` and reported as a nonzero status.
//! Panics are caught at the boundary.

use std::os::raw::{c_double, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::error;

use crate::core::TableGame;
use crate::solver::{random_perturbations, GnmSolver, NullRenderer};
use crate::util::errors::{GambitError, Result};

const STATUS_OK: c_int = 0;
const STATUS_ERROR: c_int = 1;

/// Equilibria of a game given as a flat payoff table, one profile after
/// another in player/strategy order, along with how many there are.
///
/// `data` holds every contingency's payoffs in table order, player 1's
/// strategy varying fastest.
pub fn solve_payoff_table<R: Rng + ?Sized>(
    strategy_counts: &[usize],
    data: &[f64],
    perturbations: usize,
    rng: &mut R,
) -> Result<(Vec<f64>, usize)> {
    let mut game = TableGame::from_payoffs(strategy_counts, data)?;
    game.set_title("NA");
    game.set_comment("NA");

    let perts = random_perturbations(&game, perturbations, rng);
    let found = GnmSolver::default().solve_many(&game, &perts, &mut NullRenderer)?;

    let count = found.len();
    let values = found.into_iter().flat_map(|p| p.into_vec()).collect();
    Ok((values, count))
}

fn positive(value: c_int, what: &str) -> Result<usize> {
    usize::try_from(value)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| {
            GambitError::InvalidArgument(format!("{} must be positive, got {}", what, value))
        })
}

/// # Safety
///
/// `pay_off_data` must point to `data_length` doubles and `num_strats` to
/// `num_players` ints. The three out-pointers must be valid for writes.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn nfggnm_c(
    num_players: c_int,
    pay_off_data: *const c_double,
    data_length: c_int,
    num_strats: *const c_int,
    number_of_perturbations: c_int,
    equilibriums_buffer: *mut *mut c_double,
    equilibriums_buffer_size: *mut c_int,
    number_of_equilibriums: *mut c_int,
) -> c_int {
    if pay_off_data.is_null()
        || num_strats.is_null()
        || equilibriums_buffer.is_null()
        || equilibriums_buffer_size.is_null()
        || number_of_equilibriums.is_null()
    {
        error!("nfggnm_c: null pointer argument");
        return STATUS_ERROR;
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(Vec<f64>, usize)> {
        let players = positive(num_players, "number of players")?;
        let length = positive(data_length, "payoff data length")?;
        let perturbations = positive(number_of_perturbations, "number of perturbations")?;

        // SAFETY: the caller guarantees both arrays are this long.
        let raw_counts = unsafe { std::slice::from_raw_parts(num_strats, players) };
        let data = unsafe { std::slice::from_raw_parts(pay_off_data, length) };

        let counts = raw_counts
            .iter()
            .enumerate()
            .map(|(pl, &n)| {
                usize::try_from(n)
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or(GambitError::EmptyStrategySet { player: pl + 1 })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut rng = StdRng::from_entropy();
        solve_payoff_table(&counts, data, perturbations, &mut rng)
    }));

    let (values, count) = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!("nfggnm_c: {}", e);
            return STATUS_ERROR;
        }
        Err(_) => {
            error!("nfggnm_c: solver panicked");
            return STATUS_ERROR;
        }
    };

    let (Ok(size), Ok(count)) = (c_int::try_from(values.len()), c_int::try_from(count)) else {
        error!("nfggnm_c: result does not fit in the output counters");
        return STATUS_ERROR;
    };

    let buffer = if values.is_empty() {
        ptr::null_mut()
    } else {
        Box::into_raw(values.into_boxed_slice()) as *mut c_double
    };
    // SAFETY: checked non-null above.
    unsafe {
        *equilibriums_buffer = buffer;
        *equilibriums_buffer_size = size;
        *number_of_equilibriums = count;
    }
    STATUS_OK
}

/// Release a buffer returned by [`nfggnm_c`].
///
/// # Safety
///
/// `buffer` must come from `nfggnm_c` together with its reported `size`,
/// and must not be freed twice.
#[no_mangle]
pub unsafe extern "C" fn nfggnm_free(buffer: *mut c_double, size: c_int) {
    if buffer.is_null() {
        return;
    }
    let Ok(len) = usize::try_from(size) else {
        error!("nfggnm_free: negative size {}", size);
        return;
    };
    // SAFETY: the buffer was produced by `Box::into_raw` on a slice of `len`.
    drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(buffer, len)) });
}

#[cfg(test)]
mod tests {
    use super::*;

    const PENNIES: [f64; 8] = [1.0, -1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0];

    fn call(counts: &[c_int], data: &[f64], perts: c_int) -> (c_int, Vec<f64>, c_int) {
        let mut buffer: *mut c_double = ptr::null_mut();
        let mut size: c_int = 0;
        let mut count: c_int = 0;
        let status = unsafe {
            nfggnm_c(
                counts.len() as c_int,
                data.as_ptr(),
                data.len() as c_int,
                counts.as_ptr(),
                perts,
                &mut buffer,
                &mut size,
                &mut count,
            )
        };
        let values = if buffer.is_null() {
            Vec::new()
        } else {
            let copy = unsafe { std::slice::from_raw_parts(buffer, size as usize) }.to_vec();
            unsafe { nfggnm_free(buffer, size) };
            copy
        };
        (status, values, count)
    }

    #[test]
    fn test_matching_pennies_through_c_api() {
        let (status, values, count) = call(&[2, 2], &PENNIES, 2);
        assert_eq!(status, STATUS_OK);
        assert_eq!(count, 2);
        assert_eq!(values.len(), 8);
        for v in values {
            assert!((v - 0.5).abs() < 1e-6, "{v}");
        }
    }

    #[test]
    fn test_wrong_data_length_is_error() {
        let (status, values, _) = call(&[2, 2], &PENNIES[..6], 1);
        assert_eq!(status, STATUS_ERROR);
        assert!(values.is_empty());
    }

    #[test]
    fn test_non_positive_sizes_are_errors() {
        assert_eq!(call(&[2, 2], &PENNIES, 0).0, STATUS_ERROR);
        assert_eq!(call(&[2, 0], &PENNIES, 1).0, STATUS_ERROR);
    }

    #[test]
    fn test_null_pointers_rejected() {
        let status = unsafe {
            nfggnm_c(
                2,
                ptr::null(),
                8,
                ptr::null(),
                1,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        assert_eq!(status, STATUS_ERROR);
    }

    #[test]
    fn test_free_null_is_noop() {
        unsafe { nfggnm_free(ptr::null_mut(), 0) };
    }

    #[test]
    fn test_solve_payoff_table_prisoners_dilemma() {
        let data = [3.0, 3.0, 5.0, 0.0, 0.0, 5.0, 1.0, 1.0];
        let mut rng = StdRng::seed_from_u64(7);
        let (values, count) = solve_payoff_table(&[2, 2], &data, 1, &mut rng).unwrap();
        assert_eq!(count, 1);
        let expected = [0.0, 1.0, 0.0, 1.0];
        for (v, e) in values.iter().zip(expected) {
            assert!((v - e).abs() < 1e-6);
        }
    }
}
