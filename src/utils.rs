//! Small helpers shared across modules.

/// Number of logical cores reported by the OS (never zero).
#[must_use]
pub fn hardware_concurrency() -> usize {
    num_cpus::get().max(1)
}

/// Interpret a user-supplied thread count.
///
/// Positive values are taken as-is. Zero and negative values are relative to
/// the hardware: `0` means "all cores", `-2` means "all but two cores". The
/// result is always at least 1.
///
/// ```
/// use ironframe::utils::{hardware_concurrency, resolve_nthreads};
///
/// assert_eq!(resolve_nthreads(3), 3);
/// assert_eq!(resolve_nthreads(0), hardware_concurrency());
/// assert_eq!(resolve_nthreads(-10_000), 1);
/// ```
#[must_use]
pub fn resolve_nthreads(n: i64) -> usize {
    if n > 0 {
        return usize::try_from(n).unwrap_or(usize::MAX);
    }
    let hw = i64::try_from(hardware_concurrency()).unwrap_or(i64::MAX);
    usize::try_from((hw + n).max(1)).unwrap_or(1)
}

/// Round `n` up to the next multiple of `align` (`align` must be a power of two).
#[inline]
#[must_use]
pub fn align_up(n: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (n + align - 1) & !(align - 1)
}
