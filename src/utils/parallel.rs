//! Data-parallel loop helpers.
//!
//! All skinning and transform kernels run through these helpers so that the
//! serial/parallel decision is made in exactly one place: below
//! [`PARALLEL_GRAIN_SIZE`] elements, or when the caller forces serial
//! execution (e.g. because it is already inside a rayon scope), the work runs
//! on the calling thread.

use rayon::prelude::*;

/// Minimum number of elements per parallel chunk. Smaller inputs run serially.
pub const PARALLEL_GRAIN_SIZE: usize = 1000;

#[inline]
fn runs_serial(len: usize, in_serial: bool) -> bool {
    in_serial || len < PARALLEL_GRAIN_SIZE
}

/// Runs `f(start, chunk)` over disjoint mutable chunks of `data`.
pub fn for_each_chunk_mut<T, F>(data: &mut [T], in_serial: bool, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync + Send,
{
    if runs_serial(data.len(), in_serial) {
        f(0, data);
        return;
    }
    data.par_chunks_mut(PARALLEL_GRAIN_SIZE)
        .enumerate()
        .for_each(|(chunk, slice)| f(chunk * PARALLEL_GRAIN_SIZE, slice));
}

/// Runs `f(start, chunk)` over disjoint mutable chunks whose length is a
/// multiple of `group`, so grouped records (influence sets) never straddle a
/// chunk boundary.
pub fn for_each_group_chunk_mut<T, F>(data: &mut [T], group: usize, in_serial: bool, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync + Send,
{
    let num_groups = if group == 0 { 0 } else { data.len() / group };
    if runs_serial(num_groups, in_serial) {
        f(0, data);
        return;
    }
    let chunk_len = PARALLEL_GRAIN_SIZE * group;
    data.par_chunks_mut(chunk_len)
        .enumerate()
        .for_each(|(chunk, slice)| f(chunk * chunk_len, slice));
}

/// Runs `f(a_group, b_group)` over matching groups of two parallel arrays,
/// e.g. the index and weight sets of one component.
pub fn for_each_group_pair_mut<A, B, F>(a: &mut [A], b: &mut [B], group: usize, in_serial: bool, f: F)
where
    A: Send,
    B: Send,
    F: Fn(&mut [A], &mut [B]) + Sync + Send,
{
    if group == 0 {
        return;
    }
    if runs_serial(a.len() / group, in_serial) {
        a.chunks_mut(group)
            .zip(b.chunks_mut(group))
            .for_each(|(ga, gb)| f(ga, gb));
        return;
    }
    a.par_chunks_mut(group)
        .zip(b.par_chunks_mut(group))
        .with_min_len(PARALLEL_GRAIN_SIZE)
        .for_each(|(ga, gb)| f(ga, gb));
}
