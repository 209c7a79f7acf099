//! Local-maximum peak detection with minimum separation

/// Find peaks in a power vector
///
/// A bin is a candidate when it strictly exceeds both neighbours and
/// `threshold_db`. Candidates are accepted strongest first and a candidate
/// closer than `min_distance` bins to an accepted peak is dropped, so a wide
/// lobe reports only its maximum.
///
/// # Returns
/// Accepted peak indices in ascending order
pub fn find_peaks(power: &[f64], threshold_db: f64, min_distance: usize) -> Vec<usize> {
    if power.len() < 3 {
        return Vec::new();
    }

    let mut candidates: Vec<usize> = (1..power.len() - 1)
        .filter(|&i| {
            let p = power[i];
            p > threshold_db && p > power[i - 1] && p > power[i + 1]
        })
        .collect();

    // Strongest first; ties resolved toward the lower index
    candidates.sort_by(|&a, &b| power[b].total_cmp(&power[a]).then(a.cmp(&b)));

    let mut accepted: Vec<usize> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if accepted.iter().all(|&p| p.abs_diff(candidate) >= min_distance) {
            accepted.push(candidate);
        }
    }

    accepted.sort_unstable();
    accepted
}
