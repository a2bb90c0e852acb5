use rayon::prelude::*;

/// Rescale every channel so its loudest value at or above `threshold` maps to `scale`.
///
/// Values below the threshold become 0.0 and signs are preserved. A channel with nothing at or
/// above the threshold comes back as all zeros. Empty input maps to empty output.
pub fn normalize(channels: &[Vec<f32>], scale: f32, threshold: f32) -> Vec<Vec<f32>> {
    let mut normalized = channels.to_vec();
    normalize_in_place(&mut normalized, scale, threshold);
    normalized
}

/// In-place variant of [`normalize`].
pub fn normalize_in_place(channels: &mut [Vec<f32>], scale: f32, threshold: f32) {
    if channels.len() > 1 {
        channels
            .par_iter_mut()
            .for_each(|channel| normalize_channel(channel, scale, threshold));
    } else {
        for channel in channels.iter_mut() {
            normalize_channel(channel, scale, threshold);
        }
    }
}

/// Loudest magnitude at or above `threshold`, or 0.0 when none qualifies.
pub fn peak_above_threshold(channel: &[f32], threshold: f32) -> f32 {
    channel
        .iter()
        .map(|value| value.abs())
        .filter(|magnitude| *magnitude >= threshold)
        .fold(0.0_f32, f32::max)
}

fn normalize_channel(channel: &mut [f32], scale: f32, threshold: f32) {
    let peak = peak_above_threshold(channel, threshold);
    if peak <= 0.0 {
        channel.fill(0.0);
        return;
    }
    for value in channel.iter_mut() {
        *value = if value.abs() < threshold {
            0.0
        } else {
            *value / peak * scale
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_sign() {
        let out = normalize(&[vec![-0.5, 0.25]], 1.0, 0.0);
        assert_eq!(out, vec![vec![-1.0, 0.5]]);
    }

    #[test]
    fn zeroes_channel_when_nothing_meets_threshold() {
        let out = normalize(&[vec![0.01, 0.02, 0.03]], 1.0, 0.1);
        assert_eq!(out, vec![vec![0.0, 0.0, 0.0]]);
    }

    #[test]
    fn silent_channel_stays_silent() {
        let out = normalize(&[vec![0.0; 4]], 1.0, 0.0);
        assert_eq!(out, vec![vec![0.0; 4]]);
    }

    #[test]
    fn values_below_threshold_are_dropped() {
        let out = normalize(&[vec![0.05, 0.4, -0.2, 0.1]], 2.0, 0.1);
        assert_eq!(out, vec![vec![0.0, 2.0, -1.0, 0.5]]);
    }

    #[test]
    fn scale_sets_target_peak() {
        let out = normalize(&[vec![0.2, -0.4, 0.1]], 0.5, 0.0);
        let peak = out[0].iter().fold(0.0_f32, |m, v| m.max(v.abs()));
        assert!((peak - 0.5).abs() < 1e-6);
    }

    #[test]
    fn normalizing_twice_is_a_no_op() {
        let once = normalize(&[vec![0.3, -0.7, 0.15, 0.6]], 1.0, 0.0);
        let twice = normalize(&once, 1.0, 0.0);
        assert_eq!(once, twice);
        let peak = twice[0].iter().fold(0.0_f32, |m, v| m.max(v.abs()));
        assert_eq!(peak, 1.0);
    }

    #[test]
    fn channels_are_independent() {
        let out = normalize(&[vec![0.5, 0.25], vec![0.1, -0.05], vec![]], 1.0, 0.0);
        assert_eq!(out, vec![vec![1.0, 0.5], vec![1.0, -0.5], vec![]]);
    }

    #[test]
    fn empty_input_is_structurally_unchanged() {
        assert!(normalize(&[], 1.0, 0.0).is_empty());
        let mut channels: Vec<Vec<f32>> = vec![vec![]];
        normalize_in_place(&mut channels, 1.0, 0.0);
        assert_eq!(channels, vec![Vec::<f32>::new()]);
    }
}
