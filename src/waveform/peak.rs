//! Peak reduction: maximum absolute amplitude over a run of samples.
//!
//! The vector kernels process four lanes per step with unaligned loads and fold the tail with a
//! scalar loop. Every kernel ignores NaN the way `f32::max` does, so all of them return the
//! same value for the same input.

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;
use std::sync::OnceLock;

const LANES: usize = 4;

static DETECTED: OnceLock<PeakKernel> = OnceLock::new();

/// Implementation used to compute a peak.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeakKernel {
    /// Single pass of `max(|x|)`; always available and the reference for correctness.
    Scalar,
    /// SSE2 four-lane kernel.
    Sse2,
    /// NEON four-lane kernel.
    Neon,
}

impl PeakKernel {
    /// Best kernel supported by the running CPU, resolved once per process.
    pub fn detect() -> Self {
        *DETECTED.get_or_init(|| {
            let kernel = Self::available()
                .into_iter()
                .find(|kernel| *kernel != Self::Scalar)
                .unwrap_or(Self::Scalar);
            tracing::debug!("Peak reducer using {kernel:?} kernel");
            kernel
        })
    }

    /// Every kernel usable on the running CPU, vector kernels first.
    pub fn available() -> Vec<Self> {
        let mut kernels = Vec::with_capacity(2);
        #[cfg(target_arch = "x86_64")]
        {
            if std::is_x86_feature_detected!("sse2") {
                kernels.push(Self::Sse2);
            }
        }
        #[cfg(target_arch = "aarch64")]
        {
            if std::arch::is_aarch64_feature_detected!("neon") {
                kernels.push(Self::Neon);
            }
        }
        kernels.push(Self::Scalar);
        kernels
    }

    /// Return true when this kernel can run on the current CPU.
    pub fn is_supported(self) -> bool {
        Self::available().contains(&self)
    }

    /// Maximum absolute value in `samples` using this kernel; 0.0 for an empty slice.
    ///
    /// Falls back to the scalar kernel when this one is not supported here.
    pub fn max_abs(self, samples: &[f32]) -> f32 {
        match self {
            Self::Scalar => max_abs_scalar(samples),
            Self::Sse2 => {
                #[cfg(target_arch = "x86_64")]
                {
                    if std::is_x86_feature_detected!("sse2") {
                        // SAFETY: gated by runtime feature check.
                        return unsafe { max_abs_sse2(samples) };
                    }
                }
                max_abs_scalar(samples)
            }
            Self::Neon => {
                #[cfg(target_arch = "aarch64")]
                {
                    if std::arch::is_aarch64_feature_detected!("neon") {
                        // SAFETY: gated by runtime feature check.
                        return unsafe { max_abs_neon(samples) };
                    }
                }
                max_abs_scalar(samples)
            }
        }
    }
}

/// Maximum absolute value in `samples` using the detected kernel.
#[inline]
pub fn max_abs(samples: &[f32]) -> f32 {
    PeakKernel::detect().max_abs(samples)
}

/// Maximum absolute value of every `stride`-th sample, starting at `samples[0]`.
pub fn max_abs_strided(samples: &[f32], stride: usize) -> f32 {
    samples
        .iter()
        .step_by(stride.max(1))
        .fold(0.0_f32, |peak, &sample| peak.max(sample.abs()))
}

fn max_abs_scalar(samples: &[f32]) -> f32 {
    samples
        .iter()
        .fold(0.0_f32, |peak, &sample| peak.max(sample.abs()))
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn max_abs_sse2(samples: &[f32]) -> f32 {
    unsafe {
        let mut max_v = _mm_setzero_ps();
        let sign_mask = _mm_castsi128_ps(_mm_set1_epi32(0x7fff_ffff_u32 as i32));
        let chunks = samples.chunks_exact(LANES);
        let rem = chunks.remainder();
        for chunk in chunks {
            let v = _mm_loadu_ps(chunk.as_ptr());
            let abs = _mm_and_ps(v, sign_mask);
            // `maxps` returns its second operand when either is NaN, keeping the accumulator.
            max_v = _mm_max_ps(abs, max_v);
        }
        let mut tmp = [0.0_f32; LANES];
        _mm_storeu_ps(tmp.as_mut_ptr(), max_v);
        let mut max = tmp.iter().fold(0.0_f32, |m, &v| m.max(v));
        for &val in rem {
            max = max.max(val.abs());
        }
        max
    }
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn max_abs_neon(samples: &[f32]) -> f32 {
    unsafe {
        let mut max_v = vdupq_n_f32(0.0);
        let chunks = samples.chunks_exact(LANES);
        let rem = chunks.remainder();
        for chunk in chunks {
            let v = vld1q_f32(chunk.as_ptr());
            max_v = vmaxnmq_f32(max_v, vabsq_f32(v));
        }
        let mut max = vmaxnmvq_f32(max_v);
        for &val in rem {
            max = max.max(val.abs());
        }
        max
    }
}
