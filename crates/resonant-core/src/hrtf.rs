//! HRTF dataset loading and coefficient synthesis.
//!
//! The dataset's own binary layout is in scope (§6): little-endian
//! `magic`, `sample_rate`, `hrir_length`, `elev_count`, `min_elevation`,
//! `max_elevation`, `azimuth_counts[elev_count]`, then `f32` HRIRs ordered
//! `[elev][az][tap]`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use rustfft::{num_complex::Complex32, FftPlanner};
use tracing::instrument;

use crate::error::{EngineError, EngineResult};
use crate::resampler::resample_mono_buffer;

const MAGIC: u32 = 0x4852_5446; // "HRTF" little-endian

/// An immutable, shared HRTF dataset: a per-elevation ring of HRIRs.
///
/// Loaded once, then read concurrently by every multipanner that uses it;
/// nothing here is mutated after [`HrtfData::load_from_buffer`] returns.
pub struct HrtfData {
    hrir_length: usize,
    min_elevation: i32,
    max_elevation: i32,
    /// `azimuth_counts[e]` = number of azimuth bins in elevation band `e`.
    azimuth_counts: Vec<usize>,
    /// `hrirs[e][a]` is one HRIR of `hrir_length` samples.
    hrirs: Vec<Vec<Vec<f32>>>,
    sample_rate: u32,
}

struct FftScratch {
    planner: FftPlanner<f32>,
}

thread_local! {
    static SCRATCH: RefCell<FftScratch> = RefCell::new(FftScratch { planner: FftPlanner::new() });
}

impl HrtfData {
    /// The HRIR length in samples (post-resample, if resampling occurred).
    pub fn hrir_length(&self) -> usize {
        self.hrir_length
    }

    /// Parses a dataset from an in-memory buffer, resampling every HRIR to
    /// `target_sr` if the dataset's native rate differs.
    #[instrument(skip(buffer))]
    pub fn load_from_buffer(buffer: &[u8], target_sr: u32) -> EngineResult<Self> {
        let mut cursor = buffer;
        let magic = read_u32(&mut cursor)?;
        if magic != MAGIC {
            return Err(EngineError::UnknownFormat(format!("bad HRTF magic 0x{magic:08x}")));
        }
        let native_sr = read_u32(&mut cursor)?;
        let hrir_length = read_u32(&mut cursor)? as usize;
        let elev_count = read_u32(&mut cursor)? as usize;
        let min_elevation = read_i32(&mut cursor)?;
        let max_elevation = read_i32(&mut cursor)?;

        if elev_count == 0 || hrir_length == 0 {
            return Err(EngineError::UnknownFormat("HRTF dataset has zero elevations or zero-length HRIRs".into()));
        }

        let mut azimuth_counts = Vec::with_capacity(elev_count);
        for _ in 0..elev_count {
            azimuth_counts.push(read_u32(&mut cursor)? as usize);
        }

        let mut hrirs = Vec::with_capacity(elev_count);
        for &az_count in &azimuth_counts {
            let mut band = Vec::with_capacity(az_count);
            for _ in 0..az_count {
                let mut hrir = Vec::with_capacity(hrir_length);
                for _ in 0..hrir_length {
                    hrir.push(read_f32(&mut cursor)?);
                }
                band.push(hrir);
            }
            hrirs.push(band);
        }

        let (hrirs, hrir_length) = if native_sr != target_sr {
            let mut resampled_len = hrir_length;
            let hrirs: Vec<Vec<Vec<f32>>> = hrirs
                .into_iter()
                .map(|band| {
                    band.into_iter()
                        .map(|hrir| {
                            let out = resample_mono_buffer(&hrir, native_sr as f32, target_sr as f32);
                            resampled_len = out.len();
                            out
                        })
                        .collect()
                })
                .collect();
            (hrirs, resampled_len)
        } else {
            (hrirs, hrir_length)
        };

        Ok(Self { hrir_length, min_elevation, max_elevation, azimuth_counts, hrirs, sample_rate: target_sr })
    }

    /// Loads a dataset from a file on disk.
    pub fn load_from_file(path: &Path, target_sr: u32) -> EngineResult<Self> {
        let mut bytes = Vec::new();
        std::fs::File::open(path)
            .and_then(|mut f| f.read_to_end(&mut bytes))
            .map_err(|source| EngineError::Io { path: path.to_path_buf(), source })?;
        Self::load_from_buffer(&bytes, target_sr)
    }

    fn elevation_band(&self, elevation: f32) -> (usize, usize, f32) {
        let clamped = elevation.clamp(self.min_elevation as f32, self.max_elevation as f32);
        let span = (self.max_elevation - self.min_elevation).max(1) as f32;
        let n = self.azimuth_counts.len();
        let pos = (clamped - self.min_elevation as f32) / span * (n - 1) as f32;
        let lo = (pos.floor() as usize).min(n - 1);
        let hi = (lo + 1).min(n - 1);
        let w = if hi == lo { 0.0 } else { pos - lo as f32 };
        (lo, hi, w)
    }

    fn azimuth_bins(&self, band: usize, azimuth: f32) -> (usize, usize, f32) {
        let count = self.azimuth_counts[band].max(1);
        let wrapped = azimuth.rem_euclid(360.0);
        let pos = wrapped / 360.0 * count as f32;
        let lo = (pos.floor() as i64).rem_euclid(count as i64) as usize;
        let hi = (lo + 1) % count;
        let w = pos - pos.floor();
        (lo, hi, w)
    }

    /// Computes one channel's HRIR for `(elevation, azimuth)` in degrees,
    /// bilinearly blending the four nearest dataset entries into `out`
    /// (which must be at least [`Self::hrir_length`] samples).
    pub fn compute_coefficients_mono(&self, elevation: f32, azimuth: f32, out: &mut [f32], linear_phase: bool) {
        let (e_lo, e_hi, w_e) = self.elevation_band(elevation);
        let (a_lo_lo, a_hi_lo, w_a_lo) = self.azimuth_bins(e_lo, azimuth);
        let (a_lo_hi, a_hi_hi, w_a_hi) = self.azimuth_bins(e_hi, azimuth);

        let n = self.hrir_length.min(out.len());
        out[..n].fill(0.0);
        for i in 0..n {
            let low_band = lerp(self.hrirs[e_lo][a_lo_lo][i], self.hrirs[e_lo][a_hi_lo][i], w_a_lo);
            let high_band = lerp(self.hrirs[e_hi][a_lo_hi][i], self.hrirs[e_hi][a_hi_hi][i], w_a_hi);
            out[i] = lerp(low_band, high_band, w_e);
        }

        if linear_phase {
            self.linear_phase(&mut out[..n]);
        }
    }

    /// Computes both ear channels for `(elevation, azimuth)`, mirroring
    /// the dataset for the right ear (`az_right = -az_left`).
    pub fn compute_coefficients_stereo(&self, elevation: f32, azimuth: f32, left: &mut [f32], right: &mut [f32], linear_phase: bool) {
        self.compute_coefficients_mono(elevation, azimuth, left, linear_phase);
        self.compute_coefficients_mono(elevation, -azimuth, right, linear_phase);
    }

    /// Converts `buffer` in place to a linear-phase filter with the same
    /// amplitude response: FFT, keep only the magnitude as the real part,
    /// IFFT. Uses per-thread scratch (no heap traffic is claimed here; the
    /// FFT planner itself allocates internally, which is acceptable since
    /// this runs only at dataset-load time, never per sample).
    fn linear_phase(&self, buffer: &mut [f32]) {
        SCRATCH.with(|scratch| {
            let mut scratch = scratch.borrow_mut();
            let len = buffer.len().next_power_of_two();
            let fft = scratch.planner.plan_fft_forward(len);
            let ifft = scratch.planner.plan_fft_inverse(len);

            let mut spectrum: Vec<Complex32> = buffer.iter().map(|&s| Complex32::new(s, 0.0)).chain(std::iter::repeat(Complex32::new(0.0, 0.0))).take(len).collect();
            fft.process(&mut spectrum);
            for c in &mut spectrum {
                *c = Complex32::new(c.norm(), 0.0);
            }
            ifft.process(&mut spectrum);

            let scale = 1.0 / len as f32;
            for (s, c) in buffer.iter_mut().zip(spectrum.iter()) {
                *s = c.re * scale;
            }
        });
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn read_u32(cursor: &mut &[u8]) -> EngineResult<u32> {
    if cursor.len() < 4 {
        return Err(EngineError::UnknownFormat("HRTF dataset truncated".into()));
    }
    let (head, tail) = cursor.split_at(4);
    *cursor = tail;
    Ok(u32::from_le_bytes(head.try_into().unwrap()))
}

fn read_i32(cursor: &mut &[u8]) -> EngineResult<i32> {
    read_u32(cursor).map(|v| v as i32)
}

fn read_f32(cursor: &mut &[u8]) -> EngineResult<f32> {
    read_u32(cursor).map(f32::from_bits)
}

/// Process-wide cache deduplicating loads of the same `(path, target_sr)`
/// dataset across multiple multipanners and environments.
pub struct HrtfCache {
    entries: Mutex<HashMap<(PathBuf, u32), Arc<HrtfData>>>,
}

fn global_cache() -> &'static HrtfCache {
    static CACHE: OnceLock<HrtfCache> = OnceLock::new();
    CACHE.get_or_init(|| HrtfCache { entries: Mutex::new(HashMap::new()) })
}

/// Loads (or returns a cached) dataset for `(path, target_sr)`.
pub fn load_cached(path: &Path, target_sr: u32) -> EngineResult<Arc<HrtfData>> {
    let cache = global_cache();
    let key = (path.to_path_buf(), target_sr);
    if let Some(existing) = cache.entries.lock().unwrap().get(&key) {
        return Ok(existing.clone());
    }
    let loaded = Arc::new(HrtfData::load_from_file(path, target_sr)?);
    cache.entries.lock().unwrap().insert(key, loaded.clone());
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_dataset_bytes() -> Vec<u8> {
        // 2 elevation bands, 4 azimuth bins each, hrir_length = 8.
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC.to_le_bytes());
        buf.extend_from_slice(&44100u32.to_le_bytes());
        buf.extend_from_slice(&8u32.to_le_bytes());
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&(-45i32).to_le_bytes());
        buf.extend_from_slice(&45i32.to_le_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes());
        for band in 0..2 {
            for az in 0..4 {
                for tap in 0..8 {
                    let v = (band * 10 + az) as f32 + tap as f32 * 0.01;
                    buf.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
        buf
    }

    #[test]
    fn test_parses_synthetic_dataset() {
        let bytes = synthetic_dataset_bytes();
        let data = HrtfData::load_from_buffer(&bytes, 44100).unwrap();
        assert_eq!(data.hrir_length(), 8);
        assert_eq!(data.sample_rate, 44100);
    }

    #[test]
    fn test_coefficient_synthesis_matches_exact_bin() {
        let bytes = synthetic_dataset_bytes();
        let data = HrtfData::load_from_buffer(&bytes, 44100).unwrap();
        let mut out = vec![0.0; 8];
        // Azimuth bin 0 of elevation band 0 sits at azimuth 0.
        data.compute_coefficients_mono(-45.0, 0.0, &mut out, false);
        assert!((out[0] - 0.0).abs() < 1e-4);
    }

    #[test]
    fn test_azimuth_wraps() {
        let bytes = synthetic_dataset_bytes();
        let data = HrtfData::load_from_buffer(&bytes, 44100).unwrap();
        let mut a = vec![0.0; 8];
        let mut b = vec![0.0; 8];
        data.compute_coefficients_mono(-45.0, -10.0, &mut a, false);
        data.compute_coefficients_mono(-45.0, 350.0, &mut b, false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_linear_phase_preserves_length() {
        let bytes = synthetic_dataset_bytes();
        let data = HrtfData::load_from_buffer(&bytes, 44100).unwrap();
        let mut out = vec![0.0; 8];
        data.compute_coefficients_mono(0.0, 45.0, &mut out, true);
        assert_eq!(out.len(), 8);
    }

    #[test]
    fn test_resamples_when_rate_differs() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC.to_le_bytes());
        buf.extend_from_slice(&22050u32.to_le_bytes());
        buf.extend_from_slice(&8u32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        for tap in 0..8 {
            let v = tap as f32;
            buf.extend_from_slice(&v.to_le_bytes());
        }
        let data = HrtfData::load_from_buffer(&buf, 44100).unwrap();
        assert!(data.hrir_length() > 8);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = synthetic_dataset_bytes();
        bytes[0] = 0xff;
        let err = HrtfData::load_from_buffer(&bytes, 44100).unwrap_err();
        assert_eq!(err.to_error_code(), crate::error::ErrorCode::UnknownFormat);
    }
}
