//! Tone mapping on top of the kernel dispatcher.

use hdrview_compute::{Backend, DispatcherBuilder, KernelDispatcher};

use crate::Result;

/// Gamma and exposure adjustments on interleaved sample buffers.
///
/// Owns one [`KernelDispatcher`]; build it once and reuse it for every
/// image.
#[derive(Debug)]
pub struct ToneMapper {
    dispatcher: KernelDispatcher,
}

impl ToneMapper {
    /// Opens `backend`; with [`Backend::Auto`], `HDRVIEW_BACKEND` is honoured.
    pub fn new(backend: Backend) -> Result<Self> {
        let dispatcher = DispatcherBuilder::new().backend(backend).build()?;
        Ok(Self { dispatcher })
    }

    /// Best available backend.
    pub fn auto() -> Result<Self> {
        Self::new(Backend::Auto)
    }

    /// Wraps an existing dispatcher.
    pub fn from_dispatcher(dispatcher: KernelDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Underlying dispatcher.
    pub fn dispatcher(&self) -> &KernelDispatcher {
        &self.dispatcher
    }

    /// Backend in use, e.g. `"wgpu"`.
    pub fn backend_name(&self) -> &'static str {
        self.dispatcher.backend_name()
    }

    /// `v^inv_gamma` per sample.
    pub fn apply_gamma(&self, pixels: &[f32], inv_gamma: f32) -> Result<Vec<f32>> {
        Ok(self.dispatcher.apply_gamma(pixels, inv_gamma)?)
    }

    /// `v * 2^exposure` per sample.
    pub fn apply_exposure(&self, pixels: &[f32], exposure: f32) -> Result<Vec<f32>> {
        Ok(self.dispatcher.apply_exposure(pixels, exposure)?)
    }

    /// `(v * 2^exposure)^inv_gamma` per sample.
    pub fn apply_exposure_gamma(&self, pixels: &[f32], exposure: f32, inv_gamma: f32) -> Result<Vec<f32>> {
        Ok(self.dispatcher.apply_exposure_gamma(pixels, exposure, inv_gamma)?)
    }

    /// Applies `exposure` then `1/gamma`, skipping whichever is neutral.
    ///
    /// Returns `None` when both are neutral.
    pub fn grade(&self, pixels: &[f32], exposure: f32, gamma: f32) -> Result<Option<Vec<f32>>> {
        let has_exposure = exposure != 0.0;
        let has_gamma = gamma != 1.0;
        let out = match (has_exposure, has_gamma) {
            (true, true) => self.apply_exposure_gamma(pixels, exposure, gamma.recip())?,
            (true, false) => self.apply_exposure(pixels, exposure)?,
            (false, true) => self.apply_gamma(pixels, gamma.recip())?,
            (false, false) => return Ok(None),
        };
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cpu() -> ToneMapper {
        ToneMapper::from_dispatcher(KernelDispatcher::new(Backend::Cpu).unwrap())
    }

    #[test]
    fn neutral_grade_is_skipped() {
        assert!(cpu().grade(&[0.5], 0.0, 1.0).unwrap().is_none());
    }

    #[test]
    fn grade_picks_kernel() {
        let t = cpu();
        assert_relative_eq!(t.grade(&[0.25], 0.0, 2.0).unwrap().unwrap()[0], 0.5);
        assert_relative_eq!(t.grade(&[0.25], 1.0, 1.0).unwrap().unwrap()[0], 0.5);
        assert_relative_eq!(t.grade(&[0.125], 1.0, 2.0).unwrap().unwrap()[0], 0.5);
    }
}
