use super::{
    check_ratios, multiply_frames, CorrectionMethod, CorrectionReport, Corrector, CorrectorConfig,
    RunControl,
};
use crate::decay::DecayModel;
use crate::error::{BleachError, BleachResult};
use crate::fitter::{fit_decay, FitOptions, FitResult};
use crate::sampling::sample_time_series;
use crate::stack::{ImageStack, Pixel, Roi};

/// Corrects bleaching with an exponential decay fitted to the ROI means.
///
/// Every frame of time point `t` is multiplied by `I(0) / I(t)`, where `I` is
/// the fitted `a * exp(-b * t) + c`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExponentialFit {
    pub options: FitOptions,
}

impl ExponentialFit {
    pub fn new(options: FitOptions) -> Self {
        ExponentialFit { options }
    }

    /// Samples and fits the stack, then computes one ratio per frame.
    ///
    /// Nothing is written to the stack.
    pub fn ratios<T: Pixel>(
        &self,
        stack: &ImageStack<T>,
        roi: Option<Roi>,
    ) -> BleachResult<(FitResult, Vec<f64>)> {
        let series = sample_time_series(stack, roi)?;
        let fit = fit_decay(&series, &self.options)?;
        let ratios = model_ratios(stack, &fit.model)?;
        Ok((fit, ratios))
    }

    /// Corrects `stack` with an already fitted model, skipping sampling and fitting.
    ///
    /// The stack is left untouched when any ratio cannot be computed.
    pub fn apply_model<T: Pixel>(
        &self,
        stack: &mut ImageStack<T>,
        model: &DecayModel,
        control: &RunControl,
    ) -> BleachResult<Vec<f64>> {
        let ratios = model_ratios(stack, model)?;
        multiply_frames(stack, &ratios, control)?;
        Ok(ratios)
    }
}

/// `I(0) / I(t)` for every time point, broadcast to the slices of that time point.
fn model_ratios<T: Pixel>(stack: &ImageStack<T>, model: &DecayModel) -> BleachResult<Vec<f64>> {
    let layout = stack.layout()?;
    let per_time_point = (0..layout.tframes)
        .map(|t| {
            let x = t as f64;
            let ratio = model.correction_ratio(x).ok_or_else(|| {
                BleachError::NumericalDegeneracy(format!(
                    "fitted intensity {:.3e} at time point {t} cannot be divided by",
                    model.evaluate(x)
                ))
            })?;
            log::debug!(
                "time point {t}: fitted {:.4}, ratio {ratio:.6}",
                model.evaluate(x)
            );
            Ok(ratio)
        })
        .collect::<BleachResult<Vec<f64>>>()?;

    let ratios: Vec<f64> = (0..stack.n_frames())
        .map(|frame| per_time_point[layout.time_point_of(frame)])
        .collect();
    check_ratios(&ratios)?;
    Ok(ratios)
}

impl Corrector for ExponentialFit {
    fn config(&self) -> CorrectorConfig {
        CorrectorConfig {
            name: "Exponential Fit".to_string(),
            description: "Fits an exponential decay with offset to the ROI means and divides \
                every frame by the fitted curve. Keeps intensities quantitative."
                .to_string(),
            hyperlink: Some((
                Some("Miura 2020".to_string()),
                "https://doi.org/10.12688/f1000research.27171.1".to_string(),
            )),
            method: CorrectionMethod::ExponentialFit,
        }
    }

    fn apply<T: Pixel>(
        &self,
        stack: &mut ImageStack<T>,
        roi: Option<Roi>,
        control: &RunControl,
    ) -> BleachResult<CorrectionReport> {
        let series = sample_time_series(stack, roi)?;
        let fit = fit_decay(&series, &self.options)?;
        let ratios = self.apply_model(stack, &fit.model, control)?;
        Ok(CorrectionReport {
            fit: Some(fit),
            ..CorrectionReport::from_ratios(CorrectionMethod::ExponentialFit, ratios)
        })
    }
}
