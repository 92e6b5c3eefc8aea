//! Parameter sweep executor.
//!
//! Runs many independent configs over one borrowed instrument set. Configs
//! that share indicator parameters share one [`FrameSet`]; every run owns
//! its own portfolio. Results come back in input order whether the sweep
//! ran in parallel or sequentially.

use crate::domain::backtest::{BacktestResult, run_prepared};
use crate::domain::config::SimulationConfig;
use crate::domain::error::RsitraderError;
use crate::domain::metrics::PerformanceSummary;
use crate::domain::series::{FrameSet, IndicatorParams, InstrumentSeries, build_unified_timeline};
use crate::domain::universe::UniverseMembership;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Result of one config in a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutcome {
    /// Position of the config in the input slice.
    pub index: usize,
    pub config: SimulationConfig,
    pub result: BacktestResult,
    pub summary: PerformanceSummary,
}

pub struct ParamSweep {
    parallel: bool,
}

impl Default for ParamSweep {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamSweep {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every config in `configs`.
    ///
    /// All configs are validated up front; the first invalid one fails the
    /// whole sweep before any simulation starts.
    pub fn run(
        &self,
        series: &[InstrumentSeries],
        universe: Option<&UniverseMembership>,
        configs: &[SimulationConfig],
        risk_free_rate: f64,
    ) -> Result<Vec<SweepOutcome>, RsitraderError> {
        for config in configs {
            config.validate()?;
        }

        let all;
        let universe = match universe {
            Some(u) => u,
            None => {
                all = UniverseMembership::all_of(series);
                &all
            }
        };
        let timeline = build_unified_timeline(series);

        let groups: BTreeSet<IndicatorParams> =
            configs.iter().map(SimulationConfig::indicator_params).collect();

        let frame_sets: BTreeMap<IndicatorParams, FrameSet<'_>> = if self.parallel {
            groups
                .iter()
                .collect::<Vec<_>>()
                .into_par_iter()
                .map(|params| (*params, FrameSet::prepare(series, params)))
                .collect()
        } else {
            groups
                .iter()
                .map(|params| (*params, FrameSet::prepare(series, params)))
                .collect()
        };

        info!(
            configs = configs.len(),
            frame_sets = frame_sets.len(),
            parallel = self.parallel,
            "starting sweep"
        );

        let run_one = |(index, config): (usize, &SimulationConfig)| -> Result<SweepOutcome, RsitraderError> {
            let frames = frame_sets.get(&config.indicator_params()).ok_or_else(|| {
                RsitraderError::invalid("strategy", "oscillator_window", "no signal frames prepared")
            })?;
            let result = run_prepared(frames, &timeline, universe, config)?;
            let summary = PerformanceSummary::compute(
                result.equity_curve(),
                result.trades(),
                config.initial_capital,
                risk_free_rate,
            );
            Ok(SweepOutcome {
                index,
                config: config.clone(),
                result,
                summary,
            })
        };

        if self.parallel {
            configs
                .par_iter()
                .enumerate()
                .map(run_one)
                .collect::<Result<Vec<_>, RsitraderError>>()
        } else {
            configs
                .iter()
                .enumerate()
                .map(run_one)
                .collect::<Result<Vec<_>, RsitraderError>>()
        }
    }
}
