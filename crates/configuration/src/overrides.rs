use crate::settings::Config;

/// Command-line overrides applied on top of the loaded configuration.
///
/// With the `clap` feature enabled this doubles as a flattened argument group.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct ConfigOverrides {
    /// Base seed for the simulation random streams.
    #[cfg_attr(feature = "clap", arg(long))]
    pub seed: Option<u64>,

    /// Number of simulated paths.
    #[cfg_attr(feature = "clap", arg(long))]
    pub paths: Option<usize>,

    /// Simulation horizon in trading days.
    #[cfg_attr(feature = "clap", arg(long))]
    pub horizon_days: Option<usize>,

    /// Sub-steps per simulated trading day.
    #[cfg_attr(feature = "clap", arg(long))]
    pub steps_per_day: Option<usize>,

    /// Disable antithetic variates.
    #[cfg_attr(feature = "clap", arg(long))]
    pub no_antithetic: bool,

    /// Calibration window length.
    #[cfg_attr(feature = "clap", arg(long))]
    pub calibration_window: Option<usize>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(seed) = self.seed {
            config.simulation.seed = Some(seed);
        }
        if let Some(paths) = self.paths {
            config.simulation.paths = paths;
        }
        if let Some(days) = self.horizon_days {
            config.simulation.horizon_days = days;
        }
        if let Some(steps) = self.steps_per_day {
            config.simulation.steps_per_day = steps;
        }
        if self.no_antithetic {
            config.simulation.antithetic = false;
        }
        if let Some(window) = self.calibration_window {
            config.calibration.window = window;
        }
    }
}
