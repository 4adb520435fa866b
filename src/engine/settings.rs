use serde::{Deserialize, Serialize};

use super::SimulationError;

/// Relative weights of the three per-step actions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionWeights {
    #[serde(rename = "reply_weight")]
    pub reply: f64,
    #[serde(rename = "forward_weight")]
    pub forward: f64,
    #[serde(rename = "nothing_weight")]
    pub nothing: f64,
}

impl Default for ActionWeights {
    fn default() -> Self {
        Self {
            reply: 0.8,
            forward: 0.1,
            nothing: 0.1,
        }
    }
}

impl ActionWeights {
    /// Weights from reply/forward percentages; "nothing" takes what is left.
    pub fn from_percentages(reply_pct: u32, forward_pct: u32) -> Self {
        let nothing_pct = 100u32.saturating_sub(reply_pct.saturating_add(forward_pct));
        Self {
            reply: reply_pct as f64 / 100.0,
            forward: forward_pct as f64 / 100.0,
            nothing: nothing_pct as f64 / 100.0,
        }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.reply, self.forward, self.nothing]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    #[serde(flatten)]
    pub weights: ActionWeights,
    /// Chance, checked once per step after the second message, that a thread stops growing.
    pub early_end_chance: f64,
    /// Upper bound of the per-thread target length (the lower bound is 2).
    pub max_emails_per_thread: usize,
    /// Consecutive "nothing" steps after which a thread is considered finished.
    pub max_idle_ticks: usize,
    /// CC the remaining original recipients on replies.
    pub reply_all: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            weights: ActionWeights::default(),
            early_end_chance: 0.15,
            max_emails_per_thread: 9,
            max_idle_ticks: 50,
            reply_all: true,
        }
    }
}

impl SimulationSettings {
    pub fn validate(&self) -> Result<(), SimulationError> {
        let w = self.weights.as_array();
        if w.iter().any(|x| !x.is_finite() || *x < 0.0) {
            return Err(SimulationError::InvalidSettings(
                "action weights must be finite and non-negative".into(),
            ));
        }
        if w.iter().sum::<f64>() <= 0.0 {
            return Err(SimulationError::InvalidSettings(
                "at least one action weight must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.early_end_chance) {
            return Err(SimulationError::InvalidSettings(format!(
                "early_end_chance must be within 0..=1, got {}",
                self.early_end_chance
            )));
        }
        if self.max_emails_per_thread < 2 {
            return Err(SimulationError::InvalidSettings(format!(
                "max_emails_per_thread must be at least 2, got {}",
                self.max_emails_per_thread
            )));
        }
        if self.max_idle_ticks == 0 {
            return Err(SimulationError::InvalidSettings(
                "max_idle_ticks must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SimulationSettings::default().validate().is_ok());
    }

    #[test]
    fn test_from_percentages() {
        let w = ActionWeights::from_percentages(70, 20);
        assert!((w.reply - 0.7).abs() < 1e-9);
        assert!((w.forward - 0.2).abs() < 1e-9);
        assert!((w.nothing - 0.1).abs() < 1e-9);

        let w = ActionWeights::from_percentages(90, 30);
        assert_eq!(w.nothing, 0.0);
    }

    #[test]
    fn test_rejects_zero_weights() {
        let s = SimulationSettings {
            weights: ActionWeights {
                reply: 0.0,
                forward: 0.0,
                nothing: 0.0,
            },
            ..Default::default()
        };
        assert!(matches!(s.validate(), Err(SimulationError::InvalidSettings(_))));
    }

    #[test]
    fn test_rejects_short_threads() {
        let s = SimulationSettings {
            max_emails_per_thread: 1,
            ..Default::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_early_end() {
        let s = SimulationSettings {
            early_end_chance: 1.5,
            ..Default::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_toml_section() {
        let s: SimulationSettings =
            toml::from_str(
                "reply_weight = 0.5\nforward_weight = 0.5\nnothing_weight = 0.0\nmax_emails_per_thread = 4",
            )
            .unwrap();
        assert_eq!(s.weights.reply, 0.5);
        assert_eq!(s.max_emails_per_thread, 4);
        assert_eq!(s.early_end_chance, 0.15);
    }
}
