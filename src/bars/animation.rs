use crate::config::AnimationConfig;
use crate::error::ConfigError;

/// Upper bound for [`AnimationEngine::ticks_to_settle`].
const MAX_SETTLE_TICKS: usize = 100_000;

/// Eases displayed bars toward their targets, rising faster than falling.
#[derive(Debug, Clone)]
pub struct AnimationEngine {
    config: AnimationConfig,
}

impl AnimationEngine {
    pub fn new(config: AnimationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    /// Advances `current` by one tick. Returns `true` while any bar is still
    /// visibly away from its target.
    pub fn step(&self, targets: &[f32], current: &mut [f32]) -> bool {
        let mut dirty = false;
        for (bar, &target) in current.iter_mut().zip(targets) {
            *bar = self.ease(*bar, target);
            if (target - *bar).abs() > self.config.settle_tolerance {
                dirty = true;
            }
        }
        dirty
    }

    fn ease(&self, current: f32, target: f32) -> f32 {
        let AnimationConfig {
            attack_speed,
            release_speed,
            max_step,
            ..
        } = self.config;

        let delta = target - current;
        let step = if delta > 0.0 {
            delta * attack_speed
        } else if delta < 0.0 {
            delta * release_speed
        } else {
            0.0
        };
        let step = step.clamp(-max_step, max_step);

        let mut next = current + step;
        if delta > 0.0 && next > target {
            next = target;
        }
        if delta < 0.0 && next < target {
            next = target;
        }
        next.clamp(0.0, 1.0)
    }

    /// Ticks a single bar needs to get from `from` to within the settle
    /// tolerance of `to`.
    pub fn ticks_to_settle(&self, from: f32, to: f32) -> usize {
        let mut value = from;
        let mut ticks = 0;
        while (to - value).abs() > self.config.settle_tolerance && ticks < MAX_SETTLE_TICKS {
            value = self.ease(value, to);
            ticks += 1;
        }
        ticks
    }
}

impl Default for AnimationEngine {
    fn default() -> Self {
        Self {
            config: AnimationConfig::default(),
        }
    }
}
