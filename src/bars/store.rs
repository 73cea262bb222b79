use parking_lot::Mutex;

use super::animation::AnimationEngine;

#[derive(Debug)]
struct BarState {
    targets: Vec<f32>,
    current: Vec<f32>,
    epoch: u64,
}

/// Latest bar targets and the displayed values, shared between the audio and
/// render contexts.
///
/// Single-slot semantics: publishing replaces the previous targets whether or
/// not anyone saw them. The lock is only held while copying arrays.
#[derive(Debug)]
pub struct BarStore {
    bar_count: usize,
    state: Mutex<BarState>,
}

impl BarStore {
    pub fn new(bar_count: usize) -> Self {
        Self {
            bar_count,
            state: Mutex::new(BarState {
                targets: vec![0.0; bar_count],
                current: vec![0.0; bar_count],
                epoch: 0,
            }),
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    /// Replaces the targets. Values are clamped to `[0, 1]`; missing bars
    /// become 0 and surplus values are dropped.
    pub fn publish_targets(&self, values: &[f32]) {
        let mut state = self.state.lock();
        for (i, target) in state.targets.iter_mut().enumerate() {
            *target = values.get(i).map_or(0.0, |v| sanitize(*v));
        }
    }

    /// Sets every target to zero so the bars decay.
    pub fn clear_targets(&self) {
        self.state.lock().targets.fill(0.0);
    }

    /// Zeros targets and displayed bars immediately.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.targets.fill(0.0);
        state.current.fill(0.0);
        state.epoch += 1;
    }

    pub fn targets(&self) -> Vec<f32> {
        self.state.lock().targets.clone()
    }

    /// Copy of the displayed bars for drawing.
    pub fn snapshot(&self) -> Vec<f32> {
        self.state.lock().current.clone()
    }

    /// Runs one animation tick outside the lock and stores the result.
    ///
    /// A tick that overlaps a [`reset`](Self::reset) is discarded so stale
    /// values never reappear.
    pub fn tick(&self, engine: &AnimationEngine) -> bool {
        let (targets, mut current, epoch) = {
            let state = self.state.lock();
            (state.targets.clone(), state.current.clone(), state.epoch)
        };

        let dirty = engine.step(&targets, &mut current);

        let mut state = self.state.lock();
        if state.epoch == epoch {
            state.current.copy_from_slice(&current);
        }
        dirty
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
