//! Per-class modulo sub-sampling.

use crate::domain::MouthClass;

/// How often each class is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    /// Persist every Nth open-mouth frame.
    pub open_step: u64,
    /// Persist every Mth closed-mouth frame.
    pub closed_step: u64,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            open_step: 1,
            closed_step: 4,
        }
    }
}

impl SamplingPolicy {
    /// Creates a policy, raising zero steps to 1.
    #[must_use]
    pub fn new(open_step: u64, closed_step: u64) -> Self {
        Self {
            open_step: open_step.max(1),
            closed_step: closed_step.max(1),
        }
    }

    const fn step(&self, class: MouthClass) -> u64 {
        match class {
            MouthClass::Opened => self.open_step,
            MouthClass::Closed => self.closed_step,
        }
    }
}

/// Run-scoped read and saved counters for both classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerState {
    /// Open-mouth frames classified.
    pub open_read: u64,
    /// Closed-mouth frames classified.
    pub closed_read: u64,
    /// Open-mouth crops persisted.
    pub open_saved: u64,
    /// Closed-mouth crops persisted.
    pub closed_saved: u64,
}

impl SamplerState {
    /// Counts one classified frame and decides whether to keep it.
    ///
    /// Returns the class read counter when it is a multiple of the class step,
    /// otherwise `None`.
    pub fn admit(&mut self, class: MouthClass, policy: &SamplingPolicy) -> Option<u64> {
        let read = match class {
            MouthClass::Opened => &mut self.open_read,
            MouthClass::Closed => &mut self.closed_read,
        };
        *read += 1;
        let step = policy.step(class).max(1);
        (*read % step == 0).then_some(*read)
    }

    /// Counts one persisted crop.
    pub fn mark_saved(&mut self, class: MouthClass) {
        match class {
            MouthClass::Opened => self.open_saved += 1,
            MouthClass::Closed => self.closed_saved += 1,
        }
    }

    /// Frames classified across both classes.
    #[must_use]
    pub const fn total_read(&self) -> u64 {
        self.open_read + self.closed_read
    }

    /// Crops persisted across both classes.
    #[must_use]
    pub const fn total_saved(&self) -> u64 {
        self.open_saved + self.closed_saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_step_one_keeps_everything() {
        let policy = SamplingPolicy::default();
        let mut state = SamplerState::default();
        let kept: Vec<_> = (0..5)
            .filter_map(|_| state.admit(MouthClass::Opened, &policy))
            .collect();
        assert_eq!(kept, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_closed_step_keeps_multiples() {
        let policy = SamplingPolicy::default();
        let mut state = SamplerState::default();
        let kept: Vec<_> = (0..10)
            .filter_map(|_| state.admit(MouthClass::Closed, &policy))
            .collect();
        assert_eq!(kept, vec![4, 8]);
        assert_eq!(state.closed_read, 10);
    }

    #[test]
    fn test_kept_count_is_floor_of_reads_over_step() {
        for step in 1..=7u64 {
            for n in 0..30u64 {
                let policy = SamplingPolicy::new(step, step);
                let mut state = SamplerState::default();
                let kept = (0..n)
                    .filter_map(|_| state.admit(MouthClass::Opened, &policy))
                    .count() as u64;
                assert_eq!(kept, n / step, "step {step}, n {n}");
            }
        }
    }

    #[test]
    fn test_classes_are_counted_independently() {
        let policy = SamplingPolicy::new(2, 3);
        let mut state = SamplerState::default();

        assert_eq!(state.admit(MouthClass::Opened, &policy), None);
        assert_eq!(state.admit(MouthClass::Closed, &policy), None);
        assert_eq!(state.admit(MouthClass::Opened, &policy), Some(2));
        assert_eq!(state.admit(MouthClass::Closed, &policy), None);
        assert_eq!(state.admit(MouthClass::Closed, &policy), Some(3));
        assert_eq!(state.total_read(), 5);
    }

    #[test]
    fn test_zero_step_is_raised() {
        let policy = SamplingPolicy::new(0, 0);
        assert_eq!(policy.open_step, 1);
        assert_eq!(policy.closed_step, 1);
    }

    #[test]
    fn test_mark_saved() {
        let mut state = SamplerState::default();
        state.mark_saved(MouthClass::Opened);
        state.mark_saved(MouthClass::Closed);
        state.mark_saved(MouthClass::Closed);
        assert_eq!(state.open_saved, 1);
        assert_eq!(state.closed_saved, 2);
        assert_eq!(state.total_saved(), 3);
    }
}
