use std::num::NonZeroUsize;
use std::time::Duration;

use quanta::Clock;

/// Elapsed time of each repetition, in the order they ran.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimingSample {
    durations: Vec<Duration>,
}

impl TimingSample {
    pub fn new(durations: Vec<Duration>) -> Self {
        Self { durations }
    }

    pub fn repetitions(&self) -> usize {
        self.durations.len()
    }

    /// Best of K: the fastest repetition.
    pub fn best(&self) -> Option<Duration> {
        self.durations.iter().min().copied()
    }
}

/// Runs a callable repeatedly and times each call.
pub trait TimingFacility {
    /// Time `repetitions` calls of `f`. Returns the sample and the output of
    /// the last call; every output is dropped outside the timed window.
    fn measure<R, E>(
        &self,
        repetitions: NonZeroUsize,
        f: impl FnMut() -> Result<R, E>,
    ) -> Result<(TimingSample, R), E>;
}

/// Wall-clock timing on a [`quanta::Clock`]. With more than one repetition an
/// untimed warm-up call runs first so first-touch costs stay out of the sample.
pub struct BestOf {
    clock: Clock,
}

impl BestOf {
    pub fn new() -> Self {
        Self {
            clock: Clock::new(),
        }
    }
}

impl Default for BestOf {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingFacility for BestOf {
    fn measure<R, E>(
        &self,
        repetitions: NonZeroUsize,
        mut f: impl FnMut() -> Result<R, E>,
    ) -> Result<(TimingSample, R), E> {
        if repetitions.get() > 1 {
            drop(f()?);
        }

        let mut durations = Vec::with_capacity(repetitions.get());
        let start = self.clock.now();
        let mut last = f()?;
        durations.push(self.clock.now().duration_since(start));

        for _ in 1..repetitions.get() {
            let start = self.clock.now();
            let out = f()?;
            durations.push(self.clock.now().duration_since(start));
            last = out;
        }

        Ok((TimingSample::new(durations), last))
    }
}

pub fn format_duration(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        format!("{:.2}ms", ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_is_the_minimum() {
        let sample = TimingSample::new(vec![
            Duration::from_millis(5),
            Duration::from_millis(2),
            Duration::from_millis(7),
        ]);
        assert_eq!(sample.best(), Some(Duration::from_millis(2)));
        assert_eq!(TimingSample::default().best(), None);
    }

    #[test]
    fn warmup_call_is_not_recorded() {
        let mut calls = 0;
        let (sample, last) = BestOf::new()
            .measure(NonZeroUsize::new(3).unwrap(), || {
                calls += 1;
                Ok::<_, ()>(calls)
            })
            .unwrap();
        assert_eq!(calls, 4);
        assert_eq!(sample.repetitions(), 3);
        assert_eq!(last, 4);
    }

    #[test]
    fn single_repetition_skips_warmup() {
        let mut calls = 0;
        BestOf::new()
            .measure(NonZeroUsize::new(1).unwrap(), || {
                calls += 1;
                Ok::<_, ()>(())
            })
            .unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn formats_millis_and_seconds() {
        assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.50s");
    }
}
