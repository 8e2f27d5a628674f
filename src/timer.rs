use std::time::Duration;

/// Phase of the pomodoro cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    #[strum(to_string = "Ready")]
    Idle,
    #[strum(to_string = "Focus Time")]
    Work,
    #[strum(to_string = "Short Break")]
    ShortBreak,
    #[strum(to_string = "Long Break")]
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        matches!(self, Phase::ShortBreak | Phase::LongBreak)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDurations {
    pub work: Duration,
    pub short_break: Duration,
    pub long_break: Duration,
    /// Every n-th completed pomodoro earns a long break.
    pub long_break_every: u32,
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            work: Duration::from_secs(25 * 60),
            short_break: Duration::from_secs(5 * 60),
            long_break: Duration::from_secs(15 * 60),
            long_break_every: 4,
        }
    }
}

impl PhaseDurations {
    pub fn seconds(&self, phase: Phase) -> u32 {
        let duration = match phase {
            Phase::Idle | Phase::Work => self.work,
            Phase::ShortBreak => self.short_break,
            Phase::LongBreak => self.long_break,
        };
        u32::try_from(duration.as_secs()).unwrap_or(u32::MAX)
    }
}

/// Emitted by [`PomodoroTimer::tick`] when the countdown hits zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseCompletion {
    PomodoroCompleted { completed: u32, next: Phase },
    BreakFinished,
}

/// Client-local countdown state. Nothing here is persisted.
#[derive(Debug, Clone)]
pub struct PomodoroTimer {
    durations: PhaseDurations,
    phase: Phase,
    time_remaining: u32,
    running: bool,
    completed_pomodoros: u32,
    interrupted_pomodoros: u32,
    total_study_secs: u64,
}

impl PomodoroTimer {
    pub fn new(durations: PhaseDurations) -> Self {
        Self {
            time_remaining: durations.seconds(Phase::Work),
            durations,
            phase: Phase::Idle,
            running: false,
            completed_pomodoros: 0,
            interrupted_pomodoros: 0,
            total_study_secs: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn completed_pomodoros(&self) -> u32 {
        self.completed_pomodoros
    }

    pub fn interrupted_pomodoros(&self) -> u32 {
        self.interrupted_pomodoros
    }

    pub fn total_study_secs(&self) -> u64 {
        self.total_study_secs
    }

    pub fn durations(&self) -> &PhaseDurations {
        &self.durations
    }

    /// Fraction of the current phase already elapsed, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        let total = self.durations.seconds(self.phase);
        if total == 0 || self.phase == Phase::Idle {
            return 0.0;
        }
        1.0 - f64::from(self.time_remaining) / f64::from(total)
    }

    /// Fresh session: counters cleared, work phase loaded but not running.
    pub fn begin_session(&mut self) {
        *self = Self::new(self.durations);
        self.enter(Phase::Work);
    }

    /// Back to the initial idle state.
    pub fn reset(&mut self) {
        *self = Self::new(self.durations);
    }

    /// Starts or pauses the countdown. Returns the new running flag, or
    /// `None` when there is nothing to run.
    pub fn toggle(&mut self) -> Option<bool> {
        if self.phase == Phase::Idle {
            return None;
        }
        if self.running {
            self.pause();
        } else {
            self.running = true;
        }
        Some(self.running)
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    /// One second of countdown. No-op unless running.
    pub fn tick(&mut self) -> Option<PhaseCompletion> {
        if !self.running || self.phase == Phase::Idle {
            return None;
        }

        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.phase == Phase::Work {
            self.total_study_secs += 1;
        }

        if self.time_remaining == 0 {
            Some(self.complete_phase())
        } else {
            None
        }
    }

    fn complete_phase(&mut self) -> PhaseCompletion {
        self.running = false;
        match self.phase {
            Phase::Work => {
                self.completed_pomodoros += 1;
                let every = self.durations.long_break_every.max(1);
                let next = if self.completed_pomodoros % every == 0 {
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                };
                self.enter(next);
                PhaseCompletion::PomodoroCompleted {
                    completed: self.completed_pomodoros,
                    next,
                }
            }
            Phase::ShortBreak | Phase::LongBreak | Phase::Idle => {
                self.enter(Phase::Work);
                PhaseCompletion::BreakFinished
            }
        }
    }

    /// Skips the current break. Rejected outside a break.
    pub fn skip_break(&mut self) -> bool {
        if !self.phase.is_break() {
            return false;
        }
        self.running = false;
        self.enter(Phase::Work);
        true
    }

    /// Discards the running work interval and counts it as interrupted.
    /// Seconds already ticked stay in `total_study_secs`.
    pub fn interrupt(&mut self) -> bool {
        if self.phase != Phase::Work || !self.running {
            return false;
        }
        self.running = false;
        self.interrupted_pomodoros += 1;
        self.enter(Phase::Work);
        true
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.time_remaining = self.durations.seconds(phase);
    }
}

impl Default for PomodoroTimer {
    fn default() -> Self {
        Self::new(PhaseDurations::default())
    }
}

/// `mm:ss`, minutes are not wrapped at 60.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
