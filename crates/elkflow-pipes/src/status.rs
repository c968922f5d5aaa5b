use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PipeDisposition {
    #[default]
    Waiting,
    Running,
    Done,
    Error,
}

impl PipeDisposition {
    /// Human readable state: `waiting`, `running`, `ok` or `error`.
    pub fn state(self) -> &'static str {
        match self {
            PipeDisposition::Waiting => "waiting",
            PipeDisposition::Running => "running",
            PipeDisposition::Done => "ok",
            PipeDisposition::Error => "error",
        }
    }

    /// Progress contribution in `[0, 1]`.
    pub fn step(self) -> f64 {
        match self {
            PipeDisposition::Waiting => 0.0,
            PipeDisposition::Running => 0.5,
            PipeDisposition::Done | PipeDisposition::Error => 1.0,
        }
    }
}

/// Last reported state of a pipe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipeStatus {
    pub disposition: PipeDisposition,
    pub elapsed: Option<Duration>,
    pub exception: Option<String>,
    pub updated: Option<DateTime<Local>>,
}

impl PipeStatus {
    pub fn new(disposition: PipeDisposition) -> Self {
        Self {
            disposition,
            elapsed: None,
            exception: None,
            updated: Some(Local::now()),
        }
    }

    pub fn waiting() -> Self {
        Self::new(PipeDisposition::Waiting)
    }

    pub fn running() -> Self {
        Self::new(PipeDisposition::Running)
    }

    pub fn done(elapsed: Option<Duration>) -> Self {
        Self {
            elapsed,
            ..Self::new(PipeDisposition::Done)
        }
    }

    pub fn error(exception: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            elapsed: Some(elapsed),
            exception: Some(exception.into()),
            ..Self::new(PipeDisposition::Error)
        }
    }

    pub fn state(&self) -> &'static str {
        self.disposition.state()
    }

    pub fn step(&self) -> f64 {
        self.disposition.step()
    }

    pub fn is_done(&self) -> bool {
        self.disposition == PipeDisposition::Done
    }
}

impl fmt::Display for PipeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state())?;
        if let Some(elapsed) = self.elapsed {
            write!(f, " ({})", format_elapsed(elapsed))?;
        }
        if let Some(exception) = &self.exception {
            write!(f, ": {exception}")?;
        }
        Ok(())
    }
}

/// Compact duration: `1.2ms`, `3.4s`, `2m5s`, `1h2m3s`, `1d2h3m4s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        let (days, rem) = (secs / 86_400, secs % 86_400);
        let (hours, rem) = (rem / 3_600, rem % 3_600);
        let (minutes, seconds) = (rem / 60, rem % 60);
        return if days > 0 {
            format!("{days}d{hours}h{minutes}m{seconds}s")
        } else if hours > 0 {
            format!("{hours}h{minutes}m{seconds}s")
        } else {
            format!("{minutes}m{seconds}s")
        };
    }
    if secs >= 1 {
        return format!("{:.1}s", elapsed.as_secs_f64());
    }
    format!("{:.1}ms", elapsed.as_secs_f64() * 1_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_compact() {
        assert_eq!(format_elapsed(Duration::from_micros(1_200)), "1.2ms");
        assert_eq!(format_elapsed(Duration::from_millis(3_400)), "3.4s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m5s");
        assert_eq!(format_elapsed(Duration::from_secs(3_723)), "1h2m3s");
        assert_eq!(format_elapsed(Duration::from_secs(93_784)), "1d2h3m4s");
    }

    #[test]
    fn status_renders_state_elapsed_and_exception() {
        let status = PipeStatus::error("boom", Duration::from_secs(2));
        assert_eq!(status.to_string(), "error (2.0s): boom");
        assert_eq!(PipeStatus::done(None).to_string(), "ok");
        assert_eq!(PipeStatus::running().step(), 0.5);
    }
}
