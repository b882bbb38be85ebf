use log::debug;
use rand::Rng;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

/// Longest accepted pause, in seconds.
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Inclusive range of seconds to wait, e.g. `1-3` or `1.5-4`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRange {
    pub fn new(min_secs: f64, max_secs: f64) -> Result<Self, String> {
        if !min_secs.is_finite() || !max_secs.is_finite() || min_secs < 0.0 {
            return Err(format!("invalid delay range {}-{}", min_secs, max_secs));
        }
        if max_secs > MAX_DELAY_SECS {
            return Err(format!(
                "delay {} exceeds the {} second maximum",
                max_secs, MAX_DELAY_SECS
            ));
        }
        if min_secs > max_secs {
            return Err(format!(
                "delay range minimum {} is greater than maximum {}",
                min_secs, max_secs
            ));
        }
        Ok(Self { min_secs, max_secs })
    }

    #[cfg(test)]
    pub const fn none() -> Self {
        Self { min_secs: 0.0, max_secs: 0.0 }
    }

    pub fn sample(&self) -> Duration {
        let secs = if self.max_secs > self.min_secs {
            rand::thread_rng().gen_range(self.min_secs..=self.max_secs)
        } else {
            self.min_secs
        };
        Duration::from_secs_f64(secs)
    }
}

impl FromStr for DelayRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = match s.split_once('-') {
            Some((min, max)) => (min.trim(), max.trim()),
            None => (s.trim(), s.trim()),
        };
        let min: f64 = min
            .parse()
            .map_err(|_| format!("invalid delay '{}' (expected e.g. 1-3)", s))?;
        let max: f64 = max
            .parse()
            .map_err(|_| format!("invalid delay '{}' (expected e.g. 1-3)", s))?;
        Self::new(min, max)
    }
}

/// Throttle applied between outbound requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Politeness {
    pub per_offer: DelayRange,
    pub per_page: DelayRange,
}

impl Default for Politeness {
    fn default() -> Self {
        Self {
            per_offer: DelayRange { min_secs: 1.0, max_secs: 3.0 },
            per_page: DelayRange { min_secs: 2.0, max_secs: 6.0 },
        }
    }
}

impl Politeness {
    #[cfg(test)]
    pub const fn disabled() -> Self {
        Self {
            per_offer: DelayRange::none(),
            per_page: DelayRange::none(),
        }
    }

    pub fn pause_offer(&self) {
        pause("offer", &self.per_offer);
    }

    pub fn pause_page(&self) {
        pause("page", &self.per_page);
    }
}

fn pause(label: &str, range: &DelayRange) {
    let delay = range.sample();
    if delay.is_zero() {
        return;
    }
    debug!("Waiting {:.1}s ({} delay)...", delay.as_secs_f64(), label);
    thread::sleep(delay);
}
