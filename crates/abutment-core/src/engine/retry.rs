/// Result of a bounded fallback search.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackOutcome<T> {
    /// The first non-empty result, if any level produced one.
    pub value: Option<T>,
    /// The last level attempted.
    pub level: u32,
    pub attempts: usize,
}

/// An explicit, finite list of levels to try in order.
///
/// The search stops at the first level that yields a value; when every level comes back
/// empty the empty result is accepted as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    levels: Vec<u32>,
}

impl Fallback {
    pub fn new(mut levels: Vec<u32>, max_attempts: usize) -> Self {
        levels.truncate(max_attempts.max(1));
        Self { levels }
    }

    /// `start`, `start − step`, `start − 2·step`, … while positive, capped at
    /// `max_attempts` levels.
    pub fn descending(start: u32, step: u32, max_attempts: u32) -> Self {
        let levels = std::iter::successors(Some(start), |level| {
            level.checked_sub(step).filter(|next| *next > 0 && step > 0)
        })
        .take(max_attempts.max(1) as usize)
        .collect();
        Self { levels }
    }

    pub fn levels(&self) -> &[u32] {
        &self.levels
    }

    pub fn run<T, E>(
        &self,
        mut attempt: impl FnMut(u32) -> Result<Option<T>, E>,
    ) -> Result<FallbackOutcome<T>, E> {
        let mut last_level = self.levels.first().copied().unwrap_or(0);
        for (i, &level) in self.levels.iter().enumerate() {
            last_level = level;
            if let Some(value) = attempt(level)? {
                return Ok(FallbackOutcome {
                    value: Some(value),
                    level,
                    attempts: i + 1,
                });
            }
        }
        Ok(FallbackOutcome {
            value: None,
            level: last_level,
            attempts: self.levels.len(),
        })
    }
}
