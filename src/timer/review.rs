use serde::{Deserialize, Serialize};

/// A stopped session waiting for the user to commit or discard it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    duration_minutes: u32,
    distractions: u32,
}

impl Review {
    pub fn new(duration_minutes: u32) -> Self {
        Self {
            duration_minutes,
            distractions: 0,
        }
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn distractions(&self) -> u32 {
        self.distractions
    }

    pub fn increment(&mut self) -> u32 {
        self.distractions = self.distractions.saturating_add(1);
        self.distractions
    }

    /// Floors at zero.
    pub fn decrement(&mut self) -> u32 {
        self.distractions = self.distractions.saturating_sub(1);
        self.distractions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_never_drops_below_zero() {
        let mut review = Review::new(12);
        for _ in 0..5 {
            assert_eq!(review.decrement(), 0);
        }
        assert_eq!(review.increment(), 1);
        assert_eq!(review.decrement(), 0);
        assert_eq!(review.duration_minutes(), 12);
    }

    #[test]
    fn counter_grows_without_cap() {
        let mut review = Review::new(20);
        for _ in 0..1000 {
            review.increment();
        }
        assert_eq!(review.distractions(), 1000);
    }
}
