use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Minutes between two slots of the model grid
pub const STEP_MINUTES: i32 = 5;

/// 09:30 to 16:00 on the 5-minute grid
pub const SESSION_STEPS: usize = 78;

/// How far ahead a prediction looks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Horizon {
    /// Stored as `horizon_minutes`; one day is recorded as 1440
    pub minutes: i32,
    /// Forward step on the 5-minute grid
    pub steps: usize,
}

impl Horizon {
    /// Horizon of `minutes` within a session
    pub const fn minutes(minutes: i32) -> Self {
        Self {
            minutes,
            steps: (minutes / STEP_MINUTES) as usize,
        }
    }

    /// One full trading session ahead
    pub const fn one_day() -> Self {
        Self {
            minutes: 24 * 60,
            steps: SESSION_STEPS,
        }
    }
}

/// Next 5 minute bar only
pub fn single_step() -> Vec<Horizon> {
    vec![Horizon::minutes(5)]
}

/// 5m, 15m, 30m, 60m and one session ahead
pub fn multi_interval() -> Vec<Horizon> {
    vec![
        Horizon::minutes(5),
        Horizon::minutes(15),
        Horizon::minutes(30),
        Horizon::minutes(60),
        Horizon::one_day(),
    ]
}

pub fn configured(multi: bool) -> Vec<Horizon> {
    if multi {
        multi_interval()
    } else {
        single_step()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizon_steps() {
        let steps: Vec<usize> = multi_interval().iter().map(|h| h.steps).collect();
        assert_eq!(steps, vec![1, 3, 6, 12, 78]);
    }

    #[test]
    fn test_configured() {
        assert_eq!(configured(false), vec![Horizon::minutes(5)]);
        assert_eq!(configured(true).len(), 5);
        assert_eq!(configured(true)[4].minutes, 1440);
    }
}
