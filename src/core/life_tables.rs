//! IRS distribution-period tables.

/// First age with a uniform-lifetime divisor.
pub(crate) const UNIFORM_LIFETIME_START_AGE: u32 = 70;

// Ages 70..=120; 120 and older share the last divisor.
const UNIFORM_LIFETIME: [f64; 51] = [
    29.1, 28.2, 27.4, 26.5, 25.5, 24.6, 23.7, 22.9, 22.0, 21.1, // 70-79
    20.2, 19.4, 18.5, 17.7, 16.8, 16.0, 15.2, 14.4, 13.7, 12.9, // 80-89
    12.2, 11.5, 10.8, 10.1, 9.5, 8.9, 8.4, 7.8, 7.3, 6.8, // 90-99
    6.4, 6.0, 5.6, 5.2, 4.9, 4.6, 4.3, 4.1, 3.9, 3.7, // 100-109
    3.5, 3.4, 3.3, 3.1, 3.0, 2.9, 2.8, 2.7, 2.5, 2.3, // 110-119
    2.0, // 120+
];

// Ages 0..=120.
const SINGLE_LIFE: [f64; 121] = [
    84.6, 83.7, 82.8, 81.8, 80.8, 79.8, 78.8, 77.9, 76.9, 75.9, // 0-9
    74.9, 73.9, 72.9, 71.9, 70.9, 69.9, 69.0, 68.0, 67.0, 66.0, // 10-19
    65.0, 64.1, 63.1, 62.1, 61.1, 60.2, 59.2, 58.2, 57.3, 56.3, // 20-29
    55.3, 54.4, 53.4, 52.5, 51.5, 50.5, 49.6, 48.6, 47.7, 46.7, // 30-39
    45.7, 44.8, 43.8, 42.9, 41.9, 41.0, 40.0, 39.0, 38.1, 37.1, // 40-49
    36.2, 35.3, 34.3, 33.4, 32.5, 31.6, 30.6, 29.8, 28.9, 28.0, // 50-59
    27.1, 26.2, 25.4, 24.5, 23.7, 22.9, 22.0, 21.2, 20.4, 19.6, // 60-69
    18.8, 18.0, 17.2, 16.4, 15.6, 14.8, 14.1, 13.3, 12.6, 11.9, // 70-79
    11.2, 10.5, 9.9, 9.3, 8.7, 8.1, 7.6, 7.1, 6.6, 6.1, // 80-89
    5.7, 5.3, 4.9, 4.6, 4.3, 4.0, 3.7, 3.4, 3.2, 3.0, // 90-99
    2.8, 2.6, 2.5, 2.3, 2.2, 2.1, 2.1, 2.1, 2.0, 2.0, // 100-109
    2.0, 2.0, 2.0, 1.9, 1.9, 1.8, 1.8, 1.6, 1.4, 1.1, // 110-119
    1.0, // 120
];

/// Required-minimum-distribution divisor for an account owner of `age`.
pub fn uniform_lifetime_divisor(age: u32) -> Option<f64> {
    if age < UNIFORM_LIFETIME_START_AGE {
        return None;
    }
    let index = ((age - UNIFORM_LIFETIME_START_AGE) as usize).min(UNIFORM_LIFETIME.len() - 1);
    Some(UNIFORM_LIFETIME[index])
}

/// Life-expectancy divisor for an inherited account; `None` once the table runs out.
pub fn single_life_divisor(age: u32) -> Option<f64> {
    SINGLE_LIFE.get(age as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    fn uniform_lifetime_ages() -> std::ops::RangeInclusive<u32> {
        UNIFORM_LIFETIME_START_AGE..=UNIFORM_LIFETIME_START_AGE + UNIFORM_LIFETIME.len() as u32 - 1
    }

    #[test]
    fn uniform_table_covers_rmd_ages() {
        assert_eq!(uniform_lifetime_divisor(69), None);
        assert_eq!(uniform_lifetime_divisor(72), Some(27.4));
        assert_eq!(uniform_lifetime_divisor(120), Some(2.0));
        assert_eq!(uniform_lifetime_divisor(130), Some(2.0));
    }

    #[test]
    fn single_life_table_ends_after_120() {
        assert_eq!(single_life_divisor(49), Some(37.1));
        assert_eq!(single_life_divisor(120), Some(1.0));
        assert_eq!(single_life_divisor(121), None);
    }

    #[test]
    fn uniform_table_is_strictly_decreasing() {
        let ages: Vec<u32> = uniform_lifetime_ages().collect();
        for pair in ages.windows(2) {
            let younger = uniform_lifetime_divisor(pair[0]).expect("in table");
            let older = uniform_lifetime_divisor(pair[1]).expect("in table");
            assert!(older < younger, "divisor must drop from {} to {}", pair[0], pair[1]);
        }
    }

    proptest! {
        #[test]
        fn prop_single_life_never_increases(age in 0u32..120) {
            let now = single_life_divisor(age).expect("in table");
            let next = single_life_divisor(age + 1).expect("in table");
            prop_assert!(next <= now);
        }
    }
}
