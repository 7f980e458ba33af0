//! # Margin Calculator Values
//!
//! Reference values of the margin engine for the default pool parameters
//! (alpha 0.04, beta 1, sigma² 0.15, one year horizon, multipliers 1.5 / 0.7).
//! The APY bounds match exactly. Worst-case factors carry a residual of a few
//! dozen wei from the reference's own rounding, and margins scale that
//! residual by the variable balance.

#[cfg(test)]
mod tests {
    use fixfloat_core::constants::*;
    use fixfloat_core::margin::*;

    const WEEK: i128 = SECONDS_IN_WEEK * WAD;
    const NOW: i128 = 1_640_000_000 * WAD;

    /// Wei of drift allowed on a worst-case variable factor
    const FACTOR_TOLERANCE: i128 = 100;

    fn assert_close(actual: i128, expected: i128, tolerance: i128) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {} got {} (off by {})",
            expected,
            actual,
            (actual - expected).abs()
        );
    }

    fn calculator() -> MarginCalculator {
        MarginCalculator::new(MarginCalculatorParameters::default()).unwrap()
    }

    fn trader(fixed: i128, variable: i128, is_lm: bool) -> TraderMarginRequirementParams {
        TraderMarginRequirementParams {
            fixed_token_balance: fixed * WAD,
            variable_token_balance: variable * WAD,
            term_start_timestamp_wad: NOW - WEEK,
            term_end_timestamp_wad: NOW + WEEK,
            is_lm,
            historical_apy_wad: WAD / 10,
        }
    }

    #[test]
    fn test_apy_bounds() {
        let calculator = calculator();
        let apy = 2 * WAD / 100;

        let upper = calculator.compute_apy_bound(NOW + WEEK, NOW, apy, true).unwrap();
        assert_eq!(upper, 24_278_147_968_583_284);

        let lower = calculator.compute_apy_bound(NOW + WEEK, NOW, apy, false).unwrap();
        assert_eq!(lower, 17_456_226_370_556_757);
    }

    #[test]
    fn test_worst_case_variable_factor_quadrants() {
        let calculator = calculator();
        let term = 2 * WEEK;
        let apy = WAD / 10;

        let expected = [
            (true, true, 4_123_691_408_399_440),
            (true, false, 6_185_537_112_599_160),
            (false, true, 3_543_058_379_114_670),
            (false, false, 2_480_140_865_380_269),
        ];
        for (is_ft, is_lm, value) in expected {
            let factor = calculator
                .worst_case_variable_factor_at_maturity(term, NOW + WEEK, NOW, is_ft, is_lm, apy)
                .unwrap();
            assert_close(factor, value, FACTOR_TOLERANCE);
        }
    }

    #[test]
    fn test_trader_margin_requirements() {
        let calculator = calculator();

        let cases = [
            (1_000, -30, true, 259_850_901_583_632_800),
            (1_000, -3_000, true, 0),
            (1_000, -30, false, 197_995_530_457_641_200),
            (1_000, -3_000, false, 0),
            (-1_000, 3_000, true, 10_245_613_493_508_394_000),
            (-1_000, 3_000, false, 7_056_860_952_305_191_000),
        ];
        for (fixed, variable, is_lm, expected) in cases {
            let requirement = calculator
                .get_trader_margin_requirement(&trader(fixed, variable, is_lm), NOW)
                .unwrap();
            // the factor drift is multiplied by every whole variable token
            assert_close(requirement, expected, variable.abs() * FACTOR_TOLERANCE);
        }
    }

    #[test]
    fn test_liquidation_margin_dominates_initial() {
        // The initial margin multipliers move each bound so that the model
        // margin shrinks: the VT lower bound is scaled down against a long
        // variable balance, the FT upper bound scaled up against a short one
        let calculator = calculator();
        for (fixed, variable) in [(-1_000, 3_000), (1_000, -30), (500, -10)] {
            let lm = calculator
                .get_trader_margin_requirement(&trader(fixed, variable, true), NOW)
                .unwrap();
            let im = calculator
                .get_trader_margin_requirement(&trader(fixed, variable, false), NOW)
                .unwrap();
            assert!(lm > im, "fixed {} variable {}: lm {} im {}", fixed, variable, lm, im);
        }
    }

    #[test]
    fn test_trader_liquidatable() {
        let calculator = calculator();
        assert!(calculator
            .is_liquidatable_trader(&trader(-1_000, 3_000, false), NOW, 0)
            .unwrap());
        assert!(!calculator
            .is_liquidatable_trader(&trader(-1_000, 3_000, false), NOW, 11 * WAD)
            .unwrap());
    }

    #[test]
    fn test_position_liquidatable() {
        let calculator = calculator();
        let position = PositionMarginRequirementParams {
            tick_lower: -1,
            tick_upper: 1,
            current_tick: 0,
            liquidity: WAD_U128,
            fixed_token_balance: -3_000 * WAD,
            variable_token_balance: 1_000 * WAD,
            variable_factor_wad: 2 * WAD / 100,
            term_start_timestamp_wad: NOW - WEEK,
            term_end_timestamp_wad: NOW + WEEK,
            is_lm: false,
            historical_apy_wad: 3 * WAD / 10,
        };
        assert!(calculator.is_liquidatable_position(&position, NOW, 0).unwrap());
    }

    #[test]
    fn test_minimum_margin_floor_applies_to_traders() {
        let mut params = MarginCalculatorParameters::default();
        params.min_margin_to_incentivise_liquidators = 1_000 * WAD;
        let calculator = MarginCalculator::new(params).unwrap();

        let requirement = calculator
            .get_trader_margin_requirement(&trader(1_000, -30, true), NOW)
            .unwrap();
        assert_eq!(requirement, 1_000 * WAD);

        // positions without downside still need nothing
        let requirement = calculator
            .get_trader_margin_requirement(&trader(1_000, 30, true), NOW)
            .unwrap();
        assert_eq!(requirement, 0);
    }
}
