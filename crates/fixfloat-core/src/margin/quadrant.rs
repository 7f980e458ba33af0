//! Worst-case selection for the four position orientations

use crate::constants::WAD;
use crate::margin::params::MarginCalculatorParameters;

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

/// Orientation and margin mode of a position. A fixed taker (FT) loses when
/// the variable rate rises, a variable taker (VT) when it falls, so each side
/// is priced off the bound in its adverse direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub enum WorstCaseQuadrant {
    FixedTakerLiquidation,
    FixedTakerInitial,
    VariableTakerLiquidation,
    VariableTakerInitial,
}

impl WorstCaseQuadrant {
    pub const ALL: [WorstCaseQuadrant; 4] = [
        WorstCaseQuadrant::FixedTakerLiquidation,
        WorstCaseQuadrant::FixedTakerInitial,
        WorstCaseQuadrant::VariableTakerLiquidation,
        WorstCaseQuadrant::VariableTakerInitial,
    ];

    pub fn new(is_ft: bool, is_lm: bool) -> Self {
        match (is_ft, is_lm) {
            (true, true) => Self::FixedTakerLiquidation,
            (true, false) => Self::FixedTakerInitial,
            (false, true) => Self::VariableTakerLiquidation,
            (false, false) => Self::VariableTakerInitial,
        }
    }

    /// Whether the upper APY bound is the adverse one
    pub fn is_upper(self) -> bool {
        matches!(self, Self::FixedTakerLiquidation | Self::FixedTakerInitial)
    }

    pub fn is_lm(self) -> bool {
        matches!(self, Self::FixedTakerLiquidation | Self::VariableTakerLiquidation)
    }

    /// Scaling applied to the bound: initial margin stretches it away from
    /// the historical estimate, liquidation margin uses it as is
    pub fn multiplier(self, params: &MarginCalculatorParameters) -> i128 {
        match self {
            Self::FixedTakerLiquidation | Self::VariableTakerLiquidation => WAD,
            Self::FixedTakerInitial => params.apy_upper_multiplier_wad,
            Self::VariableTakerInitial => params.apy_lower_multiplier_wad,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrant_selection() {
        let params = MarginCalculatorParameters::default();

        for quadrant in WorstCaseQuadrant::ALL {
            let rebuilt = WorstCaseQuadrant::new(quadrant.is_upper(), quadrant.is_lm());
            assert_eq!(rebuilt, quadrant);
        }

        assert!(WorstCaseQuadrant::new(true, false).is_upper());
        assert!(!WorstCaseQuadrant::new(false, true).is_upper());
        assert_eq!(WorstCaseQuadrant::FixedTakerInitial.multiplier(&params), 3 * WAD / 2);
        assert_eq!(WorstCaseQuadrant::VariableTakerInitial.multiplier(&params), 7 * WAD / 10);
        assert_eq!(WorstCaseQuadrant::VariableTakerLiquidation.multiplier(&params), WAD);
    }
}
