//! Priority-ordered setup selection.
//!
//! First match wins, top to bottom. An unconfirmed CHOCH vetoes
//! everything below it: reversal evidence without its confirming BOS is
//! a no-trade condition, not a signal.

use crate::models::{BreakoutStatus, IbState, RegimeKind, SetupId, StructureStatus};

pub fn choose_setup(
    regime: RegimeKind,
    ib_state: IbState,
    breakout_status: BreakoutStatus,
    structure_status: StructureStatus,
    spring_confirmed: bool,
    cup_confirmed: bool,
) -> SetupId {
    if structure_status == StructureStatus::ChochPlusBosConfirmed {
        return SetupId::S3;
    }
    if structure_status == StructureStatus::ChochOnly {
        return SetupId::NoValidSetup;
    }
    if spring_confirmed {
        return SetupId::S6;
    }
    if regime == RegimeKind::TrendContinuation && breakout_status == BreakoutStatus::ValidBreakout
    {
        return SetupId::S1;
    }
    if regime == RegimeKind::TrendContinuation && cup_confirmed {
        return SetupId::S5;
    }
    if regime == RegimeKind::TrendContinuation
        && matches!(ib_state, IbState::InsideIbRange | IbState::FailedBreakBelowIbl)
    {
        return SetupId::S2;
    }
    if matches!(regime, RegimeKind::PotentialReversal | RegimeKind::RangeRotation)
        && matches!(
            ib_state,
            IbState::FailedBreakAboveIbh | IbState::FailedBreakBelowIbl
        )
    {
        return SetupId::S3;
    }
    if regime == RegimeKind::RangeRotation {
        return SetupId::S4;
    }
    SetupId::NoValidSetup
}
