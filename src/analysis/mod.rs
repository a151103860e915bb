//! The analysis engine: pure batch computation from cleaned series to
//! one immutable snapshot.

pub mod breakout;
pub mod divergence;
pub mod enrich;
pub mod fibonacci;
pub mod imbalance;
pub mod initial_balance;
pub mod liquidity;
pub mod patterns;
pub mod posture;
pub mod red_flags;
pub mod regime;
pub mod setup;
pub mod structure;
pub mod swings;
pub mod volume_profile;

use tracing::{debug, info_span};

use crate::constants::MAX_LEVEL_ZONES;
use crate::error::Result;
use crate::loader::LoadedInput;
use crate::models::{
    ContextSnapshot, DataSummary, EventSide, LevelsSection, Module, ModuleSet, Patterns,
    SetupSelection, StateAndRegime, TrendBias, VpvrSection,
};

/// Run every requested module over the loaded input and assemble the
/// snapshot. Pure and deterministic: same input, same output.
/// `swing_n` is the fractal pivot width; callers normally pass
/// [`crate::constants::SWING_PIVOT_WIDTH`].
pub fn build_context(
    symbol: &str,
    modules: &ModuleSet,
    swing_n: usize,
    input: &LoadedInput,
) -> Result<ContextSnapshot> {
    let span = info_span!("build_context", symbol, swing_n, modules = ?modules.names());
    let _guard = span.enter();

    let daily = enrich::EnrichedDaily::new(input.daily.clone(), swing_n);
    let intraday = enrich::EnrichedIntraday::new(input.intraday.clone());
    let last_close = daily.last_close();
    let prev_close = daily.prev_close();

    let events = structure::detect_structure_events(&daily);
    let (regime, structure_status) = regime::classify_regime(&daily, &events);
    debug!(?regime.regime, ?structure_status, events = events.len(), "structure pass done");

    let mut levels = swings::derive_levels(&daily.swing_high, &daily.swing_low);
    levels.truncate(MAX_LEVEL_ZONES);

    // The value-area read backs the balance/imbalance state even when
    // the vpvr section itself was not requested.
    let base_profile = volume_profile::fixed_profile(&daily);
    let (state, state_reason) = match (base_profile.val, base_profile.vah) {
        (Some(val), Some(vah)) => volume_profile::infer_state(last_close, val, vah, prev_close),
        _ => volume_profile::infer_state(last_close, last_close, last_close, prev_close),
    };

    let ib = initial_balance::latest_session_ib(&intraday);
    let period_ib = initial_balance::latest_period_ib(&daily);

    let nearest_mid = levels.last().map_or(last_close, |z| z.zone_mid);
    let role_reversal_note = posture::role_reversal(
        last_close,
        nearest_mid,
        regime.trend_bias == TrendBias::Bullish,
    );

    let breakout_snapshot = breakout::breakout_snapshot(&daily, &levels);

    // Patterns feed the setup decision, so they are always computed.
    let range_start = daily.len().saturating_sub(120);
    let range_low = daily.bars[range_start..]
        .iter()
        .map(|b| b.low)
        .fold(f64::INFINITY, f64::min);
    let range_high = daily.bars[range_start..]
        .iter()
        .map(|b| b.high)
        .fold(f64::NEG_INFINITY, f64::max);
    let premium_discount = patterns::premium_discount_zone(range_low, range_high, last_close);
    let wyckoff_phase = patterns::classify_wyckoff_phase(
        regime.regime,
        regime.trend_bias,
        premium_discount.zone,
    );
    let spring = patterns::detect_wyckoff_spring(&daily, wyckoff_phase);
    let cup = patterns::detect_cup_and_handle(&daily);

    let setup_id = setup::choose_setup(
        regime.regime,
        ib.state,
        breakout_snapshot.status,
        structure_status,
        spring.detected,
        cup.confirmed,
    );
    debug!(?setup_id, "setup selected");

    let imbalance_section = modules
        .contains(Module::Imbalance)
        .then(|| imbalance::build_section(&daily.bars));

    let liquidity = liquidity::derive_liquidity(
        last_close,
        &levels,
        imbalance_section.as_ref().map(|s| s.fvg_zones.as_slice()),
        &events,
    );

    let patterns_section = Patterns {
        cup_and_handle: cup,
        wyckoff: crate::models::WyckoffReport { phase: wyckoff_phase, spring },
        trendlines: patterns::detect_trendlines(&daily),
    };

    let smc_section = modules.contains(Module::Smc).then(|| {
        let internal_bias = match events.last().map(|e| e.event.side) {
            Some(EventSide::Up) => TrendBias::Bullish,
            Some(EventSide::Down) => TrendBias::Bearish,
            None => TrendBias::Neutral,
        };
        crate::models::SmcSection {
            equal_levels: patterns::detect_equal_levels(&daily),
            premium_discount: premium_discount.clone(),
            structure_bias: patterns::choose_structure_bias(regime.trend_bias, internal_bias),
            order_blocks: patterns::detect_order_blocks(&daily, &events),
        }
    });

    let vpvr_section = modules.contains(Module::Vpvr).then(|| {
        let acceptance = match (base_profile.vah, base_profile.val) {
            (Some(vah), Some(val)) => {
                volume_profile::acceptance_vs_value(last_close, vah, val, prev_close)
            }
            _ => crate::models::ValueAcceptance::InsideValue,
        };
        VpvrSection {
            profile: base_profile.clone(),
            acceptance,
            prior_session_pocs: volume_profile::prior_session_pocs(&intraday),
            anchored: volume_profile::anchored_profile(&daily, regime.trend_bias),
        }
    });

    let breakout_section = modules
        .contains(Module::Breakout)
        .then(|| breakout_snapshot.clone());

    let diagnostics = divergence::build_diagnostics(&daily);
    let red_flags = red_flags::evaluate(&red_flags::RedFlagInputs {
        daily: &daily,
        regime: regime.regime,
        structure_status,
        levels: &levels,
        breakout: Some(&breakout_snapshot),
        diagnostics: &diagnostics,
        smc: smc_section.as_ref(),
        modules,
    });
    debug!(
        flags = red_flags.flags.len(),
        ?red_flags.overall_severity,
        "red-flag pass done"
    );

    let levels_section = LevelsSection {
        zones: levels,
        ma_posture: posture::ma_posture(&daily),
        adaptive_ma: posture::choose_adaptive_ma(&daily),
        time_based_opens: posture::time_based_opens(&daily),
        round_levels: posture::nearest_round_levels(last_close),
        role_reversal_note,
        fib_context: fibonacci::derive_fib_context(&daily, regime.trend_bias),
    };

    let data = DataSummary {
        daily_rows: daily.len(),
        intraday_rows: intraday.bars.len(),
        corp_actions_rows: input.corp_actions_rows,
        daily_start: daily.bars[0].datetime,
        daily_end: daily.bars[daily.len() - 1].datetime,
        intraday_start: intraday.bars[0].datetime,
        intraday_end: intraday.bars[intraday.bars.len() - 1].datetime,
    };

    Ok(ContextSnapshot {
        symbol: symbol.to_uppercase(),
        modules: modules.names(),
        data,
        state_and_regime: StateAndRegime {
            state,
            state_reason,
            regime: regime.regime,
            trend_bias: regime.trend_bias,
            regime_proof: regime.proof,
            structure_status,
        },
        levels: levels_section,
        ib_state: ib,
        period_ib_state: period_ib,
        structure_events: events.into_iter().map(|e| e.event).collect(),
        setup_selection: SetupSelection { setup_id },
        liquidity,
        patterns: patterns_section,
        diagnostics,
        red_flags,
        vpvr: vpvr_section,
        imbalance: imbalance_section,
        breakout: breakout_section,
        smc: smc_section,
    })
}
