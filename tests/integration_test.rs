//! Integration tests for the simulation engine.
//!
//! Tests cover:
//! - Single-instrument round trip at the signal-day close
//! - Cooldown after a forced losing exit
//! - Exit-before-entry cash recycling and candidate ranking
//! - NextOpen fills, including orders carried over a missing bar
//! - Year-keyed universes and rotation out of the universe
//! - Universe validation through a mock data port
//! - Warmup history before the simulation start date
//! - Cost accounting, minimum notional and liquidation

mod common;

use approx::assert_relative_eq;
use common::*;
use rsitrader::domain::backtest::{run_backtest, run_backtest_from};
use rsitrader::domain::config::{ExecutionTiming, SimulationConfig};
use rsitrader::domain::cooldown::CooldownLedger;
use rsitrader::domain::error::RsitraderError;
use rsitrader::domain::metrics::PerformanceSummary;
use rsitrader::domain::position::ExitReason;
use rsitrader::domain::series::InstrumentSeries;
use rsitrader::domain::universe::{SkipReason, UniverseMembership, validate_universe};
use std::collections::{BTreeMap, BTreeSet};

fn set(codes: &[&str]) -> BTreeSet<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

mod single_instrument {
    use super::*;

    #[test]
    fn buy_on_signal_close_and_exit_on_signal() {
        let data = vec![daily_series("AAA", &signal_closes())];
        let result = run_backtest(&data, None, &base_config()).unwrap();

        assert_eq!(result.trades().len(), 1);
        let trade = &result.trades()[0];
        assert_eq!(trade.code, "AAA");
        assert_eq!(trade.entry_date, day(13));
        assert_eq!(trade.exit_date, day(19));
        assert_eq!(trade.quantity, 86);
        assert_eq!(trade.entry_price, 116.0);
        assert_eq!(trade.exit_price, 130.0);
        assert_eq!(trade.holding_days, 6);
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert_relative_eq!(trade.pnl, 86.0 * 14.0, epsilon = 1e-9);

        let curve = result.equity_curve();
        assert_eq!(curve.len(), 20);
        for point in &curve[..13] {
            assert_eq!(point.equity, 10_000.0);
            assert_eq!(point.open_positions, 0);
        }
        for (i, point) in curve.iter().enumerate().take(19).skip(13) {
            assert_eq!(point.open_positions, 1, "day {}", i);
            assert_relative_eq!(point.equity, point.cash + 86.0 * 116.0, epsilon = 1e-9);
        }
        assert_relative_eq!(result.final_equity(), 11_204.0, epsilon = 1e-9);
    }

    #[test]
    fn bars_before_start_date_only_warm_up() {
        let data = vec![daily_series("AAA", &signal_closes())];
        let result = run_backtest_from(&data, None, &base_config(), day(5)).unwrap();

        let curve = result.equity_curve();
        assert_eq!(curve.len(), 15);
        assert_eq!(curve[0].date, day(5));
        assert_eq!(result.trades().len(), 1);
        assert_eq!(result.trades()[0].entry_date, day(13));
        assert_relative_eq!(result.final_equity(), 11_204.0, epsilon = 1e-9);

        let late = run_backtest_from(&data, None, &base_config(), day(14)).unwrap();
        assert_eq!(late.equity_curve().len(), 6);
        assert!(late.trades().is_empty());
    }

    #[test]
    fn costs_reduce_quantity_and_pnl() {
        let data = vec![daily_series("AAA", &signal_closes())];
        let config = SimulationConfig {
            costs: market_costs(),
            ..base_config()
        };
        let result = run_backtest(&data, None, &config).unwrap();

        let trade = &result.trades()[0];
        assert_eq!(trade.quantity, 86);
        let basis = 86.0 * 116.0 * 1.00115;
        let net = 86.0 * 130.0 * (1.0 - 0.00345);
        assert_relative_eq!(trade.pnl, net - basis, epsilon = 1e-6);
        assert_relative_eq!(trade.pnl_pct, (net - basis) / basis * 100.0, epsilon = 1e-9);
        assert_relative_eq!(result.portfolio.cash, 10_000.0 - basis + net, epsilon = 1e-6);
    }

    #[test]
    fn below_minimum_notional_is_skipped() {
        let data = vec![daily_series("AAA", &signal_closes())];
        let config = SimulationConfig {
            min_trade_notional: 20_000.0,
            ..base_config()
        };
        let result = run_backtest(&data, None, &config).unwrap();
        assert!(result.trades().is_empty());
        assert_eq!(result.portfolio.position_count(), 0);
        assert_eq!(result.final_equity(), 10_000.0);
    }

    #[test]
    fn liquidation_closes_at_last_mark() {
        let mut closes = signal_closes();
        closes.truncate(17);
        let data = vec![daily_series("AAA", &closes)];
        let config = SimulationConfig {
            liquidate_at_end: true,
            costs: market_costs(),
            ..base_config()
        };
        let result = run_backtest(&data, None, &config).unwrap();

        assert_eq!(result.trades().len(), 1);
        let trade = &result.trades()[0];
        assert_eq!(trade.exit_reason, ExitReason::Liquidation);
        assert_eq!(trade.exit_date, day(16));
        assert_eq!(trade.exit_price, 116.0);
        assert!(trade.pnl < 0.0);

        let last = result.equity_curve().last().unwrap();
        assert_eq!(result.equity_curve().len(), 17);
        assert_eq!(last.open_positions, 0);
        assert_eq!(last.equity, result.portfolio.cash);
    }

    #[test]
    fn rerun_is_identical() {
        let data = vec![
            daily_series("AAA", &signal_closes()),
            daily_series("BBB", &cooldown_closes()),
        ];
        let config = SimulationConfig {
            max_positions: 2,
            max_holding_days: 3,
            costs: market_costs(),
            ..base_config()
        };
        let first = run_backtest(&data, None, &config).unwrap();
        let second = run_backtest(&data, None, &config).unwrap();
        assert_eq!(first, second);
    }
}

mod cooldown {
    use super::*;

    fn config(cooldown_days: u32) -> SimulationConfig {
        SimulationConfig {
            max_holding_days: 3,
            cooldown_days,
            ..base_config()
        }
    }

    #[test]
    fn losing_exit_blocks_reentry_until_cooldown_ends() {
        let data = vec![daily_series("AAA", &cooldown_closes())];
        let result = run_backtest(&data, None, &config(90)).unwrap();
        let trades = result.trades();

        assert_eq!(trades.len(), 2);

        assert_eq!(trades[0].entry_date, day(17));
        assert_eq!(trades[0].exit_date, day(20));
        assert_eq!(trades[0].exit_reason, ExitReason::MaxHoldingPeriod);
        assert_eq!(trades[0].holding_days, 3);
        assert!(trades[0].pnl_pct < 0.0);

        // the day 40 signal falls inside the cooldown; day 115 is after it
        assert_eq!(trades[1].entry_date, day(115));
        assert!(trades.iter().all(|t| t.entry_date != day(40)));
    }

    #[test]
    fn without_cooldown_day_40_signal_is_taken() {
        let data = vec![daily_series("AAA", &cooldown_closes())];
        let result = run_backtest(&data, None, &config(0)).unwrap();
        let entries: Vec<_> = result.trades().iter().map(|t| t.entry_date).collect();
        assert_eq!(entries, vec![day(17), day(40), day(115)]);
    }

    #[test]
    fn profitable_exit_starts_no_cooldown() {
        let data = vec![daily_series("AAA", &signal_closes())];
        let result = run_backtest(&data, None, &base_config()).unwrap();
        assert_eq!(result.portfolio.cooldowns, CooldownLedger::new());
    }
}

mod multi_instrument {
    use super::*;

    #[test]
    fn exit_frees_cash_and_slot_for_same_day_entry() {
        let mut bbb = rising(100.0, 2.0, 18);
        bbb.extend([131.0, 128.0]);
        let data = vec![daily_series("AAA", &signal_closes()), daily_series("BBB", &bbb)];

        let result = run_backtest(&data, None, &base_config()).unwrap();

        assert_eq!(result.trades().len(), 1);
        assert_eq!(result.trades()[0].exit_date, day(19));

        let held = result.portfolio.get_position("BBB").unwrap();
        assert_eq!(held.entry_date, day(19));
        assert_eq!(held.quantity, 87);
        assert_relative_eq!(result.portfolio.cash, 11_204.0 - 87.0 * 128.0, epsilon = 1e-9);
    }

    #[test]
    fn candidates_ranked_by_oscillator_then_code() {
        // AAA dips less sharply (RSI 21.4) than BBB and CCC (RSI 18.2, tied)
        let mut aaa = rising(100.0, 3.0, 12);
        aaa.extend([130.0, 126.0]);
        let mut dip = rising(100.0, 2.0, 12);
        dip.extend([119.0, 116.0]);
        let data = vec![
            daily_series("AAA", &aaa),
            daily_series("CCC", &dip),
            daily_series("BBB", &dip),
        ];
        let config = SimulationConfig {
            max_positions: 2,
            ..base_config()
        };

        let result = run_backtest(&data, None, &config).unwrap();
        let held: Vec<&str> = result.portfolio.positions.keys().map(String::as_str).collect();
        assert_eq!(held, vec!["BBB", "CCC"]);
        for code in ["BBB", "CCC"] {
            assert_eq!(result.portfolio.get_position(code).unwrap().quantity, 43);
        }

        let single = SimulationConfig {
            max_positions: 1,
            ..base_config()
        };
        let result = run_backtest(&data, None, &single).unwrap();
        let held: Vec<&str> = result.portfolio.positions.keys().map(String::as_str).collect();
        assert_eq!(held, vec!["BBB"]);
    }

    #[test]
    fn position_count_never_exceeds_maximum() {
        let data = vec![
            daily_series("AAA", &cooldown_closes()),
            daily_series("BBB", &cooldown_closes()),
            daily_series("CCC", &signal_closes()),
        ];
        for max_positions in 1..=3 {
            let config = SimulationConfig {
                max_positions,
                max_holding_days: 3,
                cooldown_days: 5,
                ..base_config()
            };
            let result = run_backtest(&data, None, &config).unwrap();
            assert!(
                result
                    .equity_curve()
                    .iter()
                    .all(|p| p.open_positions <= max_positions)
            );
        }
    }
}

mod next_open {
    use super::*;

    fn bars_with_open_offset(code: &str, closes: &[f64], skip: Option<usize>) -> InstrumentSeries {
        let bars = daily_bars(code, closes)
            .into_iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .map(|(_, mut bar)| {
                bar.open = bar.close - 0.5;
                bar
            })
            .collect();
        InstrumentSeries::new(code.to_string(), bars)
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            execution: ExecutionTiming::NextOpen,
            ..base_config()
        }
    }

    #[test]
    fn fills_at_next_open() {
        let data = vec![bars_with_open_offset("AAA", &signal_closes(), None)];
        let result = run_backtest(&data, None, &config()).unwrap();

        assert!(result.trades().is_empty());
        let position = result.portfolio.get_position("AAA").unwrap();
        assert_eq!(position.entry_date, day(14));
        assert_eq!(position.entry_price, 115.5);
        assert_eq!(position.quantity, 86);
        // exit signalled on the final close has no next bar to fill on
        assert_eq!(position.days_held, 5);
    }

    #[test]
    fn order_carries_over_missing_bar() {
        let aaa = bars_with_open_offset("AAA", &signal_closes(), Some(14));
        let flat = daily_series("BBB", &[50.0; 20]);
        let data = vec![aaa, flat];

        let result = run_backtest(&data, None, &config()).unwrap();

        let position = result.portfolio.get_position("AAA").unwrap();
        assert_eq!(position.entry_date, day(15));
        assert_eq!(position.entry_price, 115.5);
        assert_eq!(position.days_held, 4);
        assert_eq!(result.equity_curve().len(), 20);
        assert_eq!(result.equity_curve()[14].open_positions, 0);
        assert_eq!(result.equity_curve()[15].open_positions, 1);
    }

    #[test]
    fn signal_exit_fills_next_open() {
        let mut closes = signal_closes();
        closes.extend([131.0, 132.0]);
        let data = vec![bars_with_open_offset("AAA", &closes, None)];

        let result = run_backtest(&data, None, &config()).unwrap();

        assert_eq!(result.trades().len(), 1);
        let trade = &result.trades()[0];
        assert_eq!(trade.entry_date, day(14));
        assert_eq!(trade.exit_date, day(20));
        assert_eq!(trade.exit_price, 130.5);
        assert_eq!(trade.exit_reason, ExitReason::Signal);
    }
}

mod universe {
    use super::*;

    fn series_from(code: &str, start: chrono::NaiveDate, closes: &[f64]) -> InstrumentSeries {
        let bars = daily_bars(code, closes)
            .into_iter()
            .enumerate()
            .map(|(i, mut bar)| {
                bar.date = start + chrono::Duration::days(i as i64);
                bar
            })
            .collect();
        InstrumentSeries::new(code.to_string(), bars)
    }

    #[test]
    fn codes_outside_the_year_universe_are_not_entered() {
        let data = vec![daily_series("AAA", &signal_closes())];
        let mut table = BTreeMap::new();
        table.insert(2024, set(&["BBB"]));
        let membership = UniverseMembership::by_year(table).unwrap();

        let result = run_backtest(&data, Some(&membership), &base_config()).unwrap();
        assert!(result.trades().is_empty());
        assert_eq!(result.portfolio.position_count(), 0);
    }

    #[test]
    fn held_position_exits_after_rotating_out() {
        // entry on 2023-12-28, exit signal on 2024-01-03
        let data = vec![series_from("AAA", date(2023, 12, 15), &signal_closes())];
        let mut table = BTreeMap::new();
        table.insert(2023, set(&["AAA"]));
        table.insert(2024, set(&["BBB"]));
        let membership = UniverseMembership::by_year(table).unwrap();

        let result = run_backtest(&data, Some(&membership), &base_config()).unwrap();

        assert_eq!(result.trades().len(), 1);
        let trade = &result.trades()[0];
        assert_eq!(trade.entry_date, date(2023, 12, 28));
        assert_eq!(trade.exit_date, date(2024, 1, 3));
        assert_eq!(trade.exit_reason, ExitReason::Signal);
    }

    #[test]
    fn validation_skips_missing_and_short_codes() {
        let port = MockDataPort::new()
            .with_bars("AAA", daily_bars("AAA", &signal_closes()))
            .with_bars("BBB", daily_bars("BBB", &[100.0, 101.0, 102.0]))
            .with_error("CCC", "file unreadable");

        let validation = validate_universe(
            &port,
            vec!["AAA".into(), "BBB".into(), "CCC".into(), "DDD".into()],
            day(0),
            day(30),
            base_config().indicator_params().warmup_bars(),
        )
        .unwrap();

        assert_eq!(validation.series.len(), 1);
        assert_eq!(validation.series[0].code, "AAA");
        let skipped: Vec<(&str, &SkipReason)> = validation
            .skipped
            .iter()
            .map(|s| (s.code.as_str(), &s.reason))
            .collect();
        assert_eq!(
            skipped,
            vec![
                ("BBB", &SkipReason::InsufficientBars { bars: 3 }),
                ("CCC", &SkipReason::NoData),
                ("DDD", &SkipReason::NoData),
            ]
        );
    }

    #[test]
    fn validation_fails_when_nothing_remains() {
        let port = MockDataPort::new().with_bars("AAA", daily_bars("AAA", &[1.0, 2.0]));
        let result = validate_universe(&port, vec!["AAA".into()], day(0), day(30), 11);
        assert!(matches!(result, Err(RsitraderError::InsufficientData { .. })));
    }

    #[test]
    fn validation_counts_history_before_start() {
        let port = MockDataPort::new()
            .with_bars("AAA", daily_bars("AAA", &signal_closes()))
            .with_bars("OLD", daily_bars("OLD", &rising(100.0, 1.0, 15)));

        let validation = validate_universe(
            &port,
            vec!["AAA".into(), "OLD".into()],
            day(15),
            day(30),
            base_config().indicator_params().warmup_bars(),
        )
        .unwrap();

        assert_eq!(validation.series.len(), 1);
        assert_eq!(validation.series[0].bars.len(), 20);
        assert_eq!(validation.series[0].bars[0].date, day(0));
        assert_eq!(validation.skipped[0].code, "OLD");
        assert_eq!(validation.skipped[0].reason, SkipReason::NoData);
    }
}

mod summary {
    use super::*;

    #[test]
    fn summary_of_signal_scenario() {
        let data = vec![daily_series("AAA", &signal_closes())];
        let result = run_backtest(&data, None, &base_config()).unwrap();
        let summary =
            PerformanceSummary::compute(result.equity_curve(), result.trades(), 10_000.0, 0.0);

        assert_relative_eq!(summary.total_return, 12.04, epsilon = 1e-9);
        assert_eq!(summary.total_trades, 1);
        assert_eq!(summary.win_rate, 100.0);
        assert_eq!(summary.signal_exits, 1);
        assert!(summary.max_drawdown <= 0.0);
    }

    #[test]
    fn config_errors_surface_before_running() {
        let data = vec![daily_series("AAA", &signal_closes())];
        for config in [
            SimulationConfig {
                oscillator_window: 0,
                ..base_config()
            },
            SimulationConfig {
                sell_threshold: 101.0,
                ..base_config()
            },
            SimulationConfig {
                initial_capital: -5.0,
                ..base_config()
            },
            SimulationConfig {
                max_holding_days: 0,
                ..base_config()
            },
        ] {
            let err = run_backtest(&data, None, &config).unwrap_err();
            assert!(matches!(err, RsitraderError::ConfigInvalid { .. }));
        }
    }
}
