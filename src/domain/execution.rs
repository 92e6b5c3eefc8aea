//! Trade execution and cost modelling.
//!
//! Entries are sized from a target notional and pay commission and slippage
//! on top of the fill. Exits pay commission, the sell-side tax and slippage
//! out of the gross proceeds. A losing exit starts a re-entry cooldown.

use chrono::NaiveDate;

use super::portfolio::Portfolio;
use super::position::{ExitReason, Position, Trade};

/// Proportional transaction costs, as fractions of traded notional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub commission_rate: f64,
    /// Charged on sells only.
    pub tax_rate: f64,
    pub slippage_rate: f64,
}

impl CostModel {
    pub fn free() -> Self {
        CostModel {
            commission_rate: 0.0,
            tax_rate: 0.0,
            slippage_rate: 0.0,
        }
    }

    /// Cash paid per unit of notional bought.
    pub fn buy_cost_factor(&self) -> f64 {
        1.0 + self.commission_rate + self.slippage_rate
    }

    /// Fraction of gross proceeds lost on a sell.
    pub fn sell_cost_rate(&self) -> f64 {
        self.commission_rate + self.tax_rate + self.slippage_rate
    }

    pub fn entry_cost(&self, quantity: i64, price: f64) -> f64 {
        quantity as f64 * price * self.buy_cost_factor()
    }
}

/// Equity share allotted to one new position, never more than the cash on hand.
pub fn target_notional(equity: f64, allocation_fraction: f64, cash: f64) -> f64 {
    (equity * allocation_fraction).min(cash).max(0.0)
}

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        quantity: i64,
        execution_price: f64,
        cost: f64,
    },
    Rejected(EntryRejection),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryRejection {
    InvalidPrice,
    ZeroQuantity,
    BelowMinimum { notional: f64 },
}

/// Buy `code` at `price` with up to `target` of cash.
///
/// 1. Cap the budget at available cash
/// 2. Remove costs: buyable = budget / (1 + commission + slippage)
/// 3. Whole shares only: quantity = floor(buyable / price)
/// 4. Reject zero quantity or a notional under `min_trade_notional`
/// 5. Deduct quantity * price * (1 + commission + slippage) from cash
pub fn enter_long(
    portfolio: &mut Portfolio,
    code: &str,
    price: f64,
    date: NaiveDate,
    target: f64,
    costs: &CostModel,
    min_trade_notional: f64,
) -> EntryResult {
    if !(price.is_finite() && price > 0.0) {
        return EntryResult::Rejected(EntryRejection::InvalidPrice);
    }

    let budget = target.min(portfolio.cash);
    let buyable = budget / costs.buy_cost_factor();
    let mut quantity = (buyable / price).floor() as i64;

    // rounding in the division above can leave the cost a hair over cash
    while quantity > 0 && costs.entry_cost(quantity, price) > portfolio.cash {
        quantity -= 1;
    }

    if quantity <= 0 {
        return EntryResult::Rejected(EntryRejection::ZeroQuantity);
    }

    let notional = quantity as f64 * price;
    if notional < min_trade_notional {
        return EntryResult::Rejected(EntryRejection::BelowMinimum { notional });
    }

    let cost = costs.entry_cost(quantity, price);
    portfolio.cash -= cost;

    portfolio.add_position(Position {
        code: code.to_string(),
        quantity,
        entry_price: price,
        entry_date: date,
        days_held: 0,
        mark_price: price,
        cost_basis: cost,
    });

    EntryResult::Entered {
        quantity,
        execution_price: price,
        cost,
    }
}

/// Result of an exit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitResult {
    pub quantity: i64,
    pub exit_price: f64,
    pub gross_proceeds: f64,
    pub costs: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
}

/// Sell the whole position in `code` at `price`.
///
/// 1. gross = quantity * price
/// 2. net = gross - gross * (commission + tax + slippage), credited to cash
/// 3. pnl = net - cost basis; pnl_pct = pnl / cost basis * 100
/// 4. Negative pnl_pct starts a `cooldown_days` cooldown from `exit_date`
/// 5. Record the closed trade
pub fn exit_position(
    portfolio: &mut Portfolio,
    code: &str,
    price: f64,
    exit_date: NaiveDate,
    reason: ExitReason,
    costs: &CostModel,
    cooldown_days: u32,
) -> Option<ExitResult> {
    let position = portfolio.remove_position(code)?;

    let gross_proceeds = position.quantity as f64 * price;
    let exit_costs = gross_proceeds * costs.sell_cost_rate();
    let net_proceeds = gross_proceeds - exit_costs;
    portfolio.cash += net_proceeds;

    let pnl = net_proceeds - position.cost_basis;
    let pnl_pct = if position.cost_basis > 0.0 {
        pnl / position.cost_basis * 100.0
    } else {
        0.0
    };

    if pnl_pct < 0.0 {
        portfolio.cooldowns.start(code, exit_date, cooldown_days);
    }

    portfolio.record_trade(Trade {
        code: position.code,
        quantity: position.quantity,
        entry_price: position.entry_price,
        exit_price: price,
        entry_date: position.entry_date,
        exit_date,
        pnl,
        pnl_pct,
        holding_days: position.days_held,
        exit_reason: reason,
    });

    Some(ExitResult {
        quantity: position.quantity,
        exit_price: price,
        gross_proceeds,
        costs: exit_costs,
        pnl,
        pnl_pct,
    })
}
