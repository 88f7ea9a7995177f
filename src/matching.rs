use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::currency::Cash;
use crate::error::Error;
use crate::instruments::InstrumentId;
use crate::transactions::{CorporateActionKind, RawTransaction, Side};
use crate::types::{Date, Decimal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Stock,
    Option,
}

/// Whether uncovered closing trades are tolerated as implicit short openings.
/// Product-configurable: stock trading accounts typically forbid shorting
/// while option accounts must support written contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortPolicy {
    Allow,
    Forbid,
}

/// An open position slice: a quantity of an instrument acquired at one
/// price/date, tracked until fully closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLot {
    pub instrument: InstrumentId,
    pub asset_class: AssetClass,
    pub open_date: Date,

    /// Remaining quantity. Negative for short positions.
    pub quantity: Decimal,
    /// Unit open price.
    pub price: Cash,

    /// Remaining cost basis including the opening commission share. For short
    /// lots this is the remaining net opening proceeds.
    pub cost: Cash,
    pub local_cost: Cash,
}

/// The result of matching a closing trade slice against one open lot.
/// Created exactly once per matched quantity slice; immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedSale {
    pub instrument: InstrumentId,
    pub asset_class: AssetClass,
    /// Source market country code, derived from the instrument's ISIN.
    pub country: String,

    pub open_date: Date,
    pub close_date: Date,

    /// Matched quantity (positive magnitude).
    pub quantity: Decimal,
    pub open_price: Cash,
    pub close_price: Cash,

    /// Cost basis share including the opening commission share.
    pub open_cost: Cash,
    pub local_open_cost: Cash,

    /// Gross closing amount share.
    pub close_amount: Cash,
    pub local_close_amount: Cash,

    /// Closing commission, apportioned proportionally to matched quantity.
    pub commission: Cash,
    pub local_commission: Cash,

    /// Profit/loss in the reporting currency:
    /// (close amount − commission share) − open cost share, sign-adjusted for
    /// short positions.
    pub delta: Cash,
}

#[derive(Debug, Default)]
pub struct MatchResult {
    pub sales: Vec<RealizedSale>,
    pub open_lots: Vec<PurchaseLot>,
}

pub struct LotMatcher {
    stock_shorting: ShortPolicy,
    option_shorting: ShortPolicy,
}

impl LotMatcher {
    pub fn new(stock_shorting: ShortPolicy, option_shorting: ShortPolicy) -> LotMatcher {
        LotMatcher {stock_shorting, option_shorting}
    }

    /// Replays one instrument's trades in the provided order (the caller is
    /// responsible for deterministic chronological ordering) and matches
    /// closing trades against open lots using the FIFO rule: the oldest lot
    /// is consumed first, and a closing quantity spanning several lots
    /// produces one realized sale per contributing lot.
    pub fn process(
        &self, instrument: &InstrumentId, asset_class: AssetClass,
        transactions: &[&RawTransaction],
    ) -> Result<MatchResult, Error> {
        let policy = match asset_class {
            AssetClass::Stock => self.stock_shorting,
            AssetClass::Option => self.option_shorting,
        };

        let mut state = Matching {
            instrument: instrument.clone(),
            asset_class: asset_class,
            country: instrument.country().to_owned(),
            policy: policy,
            lots: VecDeque::new(),
            sales: Vec::new(),
        };

        for transaction in transactions {
            match &transaction.side {
                Side::Buy | Side::Open => state.trade(transaction, Direction::Long)?,
                Side::Sell | Side::Close => state.trade(transaction, Direction::Short)?,
                Side::CorporateAction(kind) => state.corporate_action(transaction, kind)?,
                _ => unreachable!("Got a non-trade transaction in the matching engine"),
            }
        }

        Ok(MatchResult {
            sales: state.sales,
            open_lots: state.lots.into(),
        })
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Direction {
    Long,
    Short,
}

impl Direction {
    fn of(quantity: Decimal) -> Direction {
        if quantity.is_sign_negative() {
            Direction::Short
        } else {
            Direction::Long
        }
    }

    fn signed(self, quantity: Decimal) -> Decimal {
        match self {
            Direction::Long => quantity,
            Direction::Short => -quantity,
        }
    }
}

struct Matching {
    instrument: InstrumentId,
    asset_class: AssetClass,
    country: String,
    policy: ShortPolicy,
    lots: VecDeque<PurchaseLot>,
    sales: Vec<RealizedSale>,
}

impl Matching {
    fn trade(&mut self, transaction: &RawTransaction, direction: Direction) -> Result<(), Error> {
        let quantity = transaction.quantity;
        let unit_price = transaction.price.unwrap_or_else(|| {
            Cash::new(transaction.amount.currency, transaction.amount.amount / quantity)
        });

        // Unconsumed portions of the closing trade. Each matched slice takes
        // its proportional share; the final slice takes the remainder, so
        // nothing is lost to division residue.
        let mut portion = Portion {
            quantity: quantity,
            amount: transaction.amount,
            local_amount: transaction.local_amount,
            commission: transaction.commission,
            local_commission: transaction.local_commission,
        };

        while !portion.quantity.is_zero() {
            let opposite = match self.lots.front() {
                Some(lot) => Direction::of(lot.quantity) != direction,
                None => false,
            };

            if !opposite {
                break;
            }

            let lot = self.lots.front_mut().unwrap();
            let matched = std::cmp::min(portion.quantity, lot.quantity.abs());

            let (open_cost, local_open_cost) = lot.consume(matched);
            let closing = portion.consume(matched);

            let delta = match direction {
                // Selling a long lot
                Direction::Short =>
                    closing.local_amount - closing.local_commission - local_open_cost,
                // Buying back a short lot: the lot holds the net opening proceeds
                Direction::Long =>
                    local_open_cost - closing.local_amount - closing.local_commission,
            };

            self.sales.push(RealizedSale {
                instrument: self.instrument.clone(),
                asset_class: self.asset_class,
                country: self.country.clone(),

                open_date: lot.open_date,
                close_date: transaction.date(),

                quantity: matched,
                open_price: lot.price,
                close_price: unit_price,

                open_cost: open_cost,
                local_open_cost: local_open_cost,

                close_amount: closing.amount,
                local_close_amount: closing.local_amount,

                commission: closing.commission,
                local_commission: closing.local_commission,

                delta: delta,
            });

            if lot.quantity.is_zero() {
                self.lots.pop_front();
            }
        }

        if portion.quantity.is_zero() {
            return Ok(());
        }

        // The remainder opens a new position
        if direction == Direction::Short && self.policy == ShortPolicy::Forbid {
            return Err(Error::InsufficientLot {
                symbol: self.instrument.as_str().to_owned(),
                date: transaction.date(),
                quantity: portion.quantity,
            });
        }

        let quantity = portion.quantity;
        let opening = portion.consume(quantity);

        // Cost basis includes the opening commission. For short openings the
        // commission reduces the net proceeds instead.
        let (cost, local_cost) = match direction {
            Direction::Long => (
                opening.amount + opening.commission,
                opening.local_amount + opening.local_commission,
            ),
            Direction::Short => (
                opening.amount - opening.commission,
                opening.local_amount - opening.local_commission,
            ),
        };

        self.lots.push_back(PurchaseLot {
            instrument: self.instrument.clone(),
            asset_class: self.asset_class,
            open_date: transaction.date(),
            quantity: direction.signed(quantity),
            price: unit_price,
            cost: cost,
            local_cost: local_cost,
        });

        Ok(())
    }

    fn corporate_action(
        &mut self, transaction: &RawTransaction, kind: &CorporateActionKind,
    ) -> Result<(), Error> {
        match kind {
            CorporateActionKind::StockSplit {numerator, denominator} => {
                for lot in &mut self.lots {
                    lot.quantity = lot.quantity * Decimal::from(*numerator) / Decimal::from(*denominator);
                    lot.price = lot.price * Decimal::from(*denominator) / Decimal::from(*numerator);
                }
                Ok(())
            },
            CorporateActionKind::Other(name) => Err(Error::UnsupportedCorporateAction {
                symbol: self.instrument.as_str().to_owned(),
                date: transaction.date(),
                action: name.clone(),
            }),
        }
    }
}

impl PurchaseLot {
    /// Consumes a quantity slice and returns its (cost, local cost) share.
    fn consume(&mut self, matched: Decimal) -> (Cash, Cash) {
        let remaining = self.quantity.abs();
        debug_assert!(matched <= remaining);

        if matched == remaining {
            let shares = (self.cost, self.local_cost);
            self.quantity = dec!(0);
            self.cost = Cash::zero(self.cost.currency);
            self.local_cost = Cash::zero(self.local_cost.currency);
            return shares;
        }

        // Multiply before dividing: amount * (matched / remaining) picks up
        // division residue on ratios like 10/15 while amount * matched is
        // exact whenever the amounts divide evenly
        let shares = (
            self.cost * matched / remaining,
            self.local_cost * matched / remaining,
        );

        self.quantity -= Direction::of(self.quantity).signed(matched);
        self.cost -= shares.0;
        self.local_cost -= shares.1;

        shares
    }
}

struct Portion {
    quantity: Decimal,
    amount: Cash,
    local_amount: Cash,
    commission: Cash,
    local_commission: Cash,
}

struct PortionShare {
    amount: Cash,
    local_amount: Cash,
    commission: Cash,
    local_commission: Cash,
}

impl Portion {
    fn consume(&mut self, matched: Decimal) -> PortionShare {
        debug_assert!(matched <= self.quantity);

        if matched == self.quantity {
            self.quantity = dec!(0);
            return PortionShare {
                amount: self.amount,
                local_amount: self.local_amount,
                commission: self.commission,
                local_commission: self.local_commission,
            };
        }

        let share = PortionShare {
            amount: self.amount * matched / self.quantity,
            local_amount: self.local_amount * matched / self.quantity,
            commission: self.commission * matched / self.quantity,
            local_commission: self.local_commission * matched / self.quantity,
        };

        self.quantity -= matched;
        self.amount -= share.amount;
        self.local_amount -= share.local_amount;
        self.commission -= share.commission;
        self.local_commission -= share.local_commission;

        share
    }
}
