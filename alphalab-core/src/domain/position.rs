use serde::{Deserialize, Serialize};

use super::event::OrderSide;

/// Open holding in one symbol. Negative quantity is a short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub average_cost: f64,
}

impl Position {
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity: 0,
            average_cost: 0.0,
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.quantity as f64 * current_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.quantity as f64 * (current_price - self.average_cost)
    }

    /// Apply a fill and return the realized PnL (commission excluded).
    ///
    /// Adds in the held direction update the weighted-average cost. Reductions
    /// keep the cost and realize PnL on the closed part. A fill that crosses
    /// through zero realizes the whole old position and opens the remainder
    /// at the fill price.
    pub fn apply_fill(&mut self, side: OrderSide, quantity: u64, price: f64) -> f64 {
        let signed = side.sign() * quantity as i64;
        let old = self.quantity;
        let new = old + signed;

        if old == 0 || old.signum() == signed.signum() {
            let old_abs = old.unsigned_abs() as f64;
            let total = old_abs + quantity as f64;
            self.average_cost = (old_abs * self.average_cost + quantity as f64 * price) / total;
            self.quantity = new;
            return 0.0;
        }

        let closed = old.unsigned_abs().min(quantity) as f64;
        let realized = closed * (price - self.average_cost) * old.signum() as f64;
        self.quantity = new;
        if new == 0 {
            self.average_cost = 0.0;
        } else if new.signum() != old.signum() {
            self.average_cost = price;
        }
        realized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_average_on_adds() {
        let mut pos = Position::flat("X");
        pos.apply_fill(OrderSide::Buy, 100, 100.0);
        pos.apply_fill(OrderSide::Buy, 100, 110.0);
        assert_eq!(pos.quantity, 200);
        assert!((pos.average_cost - 105.0).abs() < 1e-12);
    }

    #[test]
    fn partial_reduce_keeps_cost_and_realizes() {
        let mut pos = Position::flat("X");
        pos.apply_fill(OrderSide::Buy, 100, 100.0);
        let pnl = pos.apply_fill(OrderSide::Sell, 40, 110.0);
        assert_eq!(pos.quantity, 60);
        assert!((pos.average_cost - 100.0).abs() < 1e-12);
        assert!((pnl - 400.0).abs() < 1e-9);
    }

    #[test]
    fn close_to_flat_resets_cost() {
        let mut pos = Position::flat("X");
        pos.apply_fill(OrderSide::Sell, 50, 20.0);
        assert!(pos.is_short());
        let pnl = pos.apply_fill(OrderSide::Buy, 50, 18.0);
        assert!(pos.is_flat());
        assert_eq!(pos.average_cost, 0.0);
        assert!((pnl - 100.0).abs() < 1e-9);
    }

    #[test]
    fn flip_opens_remainder_at_fill_price() {
        let mut pos = Position::flat("X");
        pos.apply_fill(OrderSide::Buy, 100, 10.0);
        let pnl = pos.apply_fill(OrderSide::Sell, 150, 12.0);
        assert_eq!(pos.quantity, -50);
        assert!((pos.average_cost - 12.0).abs() < 1e-12);
        assert!((pnl - 200.0).abs() < 1e-9);
    }

    #[test]
    fn market_value_and_unrealized() {
        let pos = Position {
            symbol: "SPY".into(),
            quantity: 10,
            average_cost: 100.0,
        };
        assert_eq!(pos.market_value(110.0), 1_100.0);
        assert_eq!(pos.unrealized_pnl(110.0), 100.0);
    }
}
