//! Validation utilities for the Feedlot Management Platform

use rust_decimal::Decimal;

// ============================================================================
// Herd Validations
// ============================================================================

/// Validate a mortality/movement head-count
pub fn validate_head_count(quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Head-count must be positive");
    }
    Ok(())
}

/// Validate that a pen allocation fits the pen's remaining capacity
pub fn validate_pen_capacity(
    capacity: i32,
    occupied: i32,
    requested: i32,
) -> Result<(), &'static str> {
    if requested <= 0 {
        return Err("Allocation quantity must be positive");
    }
    if occupied + requested > capacity {
        return Err("Allocation exceeds pen capacity");
    }
    Ok(())
}

/// Validate that a lot allocation does not exceed its unallocated head
pub fn validate_lot_allocation(
    current_quantity: i32,
    already_allocated: i32,
    requested: i32,
) -> Result<(), &'static str> {
    if already_allocated + requested > current_quantity {
        return Err("Allocation exceeds the lot's current head-count");
    }
    Ok(())
}

// ============================================================================
// Financial Validations
// ============================================================================

/// Validate a monetary cost component (negative book costs are data errors)
pub fn validate_cost_component(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Cost components cannot be negative");
    }
    Ok(())
}

/// Validate a calendar month number
pub fn validate_month(month: u32) -> Result<(), &'static str> {
    if !(1..=12).contains(&month) {
        return Err("Month must be between 1 and 12");
    }
    Ok(())
}

/// Validate a lot code format (LOT-YYYY-NNNN)
pub fn validate_lot_code(code: &str) -> Result<(), &'static str> {
    let parts: Vec<&str> = code.split('-').collect();
    if parts.len() != 3 || parts[0] != "LOT" {
        return Err("Lot code must match LOT-YYYY-NNNN");
    }
    if parts[1].len() != 4 || parts[1].chars().any(|c| !c.is_ascii_digit()) {
        return Err("Lot code year must be four digits");
    }
    if parts[2].is_empty() || parts[2].chars().any(|c| !c.is_ascii_digit()) {
        return Err("Lot code sequence must be numeric");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn head_count_must_be_positive() {
        assert!(validate_head_count(1).is_ok());
        assert!(validate_head_count(0).is_err());
        assert!(validate_head_count(-3).is_err());
    }

    #[test]
    fn pen_capacity_is_enforced() {
        assert!(validate_pen_capacity(100, 60, 40).is_ok());
        assert!(validate_pen_capacity(100, 60, 41).is_err());
        assert!(validate_pen_capacity(100, 0, 0).is_err());
    }

    #[test]
    fn lot_allocation_bounded_by_head_count() {
        assert!(validate_lot_allocation(80, 50, 30).is_ok());
        assert!(validate_lot_allocation(80, 50, 31).is_err());
    }

    #[test]
    fn cost_components_cannot_be_negative() {
        assert!(validate_cost_component(Decimal::from_str("0").unwrap()).is_ok());
        assert!(validate_cost_component(Decimal::from_str("-0.01").unwrap()).is_err());
    }

    #[test]
    fn lot_code_format() {
        assert!(validate_lot_code("LOT-2025-0001").is_ok());
        assert!(validate_lot_code("LOT-25-0001").is_err());
        assert!(validate_lot_code("PEN-2025-0001").is_err());
        assert!(validate_lot_code("LOT-2025-").is_err());
    }
}
