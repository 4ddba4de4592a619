//! Budget Escrow (spec §4.5): pure value semantics over `{allocated, committed, mode}`
//! plus a `spent` figure queried from the cost accumulator. No side effects, no I/O —
//! every function here takes a snapshot and returns a new one or an error.

use conclave_core::model::{BudgetData, BudgetMode};
use conclave_core::{Error, Result};
use rust_decimal::Decimal;

/// `mode = na` has no cap; `spent + committed + amount` must not exceed `allocated`
/// otherwise.
pub fn validate_allocation(budget: &BudgetData, spent: Decimal, amount: Decimal) -> Result<()> {
    match budget.mode {
        BudgetMode::Na => Ok(()),
        BudgetMode::Root | BudgetMode::Allocated => {
            let allocated = budget.allocated.unwrap_or(Decimal::ZERO);
            if spent + budget.committed + amount <= allocated {
                Ok(())
            } else {
                Err(Error::InsufficientParentBudget)
            }
        }
    }
}

/// Increases `committed` by `amount`; no-op under `na`. Caller must have already
/// validated the allocation.
pub fn lock_allocation(budget: &BudgetData, amount: Decimal) -> BudgetData {
    match budget.mode {
        BudgetMode::Na => *budget,
        _ => BudgetData {
            committed: budget.committed + amount,
            ..*budget
        },
    }
}

/// Releases a dismissed child's escrow: decreases `committed` by `child_allocated`,
/// and returns the unspent remainder (never negative) to attribute back to the
/// parent as an absorbed cost record.
pub fn release_allocation(budget: &BudgetData, child_allocated: Decimal, child_spent: Decimal) -> (BudgetData, Decimal) {
    let released = BudgetData {
        committed: (budget.committed - child_allocated).max(Decimal::ZERO),
        ..*budget
    };
    let unspent = (child_allocated - child_spent).max(Decimal::ZERO);
    (released, unspent)
}

/// Atomic delta on the parent's `committed` when a child's allocation changes from
/// `current_child` to `new_child`. A positive delta (increase) requires available
/// room under the parent's budget (unless `na`); a negative delta always succeeds.
pub fn adjust_child_allocation(
    parent_budget: &BudgetData,
    current_child: Decimal,
    new_child: Decimal,
    parent_spent: Decimal,
) -> Result<BudgetData> {
    let delta = new_child - current_child;
    if delta <= Decimal::ZERO || matches!(parent_budget.mode, BudgetMode::Na) {
        return Ok(BudgetData {
            committed: (parent_budget.committed + delta).max(Decimal::ZERO),
            ..*parent_budget
        });
    }
    let allocated = parent_budget.allocated.unwrap_or(Decimal::ZERO);
    if parent_spent + parent_budget.committed + delta <= allocated {
        Ok(BudgetData {
            committed: parent_budget.committed + delta,
            ..*parent_budget
        })
    } else {
        Err(Error::InsufficientParentBudget)
    }
}

/// A decrease to a child's own allocation additionally requires the new figure to
/// cover what the child itself has already spent or committed to grandchildren
/// (spec §4.5: "refusing to invalidate grandchildren").
pub fn validate_child_decrease(new_child: Decimal, child_spent: Decimal, child_committed: Decimal) -> Result<()> {
    if new_child >= child_spent + child_committed {
        Ok(())
    } else {
        Err(Error::InsufficientBudget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn allocated_budget(allocated: Decimal, committed: Decimal) -> BudgetData {
        BudgetData {
            mode: BudgetMode::Allocated,
            allocated: Some(allocated),
            committed,
        }
    }

    /// P1: escrow symmetry — a lock followed by a release of the same amount
    /// returns `committed` to its starting value.
    #[test]
    fn p1_escrow_symmetry() {
        let budget = allocated_budget(dec!(100), dec!(10));
        let locked = lock_allocation(&budget, dec!(20));
        assert_eq!(locked.committed, dec!(30));
        let (released, _unspent) = release_allocation(&locked, dec!(20), dec!(5));
        assert_eq!(released.committed, budget.committed);
    }

    /// P2: adjust delta invariant — the change in `committed` equals exactly
    /// `new_child - current_child` on success.
    #[test]
    fn p2_adjust_delta_invariant() {
        let budget = allocated_budget(dec!(100), dec!(50));
        let adjusted = adjust_child_allocation(&budget, dec!(40), dec!(60), dec!(0)).unwrap();
        assert_eq!(adjusted.committed - budget.committed, dec!(20));
    }

    /// P3: no sequence of validate/lock/release/adjust can push `committed` above
    /// `allocated - spent` for an allocated-mode agent.
    #[test]
    fn p3_invariant_i1_preserved() {
        let budget = allocated_budget(dec!(100), dec!(90));
        let spent = dec!(0);
        assert!(validate_allocation(&budget, spent, dec!(20)).is_err());
        assert!(validate_allocation(&budget, spent, dec!(10)).is_ok());
    }

    /// S4: parent `{allocated: 100, committed: 50}`, spent 20, child 40 -> 25 yields
    /// `{committed: 35}`.
    #[test]
    fn s4_escrow_adjust_decrease() {
        let budget = allocated_budget(dec!(100), dec!(50));
        let adjusted = adjust_child_allocation(&budget, dec!(40), dec!(25), dec!(20)).unwrap();
        assert_eq!(adjusted.committed, dec!(35));
    }

    #[test]
    fn na_mode_never_denies() {
        let budget = BudgetData::unlimited();
        assert!(validate_allocation(&budget, dec!(1_000_000), dec!(1_000_000)).is_ok());
        assert_eq!(lock_allocation(&budget, dec!(500)).committed, Decimal::ZERO);
    }

    #[test]
    fn child_decrease_rejected_when_it_would_invalidate_grandchildren() {
        assert!(validate_child_decrease(dec!(25), dec!(10), dec!(20)).is_err());
        assert!(validate_child_decrease(dec!(35), dec!(10), dec!(20)).is_ok());
    }
}
