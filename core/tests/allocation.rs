//! Allocation ledger: percentage ceiling, amounts and the remaining cache.

mod common;

use aidledger_core::{
    budget::{BudgetUpdate, NewBudget},
    error::{ErrorKind, LedgerError},
};
use common::*;

#[test]
fn first_allocation_prices_share_and_updates_remaining() {
    let engine = engine();
    let b = budget(&engine, "100000");

    let view = allocate(&engine, b.id, ELDERLY, "50", 2);
    assert_eq!(view.allocated_amount, dec("50000.00"));
    assert_eq!(view.amount_per_person, Some(dec("25000.00")));
    assert_eq!(view.remaining_budget, dec("50000.00"));
    assert_eq!(view.target_group, "Elderly");

    assert_eq!(engine.get_budget(b.id).unwrap().remaining_budget, dec("50000"));
    assert_conserved(&engine, b.id);
}

#[test]
fn breaching_the_ceiling_is_rejected_without_side_effects() {
    let engine = engine();
    let b = budget(&engine, "100000");
    allocate(&engine, b.id, ELDERLY, "50", 2);
    let events_before = engine.events_since(0).unwrap().len();

    let err = engine
        .add_allocation(&allocation_request(b.id, LOW_INCOME, "60", 5))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OverAllocation);
    assert!(err.to_string().contains("exceeds 100%: 110%"), "message was: {err}");

    assert_eq!(engine.list_allocations(Some(b.id)).unwrap().len(), 1);
    assert_eq!(engine.get_budget(b.id).unwrap().remaining_budget, dec("50000"));
    assert_eq!(engine.events_since(0).unwrap().len(), events_before);
}

#[test]
fn exactly_one_hundred_is_accepted_and_a_hair_over_is_not() {
    let engine = engine();
    let b = budget(&engine, "100000");
    allocate(&engine, b.id, ELDERLY, "60", 10);
    allocate(&engine, b.id, LOW_INCOME, "39.9999", 10);

    let err = engine
        .add_allocation(&allocation_request(b.id, FARMER, "0.0002", 10))
        .unwrap_err();
    assert!(matches!(err, LedgerError::OverAllocation { .. }));

    allocate(&engine, b.id, FARMER, "0.0001", 10);
    assert_eq!(engine.get_budget(b.id).unwrap().remaining_budget, dec("0"));
    assert_conserved(&engine, b.id);
}

#[test]
fn update_excludes_the_groups_own_share() {
    let engine = engine();
    let b = budget(&engine, "100000");
    allocate(&engine, b.id, ELDERLY, "50", 2);
    allocate(&engine, b.id, LOW_INCOME, "40", 4);

    // 40 -> 50 sums to 100 once the old 40 is excluded.
    let view = engine
        .update_allocation(&allocation_request(b.id, LOW_INCOME, "50", 5))
        .unwrap();
    assert_eq!(view.allocated_amount, dec("50000"));
    assert_eq!(view.amount_per_person, Some(dec("10000")));
    assert_eq!(view.remaining_budget, dec("0"));

    let err = engine
        .update_allocation(&allocation_request(b.id, LOW_INCOME, "50.01", 5))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OverAllocation);
    assert_conserved(&engine, b.id);
}

#[test]
fn update_of_a_missing_allocation_is_not_found() {
    let engine = engine();
    let b = budget(&engine, "100000");
    let err = engine
        .update_allocation(&allocation_request(b.id, FARMER, "10", 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn unknown_budget_or_group_is_not_found() {
    let engine = engine();
    let b = budget(&engine, "100000");

    let err = engine
        .add_allocation(&allocation_request(999, ELDERLY, "10", 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = engine
        .add_allocation(&allocation_request(b.id, 42, "10", 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(engine.list_allocations(Some(999)).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn malformed_terms_are_validation_errors() {
    let engine = engine();
    let b = budget(&engine, "100000");

    for (pct, max) in [("0", 1), ("-5", 1), ("10", -1)] {
        let err = engine
            .add_allocation(&allocation_request(b.id, ELDERLY, pct, max))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "pct {pct} max {max}");
    }

    allocate(&engine, b.id, ELDERLY, "10", 1);
    let dup = engine
        .add_allocation(&allocation_request(b.id, ELDERLY, "5", 1))
        .unwrap_err();
    assert_eq!(dup.kind(), ErrorKind::Validation);
}

#[test]
fn zero_recipients_lists_no_per_person_amount() {
    let engine = engine();
    let b = budget(&engine, "100000");
    allocate(&engine, b.id, FARMER, "25", 0);

    let views = engine.list_allocations(Some(b.id)).unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].amount_per_person, None);

    let json = serde_json::to_value(&views[0]).unwrap();
    assert!(json["amount_per_person"].is_null());
    assert_eq!(json["allocated_amount"], "25000.00");
}

#[test]
fn per_person_rounds_to_cents() {
    let engine = engine();
    let b = budget(&engine, "100000");
    let view = allocate(&engine, b.id, OTHER, "10", 3);
    assert_eq!(view.amount_per_person, Some(dec("3333.33")));
    // The allocation itself is not rounded.
    assert_eq!(view.allocated_amount, dec("10000"));
}

#[test]
fn list_without_filter_spans_budgets() {
    let engine = engine();
    let a = budget(&engine, "100000");
    let b = engine
        .create_budget(&NewBudget {
            year: 2026,
            project_name: "Cash transfer 2026".into(),
            total_budget: dec("200000"),
        })
        .unwrap();
    allocate(&engine, a.id, ELDERLY, "10", 1);
    allocate(&engine, b.id, ELDERLY, "10", 1);

    assert_eq!(engine.list_allocations(None).unwrap().len(), 2);
    assert_eq!(engine.list_allocations(Some(b.id)).unwrap()[0].allocated_amount, dec("20000"));
}

#[test]
fn budget_update_recomputes_remaining_instead_of_resetting_it() {
    let engine = engine();
    let b = budget(&engine, "100000");
    allocate(&engine, b.id, ELDERLY, "50", 2);

    let updated = engine
        .update_budget(
            b.id,
            &BudgetUpdate {
                project_name: "Renamed".into(),
                total_budget: dec("120000"),
            },
        )
        .unwrap();
    // The allocation keeps its 50000; only the unallocated part grows.
    assert_eq!(updated.remaining_budget, dec("70000"));
    assert_eq!(updated.project_name, "Renamed");
    assert_conserved(&engine, b.id);

    let err = engine
        .update_budget(
            b.id,
            &BudgetUpdate {
                project_name: "Renamed".into(),
                total_budget: dec("40000"),
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn budget_with_allocations_cannot_be_deleted() {
    let engine = engine();
    let b = budget(&engine, "100000");
    let empty = budget(&engine, "5000");
    allocate(&engine, b.id, ELDERLY, "50", 2);

    assert_eq!(engine.delete_budget(b.id).unwrap_err().kind(), ErrorKind::Validation);
    engine.delete_budget(empty.id).unwrap();
    assert_eq!(engine.get_budget(empty.id).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(engine.delete_budget(empty.id).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn budget_input_is_validated() {
    let engine = engine();
    for (year, name, total) in [(2025, "", "100"), (0, "x", "100"), (2025, "x", "0")] {
        let err = engine
            .create_budget(&NewBudget {
                year,
                project_name: name.into(),
                total_budget: dec(total),
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
