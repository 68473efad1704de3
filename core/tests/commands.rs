//! JSON command dispatch, as driven by the runner's IPC loop.

mod common;

use aidledger_core::{command::LedgerCommand, error::ErrorKind};
use common::*;
use serde_json::Value;

fn run(engine: &aidledger_core::engine::LedgerEngine, line: &str) -> Result<Value, ErrorKind> {
    let cmd: LedgerCommand = serde_json::from_str(line).expect("command parses");
    engine.execute(&cmd).map_err(|e| e.kind())
}

#[test]
fn budget_to_report_over_json() {
    let engine = engine();
    let budget = run(
        &engine,
        r#"{"cmd":"create_budget","year":2025,"project_name":"Relief","total_budget":"100000"}"#,
    )
    .unwrap();
    assert_eq!(budget["remaining_budget"], "100000.00");
    let id = budget["id"].as_i64().unwrap();

    let alloc = run(
        &engine,
        &format!(
            r#"{{"cmd":"add_allocation","budget_id":{id},"target_group_id":1,
                 "allocation_percentage":"50","max_recipients":2}}"#
        ),
    )
    .unwrap();
    assert_eq!(alloc["allocated_amount"], "50000.00");
    assert_eq!(alloc["amount_per_person"], "25000.00");

    let reg = run(
        &engine,
        r#"{"cmd":"register_citizen","national_id":"5000000000001","first_name":"Malee",
            "last_name":"Thongdee","birth_date":"1950-03-01","income":"12000","occupation":"retired"}"#,
    )
    .unwrap();
    assert_eq!(reg["payment"]["amount"], "25000.00");
    assert_eq!(reg["payment"]["status"], "pending");

    let err = run(
        &engine,
        &format!(
            r#"{{"cmd":"add_allocation","budget_id":{id},"target_group_id":2,
                 "allocation_percentage":"60","max_recipients":2}}"#
        ),
    )
    .unwrap_err();
    assert_eq!(err, ErrorKind::OverAllocation);

    let report = run(&engine, r#"{"cmd":"report"}"#).unwrap();
    assert_eq!(report["total_remaining_budget"], "50000.00");
    assert_eq!(report["groups"][0]["pending_count"], 1);
}

#[test]
fn update_citizen_flattens_its_fields() {
    let engine = engine();
    let reg = engine.register_citizen(&elderly("5000000000001")).unwrap();
    let updated = run(
        &engine,
        &format!(
            r#"{{"cmd":"update_citizen","citizen_id":{},"first_name":"Malee","last_name":"Thongdee",
                 "birth_date":"1990-01-01","income":"5000","occupation":"driver"}}"#,
            reg.citizen.id
        ),
    )
    .unwrap();
    assert_eq!(updated["target_group_id"], LOW_INCOME);
    assert_eq!(updated["income"], "5000.00");
}

#[test]
fn errors_surface_their_kind() {
    let engine = engine();
    assert_eq!(run(&engine, r#"{"cmd":"get_budget","budget_id":1}"#).unwrap_err(), ErrorKind::NotFound);
    assert_eq!(
        run(&engine, r#"{"cmd":"classify","age":12,"income":"100","occupation":"x"}"#).unwrap_err(),
        ErrorKind::Validation
    );
    assert_eq!(run(&engine, r#"{"cmd":"quit"}"#).unwrap(), Value::Null);
}

#[test]
fn target_groups_and_classification_over_json() {
    let engine = engine();
    let groups = run(&engine, r#"{"cmd":"list_target_groups"}"#).unwrap();
    let ids: Vec<i64> = groups
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![ELDERLY, LOW_INCOME, FARMER, OTHER]);

    let group = run(
        &engine,
        r#"{"cmd":"classify_by_threshold","age":70,"income":"20000","occupation":"driver"}"#,
    )
    .unwrap();
    assert_eq!(group.as_i64(), Some(ELDERLY));
}
