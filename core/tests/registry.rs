//! Citizen registry: classification on create and update, deletes, lookups.

mod common;

use aidledger_core::{
    disbursement::{CompletionRequest, PaymentStatus},
    error::ErrorKind,
    registry::CitizenUpdate,
};
use chrono::NaiveDate;
use common::*;

fn update_from(c: &aidledger_core::registry::NewCitizen) -> CitizenUpdate {
    CitizenUpdate {
        first_name: c.first_name.clone(),
        last_name: c.last_name.clone(),
        birth_date: c.birth_date,
        income: c.income,
        occupation: c.occupation.clone(),
    }
}

#[test]
fn registration_uses_the_threshold_chain() {
    let engine = engine();
    let cases = [
        (applicant("5000000000001", (1960, 1, 1), "50000", "farmer"), ELDERLY),
        (applicant("5000000000002", (1990, 1, 1), "8999.99", "เกษตรกร"), LOW_INCOME),
        (applicant("5000000000003", (1990, 1, 1), "9000", "เกษตรกรสวนยาง"), FARMER),
        (applicant("5000000000004", (1990, 1, 1), "9000", "ข้าราชการ"), OTHER),
    ];
    for (new, expected) in cases {
        let reg = engine.register_citizen(&new).unwrap();
        assert_eq!(reg.citizen.target_group_id, expected, "{}", new.national_id);
    }
}

#[test]
fn age_is_birthday_aware() {
    let engine = engine();
    // Turns 60 the day after the fixture date.
    let reg = engine
        .register_citizen(&applicant("5000000000001", (1965, 1, 16), "50000", "office"))
        .unwrap();
    assert_eq!(reg.citizen.age, 59);
    assert_eq!(reg.citizen.target_group_id, OTHER);

    let reg = engine
        .register_citizen(&applicant("5000000000002", (1965, 1, 15), "50000", "office"))
        .unwrap();
    assert_eq!(reg.citizen.age, 60);
    assert_eq!(reg.citizen.target_group_id, ELDERLY);
}

#[test]
fn invalid_applicants_are_rejected_before_any_write() {
    let engine = engine();
    let too_young = applicant("5000000000001", (2010, 1, 1), "1000", "student");
    let too_old = applicant("5000000000002", (1920, 1, 1), "1000", "retired");
    let negative = applicant("5000000000003", (1980, 1, 1), "-1", "office");
    let mut blank = elderly("5000000000004");
    blank.first_name = "  ".into();

    for bad in [too_young, too_old, negative, blank] {
        let err = engine.register_citizen(&bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{}", bad.national_id);
    }
    assert!(engine.list_citizens().unwrap().is_empty());
    assert!(engine.events_since(0).unwrap().is_empty());
}

#[test]
fn duplicate_national_id_is_rejected() {
    let engine = engine();
    engine.register_citizen(&elderly("5000000000001")).unwrap();
    let err = engine.register_citizen(&low_income("5000000000001")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(engine.list_citizens().unwrap().len(), 1);
}

#[test]
fn update_uses_the_band_table_and_keeps_payments() {
    let engine = engine();
    let b = budget(&engine, "100000");
    allocate(&engine, b.id, FARMER, "20", 4);

    // Threshold chain: income 9500 is not low income, so the farmer rule wins.
    let new = applicant("5000000000001", (1990, 1, 1), "9500", "เกษตรกร");
    let reg = engine.register_citizen(&new).unwrap();
    assert_eq!(reg.citizen.target_group_id, FARMER);
    let payment = reg.payment.unwrap();

    // Band table: income 5000 at 35 sits inside the low income band,
    // which outranks the farmer fallback.
    let mut update = update_from(&new);
    update.income = dec("5000");
    let updated = engine.update_citizen(reg.citizen.id, &update).unwrap();
    assert_eq!(updated.target_group_id, LOW_INCOME);
    assert_eq!(updated.income, dec("5000"));

    // The queued payment is neither repriced nor moved.
    let after = engine.get_payment(payment.id).unwrap();
    assert_eq!(after.amount, payment.amount);
    assert_eq!(after.allocation_id, payment.allocation_id);
}

#[test]
fn band_table_falls_back_to_farmer_then_other() {
    let engine = engine();
    assert_eq!(engine.classify(40, dec("20000"), "เกษตรกร").unwrap(), FARMER);
    assert_eq!(engine.classify(40, dec("20000"), "driver").unwrap(), OTHER);
    assert_eq!(engine.classify(70, dec("20000"), "driver").unwrap(), ELDERLY);
    assert_eq!(engine.classify(40, dec("8999.99"), "driver").unwrap(), LOW_INCOME);
    assert_eq!(engine.classify(17, dec("100"), "driver").unwrap_err().kind(), ErrorKind::Validation);
}

#[test]
fn updating_an_unknown_citizen_is_not_found() {
    let engine = engine();
    let err = engine
        .update_citizen(77, &update_from(&elderly("5000000000001")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn delete_drops_pending_payments() {
    let engine = engine();
    let b = budget(&engine, "100000");
    allocate(&engine, b.id, ELDERLY, "50", 2);
    let reg = engine.register_citizen(&elderly("5000000000001")).unwrap();
    let payment = reg.payment.unwrap();

    engine.delete_citizen(reg.citizen.id).unwrap();
    assert_eq!(engine.get_citizen(reg.citizen.id).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(engine.get_payment(payment.id).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(engine.delete_citizen(reg.citizen.id).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn paid_citizens_cannot_be_deleted() {
    let engine = engine();
    let b = budget(&engine, "100000");
    allocate(&engine, b.id, ELDERLY, "50", 2);
    let reg = engine.register_citizen(&elderly("5000000000001")).unwrap();
    let payment = reg.payment.unwrap();
    engine
        .complete_payment(&CompletionRequest {
            payment_id: payment.id,
            citizen_id: reg.citizen.id,
            target_group_id: ELDERLY,
            budget_id: b.id,
        })
        .unwrap();

    let err = engine.delete_citizen(reg.citizen.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(engine.get_citizen(reg.citizen.id).is_ok());
}

#[test]
fn lookup_reports_group_payment_and_last_distribution() {
    let engine = engine();
    let b = budget(&engine, "100000");
    allocate(&engine, b.id, ELDERLY, "50", 2);
    let reg = engine.register_citizen(&elderly("5000000000001")).unwrap();

    let status = engine.lookup_citizen(" 5000000000001 ").unwrap();
    assert_eq!(status.target_group, "Elderly");
    assert_eq!(status.latest_payment.as_ref().unwrap().status, PaymentStatus::Pending);
    assert_eq!(status.last_distribution_date, None);

    let payment = reg.payment.unwrap();
    engine
        .complete_payment(&CompletionRequest {
            payment_id: payment.id,
            citizen_id: reg.citizen.id,
            target_group_id: ELDERLY,
            budget_id: b.id,
        })
        .unwrap();
    let status = engine.lookup_citizen("5000000000001").unwrap();
    assert_eq!(status.latest_payment.unwrap().status, PaymentStatus::Completed);
    assert_eq!(
        status.last_distribution_date.map(|d| d.date_naive()),
        NaiveDate::from_ymd_opt(2025, 1, 15)
    );

    assert_eq!(engine.lookup_citizen("5999999999999").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn birth_date_survives_the_store() {
    let engine = engine();
    let reg = engine.register_citizen(&elderly("5000000000001")).unwrap();
    let stored = engine.get_citizen(reg.citizen.id).unwrap();
    assert_eq!(stored.birth_date, NaiveDate::from_ymd_opt(1950, 3, 1).unwrap());
    assert_eq!(stored, reg.citizen);
}
