use super::common::*;
use std::sync::Arc;

use crate::workflows::admission::domain::RecordKind;
use crate::workflows::admission::resolver::{
    looks_like_reg_no, LookupError, RecordResolver, ResolvedRecord, SearchOutcome,
};

fn resolver(gateway: &MemoryGateway) -> RecordResolver<MemoryGateway> {
    RecordResolver::new(Arc::new(gateway.clone()))
}

#[test]
fn registration_number_shape() {
    assert!(looks_like_reg_no("RC00110251234"));
    assert!(looks_like_reg_no(" rc0011025 "));
    assert!(!looks_like_reg_no("Ravi"));
    assert!(!looks_like_reg_no("Ravi Kumar"));
    assert!(!looks_like_reg_no("C00110251234"));
}

#[test]
fn reg_no_hit_returns_admission_without_enquiry_search() {
    let gateway = MemoryGateway::seeded();

    let outcome = resolver(&gateway)
        .search("rc00110251234")
        .expect("lookup succeeds");

    assert_eq!(outcome.kind(), RecordKind::Admission);
    assert_eq!(gateway.calls(), vec![format!("regno:{EXISTING_REG_NO}")]);
}

#[test]
fn reg_no_miss_falls_back_to_enquiry_search() {
    let gateway = MemoryGateway::seeded();

    let outcome = resolver(&gateway)
        .search("RC00199999999")
        .expect("lookup succeeds");

    assert_eq!(outcome, SearchOutcome::NotFound);
    assert_eq!(
        gateway.calls(),
        vec![
            "regno:RC00199999999".to_string(),
            "search:RC00199999999".to_string()
        ]
    );
}

#[test]
fn name_search_skips_reg_no_lookup() {
    let gateway = MemoryGateway::seeded();

    let outcome = resolver(&gateway).search("asha").expect("lookup succeeds");

    match outcome {
        SearchOutcome::Enquiries(enquiries) => {
            assert_eq!(enquiries.len(), 1);
            assert_eq!(enquiries[0].id.as_deref(), Some("e-100"));
        }
        other => panic!("expected enquiries, got {other:?}"),
    }
    assert_eq!(gateway.calls(), vec!["search:asha".to_string()]);
}

#[test]
fn empty_term_is_rejected_without_calls() {
    let gateway = MemoryGateway::seeded();

    assert_eq!(
        resolver(&gateway).search("   "),
        Err(LookupError::EmptyQuery)
    );
    assert!(gateway.calls().is_empty());
}

#[test]
fn outage_is_distinguished_from_no_data() {
    let gateway = MemoryGateway {
        unavailable: true,
        ..MemoryGateway::seeded()
    };

    let result = resolver(&gateway).search("asha");

    assert!(matches!(result, Err(LookupError::ServiceUnavailable(_))));
}

#[test]
fn unmatched_name_is_not_found() {
    let gateway = MemoryGateway::seeded();

    let outcome = resolver(&gateway).search("nobody").expect("lookup succeeds");

    assert_eq!(outcome, SearchOutcome::NotFound);
}

#[test]
fn select_requires_a_listed_enquiry_id() {
    let outcome = SearchOutcome::Enquiries(vec![enquiry()]);

    let selected = RecordResolver::<MemoryGateway>::select(&outcome, Some("e-100"))
        .expect("enquiry listed");
    assert!(matches!(selected, ResolvedRecord::Enquiry(_)));
    assert_eq!(selected.display_name(), "asha  verma");

    assert!(RecordResolver::<MemoryGateway>::select(&outcome, Some("e-404")).is_none());
    assert!(RecordResolver::<MemoryGateway>::select(&outcome, None).is_none());
    assert!(RecordResolver::<MemoryGateway>::select(&SearchOutcome::NotFound, None).is_none());
}
