use super::common::*;
use std::sync::Arc;

use crate::workflows::admission::attachments::{
    is_accepted_type, upload_folder, AttachmentManager, AttachmentRejection, TEMP_FOLDER,
};
use crate::workflows::admission::draft::{AdmissionDraft, AttachmentRef, DocumentField};
use crate::workflows::admission::gateway::UploadFile;

const LIMIT: usize = 1024;

fn manager(store: &MemoryStore) -> AttachmentManager<MemoryStore> {
    AttachmentManager::new(Arc::new(store.clone()), LIMIT)
}

#[test]
fn unsupported_type_is_rejected_before_storage() {
    let store = MemoryStore::default();
    let file = UploadFile::new("notes.docx", "application/msword", vec![1; 10]);

    let result = manager(&store).upload(DocumentField::IdProof, None, &file, "temp");

    assert!(matches!(
        result,
        Err(AttachmentRejection::UnsupportedType { .. })
    ));
    assert!(store.uploads().is_empty());
}

#[test]
fn oversized_file_is_rejected() {
    let store = MemoryStore::default();
    let file = png("photo.png", LIMIT + 1);

    match manager(&store).upload(DocumentField::Photo, None, &file, "temp") {
        Err(AttachmentRejection::TooLarge { size, limit, .. }) => {
            assert_eq!(size, LIMIT + 1);
            assert_eq!(limit, LIMIT);
        }
        other => panic!("expected size rejection, got {other:?}"),
    }
    assert!(store.uploads().is_empty());
}

#[test]
fn empty_file_is_rejected() {
    let store = MemoryStore::default();
    let file = UploadFile::new("photo.png", "image/png", Vec::new());

    let result = manager(&store).upload(DocumentField::Photo, None, &file, "temp");

    assert!(matches!(result, Err(AttachmentRejection::Empty { .. })));
}

#[test]
fn accepted_types_fall_back_to_file_extension() {
    assert!(is_accepted_type(&UploadFile::new("scan.pdf", "", vec![1])));
    assert!(is_accepted_type(&UploadFile::new("x", "image/jpeg", vec![1])));
    assert!(is_accepted_type(&UploadFile::new("x", "image/gif", vec![1])));
    assert!(!is_accepted_type(&UploadFile::new("run.exe", "", vec![1])));
    assert!(!is_accepted_type(&UploadFile::new("x", "text/plain", vec![1])));
}

#[test]
fn folder_prefers_generated_registration_number() {
    let mut draft = AdmissionDraft::default();
    assert_eq!(upload_folder(&draft), TEMP_FOLDER);

    draft.reg_no = "RC00110259999".to_string();
    assert_eq!(upload_folder(&draft), "RC00110259999");

    draft.generated_reg_no = "RC00110251111".to_string();
    assert_eq!(upload_folder(&draft), "RC00110251111");
}

#[test]
fn successful_upload_stores_path() {
    let store = MemoryStore::default();

    let update = manager(&store)
        .upload(DocumentField::Photo, None, &png("me.png", 10), "RC00110251111")
        .expect("valid file");

    assert_eq!(
        update.reference,
        Some(AttachmentRef::Stored("RC00110251111/me.png".to_string()))
    );
    assert!(!update.degraded);
    assert!(update.warnings.is_empty());
}

#[test]
fn storage_failure_degrades_to_placeholder() {
    let store = MemoryStore {
        fail_uploads: true,
        ..MemoryStore::default()
    };

    let update = manager(&store)
        .upload(DocumentField::Signature, None, &png("sign.png", 10), "temp")
        .expect("validation passes");

    assert!(update.degraded);
    assert_eq!(
        update.reference,
        Some(AttachmentRef::Placeholder("sign.png".to_string()))
    );
    assert_eq!(update.warnings.len(), 1);
}

#[test]
fn replacing_a_stored_file_deletes_the_previous_one() {
    let store = MemoryStore::default();
    let previous = AttachmentRef::Stored("temp/old.png".to_string());

    let update = manager(&store)
        .upload(DocumentField::Photo, Some(&previous), &png("new.png", 10), "temp")
        .expect("valid file");

    assert_eq!(store.deletes(), vec!["temp/old.png".to_string()]);
    assert_eq!(
        update.reference,
        Some(AttachmentRef::Stored("temp/new.png".to_string()))
    );
}

#[test]
fn failed_replacement_keeps_the_stored_file() {
    let store = MemoryStore {
        fail_uploads: true,
        ..MemoryStore::default()
    };
    let previous = AttachmentRef::Stored("RC001/photo.png".to_string());

    let update = manager(&store)
        .upload(DocumentField::Photo, Some(&previous), &png("new.png", 10), "RC001")
        .expect("validation passes");

    assert!(update.degraded);
    assert_eq!(update.reference, Some(previous));
    assert!(store.deletes().is_empty());
    assert_eq!(update.warnings.len(), 1);
    assert!(update.warnings[0].contains("previously uploaded file is kept"));
}

#[test]
fn delete_clears_even_when_storage_fails() {
    let store = MemoryStore {
        fail_deletes: true,
        ..MemoryStore::default()
    };
    let current = AttachmentRef::Stored("temp/photo.png".to_string());

    let update = manager(&store).delete(DocumentField::Photo, Some(&current));

    assert_eq!(update.reference, None);
    assert_eq!(update.warnings.len(), 1);
    assert_eq!(store.deletes(), vec!["temp/photo.png".to_string()]);
}

#[test]
fn placeholders_are_never_deleted_remotely() {
    let store = MemoryStore::default();
    let current = AttachmentRef::Placeholder("photo.png".to_string());

    let update = manager(&store).delete(DocumentField::Photo, Some(&current));

    assert_eq!(update.reference, None);
    assert!(store.deletes().is_empty());
}
