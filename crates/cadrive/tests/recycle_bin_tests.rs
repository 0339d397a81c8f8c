mod common;

use bytes::Bytes;
use cadrive::catalog::Catalog;
use cadrive::models::{
    ClientProfile, DocumentSummary, EntityType, ItemKind, NewUpload, Recyclable, UploaderRole,
};
use cadrive::services::FolderQuery;
use cadrive::storage::bucket_name;
use chrono::{Duration, Utc};
use common::{date, setup, TestDrive};
use mongodb::bson::oid::ObjectId;

const ACTOR: &str = "staff@practice";

async fn upload_into(drive: &TestDrive, profile: &ClientProfile, folder_id: ObjectId, name: &str) -> DocumentSummary {
    drive
        .state
        .document_service()
        .upload(
            profile,
            &FolderQuery {
                folder_id: Some(folder_id),
                ..Default::default()
            },
            NewUpload {
                file_name: name.to_string(),
                content_type: "application/pdf".into(),
                data: Bytes::from_static(b"content"),
                uploaded_by: UploaderRole::Client,
                uploader_id: "client".into(),
            },
            date(2024, 6, 1),
        )
        .await
        .unwrap()
}

fn oid(hex: &str) -> ObjectId {
    ObjectId::parse_str(hex).unwrap()
}

#[tokio::test]
async fn test_non_empty_folder_cannot_be_deleted() {
    let drive = setup();
    let profile = drive
        .provisioned_client(EntityType::Individual, None, date(2024, 6, 1))
        .await;
    let bank = drive.folder_at(&profile.id, &["FY - 2024-25", "Income Tax", "Bank statement"]);
    let doc = upload_into(&drive, &profile, bank.id, "statement.pdf").await;
    let bin = drive.state.recycle_bin_service();

    let err = bin
        .soft_delete(&profile, ItemKind::Folder, &bank.id, ACTOR)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CONFLICT");

    bin.soft_delete(&profile, ItemKind::Document, &oid(&doc.id), ACTOR)
        .await
        .unwrap();
    bin.soft_delete(&profile, ItemKind::Folder, &bank.id, ACTOR)
        .await
        .unwrap();

    let folder = drive.catalog.get_folder(&bank.id).await.unwrap().unwrap();
    assert!(!folder.is_active());
    assert_eq!(folder.deletion.deleted_by.as_deref(), Some(ACTOR));
    assert!(folder.deletion.deleted_at.is_some());
}

#[tokio::test]
async fn test_restore_reverses_soft_delete() {
    let drive = setup();
    let profile = drive
        .provisioned_client(EntityType::Individual, None, date(2024, 6, 1))
        .await;
    let itr = drive.folder_at(&profile.id, &["FY - 2024-25", "Income Tax"]);
    let doc = upload_into(&drive, &profile, itr.id, "computation.pdf").await;
    let doc_id = oid(&doc.id);
    let bin = drive.state.recycle_bin_service();
    let listing = FolderQuery {
        folder_id: Some(itr.id),
        ..Default::default()
    };

    bin.soft_delete(&profile, ItemKind::Document, &doc_id, ACTOR)
        .await
        .unwrap();
    let contents = drive
        .state
        .folder_service()
        .list_contents(&profile, &listing, date(2024, 6, 1))
        .await
        .unwrap();
    assert!(contents.documents.is_empty());
    let binned = bin.list_bin(&profile).await.unwrap();
    assert_eq!(binned.documents.len(), 1);
    assert_eq!(binned.documents[0].deleted_by.as_deref(), Some(ACTOR));

    bin.restore(&profile, ItemKind::Document, &doc_id, ACTOR)
        .await
        .unwrap();
    let contents = drive
        .state
        .folder_service()
        .list_contents(&profile, &listing, date(2024, 6, 1))
        .await
        .unwrap();
    assert_eq!(contents.documents.len(), 1);
    assert!(bin.list_bin(&profile).await.unwrap().documents.is_empty());

    let restored = drive.catalog.get_document(&doc_id).await.unwrap().unwrap();
    assert!(restored.deletion.deleted_at.is_none());
    assert!(restored.deletion.deleted_by.is_none());
}

#[tokio::test]
async fn test_restoring_document_restores_deleted_folder() {
    let drive = setup();
    let profile = drive
        .provisioned_client(EntityType::Individual, None, date(2024, 6, 1))
        .await;
    let bank = drive.folder_at(&profile.id, &["FY - 2024-25", "Income Tax", "Bank statement"]);
    let doc = upload_into(&drive, &profile, bank.id, "sbi.pdf").await;
    let bin = drive.state.recycle_bin_service();

    bin.soft_delete(&profile, ItemKind::Document, &oid(&doc.id), ACTOR)
        .await
        .unwrap();
    bin.soft_delete(&profile, ItemKind::Folder, &bank.id, ACTOR)
        .await
        .unwrap();
    bin.restore(&profile, ItemKind::Document, &oid(&doc.id), ACTOR)
        .await
        .unwrap();

    assert!(drive.catalog.get_folder(&bank.id).await.unwrap().unwrap().is_active());
    assert!(bin.list_bin(&profile).await.unwrap().folders.is_empty());
}

#[tokio::test]
async fn test_bin_lists_newest_deleted_first() {
    let drive = setup();
    let profile = drive
        .provisioned_client(EntityType::Individual, None, date(2024, 6, 1))
        .await;
    let itr = drive.folder_at(&profile.id, &["FY - 2024-25", "Income Tax"]);
    let older = upload_into(&drive, &profile, itr.id, "older.pdf").await;
    let newer = upload_into(&drive, &profile, itr.id, "newer.pdf").await;
    let bin = drive.state.recycle_bin_service();

    for doc in [&older, &newer] {
        bin.soft_delete(&profile, ItemKind::Document, &oid(&doc.id), ACTOR)
            .await
            .unwrap();
    }
    drive
        .catalog
        .set_deleted_at(&oid(&older.id), Utc::now() - Duration::days(3));

    let names: Vec<String> = bin
        .list_bin(&profile)
        .await
        .unwrap()
        .documents
        .into_iter()
        .map(|d| d.file_name)
        .collect();
    assert_eq!(names, vec!["newer.pdf", "older.pdf"]);
}

#[tokio::test]
async fn test_purge_removes_expired_items_only() {
    let drive = setup();
    let profile = drive
        .provisioned_client(EntityType::Individual, None, date(2024, 6, 1))
        .await;
    let bucket = bucket_name("ca-", &profile.tenant_id);
    let itr = drive.folder_at(&profile.id, &["FY - 2024-25", "Income Tax"]);
    let expired = upload_into(&drive, &profile, itr.id, "old.pdf").await;
    let recent = upload_into(&drive, &profile, itr.id, "recent.pdf").await;
    let bin = drive.state.recycle_bin_service();

    for doc in [&expired, &recent] {
        bin.soft_delete(&profile, ItemKind::Document, &oid(&doc.id), ACTOR)
            .await
            .unwrap();
    }
    let now = Utc::now();
    drive
        .catalog
        .set_deleted_at(&oid(&expired.id), now - Duration::days(91));
    drive
        .catalog
        .set_deleted_at(&oid(&recent.id), now - Duration::days(10));

    let report = bin.purge_expired(now).await.unwrap();
    assert_eq!(report.documents, 1);
    assert_eq!(report.objects_removed, 1);
    assert_eq!(report.failures, 0);

    assert!(drive.catalog.get_document(&oid(&expired.id)).await.unwrap().is_none());
    assert!(!drive.storage.object_exists(&bucket, &expired.storage_key));
    assert!(drive
        .state
        .document_service()
        .download(&profile, &oid(&expired.id))
        .await
        .is_err());

    assert!(drive.catalog.get_document(&oid(&recent.id)).await.unwrap().is_some());
    assert!(drive.storage.object_exists(&bucket, &recent.storage_key));
}

#[tokio::test]
async fn test_purge_empties_nested_folders_in_one_run() {
    let drive = setup();
    let profile = drive
        .provisioned_client(EntityType::Individual, None, date(2024, 6, 1))
        .await;
    let itr = drive.folder_at(&profile.id, &["FY - 2024-25", "Income Tax"]);
    let folders = drive.state.folder_service();
    let outer = folders
        .create_folder(&profile.id, "Scrutiny", Some(&itr.id), ACTOR)
        .await
        .unwrap();
    let inner = folders
        .create_folder(&profile.id, "Replies", Some(&outer.id), ACTOR)
        .await
        .unwrap();
    let doc = upload_into(&drive, &profile, inner.id, "reply.pdf").await;
    let bin = drive.state.recycle_bin_service();

    bin.soft_delete(&profile, ItemKind::Document, &oid(&doc.id), ACTOR)
        .await
        .unwrap();
    bin.soft_delete(&profile, ItemKind::Folder, &inner.id, ACTOR)
        .await
        .unwrap();
    bin.soft_delete(&profile, ItemKind::Folder, &outer.id, ACTOR)
        .await
        .unwrap();

    let long_ago = Utc::now() - Duration::days(120);
    for id in [oid(&doc.id), inner.id, outer.id] {
        assert!(drive.catalog.set_deleted_at(&id, long_ago));
    }

    let report = bin.purge_expired(Utc::now()).await.unwrap();
    assert_eq!(report.documents, 1);
    assert_eq!(report.folders, 2);
    assert_eq!(report.failures, 0);
    assert!(drive.catalog.get_folder(&outer.id).await.unwrap().is_none());
    assert!(drive.catalog.get_folder(&itr.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_purge_tolerates_storage_failure() {
    let drive = setup();
    let profile = drive
        .provisioned_client(EntityType::Individual, None, date(2024, 6, 1))
        .await;
    let itr = drive.folder_at(&profile.id, &["FY - 2024-25", "Income Tax"]);
    let doc = upload_into(&drive, &profile, itr.id, "a.pdf").await;
    let bin = drive.state.recycle_bin_service();
    bin.soft_delete(&profile, ItemKind::Document, &oid(&doc.id), ACTOR)
        .await
        .unwrap();
    drive
        .catalog
        .set_deleted_at(&oid(&doc.id), Utc::now() - Duration::days(100));

    drive.storage.set_fail_deletes(true);
    let report = bin.purge_expired(Utc::now()).await.unwrap();
    assert_eq!(report.documents, 1);
    assert_eq!(report.objects_removed, 0);
    assert!(drive.catalog.get_document(&oid(&doc.id)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_purge_counts_blocked_folder_as_failure() {
    let drive = setup();
    let profile = drive
        .provisioned_client(EntityType::Individual, None, date(2024, 6, 1))
        .await;
    let itr = drive.folder_at(&profile.id, &["FY - 2024-25", "Income Tax"]);
    let folders = drive.state.folder_service();
    let outer = folders
        .create_folder(&profile.id, "Old", Some(&itr.id), ACTOR)
        .await
        .unwrap();
    let inner = folders
        .create_folder(&profile.id, "Older", Some(&outer.id), ACTOR)
        .await
        .unwrap();
    let bin = drive.state.recycle_bin_service();
    bin.soft_delete(&profile, ItemKind::Folder, &inner.id, ACTOR)
        .await
        .unwrap();
    bin.soft_delete(&profile, ItemKind::Folder, &outer.id, ACTOR)
        .await
        .unwrap();

    // Only the outer folder is past retention; its child is still in the bin
    drive
        .catalog
        .set_deleted_at(&outer.id, Utc::now() - Duration::days(95));

    let report = bin.purge_expired(Utc::now()).await.unwrap();
    assert_eq!(report.folders, 0);
    assert_eq!(report.failures, 1);
    assert!(drive.catalog.get_folder(&outer.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_permanent_delete_requires_bin() {
    let drive = setup();
    let profile = drive
        .provisioned_client(EntityType::Individual, None, date(2024, 6, 1))
        .await;
    let bucket = bucket_name("ca-", &profile.tenant_id);
    let itr = drive.folder_at(&profile.id, &["FY - 2024-25", "Income Tax"]);
    let doc = upload_into(&drive, &profile, itr.id, "a.pdf").await;
    let doc_id = oid(&doc.id);
    let bin = drive.state.recycle_bin_service();

    let err = bin
        .permanent_delete(&profile, ItemKind::Document, &doc_id, ACTOR)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CONFLICT");

    bin.soft_delete(&profile, ItemKind::Document, &doc_id, ACTOR)
        .await
        .unwrap();
    bin.permanent_delete(&profile, ItemKind::Document, &doc_id, ACTOR)
        .await
        .unwrap();
    assert!(drive.catalog.get_document(&doc_id).await.unwrap().is_none());
    assert!(!drive.storage.object_exists(&bucket, &doc.storage_key));

    let missing = bin
        .permanent_delete(&profile, ItemKind::Document, &doc_id, ACTOR)
        .await
        .unwrap_err();
    assert!(missing.is_not_found());
}

#[tokio::test]
async fn test_mutations_on_unknown_ids_are_not_found() {
    let drive = setup();
    let profile = drive
        .provisioned_client(EntityType::Individual, None, date(2024, 6, 1))
        .await;
    let bin = drive.state.recycle_bin_service();
    let unknown = ObjectId::new();

    for kind in [ItemKind::Folder, ItemKind::Document] {
        assert!(bin
            .soft_delete(&profile, kind, &unknown, ACTOR)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(bin
            .restore(&profile, kind, &unknown, ACTOR)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(bin.owner_of(kind, &unknown).await.unwrap_err().is_not_found());
    }
}
