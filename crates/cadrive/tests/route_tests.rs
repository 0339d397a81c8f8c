mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::{Extension, Router};
use cadrive::fiscal_year::current_fiscal_year;
use cadrive::models::{ClientProfile, EntityType, ItemKind};
use cadrive::routes::configure;
use cadrive::AuthenticatedPrincipal;
use common::{setup, TestDrive};
use mongodb::bson::oid::ObjectId;
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "cadrive-test-boundary";

fn app(drive: &TestDrive, principal: AuthenticatedPrincipal) -> Router {
    configure(drive.state.clone()).layer(Extension(principal))
}

fn staff_of(client: &ClientProfile) -> AuthenticatedPrincipal {
    AuthenticatedPrincipal::staff(client.tenant_id, "staff@practice")
}

async fn provisioned(drive: &TestDrive, entity_type: EntityType) -> ClientProfile {
    drive
        .provisioned_client(entity_type, None, drive.state.config.today())
        .await
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn multipart_upload(fields: &[(&str, &str)], file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_folder_contents_reports_current_year() {
    let drive = setup();
    let client = provisioned(&drive, EntityType::Business).await;
    let principal = AuthenticatedPrincipal::client(client.tenant_id, client.id);

    let response = app(&drive, principal)
        .oneshot(json_request(Method::POST, "/folder-contents", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    let current = current_fiscal_year(&drive.state.config.today());
    assert_eq!(body["currentFiscalYear"], json!(current));
    assert_eq!(body["availableFiscalYears"][0], json!(current));
    assert_eq!(body["folders"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_staff_must_name_a_client() {
    let drive = setup();
    let client = provisioned(&drive, EntityType::Individual).await;

    let response = app(&drive, staff_of(&client))
        .oneshot(json_request(Method::POST, "/folder-contents", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_other_clients_bin_is_not_found() {
    let drive = setup();
    let owner = provisioned(&drive, EntityType::Individual).await;
    let intruder = provisioned(&drive, EntityType::Individual).await;

    let as_intruder = AuthenticatedPrincipal::client(intruder.tenant_id, intruder.id);
    let response = app(&drive, as_intruder)
        .oneshot(empty_request(Method::GET, &format!("/bin/{}", owner.id.to_hex())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Staff of another practice cannot see it either
    let foreign_staff = AuthenticatedPrincipal::staff(intruder.tenant_id, "other@practice");
    let response = app(&drive, foreign_staff)
        .oneshot(empty_request(Method::GET, &format!("/bin/{}", owner.id.to_hex())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app(&drive, staff_of(&owner))
        .oneshot(empty_request(Method::GET, &format!("/bin/{}", owner.id.to_hex())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_deleting_non_empty_folder_conflicts() {
    let drive = setup();
    let client = provisioned(&drive, EntityType::Individual).await;
    let current = current_fiscal_year(&drive.state.config.today());
    let income_tax = drive.folder_at(&client.id, &[current.as_str(), "Income Tax"]);

    let response = app(&drive, staff_of(&client))
        .oneshot(empty_request(
            Method::DELETE,
            &format!("/folders/{}", income_tax.id.to_hex()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(response).await["code"], "CONFLICT");

    let bank = drive.folder_at(&client.id, &[current.as_str(), "Income Tax", "Bank statement"]);
    let response = app(&drive, staff_of(&client))
        .oneshot(empty_request(Method::DELETE, &format!("/folders/{}", bank.id.to_hex())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_upload_then_download() {
    let drive = setup();
    let client = provisioned(&drive, EntityType::Individual).await;
    let client_hex = client.id.to_hex();

    let response = app(&drive, staff_of(&client))
        .oneshot(multipart_upload(
            &[("clientId", client_hex.as_str()), ("category", "ITR")],
            "computation.pdf",
            b"%PDF-1.7 computation",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let document = read_json(response).await;
    assert_eq!(document["fileName"], "computation.pdf");
    assert_eq!(document["contentType"], "application/pdf");
    assert_eq!(document["category"], "ITR");
    let id = document["id"].as_str().unwrap().to_string();

    let as_client = AuthenticatedPrincipal::client(client.tenant_id, client.id);
    let response = app(&drive, as_client)
        .oneshot(empty_request(Method::GET, &format!("/documents/{id}/download")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"computation.pdf\""
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"%PDF-1.7 computation");
}

#[tokio::test]
async fn test_upload_without_file_is_rejected() {
    let drive = setup();
    let client = provisioned(&drive, EntityType::Individual).await;

    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"category\"\r\n\r\nKYC\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let as_client = AuthenticatedPrincipal::client(client.tenant_id, client.id);
    let response = app(&drive, as_client).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_permanent_delete_requires_staff() {
    let drive = setup();
    let client = provisioned(&drive, EntityType::Individual).await;
    let kyc = drive.folder_at(&client.id, &["KYC"]);
    let as_client = AuthenticatedPrincipal::client(client.tenant_id, client.id);

    let response = app(&drive, as_client.clone())
        .oneshot(empty_request(Method::DELETE, &format!("/folders/{}", kyc.id.to_hex())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let uri = format!("/permanent/folder/{}", kyc.id.to_hex());
    let response = app(&drive, as_client)
        .oneshot(empty_request(Method::DELETE, &uri))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(&drive, staff_of(&client))
        .oneshot(empty_request(Method::DELETE, &uri))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_restore_route_and_bad_kind() {
    let drive = setup();
    let client = provisioned(&drive, EntityType::Individual).await;
    let kyc = drive.folder_at(&client.id, &["KYC"]);
    let staff = staff_of(&client);

    app(&drive, staff.clone())
        .oneshot(empty_request(Method::DELETE, &format!("/folders/{}", kyc.id.to_hex())))
        .await
        .unwrap();

    let response = app(&drive, staff.clone())
        .oneshot(empty_request(
            Method::PUT,
            &format!("/restore/folder/{}", kyc.id.to_hex()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    drive.folder_at(&client.id, &["KYC"]);

    let response = app(&drive, staff)
        .oneshot(empty_request(
            Method::PUT,
            &format!("/restore/client/{}", kyc.id.to_hex()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_folder_route() {
    let drive = setup();
    let client = provisioned(&drive, EntityType::Individual).await;
    let kyc = drive.folder_at(&client.id, &["KYC"]);

    let response = app(&drive, staff_of(&client))
        .oneshot(json_request(
            Method::POST,
            "/folders",
            json!({
                "name": "Aadhaar",
                "clientId": client.id.to_hex(),
                "parentFolderId": kyc.id.to_hex(),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let folder = read_json(response).await;
    assert_eq!(folder["category"], "KYC");
    assert_eq!(folder["parentFolderId"], json!(kyc.id.to_hex()));

    let response = app(&drive, staff_of(&client))
        .oneshot(json_request(
            Method::POST,
            "/folders",
            json!({ "name": "", "clientId": client.id.to_hex() }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_client_routes_are_staff_only() {
    let drive = setup();
    let client = provisioned(&drive, EntityType::Individual).await;
    let uri = format!("/clients/{}", client.id.to_hex());

    let as_client = AuthenticatedPrincipal::client(client.tenant_id, client.id);
    let response = app(&drive, as_client)
        .oneshot(empty_request(Method::DELETE, &uri))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(&drive, staff_of(&client))
        .oneshot(empty_request(Method::DELETE, &uri))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(read_json(response).await["folders"].as_u64().unwrap() > 0);
    assert!(drive.catalog.all_folders(&client.id).is_empty());
}

#[tokio::test]
async fn test_all_data_returns_active_tree_with_urls() {
    let drive = setup();
    let client = provisioned(&drive, EntityType::Individual).await;
    let client_hex = client.id.to_hex();

    let mut uploaded = Vec::new();
    for (category, file_name) in [("ITR", "computation.pdf"), ("KYC", "pan.pdf")] {
        let response = app(&drive, staff_of(&client))
            .oneshot(multipart_upload(
                &[("clientId", client_hex.as_str()), ("category", category)],
                file_name,
                b"%PDF-1.7",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        uploaded.push(read_json(response).await);
    }

    let bin = drive.state.recycle_bin_service();
    let pan_id = ObjectId::parse_str(uploaded[1]["id"].as_str().unwrap()).unwrap();
    bin.soft_delete(&client, ItemKind::Document, &pan_id, "staff@practice")
        .await
        .unwrap();
    let current = current_fiscal_year(&drive.state.config.today());
    let bank = drive.folder_at(&client.id, &[current.as_str(), "Income Tax", "Bank statement"]);
    bin.soft_delete(&client, ItemKind::Folder, &bank.id, "staff@practice")
        .await
        .unwrap();

    let as_client = AuthenticatedPrincipal::client(client.tenant_id, client.id);
    let response = app(&drive, as_client)
        .oneshot(empty_request(
            Method::GET,
            &format!("/clients/{}/all-data", client_hex),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    // 3 years x (root + Income Tax + Bank statement) + KYC, minus the binned folder
    assert_eq!(body["folders"].as_array().unwrap().len(), 9);
    let documents = body["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["fileName"], "computation.pdf");
    assert!(documents[0]["fileUrl"]
        .as_str()
        .unwrap()
        .starts_with("http://localhost:9000/ca-"));
}

#[tokio::test]
async fn test_all_data_of_other_client_is_not_found() {
    let drive = setup();
    let owner = provisioned(&drive, EntityType::Individual).await;
    let intruder = provisioned(&drive, EntityType::Individual).await;

    let as_intruder = AuthenticatedPrincipal::client(intruder.tenant_id, intruder.id);
    let response = app(&drive, as_intruder)
        .oneshot(empty_request(
            Method::GET,
            &format!("/clients/{}/all-data", owner.id.to_hex()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
