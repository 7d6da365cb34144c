//! HTTP backend tests against a local mock server
//!
//! Tests:
//! - Bearer token is sent and created ids are decoded
//! - 401/403 map to Unauthorized, other 4xx to Rejected with the server detail
//! - Mutations are sent exactly once, even on 5xx
//! - Reads are retried on 5xx
//! - Multipart upload returns the stored path, which may be absent
//! - Login success and refusal
//! - Invoices, dashboard figures and the SEPA remittance document

use mockito::{Matcher, Server};
use std::time::Duration;

use enerdesk::backend::{NewClient, Role};
use enerdesk::{BackendError, CrmBackend, EntityId, HttpBackend, SessionContext};

fn backend(url: &str) -> HttpBackend {
    HttpBackend::new(
        url,
        SessionContext::new("secret-token", Role::Sales),
        Duration::from_secs(2),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn client() -> NewClient {
    NewClient {
        name: "ACME SL".to_string(),
        tax_id: "B12345678".to_string(),
        contact_person: None,
        email: Some("admin@acme.test".to_string()),
        phone: None,
        bank_account: None,
    }
}

#[tokio::test]
async fn test_create_client_sends_bearer_and_decodes_id() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/clientes/")
        .match_header("authorization", "Bearer secret-token")
        .match_body(Matcher::PartialJsonString(
            r#"{"nombre":"ACME SL","nif_cif":"B12345678"}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 41, "nombre": "ACME SL"}"#)
        .expect(1)
        .create_async()
        .await;

    let created = backend(&server.url()).create_client(&client()).await.unwrap();

    assert_eq!(created.id, EntityId::Numeric(41));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized_response() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/clientes/")
        .with_status(401)
        .with_body(r#"{"detail":"Not authenticated"}"#)
        .create_async()
        .await;

    let err = backend(&server.url()).list_clients().await.unwrap_err();

    assert!(matches!(err, BackendError::Unauthorized(_)));
}

#[tokio::test]
async fn test_validation_rejection_carries_detail() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/clientes/")
        .with_status(422)
        .with_header("content-type", "application/json")
        .with_body(r#"{"detail":"NIF/CIF ya registrado"}"#)
        .create_async()
        .await;

    let err = backend(&server.url()).create_client(&client()).await.unwrap_err();

    match err {
        BackendError::Rejected { status, detail } => {
            assert_eq!(status, 422);
            assert!(detail.contains("ya registrado"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_mutation_is_not_retried_on_server_error() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/clientes/")
        .with_status(500)
        .with_body("Internal Server Error")
        .expect(1)
        .create_async()
        .await;

    let err = backend(&server.url()).create_client(&client()).await.unwrap_err();

    assert!(matches!(err, BackendError::ServerError { status: 500, .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_read_is_retried_on_server_error() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/procesos-atr/")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let err = backend(&server.url())
        .list_switching_requests()
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::ServerError { status: 503, .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_upload_is_multipart_and_returns_stored_path() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/upload/")
        .match_header("content-type", Matcher::Regex("^multipart/form-data".to_string()))
        .match_body(Matcher::Regex("filename=\"dni.pdf\"".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"url":"uploads/2025/dni.pdf"}"#)
        .expect(1)
        .create_async()
        .await;

    let stored = backend(&server.url())
        .upload_file("dni.pdf", b"%PDF-1.4")
        .await
        .unwrap();

    assert_eq!(stored.stored_path.as_deref(), Some("uploads/2025/dni.pdf"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_upload_without_url_is_accepted() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/upload/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"filename":"dni.pdf"}"#)
        .expect(1)
        .create_async()
        .await;

    let stored = backend(&server.url())
        .upload_file("dni.pdf", b"%PDF-1.4")
        .await
        .unwrap();

    assert_eq!(stored.stored_path, None);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_listing_decodes_rows() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/renovaciones/pendientes")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"id":3,"cliente":"Bar Pepe","telefono":"600000000","cups":"ES0021000000000000AB",
                "comercializadora":"Endesa","fecha_fin":"2025-04-30","dias_restantes":12}]"#,
        )
        .create_async()
        .await;

    let alerts = backend(&server.url()).list_pending_renewals().await.unwrap();

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].client, "Bar Pepe");
    assert_eq!(alerts[0].days_remaining, 12);
}

#[tokio::test]
async fn test_login_returns_session() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/login")
        .match_body(Matcher::PartialJsonString(
            r#"{"email":"ana@example.com"}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"abc123","token_type":"bearer","role":"backoffice"}"#)
        .create_async()
        .await;

    let session = backend(&server.url())
        .login("ana@example.com", "hunter2")
        .await
        .unwrap();

    assert_eq!(session.token(), Some("abc123"));
    assert_eq!(session.role(), Role::BackOffice);
    assert_eq!(session.email(), Some("ana@example.com"));
}

#[tokio::test]
async fn test_login_bad_credentials_is_unauthorized() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/login")
        .with_status(400)
        .with_body(r#"{"detail":"Credenciales incorrectas"}"#)
        .create_async()
        .await;

    let err = backend(&server.url())
        .login("ana@example.com", "wrong")
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::Unauthorized(_)));
}

#[tokio::test]
async fn test_invoices_and_stats_decode() {
    let mut server = Server::new_async().await;
    let _invoices = server
        .mock("GET", "/facturas/")
        .match_header("authorization", "Bearer secret-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"id":7,"monto":120.5,"concepto":"Luz enero","cliente_id":2,"estado":"Pendiente","created_at":"2025-01-31T10:00:00"},
                {"id":8,"monto":60.0,"concepto":"Gas enero","cliente_id":2,"estado":"Pagada"}]"#,
        )
        .create_async()
        .await;
    let _stats = server
        .mock("GET", "/dashboard-stats/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"total_clientes":5,"activos":4,"inactivos":1,"nuevos_hoy":2,"total_facturas":2,"total_dinero":180.5}"#,
        )
        .create_async()
        .await;

    let backend = backend(&server.url());
    let invoices = backend.list_invoices().await.unwrap();
    let stats = backend.dashboard_stats().await.unwrap();

    assert_eq!(invoices.len(), 2);
    assert_eq!(invoices[0].id, EntityId::Numeric(7));
    assert!(invoices[0].is_pending());
    assert!(!invoices[1].is_pending());
    assert_eq!(stats.total_clients, 5);
    assert_eq!(stats.new_today, 2);
    assert!((stats.total_invoiced - 180.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_remittance_posts_id_list_and_returns_xml() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/facturas/generar-remesa")
        .match_header("authorization", "Bearer secret-token")
        .match_body(Matcher::JsonString("[7,9]".to_string()))
        .with_status(200)
        .with_header("content-type", "application/xml")
        .with_body("<?xml version=\"1.0\"?><Document><CstmrDrctDbtInitn/></Document>")
        .expect(1)
        .create_async()
        .await;

    let xml = backend(&server.url())
        .generate_sepa_remittance(&[EntityId::Numeric(7), EntityId::Numeric(9)])
        .await
        .unwrap();

    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("CstmrDrctDbtInitn"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_remittance_rejection_is_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/facturas/generar-remesa")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"detail":"No se han seleccionado facturas"}"#)
        .expect(1)
        .create_async()
        .await;

    let err = backend(&server.url())
        .generate_sepa_remittance(&[EntityId::Numeric(99)])
        .await
        .unwrap_err();

    match err {
        BackendError::Rejected { status, detail } => {
            assert_eq!(status, 400);
            assert!(detail.contains("No se han seleccionado facturas"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    mock.assert_async().await;
}
