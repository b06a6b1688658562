use chrono::{Duration as ChronoDuration, Utc};
use edufin_api::config::ApiConfig;
use edufin_auth::{JwtClaims, Role};
use edufin_core::{TenantId, UserId};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod (in-memory store), bound to an ephemeral port.
        let app = edufin_api::app::build_app(&ApiConfig::in_memory(SECRET))
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(tenant: &str, user: &str, roles: &[&'static str]) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(user).unwrap(),
        tenant_id: TenantId::new(tenant).unwrap(),
        roles: roles.iter().map(|r| Role::new(*r)).collect(),
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn open_account(
    client: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    code: &str,
    name: &str,
    account_type: &str,
) -> String {
    let res = client
        .post(srv.url("/ledger/accounts"))
        .bearer_auth(token)
        .json(&json!({ "code": code, "name": name, "type": account_type, "category": "tuition" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

fn fee_payment(cash: &str, fees: &str, debit: &str, credit: &str) -> Value {
    json!({
        "date": "2024-09-02",
        "reference": "RCPT-0001",
        "memo": "Term 1 fees",
        "entries": [
            { "accountId": cash, "debit": debit, "credit": "0" },
            { "accountId": fees, "debit": "0", "credit": credit },
        ],
    })
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/audit/financial")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/audit/financial"))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn school_fee_payment_is_posted_audited_and_verified() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt("school-1", "bursar-1", &["bursar"]);

    let cash = open_account(&client, &srv, &token, "1000", "Cash", "asset").await;
    let fees = open_account(&client, &srv, &token, "4000", "Tuition Fees", "revenue").await;

    let res = client
        .post(srv.url("/ledger/journals"))
        .bearer_auth(&token)
        .json(&fee_payment(&cash, &fees, "500.00", "500.00"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let journal: Value = res.json().await.unwrap();
    assert_eq!(journal["tenantId"], "school-1");
    assert_eq!(journal["entries"].as_array().unwrap().len(), 2);
    let journal_id = journal["id"].as_str().unwrap().to_string();

    let res = client
        .get(srv.url(&format!("/ledger/journals/{journal_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url(&format!("/ledger/accounts/{cash}/balance")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["accountId"], cash.as_str());
    assert_eq!(body["balance"], "500");

    let res = client
        .get(srv.url("/audit/financial"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let trail: Value = res.json().await.unwrap();
    let items = trail["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["actionType"], "JOURNAL_POSTED");
    assert_eq!(items[0]["userId"], "bursar-1");
    assert!(items[0]["previousHash"].is_null());

    let res = client
        .get(srv.url("/audit/financial/verify"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report, json!({ "isValid": true, "errors": [] }));
}

#[tokio::test]
async fn unbalanced_journal_is_rejected_and_not_audited() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt("school-1", "bursar-1", &["bursar"]);

    let cash = open_account(&client, &srv, &token, "1000", "Cash", "asset").await;
    let fees = open_account(&client, &srv, &token, "4000", "Tuition Fees", "revenue").await;

    let res = client
        .post(srv.url("/ledger/journals"))
        .bearer_auth(&token)
        .json(&fee_payment(&cash, &fees, "500.00", "499.99"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unbalanced_journal");

    let res = client
        .get(srv.url(&format!("/ledger/accounts/{cash}/balance")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["balance"], "0");

    let res = client
        .get(srv.url("/audit/financial"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let trail: Value = res.json().await.unwrap();
    assert!(trail["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn amounts_finer_than_four_places_are_rejected_before_posting() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt("school-1", "bursar-1", &["bursar"]);

    let cash = open_account(&client, &srv, &token, "1000", "Cash", "asset").await;
    let fees = open_account(&client, &srv, &token, "4000", "Tuition Fees", "revenue").await;

    // Balanced at full precision, but not representable in storage.
    let res = client
        .post(srv.url("/ledger/journals"))
        .bearer_auth(&token)
        .json(&json!({
            "date": "2024-09-02",
            "reference": "RCPT-0002",
            "entries": [
                { "accountId": cash, "debit": "0.00005", "credit": "0" },
                { "accountId": cash, "debit": "0.00005", "credit": "0" },
                { "accountId": fees, "debit": "0", "credit": "0.0001" },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Amounts too large to total are refused the same way, without a panic.
    let res = client
        .post(srv.url("/ledger/journals"))
        .bearer_auth(&token)
        .json(&fee_payment(
            &cash,
            &fees,
            "50000000000000000000000000000",
            "50000000000000000000000000000",
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = client
        .get(srv.url(&format!("/ledger/accounts/{cash}/balance")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["balance"], "0");

    let res = client
        .get(srv.url("/audit/financial"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let trail: Value = res.json().await.unwrap();
    assert!(trail["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn tenants_cannot_see_each_others_ledgers() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let school_1 = mint_jwt("school-1", "bursar-1", &["bursar"]);
    let school_2 = mint_jwt("school-2", "bursar-2", &["bursar"]);

    let cash = open_account(&client, &srv, &school_1, "1000", "Cash", "asset").await;
    let fees = open_account(&client, &srv, &school_1, "4000", "Tuition Fees", "revenue").await;
    let res = client
        .post(srv.url("/ledger/journals"))
        .bearer_auth(&school_1)
        .json(&fee_payment(&cash, &fees, "120.00", "120.00"))
        .send()
        .await
        .unwrap();
    let journal: Value = res.json().await.unwrap();
    let journal_id = journal["id"].as_str().unwrap().to_string();

    let res = client
        .get(srv.url(&format!("/ledger/journals/{journal_id}")))
        .bearer_auth(&school_2)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(srv.url(&format!("/ledger/accounts/{cash}/balance")))
        .bearer_auth(&school_2)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["balance"], "0");

    // Posting against another tenant's accounts is refused outright.
    let res = client
        .post(srv.url("/ledger/journals"))
        .bearer_auth(&school_2)
        .json(&fee_payment(&cash, &fees, "1.00", "1.00"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(srv.url("/audit/financial"))
        .bearer_auth(&school_2)
        .send()
        .await
        .unwrap();
    let trail: Value = res.json().await.unwrap();
    assert!(trail["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn admin_actions_capture_request_metadata() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = mint_jwt("school-1", "admin-1", &["admin"]);

    let res = client
        .post(srv.url("/audit/admin"))
        .bearer_auth(&admin)
        .header("x-forwarded-for", "203.0.113.9")
        .header("user-agent", "edufin-tests/1.0")
        .json(&json!({ "action": "USER_ROLE_CHANGED", "details": { "userId": "u-7" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["ipAddress"], "203.0.113.9");
    assert_eq!(created["userAgent"], "edufin-tests/1.0");
    assert_eq!(created["tenantId"], "school-1");

    let res = client
        .get(srv.url("/audit/admin"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let trail: Value = res.json().await.unwrap();
    assert_eq!(trail["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn read_only_roles_cannot_write() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let auditor = mint_jwt("school-1", "auditor-1", &["auditor"]);

    let res = client
        .post(srv.url("/ledger/accounts"))
        .bearer_auth(&auditor)
        .json(&json!({ "code": "1000", "name": "Cash", "type": "asset", "category": "tuition" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(srv.url("/audit/admin"))
        .bearer_auth(&auditor)
        .json(&json!({ "action": "SETTINGS_CHANGED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(srv.url("/audit/financial/verify"))
        .bearer_auth(&auditor)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
