use pretty_assertions::assert_eq;
use purelink_bridge::cloud::client::Idle;
use purelink_bridge::cloud::{
    AuthFlow, AuthProgress, ChallengeState, CloudAuthClient, CloudError, CloudSettings,
};
use purelink_bridge::persistence::{credentials, KeyValueStore, MemoryStore};
use purelink_bridge::protocol::ProductFamily;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EMAIL: &str = "owner@example.com";
const PASSWORD: &str = "account-password";
const OTP: &str = "123456";

// Manifest envelopes for the broker passwords "local-1" and "local-2".
const LOCAL_1: &str = "esaxhcTtnXJoLo8I3tT8NMVx7rbVlBca5JllGhAE1u+DgN4Gd1Uu4wb7yxyjtwUx";
const LOCAL_2: &str = "esaxhcTtnXJoLo8I3tT8NMVx7rbVlBca5JllGhAE1u8Hu0N+5mjIzKlyGFPfJ/5a";

fn settings(server: &MockServer) -> CloudSettings {
    let mut settings = CloudSettings::new(EMAIL, "NL");
    settings.base_url = Some(server.uri());
    settings
}

fn password() -> SecretString {
    SecretString::from(PASSWORD)
}

async fn mount_user_status(server: &MockServer, status: &str) {
    Mock::given(method("POST"))
        .and(path("/v3/userregistration/email/userstatus"))
        .and(query_param("country", "NL"))
        .and(header("user-agent", "android client"))
        .and(body_json(json!({ "email": EMAIL })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accountStatus": status })))
        .mount(server)
        .await;
}

async fn mount_request_otp(server: &MockServer, challenge_id: &str) {
    Mock::given(method("POST"))
        .and(path("/v3/userregistration/email/auth"))
        .and(query_param("country", "NL"))
        .and(query_param("culture", "en-US"))
        .and(body_json(json!({ "email": EMAIL })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "challengeId": challenge_id })),
        )
        .mount(server)
        .await;
}

async fn mount_verify(server: &MockServer, challenge_id: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v3/userregistration/email/verify"))
        .and(body_json(json!({
            "email": EMAIL,
            "password": PASSWORD,
            "challengeId": challenge_id,
            "otpCode": OTP
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "account": "account-1",
            "token": "session-token",
            "tokenType": "Bearer"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_manifest(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/v2/provisioningservice/manifest"))
        .and(header("authorization", "Bearer session-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn two_devices() -> serde_json::Value {
    json!([
        {
            "Serial": "AB1-EU-HAA0000A",
            "Name": "Living Room",
            "Version": "21.03.08",
            "LocalCredentials": LOCAL_1,
            "AutoUpdate": true,
            "ProductType": "475"
        },
        {
            "Serial": "NN2-EU-HEA0000B",
            "Name": "Bedroom",
            "Version": "0.0.1",
            "LocalCredentials": LOCAL_2,
            "AutoUpdate": false,
            "ProductType": "438"
        }
    ])
}

#[tokio::test]
async fn client_walks_through_every_login_step() {
    let server = MockServer::start().await;
    mount_user_status(&server, "ACTIVE").await;
    mount_request_otp(&server, "challenge-1").await;
    mount_verify(&server, "challenge-1", 1).await;
    mount_manifest(&server, two_devices()).await;

    let client = CloudAuthClient::<Idle>::create(&settings(&server)).unwrap();
    let (client, challenge) = client.request_otp().await.unwrap();
    assert_eq!(challenge.challenge_id, "challenge-1");

    let verified = client.verify(challenge, OTP, &password()).await.unwrap();
    let session = verified.session().unwrap();
    assert_eq!(session.account, "account-1");
    assert_eq!(session.token.expose_secret(), "session-token");

    let devices = verified.fetch_devices().await.unwrap().into_devices();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].name, "Living Room");
    assert_eq!(devices[0].password.expose_secret(), "local-1");
    assert_eq!(devices[0].family(), ProductFamily::Link);
    assert_eq!(devices[1].base_topic(), "438/NN2-EU-HEA0000B");
    assert_eq!(devices[1].family(), ProductFamily::PowerControl);
}

#[tokio::test]
async fn inactive_account_stops_before_requesting_a_code() {
    let server = MockServer::start().await;
    mount_user_status(&server, "UNREGISTERED").await;
    Mock::given(method("POST"))
        .and(path("/v3/userregistration/email/auth"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = CloudAuthClient::<Idle>::create(&settings(&server))
        .unwrap()
        .request_otp()
        .await
        .unwrap_err();

    match err {
        CloudError::AccountNotActive { email, status } => {
            assert_eq!(email, EMAIL);
            assert_eq!(status, "UNREGISTERED");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn empty_manifest_means_no_devices() {
    let server = MockServer::start().await;
    mount_verify(&server, "challenge-1", 1).await;
    mount_manifest(&server, json!([])).await;

    let store = MemoryStore::new();
    credentials::save_challenge(&store, &ChallengeState::new("challenge-1"))
        .await
        .unwrap();
    let flow = AuthFlow::new(&store, settings(&server), password());

    assert!(matches!(
        flow.verify(OTP).await,
        Err(CloudError::NoDevicesFound)
    ));
    assert!(credentials::load_devices(&store).await.unwrap().is_empty());
}

#[tokio::test]
async fn login_spans_two_runs_and_then_uses_the_store() {
    let server = MockServer::start().await;
    mount_user_status(&server, "ACTIVE").await;
    mount_request_otp(&server, "challenge-7").await;
    mount_verify(&server, "challenge-7", 1).await;
    mount_manifest(&server, two_devices()).await;

    let store = MemoryStore::new();

    let first = AuthFlow::new(&store, settings(&server), password());
    assert!(matches!(
        first.run(None).await.unwrap(),
        AuthProgress::OtpRequested
    ));
    assert_eq!(
        store.get("challenge_id").await.unwrap().as_deref(),
        Some("challenge-7")
    );

    let second = AuthFlow::new(&store, settings(&server), password());
    let devices = match second.run(Some(OTP)).await.unwrap() {
        AuthProgress::Completed(devices) => devices,
        other => panic!("unexpected progress: {:?}", other),
    };
    assert_eq!(devices.len(), 2);
    assert_eq!(store.get("challenge_id").await.unwrap(), None);
    assert_eq!(
        store.get("Bedroom.serial").await.unwrap().as_deref(),
        Some("NN2-EU-HEA0000B")
    );

    // Third start: no cloud traffic, verify is still expected exactly once.
    let third = AuthFlow::new(&store, settings(&server), password());
    match third.run(Some(OTP)).await.unwrap() {
        AuthProgress::Completed(stored) => {
            let names: Vec<_> = stored.iter().map(|d| d.name.as_str()).collect();
            assert_eq!(names, vec!["Living Room", "Bedroom"]);
        }
        other => panic!("unexpected progress: {:?}", other),
    }
}

#[tokio::test]
async fn verify_before_request_is_an_invalid_challenge() {
    let server = MockServer::start().await;
    mount_verify(&server, "challenge-1", 0).await;

    let store = MemoryStore::new();
    let flow = AuthFlow::new(&store, settings(&server), password());

    assert!(matches!(
        flow.verify(OTP).await,
        Err(CloudError::InvalidChallenge(_))
    ));
}

#[tokio::test]
async fn challenge_cannot_be_verified_twice() {
    let server = MockServer::start().await;
    mount_user_status(&server, "ACTIVE").await;
    mount_request_otp(&server, "challenge-1").await;
    mount_verify(&server, "challenge-1", 1).await;
    mount_manifest(&server, two_devices()).await;

    let store = MemoryStore::new();
    let flow = AuthFlow::new(&store, settings(&server), password());
    flow.request_otp().await.unwrap();

    assert_eq!(flow.verify(OTP).await.unwrap().len(), 2);
    assert!(matches!(
        flow.verify(OTP).await,
        Err(CloudError::InvalidChallenge(_))
    ));
}

#[tokio::test]
async fn short_code_keeps_the_challenge() {
    let server = MockServer::start().await;
    mount_verify(&server, "challenge-1", 0).await;

    let store = MemoryStore::new();
    credentials::save_challenge(&store, &ChallengeState::new("challenge-1"))
        .await
        .unwrap();
    let flow = AuthFlow::new(&store, settings(&server), password());

    assert!(matches!(
        flow.run(None).await,
        Err(CloudError::MissingOtpCode)
    ));
    assert!(matches!(
        flow.run(Some("123")).await,
        Err(CloudError::MissingOtpCode)
    ));
    assert_eq!(
        store.get("challenge_id").await.unwrap().as_deref(),
        Some("challenge-1")
    );
}

#[tokio::test]
async fn rejected_code_consumes_the_challenge() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/userregistration/email/verify"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    credentials::save_challenge(&store, &ChallengeState::new("challenge-1"))
        .await
        .unwrap();
    let flow = AuthFlow::new(&store, settings(&server), password());

    assert!(matches!(
        flow.verify(OTP).await,
        Err(CloudError::InvalidChallenge(_))
    ));
    assert_eq!(store.get("challenge_id").await.unwrap(), None);
}

#[tokio::test]
async fn expired_challenge_is_reported_as_such() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/userregistration/email/verify"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"message":"Challenge has expired"}"#),
        )
        .mount(&server)
        .await;

    let client = CloudAuthClient::<Idle>::create(&settings(&server)).unwrap().resume();
    let err = client
        .verify(
            ChallengeState::new("old"),
            OTP,
            &password(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CloudError::ExpiredChallenge));
}

#[tokio::test]
async fn server_errors_keep_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/userregistration/email/userstatus"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = CloudAuthClient::<Idle>::create(&settings(&server))
        .unwrap()
        .request_otp()
        .await
        .unwrap_err();

    match err {
        CloudError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn undecryptable_local_credentials_fail_the_manifest() {
    let server = MockServer::start().await;
    mount_verify(&server, "challenge-1", 1).await;
    mount_manifest(
        &server,
        json!([{
            "Serial": "AB1-EU-HAA0000A",
            "Name": "Living Room",
            "LocalCredentials": "not-an-envelope",
            "ProductType": "475"
        }]),
    )
    .await;

    let store = MemoryStore::new();
    credentials::save_challenge(&store, &ChallengeState::new("challenge-1"))
        .await
        .unwrap();
    let flow = AuthFlow::new(&store, settings(&server), password());

    match flow.verify(OTP).await {
        Err(CloudError::InvalidLocalCredentials { serial, .. }) => {
            assert_eq!(serial, "AB1-EU-HAA0000A")
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(credentials::load_devices(&store).await.unwrap().is_empty());
}
