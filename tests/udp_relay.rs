//! End-to-end tests over loopback UDP.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{json, Value};
use udp_chat::client::client::RequestConfig;
use udp_chat::client::{ChatSession, RelayClient, RelayTransport};
use udp_chat::common::connection::DatagramSocket;
use udp_chat::common::messages::{Delivery, Payload, Reply, Request, RequestFrame, UserId};
use udp_chat::relay::{RelayConfig, RelayService, RelayServer};

async fn start_relay() -> (SocketAddr, RelayService) {
    let server = RelayServer::bind(&RelayConfig::with_address("127.0.0.1:0"))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let service = server.service().clone();
    tokio::spawn(server.run());
    (addr, service)
}

fn quick_policy() -> RequestConfig {
    RequestConfig {
        timeout_ms: 500,
        max_attempts: 3,
        retry_backoff_ms: 20,
    }
}

async fn client_for(relay: SocketAddr) -> ChatSession<RelayClient> {
    let transport = RelayClient::connect_to("127.0.0.1:0", &relay.to_string(), quick_policy())
        .await
        .unwrap();
    ChatSession::new(transport)
}

/// Send a raw datagram to the relay and decode the JSON answer.
async fn raw_exchange(socket: &mut DatagramSocket, payload: &[u8]) -> Value {
    socket.send(payload).await.unwrap();
    let data = tokio::time::timeout(Duration::from_secs(2), socket.recv())
        .await
        .expect("relay did not answer")
        .unwrap();
    serde_json::from_slice(data).unwrap()
}

async fn raw_socket(relay: SocketAddr) -> DatagramSocket {
    let socket = DatagramSocket::bind("127.0.0.1:0").await.unwrap();
    socket.connect(relay).await.unwrap();
    socket
}

/// A socket standing in for the relay, plus a client pointed at it.
async fn scripted_relay() -> (DatagramSocket, RelayClient) {
    let fake = DatagramSocket::bind("127.0.0.1:0").await.unwrap();
    let relay = fake.local_addr().unwrap().to_string();
    let client = RelayClient::connect_to("127.0.0.1:0", &relay, quick_policy())
        .await
        .unwrap();
    (fake, client)
}

async fn next_request(fake: &mut DatagramSocket) -> (RequestFrame, SocketAddr) {
    let (data, from) = fake.recv_from().await.unwrap();
    (RequestFrame::from_bytes(&data).unwrap(), from)
}

#[tokio::test]
async fn two_clients_chat_through_the_relay() {
    let (relay, _) = start_relay().await;
    let mut alice = client_for(relay).await;
    let mut bob = client_for(relay).await;

    let alice_id = alice.resolve_self("alice").await.unwrap();
    let bob_id = bob.resolve_self("bob").await.unwrap();
    assert_ne!(alice_id, bob_id);

    assert_eq!(alice.refresh_peers("alice").await.unwrap(), vec!["bob"]);
    alice.send(alice_id, "bob", "hello").await.unwrap();
    alice.send(alice_id, "bob", "are you there?").await.unwrap();

    assert_eq!(bob.refresh_peers("bob").await.unwrap(), vec!["alice"]);
    let messages = bob.drain_all(bob_id).await.unwrap();
    let bodies: Vec<&str> = messages.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["hello", "are you there?"]);
    assert!(messages.iter().all(|m| m.sender == "alice"));

    assert!(bob.drain_all(bob_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn reconnecting_client_keeps_its_identity() {
    let (relay, _) = start_relay().await;

    let first = client_for(relay).await.resolve_self("alice").await.unwrap();
    let second = client_for(relay).await.resolve_self("alice").await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn wire_replies_match_the_legacy_shapes() {
    let (relay, _) = start_relay().await;
    let mut socket = raw_socket(relay).await;

    let created = raw_exchange(&mut socket, br#"{"action": "register", "username": "zed"}"#).await;
    assert!(created["value"].is_u64(), "{}", created);

    let taken = raw_exchange(&mut socket, br#"{"action": "register", "username": "zed"}"#).await;
    assert_eq!(taken, json!({"status_msg": "User already exists"}));

    let listing = raw_exchange(&mut socket, br#"{"action": "get_user_list"}"#).await;
    assert_eq!(listing, json!(["zed"]));

    let id = created["value"].as_u64().unwrap();
    let empty = raw_exchange(
        &mut socket,
        format!(r#"{{"action": "get", "user_id": {}}}"#, id).as_bytes(),
    )
    .await;
    assert_eq!(empty, json!({"status_msg": "no messages"}));

    let unknown =
        raw_exchange(&mut socket, br#"{"action": "get_user_id", "username": "nonexistent"}"#).await;
    assert_eq!(unknown["status"], "error");
    assert!(unknown.get("value").is_none());
}

#[tokio::test]
async fn malformed_datagrams_get_an_error_reply() {
    let (relay, service) = start_relay().await;
    let mut socket = raw_socket(relay).await;

    let garbage = raw_exchange(&mut socket, b"this is not json").await;
    assert_eq!(garbage["status"], "error");
    assert!(garbage["status_msg"]
        .as_str()
        .unwrap()
        .starts_with("json could not be parsed"));

    let missing = raw_exchange(&mut socket, br#"{"action": "send", "user_id": 1}"#).await;
    assert_eq!(missing["status"], "error");

    assert_eq!(service.metrics().snapshot().errors, 2);
}

#[tokio::test]
async fn retransmitted_send_is_queued_once() {
    let (relay, service) = start_relay().await;
    let mut socket = raw_socket(relay).await;

    let a = raw_exchange(&mut socket, br#"{"action": "register", "username": "a"}"#).await;
    let b = raw_exchange(&mut socket, br#"{"action": "register", "username": "b"}"#).await;
    let (a, b) = (a["value"].as_u64().unwrap(), b["value"].as_u64().unwrap());

    let send = format!(
        r#"{{"action": "send", "user_id": {}, "target_user_id": {}, "message": "once", "request_id": 77}}"#,
        a, b
    );
    let first = raw_exchange(&mut socket, send.as_bytes()).await;
    let retry = raw_exchange(&mut socket, send.as_bytes()).await;
    assert_eq!(first, retry);
    assert_eq!(first["request_id"], 77);

    let stats = service.metrics().snapshot();
    assert_eq!(stats.messages_queued, 1);
    assert_eq!(stats.replays, 1);

    let get = format!(r#"{{"action": "get", "user_id": {}}}"#, b);
    let popped = raw_exchange(&mut socket, get.as_bytes()).await;
    assert_eq!(popped["value"]["message"], "once");
    let drained = raw_exchange(&mut socket, get.as_bytes()).await;
    assert_eq!(drained, json!({"status_msg": "no messages"}));
}

#[tokio::test]
async fn retransmitted_register_replays_the_created_identity() {
    let (relay, _) = start_relay().await;
    let mut socket = raw_socket(relay).await;

    let register = br#"{"action": "register", "username": "eve", "request_id": 5}"#;
    let first = raw_exchange(&mut socket, register).await;
    let retry = raw_exchange(&mut socket, register).await;

    assert!(first["value"].is_u64());
    assert_eq!(first, retry);
}

#[tokio::test]
async fn retransmitted_get_replays_the_popped_message() {
    let (relay, service) = start_relay().await;
    let mut socket = raw_socket(relay).await;

    let a = raw_exchange(&mut socket, br#"{"action": "register", "username": "a"}"#).await;
    let b = raw_exchange(&mut socket, br#"{"action": "register", "username": "b"}"#).await;
    let (a, b) = (a["value"].as_u64().unwrap(), b["value"].as_u64().unwrap());
    for body in ["m1", "m2"] {
        let send = format!(
            r#"{{"action": "send", "user_id": {}, "target_user_id": {}, "message": "{}"}}"#,
            a, b, body
        );
        raw_exchange(&mut socket, send.as_bytes()).await;
    }

    let get = format!(r#"{{"action": "get", "user_id": {}, "request_id": 9}}"#, b);
    let first = raw_exchange(&mut socket, get.as_bytes()).await;
    let retry = raw_exchange(&mut socket, get.as_bytes()).await;
    assert_eq!(first["value"]["message"], "m1");
    assert_eq!(first["request_id"], 9);
    assert_eq!(first, retry);

    let next = format!(r#"{{"action": "get", "user_id": {}, "request_id": 10}}"#, b);
    let second = raw_exchange(&mut socket, next.as_bytes()).await;
    assert_eq!(second["value"]["message"], "m2");

    let stats = service.metrics().snapshot();
    assert_eq!(stats.messages_delivered, 2);
    assert_eq!(stats.replays, 1);
}

#[tokio::test]
async fn lost_reply_is_recovered_by_retransmission() {
    let (mut fake, mut client) = scripted_relay().await;

    let relay = tokio::spawn(async move {
        // The first datagram is dropped without an answer.
        let (first, _) = next_request(&mut fake).await;
        let (retry, from) = next_request(&mut fake).await;
        assert_eq!(first, retry);

        let reply = json!({"value": "ok", "request_id": retry.request_id.unwrap()});
        fake.send_to(reply.to_string().as_bytes(), from).await.unwrap();
    });

    let reply = client
        .request(Request::Send {
            user_id: UserId(1),
            target_user_id: UserId(2),
            message: "hello".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(reply, Reply::Success(Payload::Ack("ok".to_string())));
    relay.await.unwrap();
}

#[tokio::test]
async fn reply_to_an_abandoned_request_is_skipped() {
    let (mut fake, mut client) = scripted_relay().await;

    let relay = tokio::spawn(async move {
        let (frame, from) = next_request(&mut fake).await;
        let id = frame.request_id.unwrap();

        let stale = json!({"value": 99, "request_id": id.wrapping_add(1)});
        fake.send_to(stale.to_string().as_bytes(), from).await.unwrap();
        let current = json!({"value": 3, "request_id": id});
        fake.send_to(current.to_string().as_bytes(), from).await.unwrap();
    });

    let reply = client
        .request(Request::GetUserId {
            username: "carol".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(reply, Reply::Success(Payload::Identity(UserId(3))));
    relay.await.unwrap();
}

#[tokio::test]
async fn late_listing_is_not_taken_as_a_get_reply() {
    let (mut fake, mut client) = scripted_relay().await;

    let relay = tokio::spawn(async move {
        let (frame, from) = next_request(&mut fake).await;
        let id = frame.request_id.unwrap();

        // Answer to an earlier get_user_list; listings carry no request_id.
        fake.send_to(br#"["bob"]"#, from).await.unwrap();
        let current = json!({"value": {"sender_id": 1, "message": "hi"}, "request_id": id});
        fake.send_to(current.to_string().as_bytes(), from).await.unwrap();
    });

    let reply = client.request(Request::Get { user_id: UserId(2) }).await.unwrap();
    assert_eq!(
        reply,
        Reply::Success(Payload::Delivery(Delivery {
            sender_id: UserId(1),
            message: "hi".to_string(),
        }))
    );
    relay.await.unwrap();
}

#[tokio::test]
async fn listing_still_answers_get_user_list() {
    let (mut fake, mut client) = scripted_relay().await;

    let relay = tokio::spawn(async move {
        let (_, from) = next_request(&mut fake).await;
        fake.send_to(br#"["alice","bob"]"#, from).await.unwrap();
    });

    let reply = client.request(Request::GetUserList).await.unwrap();
    assert_eq!(
        reply,
        Reply::Listing(vec!["alice".to_string(), "bob".to_string()])
    );
    relay.await.unwrap();
}
