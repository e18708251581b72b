//! Client against a local WebSocket backend

use std::net::TcpListener as StdListener;
use std::thread;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use openems::{ClientSettings, Error, OpenEmsClient};

/// Start a backend on an ephemeral port and return its ws:// url
fn spawn_backend() -> String {
    let listener = StdListener::bind("127.0.0.1:0").expect("bind");
    listener.set_nonblocking(true).expect("nonblocking");
    let url = format!("ws://{}", listener.local_addr().expect("addr"));

    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("server runtime");
        runtime.block_on(async move {
            let listener = TcpListener::from_std(listener).expect("listener");
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream));
            }
        });
    });
    url
}

async fn serve(stream: TcpStream) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };
    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let request: Value = serde_json::from_str(&text).expect("request json");

        // unsolicited traffic the client has to skip
        let notification = json!({
            "jsonrpc": "2.0",
            "method": "edgeConfig",
            "params": { "edgeId": "edge0" }
        });
        if ws.send(Message::Text(notification.to_string())).await.is_err() {
            return;
        }

        let reply = match answer(&request) {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }),
            Err((code, message)) => json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": { "code": code, "message": message }
            }),
        };
        if ws.send(Message::Text(reply.to_string())).await.is_err() {
            return;
        }
    }
}

fn answer(request: &Value) -> Result<Value, (i64, &'static str)> {
    let params = &request["params"];
    match request["method"].as_str().unwrap_or_default() {
        "authenticateWithPassword" if params["password"] == "secret" => {
            Ok(json!({ "token": "abc", "user": { "id": "admin" } }))
        }
        "authenticateWithPassword" => Err((1003, "Authentication failed")),
        "getEdges" => Ok(json!({
            "edges": [
                { "id": "edge0", "comment": "Office", "isOnline": true },
                { "id": "edge1", "comment": "Plant", "isOnline": false }
            ]
        })),
        "edgeRpc" => {
            let payload = &params["payload"];
            match payload["method"].as_str().unwrap_or_default() {
                "getEdgeConfig" => Ok(json!({
                    "payload": {
                        "jsonrpc": "2.0",
                        "id": payload["id"],
                        "result": {
                            "components": {
                                "meter0": { "factoryId": "Meter.Socomec.Threephase" },
                                "ess0": { "factoryId": "Ess.Generic.ManagedSymmetric" }
                            }
                        }
                    }
                })),
                _ => Err((-32601, "Method not found")),
            }
        }
        _ => Err((-32601, "Method not found")),
    }
}

#[test]
fn test_round_trip_over_websocket() {
    let url = spawn_backend();
    let client = OpenEmsClient::new(ClientSettings::new(url, "admin", "secret")).expect("client");

    let edges = client.get_edges().expect("edges");
    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0].id, "edge0");
    assert_eq!(edges[1].is_online, Some(false));

    let meters = client.get_meter_list("edge0").expect("meters");
    assert_eq!(meters.keys().collect::<Vec<_>>(), vec!["meter0"]);
    client.close();
}

#[test]
fn test_rejected_password_over_websocket() {
    let url = spawn_backend();
    let client = OpenEmsClient::new(ClientSettings::new(url, "admin", "nope")).expect("client");

    match client.login() {
        Err(Error::Api { code, message }) => {
            assert_eq!(code, 1003);
            assert_eq!(message, "1003: Authentication failed");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_websocket_client_inside_runtime() {
    let url = spawn_backend();
    let client = OpenEmsClient::new(ClientSettings::new(url, "admin", "secret")).expect("client");

    assert_eq!(client.get_edges().expect("edges").len(), 2);
    assert!(client.get_edge_config("edge0").expect("config").components.contains_key("ess0"));
}

#[test]
fn test_unreachable_server_is_transport_error() {
    let port = {
        let probe = StdListener::bind("127.0.0.1:0").expect("bind");
        probe.local_addr().expect("addr").port()
    };
    let settings = ClientSettings::new(format!("ws://127.0.0.1:{port}"), "admin", "secret");
    let client = OpenEmsClient::new(settings).expect("client");

    assert!(matches!(client.get_edges(), Err(Error::Transport(_))));
}
