// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct Recorded {
    line: String,
    body: serde_json::Value,
}

/// Loopback server answering each connection with the next canned response
async fn serve(responses: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<Recorded>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&recorded);
    tokio::spawn(async move {
        for (status, body) in responses {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let mut content_length = 0usize;
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).await.unwrap();
                if header == "\r\n" || header.is_empty() {
                    break;
                }
                if let Some(v) = header.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
            }
            let mut buf = vec![0u8; content_length];
            reader.read_exact(&mut buf).await.unwrap();
            let body_json = serde_json::from_slice(&buf).unwrap_or(serde_json::Value::Null);
            log.lock().push(Recorded { line: line.trim().to_string(), body: body_json });

            let response = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        }
    });
    (format!("http://{}", addr), recorded)
}

fn session(id: &str) -> SandboxSession {
    SandboxSession {
        id: id.into(),
        provider: "remote".into(),
        endpoint: None,
        work_dir: None,
        created_at_ms: 0,
    }
}

#[tokio::test]
async fn create_posts_template_and_reads_sandbox_id() {
    let (url, recorded) =
        serve(vec![(200, r#"{"sandboxId":"sb-1","url":"https://sb-1.example","provider":"e2b"}"#)])
            .await;
    let sandbox = RemoteSandbox::new(url).unwrap();

    let session = sandbox.create(&JobId::new(), 0).await.unwrap();

    assert_eq!(session.id, "sb-1");
    assert_eq!(session.provider, "e2b");
    assert_eq!(session.endpoint.as_deref(), Some("https://sb-1.example"));
    let req = recorded.lock()[0].clone();
    assert_eq!(req.line, "POST /api/create-ai-sandbox-v2 HTTP/1.1");
    assert_eq!(req.body["template"], "maven-jdk17");
}

#[tokio::test]
async fn create_without_id_is_protocol_error() {
    let (url, _) = serve(vec![(200, r#"{"success":false,"error":"quota"}"#)]).await;
    let err = RemoteSandbox::new(url).unwrap().create(&JobId::new(), 0).await.unwrap_err();
    assert!(matches!(err, SandboxError::Protocol(ref m) if m.contains("quota")), "{err}");
}

#[tokio::test]
async fn write_files_prefixes_workdir() {
    let (url, recorded) = serve(vec![(200, r#"{"success":true}"#)]).await;
    let sandbox = RemoteSandbox::new(url).unwrap();
    sandbox
        .write_files(&session("sb-1"), &[Artifact::new("src/A.java", "class A {}")])
        .await
        .unwrap();

    let req = recorded.lock()[0].clone();
    assert_eq!(req.body["sandboxId"], "sb-1");
    assert_eq!(req.body["files"][0]["path"], "/home/user/app/src/A.java");
    assert_eq!(req.body["files"][0]["content"], "class A {}");
}

#[tokio::test]
async fn exec_maps_exit_code_and_streams() {
    let (url, recorded) =
        serve(vec![(200, r#"{"exitCode":1,"stdout":"[ERROR] boom","stderr":"warn"}"#)]).await;
    let sandbox = RemoteSandbox::new(url).unwrap();

    let out = sandbox.exec(&session("sb-1"), "mvn compile", Duration::from_secs(60)).await.unwrap();

    assert_eq!(out.exit_code, 1);
    assert_eq!(out.stdout, "[ERROR] boom");
    assert_eq!(out.stderr, "warn");
    let req = recorded.lock()[0].clone();
    assert_eq!(req.body["command"], "cd /home/user/app && mvn compile");
    assert_eq!(req.body["timeout"], 60);
}

#[tokio::test]
async fn exec_falls_back_to_return_code_line() {
    let (url, _) = serve(vec![(200, r#"{"output":"BUILD FAILURE\nReturn code: 2\n"}"#)]).await;
    let out = RemoteSandbox::new(url)
        .unwrap()
        .exec(&session("sb-1"), "mvn compile", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(out.exit_code, 2);
    assert!(out.stdout.contains("BUILD FAILURE"));
}

#[tokio::test]
async fn http_error_status_is_reported() {
    let (url, _) = serve(vec![(500, r#"{"error":"no active sandbox"}"#)]).await;
    let err = RemoteSandbox::new(url)
        .unwrap()
        .exec(&session("sb-1"), "ls", Duration::from_secs(5))
        .await
        .unwrap_err();
    match err {
        SandboxError::Status { status, body, .. } => {
            assert_eq!(status, 500);
            assert!(body.contains("no active sandbox"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn is_alive_checks_active_session_id() {
    let (url, _) = serve(vec![
        (200, r#"{"active":true,"healthy":true,"sandboxData":{"sandboxId":"sb-1"}}"#),
        (200, r#"{"active":true,"healthy":true,"sandboxData":{"sandboxId":"sb-2"}}"#),
        (200, r#"{"active":false}"#),
    ])
    .await;
    let sandbox = RemoteSandbox::new(url).unwrap();
    assert!(sandbox.is_alive(&session("sb-1")).await);
    assert!(!sandbox.is_alive(&session("sb-1")).await);
    assert!(!sandbox.is_alive(&session("sb-1")).await);
}

#[tokio::test]
async fn unreachable_service_is_request_error() {
    let sandbox = RemoteSandbox::new("http://127.0.0.1:1").unwrap();
    let err = sandbox.destroy(&session("sb-1")).await.unwrap_err();
    assert!(err.to_string().starts_with("i/o error on POST request"), "{err}");
}

#[test]
fn parse_return_code_reads_line() {
    assert_eq!(parse_return_code("a\nReturn code: 17\nb"), Some(17));
    assert_eq!(parse_return_code("no code here"), None);
}
