//! Direct form login against a mock course platform.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use homework_harvest::login::{password_digest, DirectFormLogin};
use homework_harvest::{CaptchaSolver, Credentials, HarvestConfig, HarvestError, HarvestResult, NoopSolver};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ─────────────────────── helpers ───────────────────────

/// Solver returning a fixed answer and remembering what it was shown.
struct ScriptedSolver {
    answer: &'static str,
    seen: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedSolver {
    fn new(answer: &'static str) -> Arc<Self> {
        Arc::new(Self {
            answer,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CaptchaSolver for ScriptedSolver {
    async fn solve(&self, image: &[u8]) -> HarvestResult<String> {
        self.seen.lock().unwrap().push(image.to_vec());
        Ok(self.answer.to_string())
    }
}

fn config_for(server: &MockServer) -> HarvestConfig {
    HarvestConfig {
        base_url: format!("{}/ve", server.uri()),
        ..Default::default()
    }
}

async fn mount_entry_and_captcha(server: &MockServer, set_cookie: bool) {
    let entry = if set_cookie {
        ResponseTemplate::new(200)
            .insert_header("set-cookie", "JSESSIONID=abc123; Path=/")
            .set_body_string("<html>login</html>")
    } else {
        ResponseTemplate::new(200).set_body_string("<html>login</html>")
    };
    Mock::given(method("GET"))
        .and(path("/ve/"))
        .respond_with(entry)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ve/GetImg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG-captcha".to_vec()))
        .mount(server)
        .await;
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn test_login_posts_form_and_collects_cookies() {
    let server = MockServer::start().await;
    mount_entry_and_captcha(&server, true).await;

    let creds = Credentials::new("21301001", "");
    let digest = password_digest(&creds);

    Mock::given(method("POST"))
        .and(path("/ve/s.shtml"))
        .and(body_string_contains("login=main_2"))
        .and(body_string_contains("username=21301001"))
        .and(body_string_contains(format!("password={digest}")))
        .and(body_string_contains("passcode=471"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "route=r7; Path=/")
                .set_body_string("<html>welcome</html>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let solver = ScriptedSolver::new(" 4 7-1\n");
    let login = DirectFormLogin::new(&config_for(&server), solver.clone()).unwrap();
    let session = login.login(&creds).await.unwrap();

    assert_eq!(session.cookie("JSESSIONID"), Some("abc123"));
    assert_eq!(session.cookie("route"), Some("r7"));
    assert_eq!(solver.seen.lock().unwrap().as_slice(), &[b"\x89PNG-captcha".to_vec()]);
}

#[tokio::test]
async fn test_alert_marker_is_authentication_error_despite_200() {
    let server = MockServer::start().await;
    mount_entry_and_captcha(&server, true).await;

    Mock::given(method("POST"))
        .and(path("/ve/s.shtml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<script>alert('验证码错误');history.back();</script>"),
        )
        .mount(&server)
        .await;

    let login = DirectFormLogin::new(&config_for(&server), ScriptedSolver::new("1234")).unwrap();
    let err = login
        .login(&Credentials::new("21301001", "hunter2"))
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Authentication(_)), "got {err:?}");
}

#[tokio::test]
async fn test_error_status_is_authentication_error() {
    let server = MockServer::start().await;
    mount_entry_and_captcha(&server, true).await;

    Mock::given(method("POST"))
        .and(path("/ve/s.shtml"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let login = DirectFormLogin::new(&config_for(&server), ScriptedSolver::new("1234")).unwrap();
    let err = login
        .login(&Credentials::new("21301001", "hunter2"))
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Authentication(_)));
}

#[tokio::test]
async fn test_no_cookie_issued_is_authentication_error() {
    let server = MockServer::start().await;
    mount_entry_and_captcha(&server, false).await;

    Mock::given(method("POST"))
        .and(path("/ve/s.shtml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let login = DirectFormLogin::new(&config_for(&server), ScriptedSolver::new("1234")).unwrap();
    let err = login
        .login(&Credentials::new("21301001", "hunter2"))
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Authentication(_)));
}

#[tokio::test]
async fn test_solver_failure_submits_empty_passcode() {
    let server = MockServer::start().await;
    mount_entry_and_captcha(&server, true).await;

    Mock::given(method("POST"))
        .and(path("/ve/s.shtml"))
        .and(body_string_contains("passcode="))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let login = DirectFormLogin::new(&config_for(&server), Arc::new(NoopSolver)).unwrap();
    let session = login
        .login(&Credentials::new("21301001", "hunter2"))
        .await
        .unwrap();
    assert_eq!(session.cookie("JSESSIONID"), Some("abc123"));

    let requests = server.received_requests().await.unwrap();
    let post = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .expect("form was posted");
    let body = String::from_utf8_lossy(&post.body);
    assert!(body.ends_with("passcode="), "body was {body}");
}

#[tokio::test]
async fn test_empty_student_id_rejected_without_traffic() {
    let server = MockServer::start().await;

    let login = DirectFormLogin::new(&config_for(&server), Arc::new(NoopSolver)).unwrap();
    let err = login.login(&Credentials::new("  ", "pw")).await.unwrap_err();

    assert!(matches!(err, HarvestError::InvalidArgument(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

/// Serve the login flow over raw TCP, cutting the form response short.
///
/// The submit reply declares a longer body than it sends, then hangs up.
async fn spawn_truncating_upstream() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut pending = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    // Read one request: headers, then the declared body.
                    let head_end = loop {
                        if let Some(pos) = pending.windows(4).position(|w| w == b"\r\n\r\n") {
                            break pos + 4;
                        }
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => pending.extend_from_slice(&buf[..n]),
                        }
                    };
                    let head = String::from_utf8_lossy(&pending[..head_end]).to_string();
                    let body_len = head
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    while pending.len() < head_end + body_len {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => pending.extend_from_slice(&buf[..n]),
                        }
                    }
                    pending.drain(..head_end + body_len);

                    if head.starts_with("POST") {
                        let partial = "<script>alert('wrong password');";
                        let reply = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 500\r\n\r\n{partial}"
                        );
                        let _ = stream.write_all(reply.as_bytes()).await;
                        let _ = stream.shutdown().await;
                        return;
                    }

                    let body = "ok";
                    let reply = format!(
                        "HTTP/1.1 200 OK\r\nSet-Cookie: JSESSIONID=abc123; Path=/\r\nContent-Length: {}\r\n\r\n{body}",
                        body.len()
                    );
                    if stream.write_all(reply.as_bytes()).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn test_truncated_form_response_is_not_success() {
    let uri = spawn_truncating_upstream().await;
    let config = HarvestConfig {
        base_url: format!("{uri}/ve"),
        ..Default::default()
    };

    let login = DirectFormLogin::new(&config, Arc::new(NoopSolver)).unwrap();
    let result = login.login(&Credentials::new("21301001", "pw")).await;

    assert!(
        matches!(result, Err(HarvestError::Upstream { .. })),
        "unreadable login response must not yield a session: {result:?}"
    );
}
