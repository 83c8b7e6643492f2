use reef_core::{handler, App, Config, Error, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Reply {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn parse_reply(raw: &str) -> Reply {
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .unwrap()
        .split(' ')
        .nth(1)
        .unwrap()
        .parse()
        .unwrap();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    Reply {
        status,
        headers,
        body: body.to_string(),
    }
}

async fn send(addr: std::net::SocketAddr, request: &str) -> Reply {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    parse_reply(&String::from_utf8(raw).unwrap())
}

async fn start() -> (Arc<App>, std::net::SocketAddr, tokio::task::JoinHandle<reef_core::Result<()>>) {
    let mut router = Router::new();
    router.get(
        "/greet",
        [handler(|ctx| {
            let name = ctx.query("name").unwrap_or("stranger").to_string();
            let _ = ctx.string(format!("Hello {name}"), None);
        })],
    );
    router.get(
        "/users/:id",
        [handler(|ctx| {
            let id = ctx.param("id").unwrap_or_default().to_string();
            let _ = ctx.json(&serde_json::json!({ "id": id }), None);
        })],
    );
    router.post(
        "/echo",
        [handler(|ctx| {
            let body = ctx.post().to_string();
            let _ = ctx.string(body, Some(201));
        })],
    );
    router.get(
        "/café",
        [handler(|ctx| {
            let _ = ctx.string("bienvenue", None);
        })],
    );
    router.post(
        "/upload",
        [handler(|ctx| {
            let reply = match ctx.file("doc") {
                Ok(Some(file)) => format!(
                    "{} {} {}",
                    ctx.post_form("owner").unwrap_or_default(),
                    file.file_name,
                    file.len()
                ),
                Ok(None) => "no file".to_string(),
                Err(e) => e.to_string(),
            };
            let _ = ctx.string(reply, None);
        })],
    );
    router.get(
        "/slow",
        [handler(|ctx| {
            std::thread::sleep(Duration::from_millis(300));
            let _ = ctx.string("done", None);
        })],
    );

    let mut app = App::new(Config::new().hostname("127.0.0.1"));
    app.routes(router);
    let app = Arc::new(app);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(Arc::clone(&app).serve(listener));

    (app, addr, server)
}

/// Wait until a connection is open and its request is being handled
async fn wait_for_request(app: &App) {
    while app.active_connections() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_greet_over_socket() {
    let (app, addr, server) = start().await;

    let reply = send(
        addr,
        "GET /greet?name=world HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("content-type"), Some("text/plain"));
    assert_eq!(reply.body, "Hello world");

    app.shutdown(Duration::from_secs(5)).await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_not_found_and_path_variables() {
    let (app, addr, server) = start().await;

    let reply = send(
        addr,
        "GET /nowhere HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.body, "Not Found");

    let reply = send(
        addr,
        "GET /users/7 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("content-type"), Some("application/json"));
    assert_eq!(reply.body, r#"{"id":"7"}"#);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_percent_encoded_paths() {
    let (app, addr, server) = start().await;

    let reply = send(
        addr,
        "GET /users/john%20doe HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, r#"{"id":"john doe"}"#);

    let reply = send(
        addr,
        "GET /caf%C3%A9 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "bienvenue");

    app.shutdown(Duration::from_secs(5)).await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_multipart_upload() {
    let (app, addr, server) = start().await;

    let body = "--b0undary\r\n\
Content-Disposition: form-data; name=\"owner\"\r\n\
\r\n\
ada\r\n\
--b0undary\r\n\
Content-Disposition: form-data; name=\"doc\"; filename=\"notes.txt\"\r\n\
Content-Type: text/plain\r\n\
\r\n\
first line\r\n\
--b0undary--\r\n";
    let request = format!(
        "POST /upload HTTP/1.1\r\nHost: localhost\r\n\
Content-Type: multipart/form-data; boundary=b0undary\r\n\
Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );

    let reply = send(addr, &request).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "ada notes.txt 10");

    app.shutdown(Duration::from_secs(5)).await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_post_body() {
    let (app, addr, server) = start().await;

    let reply = send(
        addr,
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
    )
    .await;
    assert_eq!(reply.status, 201);
    assert_eq!(reply.body, "hello");

    app.shutdown(Duration::from_secs(5)).await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_request() {
    let (app, addr, server) = start().await;

    let request = tokio::spawn(send(
        addr,
        "GET /slow HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    ));

    wait_for_request(&app).await;

    app.shutdown(Duration::from_secs(5)).await.unwrap();
    server.await.unwrap().unwrap();

    let reply = request.await.unwrap();
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "done");

    // the listener is gone
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_shutdown_deadline() {
    let (app, addr, server) = start().await;

    let request = tokio::spawn(send(
        addr,
        "GET /slow HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    ));
    wait_for_request(&app).await;

    let err = app.shutdown(Duration::from_millis(20)).await.unwrap_err();
    assert!(matches!(err, Error::ShutdownTimeout { remaining: 1 }));

    server.await.unwrap().unwrap();
    let reply = request.await.unwrap();
    assert_eq!(reply.body, "done");
}
