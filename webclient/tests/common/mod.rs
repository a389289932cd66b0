use axum::Router;
use passupd_webclient::Url;

/// Serve `app` on an ephemeral local port. Returns its base url.
pub async fn serve(app: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    Url::parse(&format!("http://{}/", addr)).unwrap()
}
