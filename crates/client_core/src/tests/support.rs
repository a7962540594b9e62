use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use url::Url;

/// Serves `app` on an ephemeral local port and returns its base url.
pub(crate) async fn spawn_server(app: Router) -> Result<Url> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(Url::parse(&format!("http://{addr}/"))?)
}

/// A base url nothing is listening on.
pub(crate) async fn closed_server_url() -> Result<Url> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(Url::parse(&format!("http://{addr}/"))?)
}
