//! JSON-RPC 2.0 control surface: the method table in [`methods`] is
//! transport-agnostic, [`protocol`] defines the wire shapes, and
//! [`server`] frames them over a Unix or TCP socket per the `rpc.bind`
//! config string.

pub mod methods;
pub mod protocol;
pub mod server;

pub use methods::Context;
pub use protocol::{RpcError, RpcNotification, RpcRequest, RpcResponse};
pub use server::{BindAddr, PendingCalls, Server};

#[cfg(test)]
mod tests {
    use super::*;
    use media::{MediaCatalog, MemoryCatalog};
    use player::Player;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    fn test_ctx() -> Context {
        let catalog: Arc<dyn MediaCatalog> = Arc::new(MemoryCatalog::default());
        let player = Arc::new(Player::new(catalog.clone(), "file:///tmp/pmoplayer-rpc-test.pcm"));
        Context { player, catalog }
    }

    #[tokio::test]
    async fn round_trips_a_request_over_a_unix_socket() {
        let dir = tempfile::tempdir().unwrap();
        let sock_path = dir.path().join("rpc.sock");

        let events = Arc::new(pipeline::EventBus::new());
        let server = Arc::new(Server::new(test_ctx(), events));
        let listener = UnixListener::bind(&sock_path).unwrap();

        let accept_server = server.clone();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (rd, wr) = stream.into_split();
            accept_server.spawn_connection(rd, wr);
        });

        let mut client = tokio::net::UnixStream::connect(&sock_path).await.unwrap();
        let request = RpcRequest {
            jsonrpc: "2.0".into(),
            id: Some(json!(1)),
            method: "status".into(),
            params: json!({}),
        };
        let mut bytes = serde_json::to_vec(&request).unwrap();
        bytes.push(0);
        client.write_all(&bytes).await.unwrap();

        let mut buf = vec![0u8; 4096];
        let n = client.read(&mut buf).await.unwrap();
        let frame = &buf[..n.saturating_sub(1)];
        let response: RpcResponse = serde_json::from_slice(frame).unwrap();
        assert_eq!(response.id, json!(1));
        assert!(response.error.is_none());
        assert_eq!(response.result.unwrap()["state"], "stop");
    }

    #[test]
    fn bind_addr_parses_unix_and_tcp_forms() {
        assert!(matches!(BindAddr::parse("unix:/tmp/x.sock"), Some(BindAddr::Unix(p)) if p == "/tmp/x.sock"));
        assert!(matches!(BindAddr::parse("tcp:0.0.0.0:4242"), Some(BindAddr::Tcp(a)) if a == "0.0.0.0:4242"));
        assert!(BindAddr::parse("garbage").is_none());
    }
}
