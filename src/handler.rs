//! Per-connection request handling.
//!
//! A connection carries exactly one request: read a line, parse it, apply
//! it to the tally, log it if it was acted upon, write the response, close.

use crate::error::ConnectionError;
use crate::protocol::{Request, RequestKind, Response, MAX_LINE_LENGTH};
use crate::request_log::RequestLog;
use crate::store::VoteStore;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::{debug, trace, warn};

/// Everything a worker needs to serve one connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    store: Arc<VoteStore>,
    log: RequestLog,
    read_timeout: Option<Duration>,
}

impl ConnectionHandler {
    /// `read_timeout` of `None` waits for the request line indefinitely;
    /// a silent peer then holds its worker until it disconnects.
    pub fn new(store: Arc<VoteStore>, log: RequestLog, read_timeout: Option<Duration>) -> Self {
        Self {
            store,
            log,
            read_timeout,
        }
    }

    pub fn store(&self) -> &Arc<VoteStore> {
        &self.store
    }

    /// Serve one connection and close it.
    ///
    /// The stream is shut down on every path, including I/O failures. A
    /// failed shutdown is only a warning.
    pub async fn handle<S>(&self, stream: S, peer: SocketAddr) -> Result<Response, ConnectionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut stream = BufReader::new(stream);
        let result = self.serve(&mut stream, peer.ip()).await;

        if let Err(e) = stream.shutdown().await {
            warn!(peer = %peer, error = %e, "Failed to close client connection");
        }
        trace!(peer = %peer, "Connection closed");

        result
    }

    async fn serve<S>(&self, stream: &mut S, peer: IpAddr) -> Result<Response, ConnectionError>
    where
        S: AsyncBufRead + AsyncWrite + Unpin,
    {
        let line = self.read_request(stream).await?;

        let response = match Request::parse(&line) {
            Ok(request) => self.execute(request, peer).await,
            Err(e) => {
                debug!(peer = %peer, error = ?e, "Malformed request");
                Response::Malformed(e)
            }
        };

        stream.write_all(&response.encode()).await?;
        stream.flush().await?;
        Ok(response)
    }

    /// Read one request line, capped at `MAX_LINE_LENGTH` bytes.
    /// A peer that closes without sending anything yields an empty line.
    /// Bytes that are not valid UTF-8 become U+FFFD and are parsed like
    /// any other text.
    async fn read_request<R>(&self, reader: &mut R) -> Result<String, ConnectionError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = Vec::new();
        let mut limited = (&mut *reader).take(MAX_LINE_LENGTH as u64);
        let read = limited.read_until(b'\n', &mut line);

        match self.read_timeout {
            Some(limit) => {
                tokio::time::timeout(limit, read)
                    .await
                    .map_err(|_| ConnectionError::ReadTimeout)??;
            }
            None => {
                read.await?;
            }
        }

        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Apply a parsed request to the tally. Only requests that were acted
    /// upon reach the request log.
    async fn execute(&self, request: Request, peer: IpAddr) -> Response {
        let kind = request.kind();
        let response = match request {
            Request::List => Response::Tally(self.store.snapshot()),
            Request::Vote { option } => match self.store.increment(&option) {
                Ok(count) => {
                    debug!(peer = %peer, option = %option, count, "Vote counted");
                    Response::Voted { option }
                }
                Err(e) => {
                    debug!(peer = %peer, error = %e, "Vote rejected");
                    Response::Rejected(e)
                }
            },
        };

        if !response.is_error() {
            self.log.append(peer, kind).await;
        }
        response
    }
}

/// Label used when reporting a finished connection.
pub(crate) fn outcome(response: &Response) -> Option<RequestKind> {
    match response {
        Response::Tally(_) => Some(RequestKind::List),
        Response::Voted { .. } => Some(RequestKind::Vote),
        Response::Rejected(_) | Response::Malformed(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseError, StoreError};
    use std::net::Ipv4Addr;
    use std::path::PathBuf;
    use tokio_test::{assert_err, assert_ok};

    fn peer() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)), 40000)
    }

    fn handler(name: &str, read_timeout: Option<Duration>) -> (ConnectionHandler, PathBuf) {
        let path = std::env::temp_dir().join(format!(
            "tally-handler-{}-{}.log",
            name,
            std::process::id()
        ));
        let store = VoteStore::new(["A", "B"].map(String::from)).unwrap();
        let log = RequestLog::create(&path).unwrap();
        (
            ConnectionHandler::new(Arc::new(store), log, read_timeout),
            path,
        )
    }

    /// Send `request` over an in-memory stream and collect what comes back.
    async fn exchange(handler: &ConnectionHandler, request: &[u8]) -> (Response, String) {
        let (mut client, server) = tokio::io::duplex(request.len() + 4096);
        client.write_all(request).await.unwrap();
        client.shutdown().await.unwrap();

        let response = assert_ok!(handler.handle(server, peer()).await);
        let mut received = String::new();
        client.read_to_string(&mut received).await.unwrap();
        (response, received)
    }

    fn log_lines(path: &PathBuf) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[tokio::test]
    async fn test_vote_then_list() {
        let (handler, path) = handler("vote-list", None);

        let (response, text) = exchange(&handler, b"vote A\n").await;
        assert_eq!(response, Response::Voted { option: "A".into() });
        assert_eq!(text, "Incremented the number of votes for 'A'.\n");

        let (_, text) = exchange(&handler, b"LIST\r\n").await;
        assert_eq!(text, "'A' has 1 vote(s).\n'B' has 0 vote(s).\n\n");

        let lines = log_lines(&path);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("|10.1.2.3|vote"));
        assert!(lines[1].ends_with("|10.1.2.3|list"));

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_unknown_option_not_logged() {
        let (handler, path) = handler("unknown", None);

        let (response, text) = exchange(&handler, b"vote C\n").await;
        assert_eq!(
            response,
            Response::Rejected(StoreError::UnknownOption("C".into()))
        );
        assert_eq!(text, "Error: Option 'C' does not exist.\n");
        assert_eq!(handler.store().total(), 0);
        assert!(log_lines(&path).is_empty());

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_malformed_requests_not_logged() {
        let (handler, path) = handler("malformed", None);

        let (response, text) = exchange(&handler, b"\n").await;
        assert_eq!(response, Response::Malformed(ParseError::EmptyRequest));
        assert_eq!(text, "Error: Received empty request.\n");

        let (_, text) = exchange(&handler, b"vote\n").await;
        assert_eq!(text, "Error: Missing voting option. Usage: vote <option>\n");

        let (_, text) = exchange(&handler, b"hello world\n").await;
        assert_eq!(
            text,
            "Error: Invalid command. Please use 'list' or 'vote <option>'.\n"
        );

        assert!(log_lines(&path).is_empty());
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_peer_closes_without_request() {
        let (handler, path) = handler("eof", None);

        let (response, text) = exchange(&handler, b"").await;
        assert_eq!(response, Response::Malformed(ParseError::EmptyRequest));
        assert_eq!(text, "Error: Received empty request.\n");
        assert!(log_lines(&path).is_empty());

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_only_first_line_is_served() {
        let (handler, path) = handler("first-line", None);

        let (_, text) = exchange(&handler, b"vote B extra\nvote A\n").await;
        assert_eq!(text, "Incremented the number of votes for 'B'.\n");
        assert_eq!(
            handler.store().snapshot(),
            vec![("A".to_string(), 0), ("B".to_string(), 1)]
        );

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_invalid_utf8_gets_error_response() {
        let (handler, path) = handler("invalid-utf8", None);

        let (response, text) = exchange(&handler, b"vote \xff\xfe\n").await;
        assert_eq!(
            response,
            Response::Rejected(StoreError::UnknownOption("\u{FFFD}\u{FFFD}".into()))
        );
        assert_eq!(text, "Error: Option '\u{FFFD}\u{FFFD}' does not exist.\n");

        let (response, text) = exchange(&handler, b"\xc3list\n").await;
        assert_eq!(response, Response::Malformed(ParseError::UnknownCommand));
        assert!(text.starts_with("Error: "));

        assert_eq!(handler.store().total(), 0);
        assert!(log_lines(&path).is_empty());
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_long_line_is_truncated_and_parsed() {
        let (handler, path) = handler("long-line", None);

        let mut request = b"vote A".to_vec();
        request.extend(std::iter::repeat(b' ').take(20_000));
        request.push(b'\n');
        assert!(request.len() > MAX_LINE_LENGTH);

        let (response, text) = exchange(&handler, &request).await;
        assert_eq!(response, Response::Voted { option: "A".into() });
        assert_eq!(text, "Incremented the number of votes for 'A'.\n");

        // A multi-byte character split by the cap still parses
        let mut request = b"vote B".to_vec();
        request.extend(std::iter::repeat(b' ').take(MAX_LINE_LENGTH - 7));
        request.extend_from_slice("\u{e9}\n".as_bytes());
        let (response, _) = exchange(&handler, &request).await;
        assert_eq!(response, Response::Voted { option: "B".into() });

        assert_eq!(
            handler.store().snapshot(),
            vec![("A".to_string(), 1), ("B".to_string(), 1)]
        );
        assert_eq!(log_lines(&path).len(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let (handler, path) = handler("timeout", Some(Duration::from_millis(50)));
        let (mut client, server) = tokio::io::duplex(64);

        let result = handler.handle(server, peer()).await;
        assert!(matches!(assert_err!(result), ConnectionError::ReadTimeout));

        // Connection was closed without a response
        let mut received = String::new();
        client.read_to_string(&mut received).await.unwrap();
        assert!(received.is_empty());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_outcome() {
        assert_eq!(outcome(&Response::Tally(vec![])), Some(RequestKind::List));
        assert_eq!(
            outcome(&Response::Voted { option: "A".into() }),
            Some(RequestKind::Vote)
        );
        assert_eq!(
            outcome(&Response::Malformed(ParseError::UnknownCommand)),
            None
        );
    }
}
