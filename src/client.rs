//! Client side of the voting protocol.
//!
//! Sends one request line, then copies every response line to the given
//! writer until the server closes the connection.

use crate::error::ClientError;
use crate::protocol::Request;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{lookup_host, TcpStream};
use tracing::debug;

/// Command-line arguments for the voting client
#[derive(Parser, Debug)]
#[command(name = "tally-client")]
#[command(version = "0.1.0")]
#[command(about = "Query or vote on a tally server", long_about = None)]
pub struct ClientArgs {
    /// Server to contact, as host:port
    #[arg(short, long, default_value = "localhost:7777")]
    pub server: String,

    #[command(subcommand)]
    pub command: ClientCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Show every option and its vote count
    List,
    /// Cast one vote for an option
    Vote {
        /// Option to vote for
        option: String,

        /// Anything after the option is ignored
        #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
        extra: Vec<String>,
    },
}

impl ClientArgs {
    /// Parse arguments, accepting the command word in any letter case.
    pub fn parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut args: Vec<String> = args.into_iter().map(Into::into).collect();
        let mut i = 1;
        while i < args.len() {
            let arg = args[i].as_str();
            if arg == "-s" || arg == "--server" {
                i += 2;
            } else if arg.starts_with('-') {
                i += 1;
            } else {
                if arg.eq_ignore_ascii_case("list") || arg.eq_ignore_ascii_case("vote") {
                    args[i] = arg.to_ascii_lowercase();
                }
                break;
            }
        }
        Self::try_parse_from(args)
    }
}

impl From<ClientCommand> for Request {
    fn from(command: ClientCommand) -> Self {
        match command {
            ClientCommand::List => Request::List,
            ClientCommand::Vote { option, .. } => Request::Vote { option },
        }
    }
}

/// Send `request` to `server` and write the response lines to `out`.
pub async fn run<W>(server: &str, request: Request, out: &mut W) -> Result<(), ClientError>
where
    W: AsyncWrite + Unpin,
{
    let stream = connect(server).await?;
    let (reader, mut writer) = stream.into_split();

    writer.write_all(&request.encode()).await?;
    writer.shutdown().await?;

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
    }
    out.flush().await?;
    Ok(())
}

async fn connect(server: &str) -> Result<TcpStream, ClientError> {
    let addrs: Vec<_> = lookup_host(server)
        .await
        .map_err(|source| ClientError::UnknownHost {
            host: server.to_string(),
            source,
        })?
        .collect();

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                debug!(server = %addr, "Connected");
                return Ok(stream);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(match last_error {
        Some(source) => ClientError::Connect {
            server: server.to_string(),
            source,
        },
        None => ClientError::UnknownHost {
            host: server.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"),
        },
    })
}
