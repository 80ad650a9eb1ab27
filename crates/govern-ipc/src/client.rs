//! Child-side Sipc client
//!
//! A governed child dials the binding URI it was handed at launch,
//! identifies itself, then hands every received command line to a
//! dispatcher that can reach the live application container.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::{BindingUri, SipcResult, HELLO_WORD};

/// Sipc client for a governed child
pub struct SipcClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
    uri: BindingUri,
}

impl SipcClient {
    /// Connect to the governor and identify this child by port and app name
    pub async fn connect(uri: &BindingUri) -> SipcResult<Self> {
        let stream = TcpStream::connect((uri.host.as_str(), uri.port)).await?;
        let (read_half, write_half) = stream.into_split();

        let mut client = Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            uri: uri.clone(),
        };

        let hello = format!("{} {} {}\n", HELLO_WORD, uri.port, uri.app);
        client.writer.write_all(hello.as_bytes()).await?;

        info!(uri = %uri, "Connected to governor");

        Ok(client)
    }

    /// Send a line back to the governor (advisory; no acknowledgement)
    pub async fn send_line(&mut self, line: &str) -> SipcResult<()> {
        let mut msg = line.to_string();
        msg.push('\n');
        self.writer.write_all(msg.as_bytes()).await?;
        Ok(())
    }

    /// Receive commands until the connection closes, handing each to
    /// `dispatch`. The dispatcher reaches the live application container
    /// this child represents. Connection loss is expected and returns
    /// normally.
    pub async fn run(mut self, mut dispatch: impl FnMut(&str) + Send) {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line).await {
                Ok(0) => {
                    debug!(uri = %self.uri, "Governor closed the channel");
                    break;
                }
                Ok(_) => {
                    let command = line.trim();
                    if command.is_empty() {
                        continue;
                    }
                    debug!(uri = %self.uri, command = %command, "Command received");
                    dispatch(command);
                }
                Err(e) => {
                    warn!(uri = %self.uri, error = %e, "Channel read error");
                    break;
                }
            }
        }
    }
}
