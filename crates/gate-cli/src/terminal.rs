//! Line-oriented console shared by the review prompt and the arbiter.

use std::sync::Arc;

use async_trait::async_trait;
use gate_pipeline::{Arbiter, ArbiterError, ArbitrationRequest, Label};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::debug;

type LineReader = Lines<Box<dyn AsyncBufRead + Unpin + Send>>;
type Writer = Box<dyn AsyncWrite + Unpin + Send>;

/// One input stream and one output stream, each behind its own lock.
pub struct Console {
    input: Mutex<LineReader>,
    output: Mutex<Writer>,
}

impl Console {
    pub fn new<R, W>(input: R, output: W) -> Arc<Self>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let input: Box<dyn AsyncBufRead + Unpin + Send> = Box::new(input);
        Arc::new(Self {
            input: Mutex::new(input.lines()),
            output: Mutex::new(Box::new(output)),
        })
    }

    pub fn stdio() -> Arc<Self> {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }

    /// Next line without its terminator; `None` at end of input.
    pub async fn read_line(&self) -> std::io::Result<Option<String>> {
        self.input.lock().await.next_line().await
    }

    pub async fn write(&self, text: &str) -> std::io::Result<()> {
        let mut output = self.output.lock().await;
        output.write_all(text.as_bytes()).await?;
        output.flush().await
    }

    pub async fn write_line(&self, text: &str) -> std::io::Result<()> {
        self.write(&format!("{text}\n")).await
    }
}

/// Asks the person at the terminal to settle a disagreement.
pub struct TerminalArbiter {
    console: Arc<Console>,
}

impl TerminalArbiter {
    pub fn new(console: Arc<Console>) -> Self {
        Self { console }
    }
}

#[async_trait]
impl Arbiter for TerminalArbiter {
    async fn request_arbitration(
        &self,
        request: &ArbitrationRequest,
    ) -> Result<String, ArbiterError> {
        let io = |e: std::io::Error| ArbiterError::Io(e.to_string());

        self.console.write(&request.prompt()).await.map_err(io)?;
        let answer = self
            .console
            .read_line()
            .await
            .map_err(io)?
            .ok_or(ArbiterError::Closed)?;
        debug!(request_id = %request.request_id, answer = %answer.trim(), "Arbiter answered");

        if Label::parse_answer(&answer).is_none() {
            self.console
                .write_line("Invalid input. Keeping backup model prediction.")
                .await
                .map_err(io)?;
        }
        Ok(answer)
    }
}
