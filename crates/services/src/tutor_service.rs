use std::env;

use learn_core::model::ChatMessage;
use learn_core::model::chat::subject_label;
use learn_core::{StreamDecoder, StreamEnd, Utf8Decoder};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::TutorError;

const EVENT_BUFFER: usize = 32;

#[derive(Clone, Debug)]
pub struct TutorConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl TutorConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("LEARN_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("LEARN_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("LEARN_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Something that happened on a tutor stream, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TutorEvent {
    /// Next fragment of the answer.
    Delta(String),
    /// The answer is complete. No events follow.
    Finished(TutorReply),
}

/// Full answer text and how the stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutorReply {
    pub text: String,
    pub end: StreamEnd,
}

/// Receiving side of one streamed answer. Dropping it cancels the request.
#[derive(Debug)]
pub struct TutorStream {
    rx: mpsc::Receiver<Result<TutorEvent, TutorError>>,
}

impl TutorStream {
    /// Next event, or `None` after `Finished` or a terminal error.
    pub async fn next(&mut self) -> Option<Result<TutorEvent, TutorError>> {
        self.rx.recv().await
    }

    /// Drain the stream and return the finished answer.
    ///
    /// # Errors
    ///
    /// Returns the first transport error, or `Interrupted` if the stream
    /// stops without finishing. Partial text is discarded either way.
    pub async fn into_reply(mut self) -> Result<TutorReply, TutorError> {
        while let Some(event) = self.next().await {
            if let TutorEvent::Finished(reply) = event? {
                return Ok(reply);
            }
        }
        Err(TutorError::Interrupted)
    }
}

/// Streams answers from an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct TutorService {
    client: Client,
    config: Option<TutorConfig>,
}

impl TutorService {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(TutorConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<TutorConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Ask a question about `subject`, continuing `history`.
    ///
    /// The request is sent before this returns; answer text then arrives on
    /// the returned stream.
    ///
    /// # Errors
    ///
    /// Returns `Disabled` without configuration, `EmptyQuestion` for a blank
    /// question, `Remote`/`HttpStatus` for non-success responses, and `Http`
    /// if the request cannot be sent.
    pub async fn ask(
        &self,
        subject: &str,
        history: &[ChatMessage],
        question: &str,
    ) -> Result<TutorStream, TutorError> {
        let config = self.config.as_ref().ok_or(TutorError::Disabled)?;
        let question = question.trim();
        if question.is_empty() {
            return Err(TutorError::EmptyQuestion);
        }

        let url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt(subject)));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(question));
        let payload = ChatRequest {
            model: &config.model,
            messages: &messages,
            stream: true,
        };

        debug!(model = %config.model, subject, turns = messages.len(), "sending tutor request");
        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(remote_error(status, response).await);
        }

        Ok(spawn_decoder(response))
    }
}

fn system_prompt(subject: &str) -> String {
    format!(
        "You are a patient tutor for {}. Explain concepts step by step, \
         use short examples, and keep answers focused on the question.",
        subject_label(subject)
    )
}

async fn remote_error(status: StatusCode, response: Response) -> TutorError {
    let body: Option<Value> = response.json().await.ok();
    let message = body.as_ref().and_then(|b| {
        let error = b.get("error")?;
        error
            .as_str()
            .or_else(|| error.get("message").and_then(Value::as_str))
            .map(str::to_owned)
    });
    match message {
        Some(message) => TutorError::Remote { status, message },
        None => TutorError::HttpStatus(status),
    }
}

fn spawn_decoder(mut response: Response) -> TutorStream {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    tokio::spawn(async move {
        let mut bytes = Utf8Decoder::new();
        let mut decoder = StreamDecoder::new();

        while !decoder.is_done() {
            let next = tokio::select! {
                () = tx.closed() => {
                    debug!("tutor stream receiver dropped");
                    return;
                }
                next = response.chunk() => next,
            };
            let text = match next {
                Ok(Some(chunk)) => bytes.decode(&chunk),
                Ok(None) => {
                    let tail = bytes.finish();
                    for delta in decoder.feed(&tail) {
                        if tx.send(Ok(TutorEvent::Delta(delta.0))).await.is_err() {
                            return;
                        }
                    }
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "tutor stream failed");
                    let _ = tx.send(Err(TutorError::Http(e))).await;
                    return;
                }
            };
            for delta in decoder.feed(&text) {
                if tx.send(Ok(TutorEvent::Delta(delta.0))).await.is_err() {
                    debug!("tutor stream receiver dropped");
                    return;
                }
            }
        }

        let completion = decoder.finish();
        if completion.leftover_bytes > 0 {
            warn!(
                leftover_bytes = completion.leftover_bytes,
                "tutor stream ended with an unparsed record"
            );
        }
        let text = decoder.accumulated_text().to_owned();
        info!(chars = text.chars().count(), end = ?completion.end, "tutor answer finished");
        let _ = tx
            .send(Ok(TutorEvent::Finished(TutorReply {
                text,
                end: completion.end,
            })))
            .await;
    });

    TutorStream { rx }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}
