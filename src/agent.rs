//! High-level entry point tying configuration, options and transport together.

use std::sync::Arc;

use crate::config::AgentConfig;
use crate::options::AgentOptions;
use crate::protocol::Message;
use crate::query::QueryResult;
use crate::transport::{MessageStream, ProcessTransport, TransportError};

/// Runs queries against the Claude Code CLI using configured defaults.
///
/// Clones made with [`ClaudeAgent::with_options`] share the same transport,
/// so only one of them can run at a time and [`ClaudeAgent::stop`] on any of
/// them interrupts the shared process.
#[derive(Debug, Clone)]
pub struct ClaudeAgent {
    config: Arc<AgentConfig>,
    transport: Arc<ProcessTransport>,
    default_options: Option<AgentOptions>,
}

impl ClaudeAgent {
    /// Build an agent from configuration, locating the CLI if needed.
    #[must_use]
    pub fn new(config: AgentConfig) -> Self {
        let transport = ProcessTransport::from_config(&config);
        Self::with_transport(config, transport)
    }

    /// Build an agent around an existing transport.
    #[must_use]
    pub fn with_transport(config: AgentConfig, transport: ProcessTransport) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            default_options: None,
        }
    }

    /// A copy that uses `options` whenever a query passes none.
    #[must_use]
    pub fn with_options(&self, options: AgentOptions) -> Self {
        Self {
            default_options: Some(options),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    #[must_use]
    pub fn transport(&self) -> &ProcessTransport {
        &self.transport
    }

    /// A fresh options builder pre-filled from configuration.
    #[must_use]
    pub fn options(&self) -> AgentOptions {
        self.fill_defaults(AgentOptions::new())
    }

    /// The options a query will actually run with.
    #[must_use]
    pub fn resolve(&self, options: Option<AgentOptions>) -> AgentOptions {
        match options.or_else(|| self.default_options.clone()) {
            Some(options) => self.fill_defaults(options),
            None => self.options(),
        }
    }

    /// Run a query to completion.
    ///
    /// # Errors
    ///
    /// Propagates any [`TransportError`] from the run.
    pub async fn query(
        &self,
        prompt: &str,
        options: Option<AgentOptions>,
    ) -> Result<QueryResult, TransportError> {
        let options = self.resolve(options);
        let messages = self.transport.run(prompt, &options).await?;
        Ok(QueryResult::new(messages))
    }

    /// Run a query and stream its messages.
    ///
    /// # Errors
    ///
    /// Returns spawn failures and `Busy` directly; later failures arrive
    /// through the stream.
    pub fn stream(
        &self,
        prompt: &str,
        options: Option<AgentOptions>,
    ) -> Result<MessageStream, TransportError> {
        let options = self.resolve(options);
        self.transport.stream(prompt, &options)
    }

    /// Stream a query, calling `on_message` for each message, and return
    /// the collected result.
    ///
    /// # Errors
    ///
    /// Returns the first error the stream produces. Messages delivered
    /// before it have already been passed to `on_message`.
    pub async fn stream_collect<F>(
        &self,
        prompt: &str,
        mut on_message: F,
        options: Option<AgentOptions>,
    ) -> Result<QueryResult, TransportError>
    where
        F: FnMut(&Message),
    {
        let mut stream = self.stream(prompt, options)?;
        let mut messages = Vec::new();
        while let Some(item) = stream.next_message().await {
            let message = item?;
            on_message(&message);
            messages.push(message);
        }
        Ok(QueryResult::new(messages))
    }

    /// Interrupt the running query, if any.
    pub fn stop(&self) {
        self.transport.stop();
    }

    /// Fill fields the caller left empty from configuration.
    fn fill_defaults(&self, mut options: AgentOptions) -> AgentOptions {
        let config = &self.config;

        if options.model.is_none() {
            options.model.clone_from(&config.model);
        }
        if options.permission_mode.is_none() && !config.permission_mode.is_empty() {
            options.permission_mode = Some(config.permission_mode.clone());
        }
        if options.cwd.is_none() {
            options.cwd.clone_from(&config.cwd);
        }
        if options.allowed_tools.is_empty() {
            options.allowed_tools.clone_from(&config.allowed_tools);
        }
        if options.max_turns.unwrap_or(0) == 0 {
            options.max_turns = config.max_turns.or(options.max_turns);
        }
        options
    }
}
