//! Interactive shell: session selection menu, command parser and REPL

pub mod formatting;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::agent::{AgentBuilder, AgentCore};
use crate::config::AppConfig;
use crate::error::AgentError;
use crate::persistence::Persistence;
use crate::session::{SessionId, SessionManager, SessionSelection};
use crate::tools::ToolRegistry;

/// DataBot: a DATAPATH assistant with tools and persistent memory.
#[derive(Parser, Debug, Default)]
#[command(name = "databot", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Resume this session UUID instead of showing the session menu.
    #[arg(short = 's', long = "session", conflicts_with = "new")]
    pub session: Option<String>,

    /// Start a new session without showing the session menu.
    #[arg(long = "new")]
    pub new: bool,
}

impl CliArgs {
    /// Load configuration from --config or the usual locations, then apply env overrides
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load_from_file(path)?,
            None => AppConfig::load()?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

/// Words that end the conversation when typed on their own
pub const EXIT_KEYWORDS: [&str; 3] = ["salir", "exit", "quit"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    ConfigShow,
    SessionShow,
    SessionNew,
    SessionResume(String),
    SessionList,
    History(Option<usize>),
    Tools,
    Message(String),
    Empty,
}

pub fn parse_command(input: &str) -> Command {
    let line = input.trim();
    if line.is_empty() {
        return Command::Empty;
    }

    if EXIT_KEYWORDS
        .iter()
        .any(|keyword| line.eq_ignore_ascii_case(keyword))
    {
        return Command::Quit;
    }

    if let Some(rest) = line.strip_prefix('/') {
        let mut parts = rest.split_whitespace();
        let cmd = parts.next().unwrap_or("").to_lowercase();
        match cmd.as_str() {
            "help" | "h" | "?" => Command::Help,
            "quit" | "q" | "exit" | "salir" => Command::Quit,
            "config" => Command::ConfigShow,
            "session" => Command::SessionShow,
            "new" => Command::SessionNew,
            "resume" => match parts.next() {
                Some(id) => Command::SessionResume(id.to_string()),
                None => Command::Help,
            },
            "sessions" => Command::SessionList,
            "history" => {
                let n = parts.next().and_then(|s| s.parse::<usize>().ok());
                Command::History(n)
            }
            "tools" => Command::Tools,
            _ => Command::Help,
        }
    } else {
        Command::Message(line.to_string())
    }
}

async fn prompt_line<R, W>(reader: &mut R, writer: &mut W, prompt: &str) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(prompt.as_bytes()).await?;
    writer.flush().await?;
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Session selection menu: `1` starts a new session, `2` resumes a pasted UUID.
///
/// A malformed UUID never fails the interaction; a fresh session is minted.
pub async fn select_session<R, W>(
    reader: &mut R,
    writer: &mut W,
    sessions: &SessionManager,
) -> Result<SessionSelection>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(
            "\nOpciones de sesión:\n  1. Nueva conversación\n  2. Continuar sesión existente (pegar UUID)\n"
                .as_bytes(),
        )
        .await?;

    let choice = prompt_line(reader, writer, "\nElige (1/2): ").await?;
    if choice.as_deref() != Some("2") {
        return Ok(SessionSelection {
            id: sessions.new_session(),
            resumed: false,
            rejected: None,
        });
    }

    let candidate = prompt_line(reader, writer, "Pega el UUID de la sesión: ")
        .await?
        .unwrap_or_default();
    let selection = sessions.resume_or_new(&candidate);
    if selection.rejected.is_some() {
        writer
            .write_all("⚠️ UUID inválido. Creando nueva sesión...\n".as_bytes())
            .await?;
    }
    Ok(selection)
}

/// Resolve the session from flags, falling back to the interactive menu
pub async fn choose_session<R, W>(
    args: &CliArgs,
    reader: &mut R,
    writer: &mut W,
    sessions: &SessionManager,
) -> Result<SessionSelection>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if let Some(candidate) = &args.session {
        let selection = sessions.resume_or_new(candidate);
        if selection.rejected.is_some() {
            writer
                .write_all("⚠️ UUID inválido. Creando nueva sesión...\n".as_bytes())
                .await?;
        }
        return Ok(selection);
    }
    if args.new {
        return Ok(SessionSelection {
            id: sessions.new_session(),
            resumed: false,
            rejected: None,
        });
    }
    select_session(reader, writer, sessions).await
}

pub struct CliState {
    pub config: AppConfig,
    pub persistence: Persistence,
    pub sessions: SessionManager,
    pub agent: AgentCore,
}

impl CliState {
    /// Create a CLI state from a provided config
    pub fn new_with_config(config: AppConfig, session_id: SessionId) -> Result<Self> {
        let persistence =
            Persistence::new(&config.database.path).context("initializing persistence")?;

        let agent = AgentBuilder::new()
            .with_config(config.clone())
            .with_persistence(persistence.clone())
            .with_session_id(session_id)
            .build()?;

        Ok(Self::from_parts(config, persistence, agent))
    }

    /// Create a CLI state with an explicit tool registry
    pub fn new_with_tools(
        config: AppConfig,
        session_id: SessionId,
        tools: Arc<ToolRegistry>,
    ) -> Result<Self> {
        let persistence =
            Persistence::new(&config.database.path).context("initializing persistence")?;

        let agent = AgentBuilder::new()
            .with_config(config.clone())
            .with_persistence(persistence.clone())
            .with_tool_registry(tools)
            .with_session_id(session_id)
            .build()?;

        Ok(Self::from_parts(config, persistence, agent))
    }

    /// Assemble from already-built parts
    pub fn from_parts(config: AppConfig, persistence: Persistence, agent: AgentCore) -> Self {
        Self {
            config,
            persistence,
            sessions: SessionManager::new(),
            agent,
        }
    }

    /// Handle a single line of input. Returns an optional output string.
    ///
    /// Resolution failures are returned as errors; a reply that was computed
    /// but not saved is shown together with a warning.
    pub async fn handle_line(&mut self, line: &str) -> Result<Option<String>> {
        match parse_command(line) {
            Command::Empty => Ok(None),
            Command::Help => Ok(Some(formatting::render_help())),
            Command::Quit => Ok(Some(formatting::render_farewell(
                &self.agent.session_id().to_string(),
            ))),
            Command::ConfigShow => {
                let summary = self.config.summary();
                Ok(Some(formatting::render_config(&summary)))
            }
            Command::SessionShow => Ok(Some(format!(
                "📝 Session ID: {}",
                self.agent.session_id()
            ))),
            Command::SessionNew => {
                let id = self.sessions.new_session();
                self.agent.switch_session(id);
                Ok(Some(formatting::render_session_started(&id.to_string())))
            }
            Command::SessionResume(candidate) => {
                let selection = self.sessions.resume_or_new(&candidate);
                self.agent.switch_session(selection.id);
                let mut out = String::new();
                if selection.rejected.is_some() {
                    out.push_str("⚠️ UUID inválido. Creando nueva sesión...\n");
                }
                out.push_str(&formatting::render_session_started(
                    &selection.id.to_string(),
                ));
                Ok(Some(out))
            }
            Command::SessionList => {
                let sessions = self.persistence.list_sessions()?;
                if sessions.is_empty() {
                    return Ok(Some("No hay sesiones guardadas.".to_string()));
                }
                Ok(Some(formatting::render_list(
                    "Sesiones (más recientes primero)",
                    sessions,
                )))
            }
            Command::History(n) => {
                let limit = n.unwrap_or(10) as i64;
                let sid = self.agent.session_id().to_string();
                let msgs = self.persistence.list_messages(&sid, limit)?;
                if msgs.is_empty() {
                    Ok(Some("No hay mensajes en esta sesión.".to_string()))
                } else {
                    let messages: Vec<(String, String)> = msgs
                        .into_iter()
                        .map(|m| (m.role.as_str().to_string(), m.content))
                        .collect();
                    Ok(Some(formatting::render_history(messages)))
                }
            }
            Command::Tools => {
                let tools: Vec<String> = self
                    .agent
                    .tool_registry()
                    .list()
                    .into_iter()
                    .map(String::from)
                    .collect();
                if tools.is_empty() {
                    return Ok(Some("No hay herramientas habilitadas.".to_string()));
                }
                Ok(Some(formatting::render_list("Herramientas", tools)))
            }
            Command::Message(text) => match self.agent.run_step(&text).await {
                Ok(output) => {
                    let mut formatted = formatting::render_agent_response(
                        self.agent.agent_name(),
                        &output.response,
                    );
                    if let Some(stats) = formatting::render_run_stats(&output) {
                        if self.config.ui.show_stats {
                            formatted.push('\n');
                            formatted.push_str(&stats);
                        }
                    }
                    Ok(Some(formatted))
                }
                Err(AgentError::ReplyNotPersisted { reply, message }) => {
                    warn!("Reply shown without being saved: {}", message);
                    let mut formatted =
                        formatting::render_agent_response(self.agent.agent_name(), &reply);
                    formatted.push_str(&format!(
                        "\n⚠️ La respuesta no se pudo guardar en el historial: {}",
                        message
                    ));
                    Ok(Some(formatted))
                }
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Run the prompt loop until an exit keyword or end of input
    pub async fn run_repl<R, W>(&mut self, reader: &mut R, writer: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        writer
            .write_all(
                formatting::render_session_started(&self.agent.session_id().to_string())
                    .as_bytes(),
            )
            .await?;
        writer.flush().await?;

        let mut line = String::new();
        loop {
            writer.write_all(self.config.ui.prompt.as_bytes()).await?;
            writer.flush().await?;
            line.clear();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                // EOF
                let farewell = formatting::render_farewell(&self.agent.session_id().to_string());
                writer.write_all(farewell.as_bytes()).await?;
                break;
            }

            let quitting = parse_command(&line) == Command::Quit;
            match self.handle_line(&line).await {
                Ok(Some(out)) => {
                    writer.write_all(out.as_bytes()).await?;
                    if !out.ends_with('\n') {
                        writer.write_all(b"\n").await?;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("Turn failed: {:#}", err);
                    writer
                        .write_all(formatting::render_error(&format!("{:#}", err)).as_bytes())
                        .await?;
                }
            }
            writer.flush().await?;
            if quitting {
                break;
            }
        }

        if let Err(err) = self.persistence.checkpoint() {
            warn!("Checkpoint on exit failed: {:#}", err);
        }
        writer.flush().await?;
        Ok(())
    }
}
