//! Interactive ratatui front end over a [`Session`].
//!
//! The screen shows the history list, the current map as an outline, and a
//! detail panel with either the knowledge context or the raw model output.
//! Typing a topic and pressing Enter generates a map. Tab moves focus to the
//! history list, where Up/Down and Enter pick a past map.
//!
//! Commands: `/raw` toggles the detail panel, `/html [path]` exports the
//! current map as a vis-network page, `/help`, `/quit`.

pub mod widgets;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crate::error::KnowtreeResult;
use crate::knowledge::KnowledgeBase;
use crate::llm::CompletionModel;
use crate::message::{Message, MemorySink, MessageSink};
use crate::paths::KnowtreePaths;
use crate::render::html::export_html;
use crate::render::{LayoutConfig, Rendered};
use crate::session::{Session, SessionOptions};

use self::widgets::{Focus, View};

/// Most recent messages kept on screen.
const MESSAGE_BACKLOG: usize = 200;

const HELP: &str = "Type a topic and press Enter. Tab: focus history (Up/Down, Enter to open). \
                    Commands: /raw, /html [path], /help, /quit";

/// TUI application state.
pub struct KnowtreeTui<M, K> {
    session: Session<M, K>,
    sink: Arc<MemorySink>,
    layout: LayoutConfig,
    paths: KnowtreePaths,
    messages: Vec<Message>,
    input_buffer: String,
    focus: Focus,
    selected: usize,
    show_raw: bool,
    pending_topic: Option<String>,
    should_quit: bool,
}

impl<M: CompletionModel, K: KnowledgeBase> KnowtreeTui<M, K> {
    pub fn new(
        model: M,
        knowledge: K,
        options: SessionOptions,
        layout: LayoutConfig,
        paths: KnowtreePaths,
    ) -> Self {
        let sink = Arc::new(MemorySink::new());
        let session = Session::new(
            model,
            knowledge,
            Arc::clone(&sink) as Arc<dyn MessageSink>,
            options,
        );
        Self {
            session,
            sink,
            layout,
            paths,
            messages: vec![Message::system(format!("Welcome to knowtree. {HELP}"))],
            input_buffer: String::new(),
            focus: Focus::Input,
            selected: 0,
            show_raw: false,
            pending_topic: None,
            should_quit: false,
        }
    }

    /// Run the TUI event loop.
    pub fn run(&mut self) -> KnowtreeResult<()> {
        let mut terminal = ratatui::init();
        let result = self.event_loop(&mut terminal);
        ratatui::restore();
        result
    }

    fn event_loop(&mut self, terminal: &mut ratatui::DefaultTerminal) -> KnowtreeResult<()> {
        loop {
            self.drain_messages();

            terminal
                .draw(|frame| {
                    let view = View {
                        state: self.session.state(),
                        messages: &self.messages,
                        input: &self.input_buffer,
                        focus: self.focus,
                        selected: self.selected,
                        show_raw: self.show_raw,
                        busy: self.pending_topic.as_deref(),
                        model: self.session.model_name(),
                    };
                    widgets::render(frame, &view);
                })?;

            if self.should_quit {
                break;
            }

            // The frame above shows the busy indicator; generate now.
            if let Some(topic) = self.pending_topic.take() {
                self.generate(&topic);
                continue;
            }

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    self.handle_key(key.code, key.modifiers);
                }
            }
        }
        Ok(())
    }

    fn drain_messages(&mut self) {
        self.messages.extend(self.sink.drain());
        if self.messages.len() > MESSAGE_BACKLOG {
            let excess = self.messages.len() - MESSAGE_BACKLOG;
            self.messages.drain(..excess);
        }
    }

    fn generate(&mut self, topic: &str) {
        // Errors are already reported to the sink by the session.
        if self.session.submit(topic).is_ok() {
            self.selected = self.session.history().len().saturating_sub(1);
        }
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        match code {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = match self.focus {
                    Focus::Input => Focus::History,
                    Focus::History => Focus::Input,
                };
            }
            _ => match self.focus {
                Focus::Input => self.handle_input_key(code),
                Focus::History => self.handle_history_key(code),
            },
        }
    }

    fn handle_input_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Enter => {
                let input = self.input_buffer.trim().to_string();
                self.input_buffer.clear();
                if input.is_empty() {
                    return;
                }
                if let Some(cmd) = input.strip_prefix('/') {
                    self.handle_command(cmd);
                } else {
                    self.pending_topic = Some(input);
                }
            }
            KeyCode::Char(c) => {
                self.input_buffer.push(c);
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            _ => {}
        }
    }

    fn handle_history_key(&mut self, code: KeyCode) {
        let len = self.session.history().len();
        if len == 0 {
            return;
        }
        match code {
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                self.selected = (self.selected + 1).min(len - 1);
            }
            KeyCode::Home => {
                self.selected = 0;
            }
            KeyCode::End => {
                self.selected = len - 1;
            }
            KeyCode::Enter => {
                let _ = self.session.pick(self.selected);
            }
            _ => {}
        }
    }

    fn handle_command(&mut self, cmd: &str) {
        let (name, arg) = match cmd.split_once(' ') {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (cmd, None),
        };
        match name {
            "quit" | "q" => {
                self.should_quit = true;
            }
            "help" | "h" => {
                self.messages.push(Message::system(HELP));
            }
            "raw" => {
                self.show_raw = !self.show_raw;
            }
            "html" => self.export(arg.map(PathBuf::from)),
            _ => {
                self.messages.push(Message::system(format!(
                    "Unknown command: /{cmd}. Type /help for commands."
                )));
            }
        }
    }

    fn export(&mut self, path: Option<PathBuf>) {
        let Rendered::Canvas(visual) = self.session.render(&self.layout) else {
            self.messages
                .push(Message::system("Nothing to export yet: generate a map first."));
            return;
        };
        let title = self.session.state().current_query.clone();
        let path = match path {
            Some(p) => p,
            None => match self.paths.ensure_exports_dir() {
                Ok(_) => self.paths.export_file(&title),
                Err(e) => {
                    self.messages.push(Message::from_diagnostic(&e, None));
                    return;
                }
            },
        };
        match export_html(&visual, &title, &path) {
            Ok(written) => self
                .messages
                .push(Message::system(format!("Exported to {}", written.display()))),
            Err(e) => self.messages.push(Message::from_diagnostic(&e, None)),
        }
    }
}

/// Launch the TUI.
pub fn launch<M: CompletionModel, K: KnowledgeBase>(
    model: M,
    knowledge: K,
    options: SessionOptions,
    layout: LayoutConfig,
    paths: KnowtreePaths,
) -> KnowtreeResult<()> {
    let mut tui = KnowtreeTui::new(model, knowledge, options, layout, paths);
    tui.run()
}
