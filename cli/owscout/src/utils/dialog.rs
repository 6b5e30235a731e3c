use std::fmt::Display;
use std::time::{Duration, Instant};

use crossterm::tty::IsTty;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::ui::{Attributes, RenderConfig, StyleSheet, Styled};

use super::TERMINAL_STDERR;

#[derive(Debug, Clone)]
pub struct Confirm {
    pub default: Option<bool>,
}

#[derive(Clone)]
pub struct Select<T> {
    pub options: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct Text<'a> {
    pub default: Option<&'a str>,
}

pub struct Spinner<F>(F);
impl<F: FnOnce() -> T + Send, T: Send> Spinner<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[derive(Debug, Clone)]
pub struct Dialog<'a, Type> {
    pub message: &'a str,
    pub help_message: Option<&'a str>,
    pub typed: Type,
}

impl Dialog<'_, Confirm> {
    /// Ask a yes/no question and block until it is answered.
    ///
    /// The answer is returned to exactly one caller decision; it is never
    /// stored for later navigation steps.
    pub fn raw_prompt(self) -> inquire::error::InquireResult<bool> {
        let _stderr_lock = TERMINAL_STDERR.lock();

        let mut dialog = inquire::Confirm::new(self.message).with_render_config(owscout_theme());

        if let Some(default) = self.typed.default {
            dialog = dialog.with_default(default);
        }

        if let Some(help_message) = self.help_message {
            dialog = dialog.with_help_message(help_message);
        }

        dialog.prompt()
    }
}

impl Dialog<'_, Text<'_>> {
    /// Prompt for one line of text.
    pub fn raw_prompt(self) -> inquire::error::InquireResult<String> {
        let _stderr_lock = TERMINAL_STDERR.lock();

        let mut dialog = inquire::Text::new(self.message).with_render_config(owscout_theme());

        if let Some(default) = self.typed.default {
            dialog = dialog.with_default(default);
        }

        if let Some(help_message) = self.help_message {
            dialog = dialog.with_help_message(help_message);
        }

        dialog.prompt()
    }
}

struct Choice(usize, String);
impl Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.1.fmt(f)
    }
}

impl<T: Display> Dialog<'_, Select<T>> {
    pub fn raw_prompt(self) -> inquire::error::InquireResult<(usize, T)> {
        let message = self.message.to_owned();
        let help_message = self.help_message.map(ToOwned::to_owned);
        let mut options = self.typed.options;

        let choices = options
            .iter()
            .map(ToString::to_string)
            .enumerate()
            .map(|(id, value)| Choice(id, value))
            .collect();

        let (raw_id, Choice(id, _)) = {
            let _stderr_lock = TERMINAL_STDERR.lock();

            let mut dialog =
                inquire::Select::new(&message, choices).with_render_config(owscout_theme());

            if let Some(ref help_message) = help_message {
                dialog = dialog.with_help_message(help_message);
            }

            match dialog.raw_prompt() {
                Ok(x) => Ok((x.index, x.value)),
                Err(err) => Err(err),
            }
        }?;

        Ok((raw_id, options.remove(id)))
    }
}

impl<'a, F: FnOnce() -> T + Send, T: Send> Dialog<'a, Spinner<F>> {
    /// Run the wrapped operation, showing a spinner once it takes longer
    /// than `start_spinning_after`.
    ///
    /// The spinner is cleared on every exit path: the scoped thread joins
    /// before this function returns, whether the operation succeeded,
    /// failed, or panicked through `join`.
    pub fn spin_with_delay(self, start_spinning_after: Duration) -> T {
        let handle = tokio::runtime::Handle::current();
        std::thread::scope(|s| {
            let y = s.spawn(move || {
                // self.typed.0 may be a function that requires tokio
                let _guard = handle.enter();
                (self.typed.0)()
            });
            let mut dialog: Option<ProgressBar> = None;
            let started = Instant::now();
            loop {
                if y.is_finished() {
                    break;
                }

                if Instant::now() - started < start_spinning_after {
                    std::thread::sleep(Duration::from_millis(100));
                    continue;
                }

                let spinner = indicatif::ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::with_template("{spinner} {wide_msg} {prefix:>}")
                        .expect("spinner template is valid"),
                );
                spinner.set_message(self.message.to_string());
                if let Some(help_message) = self.help_message {
                    spinner.set_prefix(help_message.to_string())
                }
                spinner.enable_steady_tick(Duration::from_millis(100));
                dialog = Some(spinner);

                break;
            }
            let res = y.join().expect("operation thread panicked");

            if let Some(dialog) = dialog {
                dialog.finish_and_clear();
            }

            res
        })
    }

    #[allow(unused)]
    pub fn spin(self) -> T {
        self.spin_with_delay(Duration::from_millis(0))
    }
}

impl Dialog<'_, ()> {
    /// True if stderr, stdin and stdout are ttys
    pub fn can_prompt() -> bool {
        if std::env::var("_OWSCOUT_NO_PROMPT").is_ok_and(|v| v == "1") {
            return false;
        }
        std::io::stderr().is_tty() && std::io::stdin().is_tty() && std::io::stdout().is_tty()
    }
}

pub fn owscout_theme() -> RenderConfig<'static> {
    let mut render_config = RenderConfig::default_colored();

    render_config.answered_prompt_prefix = Styled::new(">");
    render_config.highlighted_option_prefix = Styled::new(">");
    render_config.prompt_prefix = Styled::new("!");
    render_config.prompt = StyleSheet::new().with_attr(Attributes::BOLD);

    render_config
}
