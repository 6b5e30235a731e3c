use std::io::Stderr;
use std::sync::{LazyLock, Mutex};

pub mod dialog;
pub mod errors;
pub mod logger;
pub mod message;
pub mod search;

/// Terminal prompts and log output share stderr; locking it keeps spinner
/// redraws and prompt rendering from interleaving.
pub static TERMINAL_STDERR: LazyLock<Mutex<Stderr>> =
    LazyLock::new(|| Mutex::new(std::io::stderr()));
