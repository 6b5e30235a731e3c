mod browse;
mod connections;
mod general;
mod register;
mod search;
mod show;

use std::fmt;
use std::num::NonZeroU8;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use bpaf::{Args, Bpaf, ParseFailure, Parser};
use indoc::indoc;
use owscout_csw::{Client, CswClient, CswClientConfig, CswError};
use owscout_sdk::models::connections::{Connection, ConnectionRegistry, Namespace};

use crate::config::Config;
use crate::utils::message;

static OWSCOUT_DESCRIPTION: &'_ str = indoc! {"
    owscout searches OGC metadata catalogues (CSW) and registers the map,
    feature and coverage services it discovers in a local connection list."
};

/// How many records a result page holds unless configured otherwise.
pub(crate) const DEFAULT_PAGE_SIZE: Option<NonZeroU8> = NonZeroU8::new(10);

fn vec_len<T>(x: Vec<T>) -> usize {
    Vec::len(&x)
}

#[derive(Bpaf, Clone, Copy, Debug)]
pub enum Verbosity {
    Verbose(
        /// Increase logging verbosity
        ///
        /// Invoke multiple times for increasing detail.
        #[bpaf(short('v'), long("verbose"), req_flag(()), many, map(vec_len))]
        usize,
    ),

    /// Silence logs except for errors
    #[bpaf(short, long)]
    Quiet,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Verbose(0)
    }
}

#[derive(Bpaf)]
#[bpaf(
    options,
    descr(OWSCOUT_DESCRIPTION),
    footer("Run 'owscout <command> --help' for details of each command.")
)]
pub struct OwscoutCli(#[bpaf(external(owscout_args))] pub OwscoutArgs);

/// Main owscout args parser
///
/// This struct is used to parse the command line arguments
/// and allows to be composed with other parsers.
///
/// To parse the owscout CLI, use [`OwscoutCli`] instead using
/// [`owscout_cli()`].
#[derive(Debug, Bpaf)]
#[bpaf(ignore_rustdoc)] // we don't want this struct to be interpreted as a group
pub struct OwscoutArgs {
    /// Verbose mode
    ///
    /// Invoke multiple times for increasing detail.
    #[bpaf(external, fallback(Default::default()))]
    pub verbosity: Verbosity,

    /// Print the version of the program
    #[allow(dead_code)] // fake arg, `--version` is checked for separately (see [Version])
    #[bpaf(long, short('V'))]
    version: bool,

    #[bpaf(external(commands), optional)]
    command: Option<Commands>,
}

impl fmt::Debug for Commands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command")
    }
}

impl OwscoutArgs {
    pub async fn handle(self, config: Config) -> Result<()> {
        // ensure xdg dirs exist
        tokio::fs::create_dir_all(&config.owscout.config_dir).await?;
        tokio::fs::create_dir_all(&config.owscout.data_dir).await?;
        tokio::fs::create_dir_all(&config.owscout.cache_dir).await?;

        // Given no command, print the help message
        let Some(command) = self.command else {
            display_help(None);
            return Ok(());
        };

        let scout = Owscout::from_config(&config);

        match command {
            Commands::Help(args) => args.handle(),
            Commands::Search(args) => args.handle(config, scout).await?,
            Commands::Browse(args) => args.handle(config, scout).await?,
            Commands::Show(args) => args.handle(scout).await?,
            Commands::Connections(args) => args.handle(scout).await?,
            Commands::Register(args) => args.handle(scout).await?,
            Commands::Config(args) => args.handle(config, scout).await?,
        }
        Ok(())
    }
}

#[derive(Bpaf, Clone)]
enum Commands {
    /// Prints help information
    #[bpaf(command, hide)]
    Help(#[bpaf(external(help))] Help),

    /// Search the catalogue and print one page of results
    #[bpaf(command)]
    Search(#[bpaf(external(search::search))] search::Search),

    /// Interactively page through catalogue results
    #[bpaf(command)]
    Browse(#[bpaf(external(browse::browse))] browse::Browse),

    /// Show the full metadata of one record
    #[bpaf(command)]
    Show(#[bpaf(external(show::show))] show::Show),

    /// Manage catalogue connections
    #[bpaf(command)]
    Connections(
        #[bpaf(external(connections::connections_commands))] connections::ConnectionsCommands,
    ),

    /// Validate a service endpoint and add it to the connection list
    #[bpaf(command)]
    Register(#[bpaf(external(register::register))] register::Register),

    /// Read or modify the owscout configuration
    #[bpaf(command)]
    Config(#[bpaf(external(general::config_args))] general::ConfigArgs),
}

#[derive(Debug, Bpaf, Clone)]
struct Help {
    /// Command to show help for
    #[bpaf(positional("cmd"))]
    cmd: Option<String>,
}

/// Force `--help` output for `owscout` with a given command
pub fn display_help(cmd: Option<String>) {
    let mut args = Vec::from_iter(cmd.as_deref());
    args.push("--help");

    match owscout_cli().run_inner(&*args) {
        Ok(_) => unreachable!(),
        Err(ParseFailure::Completion(comp)) => print!("{comp:80}"),
        Err(ParseFailure::Stdout(doc, _)) => message::plain(format!("{doc:80}")),
        Err(ParseFailure::Stderr(err)) => message::error(err),
    }
}

impl Help {
    fn handle(self) {
        display_help(self.cmd);
    }
}

/// Special parser for checking `--version` ahead of the main parse, so the
/// main parser's help handling does not swallow it.
#[derive(Bpaf, Default)]
pub struct Version(#[bpaf(long("version"), short('V'))] bool);

impl Version {
    /// Detects whether `--version` was passed.
    pub fn check() -> bool {
        let version_parser = version();
        let other_parser = bpaf::any("_", Some::<String>).many();

        bpaf::construct!(version_parser, other_parser)
            .map(|(Version(v), _)| v)
            .to_options()
            .run_inner(Args::current_args())
            .unwrap_or_default()
    }
}

/// The context a command runs against: the resolved config directory and
/// the connection registry.
#[derive(Debug)]
pub struct Owscout {
    pub config_dir: PathBuf,
    pub registry: ConnectionRegistry,
    user_agent: String,
}

impl Owscout {
    pub fn from_config(config: &Config) -> Self {
        let registry = ConnectionRegistry::new(&config.owscout.data_dir);
        let user_agent = config
            .owscout
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("owscout/{}", env!("CARGO_PKG_VERSION")));

        Owscout {
            config_dir: config.owscout.config_dir.clone(),
            registry,
            user_agent,
        }
    }

    /// A catalogue client for `url`.
    pub fn catalogue_client(&self, url: &str) -> Result<Client> {
        let mut client_config = CswClientConfig::new(url);
        client_config.user_agent = Some(self.user_agent.clone());
        Ok(Client::Csw(CswClient::new(client_config)?))
    }

    /// The catalogue a command operates on: `name` when given, the selected
    /// connection otherwise.
    pub fn resolve_catalogue(&self, name: Option<&str>) -> Result<Connection> {
        match name {
            Some(name) => self
                .registry
                .get(Namespace::Catalogue, name)?
                .ok_or_else(|| anyhow!("no catalogue connection named '{name}'")),
            None => self.registry.selected(Namespace::Catalogue)?.ok_or_else(|| {
                anyhow!(
                    "no catalogue selected; add one with 'owscout connections add' \
                     and select it with 'owscout connections select'"
                )
            }),
        }
    }
}

/// Page size precedence: flag, then config, then the built-in default.
pub(crate) fn resolve_page_size(config: &Config, flag: Option<NonZeroU8>) -> u32 {
    flag.or(config.owscout.page_size)
        .or(DEFAULT_PAGE_SIZE)
        .map(|size| u32::from(size.get()))
        .unwrap_or(10)
}

/// Transport failures surface as connection errors; anything else is a
/// search error carrying the server's message. The distinction matters to
/// the caller: after a search error the previous result page is still
/// valid.
pub(crate) fn catalogue_error(err: CswError) -> anyhow::Error {
    match err {
        CswError::Connection(_) => anyhow::Error::new(err).context("Connection error"),
        _ => anyhow::Error::new(err).context("Search error"),
    }
}
