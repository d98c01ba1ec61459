//! Command-line interface definition.
//!
//! A single command: `archaeopteryx [OPTIONS] [ROOT]`. Every flag maps onto a
//! field of [`archaeopteryx::ServerConfig`]; `archaeopteryx.json` in the
//! served root is merged over them (see [`crate::config`]).


use clap::Parser;
use std::path::PathBuf;

/// Archaeopteryx - static dev server with SPA routing and live reload
#[derive(Parser, Debug, Clone)]
#[command(
    name = "archaeopteryx",
    version,
    about = "Static dev server with SPA routing, directory listings and live reload",
    long_about = "Archaeopteryx serves a directory for front-end development.\n\
                  GET / serves the SPA entry point with a live-reload script appended,\n\
                  other paths are served from disk or listed as directories, and every\n\
                  connected browser reloads when a file under the root changes."
)]
pub struct Cli {
    /// Directory to serve
    #[arg(value_name = "ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Port to listen on
    #[arg(
        short,
        long,
        default_value_t = 8080,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub port: u16,

    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub hostname: String,

    /// Suppress all request and error output
    #[arg(short, long, conflicts_with = "debug")]
    pub silent: bool,

    /// Print full error detail and debug logs
    #[arg(short, long)]
    pub debug: bool,

    /// Disable live reload
    ///
    /// No websocket endpoint is offered and the entry point is served
    /// without the reload script.
    #[arg(short = 'n', long = "no-reload", visible_alias = "disable-reload")]
    pub no_reload: bool,

    /// Serve over HTTPS
    ///
    /// Uses --cert-file and --key-file, resolved against ROOT when relative.
    #[arg(short = 't', long)]
    pub secure: bool,

    /// Send `Access-Control-Allow-Origin: *` on every response
    #[arg(short, long)]
    pub cors: bool,

    /// Answer directory requests with 404 instead of a listing
    #[arg(short = 'f', long = "files-only", visible_alias = "dont-list")]
    pub files_only: bool,

    /// Retry paths missing under ROOT as absolute filesystem paths
    #[arg(long)]
    pub allow_absolute: bool,

    /// TLS certificate (PEM)
    #[arg(long, default_value = "archaeopteryx.crt", value_name = "FILE")]
    pub cert_file: PathBuf,

    /// TLS private key (PEM)
    #[arg(long, default_value = "archaeopteryx.key", value_name = "FILE")]
    pub key_file: PathBuf,

    /// SPA entry point served for `GET /`
    #[arg(short, long = "entry", default_value = "index.html", value_name = "FILE")]
    pub entry: String,

    /// Interceptor to run before each request (repeatable, in order)
    ///
    /// Built-ins: log, trailing-slash, no-query
    #[arg(long, value_name = "NAME")]
    pub before: Vec<String>,

    /// Interceptor to run after each request (repeatable, in order)
    #[arg(long, value_name = "NAME")]
    pub after: Vec<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}
