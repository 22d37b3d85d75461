//! The `siftc` command-line interface.
//!
//! `siftc check` parses and checks a package; `siftc fmt` prints the
//! canonical rendering. Exit status is 0 on success, 1 on a user-visible
//! failure and 2 on an internal error.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use clap::{Parser as ClapParser, Subcommand, ValueEnum};

use crate::check::error::{Diagnostic, Fatal};
use crate::check::{check_package, CheckConfig};
use crate::intern::Interner;
use crate::parser::parse_file;
use crate::render::Renderer;

pub const EXIT_OK: i32 = 0;
pub const EXIT_USER_ERROR: i32 = 1;
pub const EXIT_INTERNAL_ERROR: i32 = 2;

#[derive(ClapParser)]
#[command(name = "siftc")]
#[command(about = "The Sift compiler front half: parse and check", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiagnosticsFormat {
    Human,
    Json,
}

impl std::fmt::Display for DiagnosticsFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticsFormat::Human => write!(f, "human"),
            DiagnosticsFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check a package for errors
    Check {
        /// Source files of the package
        files: Vec<PathBuf>,

        /// Directories searched when resolving `use` paths
        #[arg(long, short)]
        search: Vec<PathBuf>,

        /// Output format for errors
        #[arg(long, value_enum, default_value_t = DiagnosticsFormat::Human)]
        diagnostics: DiagnosticsFormat,

        /// Maximum expression nesting depth
        #[arg(long)]
        max_expr_depth: Option<usize>,

        /// Maximum provable shift count (capped at 65535)
        #[arg(long)]
        shift_ceiling: Option<u32>,
    },
    /// Print the canonical rendering of source files
    Fmt {
        /// Source files to render
        files: Vec<PathBuf>,
    },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the CLI; the returned value is the process exit status.
pub fn run_cli() -> i32 {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Check {
            files,
            search,
            diagnostics,
            max_expr_depth,
            shift_ceiling,
        } => run_check(files, search, diagnostics, max_expr_depth, shift_ceiling),
        Commands::Fmt { files } => run_fmt(files),
    }
}

fn run_check(
    paths: Vec<PathBuf>,
    search: Vec<PathBuf>,
    diagnostics: DiagnosticsFormat,
    max_expr_depth: Option<usize>,
    shift_ceiling: Option<u32>,
) -> i32 {
    let mut config = CheckConfig::default();
    if let Some(d) = max_expr_depth {
        config.max_expr_depth = d;
    }
    if let Some(c) = shift_ceiling {
        config.shift_ceiling = c;
    }

    let mut interner = Interner::new();
    let mut sources: HashMap<String, String> = HashMap::new();
    let mut files = Vec::new();

    for path in &paths {
        let display = path.display().to_string();
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: cannot read {}: {}", display, e);
                return EXIT_USER_ERROR;
            }
        };
        match parse_file(&display, &source, &mut interner) {
            Ok(file) => files.push(file),
            Err(error) => {
                report(
                    &Fatal::Parse {
                        path: display.clone(),
                        error,
                    },
                    &source,
                    diagnostics,
                );
                return EXIT_USER_ERROR;
            }
        }
        sources.insert(display, source);
    }

    // `use "std/crc32"` resolves to `<dir>/std/crc32.sift` under the
    // search path, caching every source read for error rendering.
    let loaded: std::cell::RefCell<HashMap<String, String>> =
        std::cell::RefCell::new(HashMap::new());
    let mut resolver = |use_path: &str| -> Result<Vec<u8>, String> {
        for dir in &search {
            for candidate in [
                dir.join(format!("{}.sift", use_path)),
                dir.join(use_path),
            ] {
                if let Ok(bytes) = fs::read(&candidate) {
                    if let Ok(text) = std::str::from_utf8(&bytes) {
                        loaded
                            .borrow_mut()
                            .insert(use_path.to_string(), text.to_string());
                    }
                    return Ok(bytes);
                }
            }
        }
        Err(format!("not found under {} search director(ies)", search.len()))
    };

    let result = check_package(&mut files, &mut interner, &mut resolver, &config);
    drop(resolver);
    sources.extend(loaded.into_inner());

    match result {
        Ok(()) => EXIT_OK,
        Err(fatal) => {
            let source = failing_source(&fatal, &sources);
            report(&fatal, source.unwrap_or(""), diagnostics);
            if matches!(fatal, Fatal::Internal(_)) {
                EXIT_INTERNAL_ERROR
            } else {
                EXIT_USER_ERROR
            }
        }
    }
}

fn failing_source<'s>(fatal: &Fatal, sources: &'s HashMap<String, String>) -> Option<&'s str> {
    let path = match fatal {
        Fatal::Parse { path, .. } => path,
        Fatal::Check(e) => &e.path,
        Fatal::Internal(_) => return None,
    };
    sources.get(path).map(|s| s.as_str())
}

fn report(fatal: &Fatal, source: &str, format: DiagnosticsFormat) {
    match format {
        DiagnosticsFormat::Human => match fatal {
            Fatal::Parse { error, .. } => eprintln!("{}", error.display_with_source(source)),
            Fatal::Check(e) => eprintln!("{}", e.display_with_source(source)),
            Fatal::Internal(e) => eprintln!("{}", e),
        },
        DiagnosticsFormat::Json => {
            let d = Diagnostic::from_fatal(fatal, Some(source));
            match serde_json::to_string_pretty(&d) {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("{}", fatal),
            }
        }
    }
}

fn run_fmt(paths: Vec<PathBuf>) -> i32 {
    let mut interner = Interner::new();
    for path in &paths {
        let display = path.display().to_string();
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: cannot read {}: {}", display, e);
                return EXIT_USER_ERROR;
            }
        };
        match parse_file(&display, &source, &mut interner) {
            Ok(file) => {
                let renderer = Renderer::new(&interner);
                print!("{}", renderer.file(&file));
            }
            Err(error) => {
                eprintln!("{}", error.display_with_source(&source));
                return EXIT_USER_ERROR;
            }
        }
    }
    EXIT_OK
}
