//! CLI for the Lua bridge.
//!
//! Usage:
//!   lua-bridge <file.lua>            # Capture every line of a file as a handle
//!   lua-bridge -e "fragment"         # Evaluate one fragment
//!   lua-bridge                       # Start REPL (interactive mode)
//!
//! `--emulate` runs against the built-in Lua emulator instead of Hammerspoon.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use lua_bridge::{Bridge, BridgeConfig, Handle, LuaEmulator, Scope};

#[derive(Parser, Debug)]
#[command(author, version, about = "Evaluate Lua fragments in a remote interpreter", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the in-process Lua emulator instead of spawning the configured program
    #[arg(long, default_value_t = false)]
    emulate: bool,

    /// Print the effective configuration and exit
    #[arg(long, default_value_t = false)]
    print_config: bool,

    /// Evaluate one fragment
    #[arg(short, long, conflicts_with = "file")]
    eval: Option<String>,

    /// File with one fragment per line
    file: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .try_init()
        .ok();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BridgeConfig::load(path).unwrap_or_else(|e| fail(&e.to_string())),
        None => BridgeConfig::default(),
    };

    if cli.print_config {
        match config.to_toml() {
            Ok(text) => print!("{}", text),
            Err(e) => fail(&e.to_string()),
        }
        return;
    }

    let bridge = if cli.emulate {
        Bridge::with_config(LuaEmulator::new(), &config)
    } else {
        Bridge::from_config(&config)
    }
    .unwrap_or_else(|e| fail(&e.to_string()));

    let scope = bridge.open_scope();
    let ok = match (&cli.eval, &cli.file) {
        (Some(fragment), _) => eval_fragment(&scope, fragment),
        (None, Some(path)) => run_file(&scope, path),
        (None, None) => {
            run_repl(&scope);
            true
        }
    };
    scope.close();
    if !ok {
        process::exit(1);
    }
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn eval_fragment(scope: &Scope<'_>, fragment: &str) -> bool {
    match scope.execute(fragment).and_then(|h| h.read_representation()) {
        Ok(repr) => {
            println!("{}", repr);
            true
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            false
        }
    }
}

fn run_file(scope: &Scope<'_>, path: &Path) -> bool {
    let source = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            return false;
        }
    };
    let mut handles = Vec::new();
    for line in source.lines().map(str::trim) {
        if line.is_empty() || line.starts_with("--") {
            continue;
        }
        match capture_line(scope, &handles, line) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                eprintln!("Error: {}", e);
                return false;
            }
        }
    }
    true
}

fn run_repl(scope: &Scope<'_>) {
    println!("lua-bridge v{}", env!("CARGO_PKG_VERSION"));
    println!("Each line is evaluated remotely and kept as $<id>. Type .exit to quit.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handles = Vec::new();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        stdout.flush().ok();

        let input = match lines.next() {
            None => break,
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        };
        let input = input.trim();

        match input {
            ".exit" | ".quit" => break,
            ".live" => {
                println!("{} live handle(s)", scope.bridge().live_handles());
                continue;
            }
            "" => continue,
            _ => {}
        }

        match capture_line(scope, &handles, input) {
            Ok(handle) => handles.push(handle),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    println!("Goodbye!");
}

/// Captures `line` after replacing `$<id>` references to earlier handles, then prints it.
fn capture_line<'s>(
    scope: &'s Scope<'s>,
    handles: &[Handle<'s>],
    line: &str,
) -> lua_bridge::Result<Handle<'s>> {
    let fragment = substitute_handles(line, handles);
    let handle = scope.execute(&fragment)?;
    println!("${} = {}", handle.id(), handle.read_representation()?);
    Ok(handle)
}

fn substitute_handles(line: &str, handles: &[Handle<'_>]) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let digits = after.chars().take_while(|c| c.is_ascii_digit()).count();
        let known = after[..digits]
            .parse::<u64>()
            .ok()
            .and_then(|id| handles.iter().find(|h| h.id() == id));
        match known {
            Some(handle) => out.push_str(&handle.accessor()),
            None => out.push_str(&rest[pos..pos + 1 + digits]),
        }
        rest = &after[digits..];
    }
    out.push_str(rest);
    out
}
