//! CLI argument parsing and help text

use anyhow::{anyhow, bail, Result};

pub const DEFAULT_CALLER_DEPTH: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Build,
    /// Empty query means "read queries from stdin".
    Search { query: Vec<String> },
    Def { name: String },
    Refs { symbol: String },
    Callers { symbol: String, depth: usize },
    /// Reference sites grouped by enclosing function.
    CallSites { symbol: String },
}

pub fn wants_help(args: &[String]) -> bool {
    args.iter()
        .skip(1)
        .any(|a| a == "-h" || a == "--help" || a == "help")
}

pub fn wants_version(args: &[String]) -> bool {
    args.iter()
        .skip(1)
        .any(|a| a == "-V" || a == "--version" || a == "version")
}

/// Parses `args` (including the program name).
pub fn parse_command(args: &[String]) -> Result<Command> {
    let mut rest = args.iter().skip(1).map(String::as_str);
    let Some(cmd) = rest.next() else {
        bail!("missing command; run with --help for usage");
    };
    let rest: Vec<&str> = rest.collect();

    match cmd {
        "build" => {
            expect_no_more(cmd, &rest)?;
            Ok(Command::Build)
        }
        "search" => Ok(Command::Search {
            query: rest.iter().map(|s| s.to_string()).collect(),
        }),
        "def" => Ok(Command::Def {
            name: single_arg(cmd, &rest)?,
        }),
        "refs" => Ok(Command::Refs {
            symbol: single_arg(cmd, &rest)?,
        }),
        "callers" => parse_callers(&rest),
        other => bail!("unknown command `{other}`; run with --help for usage"),
    }
}

fn parse_callers(rest: &[&str]) -> Result<Command> {
    let mut symbol = None;
    let mut depth = None;
    let mut sites = false;
    let mut it = rest.iter();
    while let Some(arg) = it.next() {
        match *arg {
            "--sites" => sites = true,
            "--depth" | "-d" => {
                let raw = it.next().ok_or_else(|| anyhow!("--depth needs a value"))?;
                let n: usize = raw
                    .parse()
                    .map_err(|err| anyhow!("Invalid depth '{raw}': {err}"))?;
                if n == 0 {
                    bail!("--depth must be at least 1");
                }
                depth = Some(n);
            }
            s if symbol.is_none() => symbol = Some(s.to_string()),
            s => bail!("unexpected argument `{s}` for callers"),
        }
    }
    let symbol = symbol.ok_or_else(|| anyhow!("callers needs a SYMBOL"))?;
    match (sites, depth) {
        (true, Some(_)) => bail!("--sites and --depth cannot be combined"),
        (true, None) => Ok(Command::CallSites { symbol }),
        (false, depth) => Ok(Command::Callers {
            symbol,
            depth: depth.unwrap_or(DEFAULT_CALLER_DEPTH),
        }),
    }
}

fn single_arg(cmd: &str, rest: &[&str]) -> Result<String> {
    match rest {
        [one] => Ok(one.to_string()),
        [] => bail!("{cmd} needs an argument"),
        _ => bail!("{cmd} takes exactly one argument"),
    }
}

fn expect_no_more(cmd: &str, rest: &[&str]) -> Result<()> {
    if let Some(extra) = rest.first() {
        bail!("unexpected argument `{extra}` for {cmd}");
    }
    Ok(())
}

pub fn print_help() {
    println!("gtags-index");
    println!();
    println!("Symbol index and caller graph for C/C++ projects, built on GNU Global.");
    println!();
    println!("Usage:");
    println!("  gtags-index build                         Rebuild tag files and the search index");
    println!("  gtags-index search [QUERY...]             Search tags (no QUERY: read queries from stdin)");
    println!("  gtags-index def <NAME>                    Print file:line:column of a definition");
    println!("  gtags-index refs <SYMBOL>                 List reference sites");
    println!("  gtags-index callers <SYMBOL> [--depth N]  Callers of SYMBOL (N > 1 prints a tree)");
    println!("  gtags-index callers <SYMBOL> --sites      Reference sites grouped by caller");
    println!("  gtags-index --help");
    println!("  gtags-index --version");
    println!();
    println!("Env (defaults shown):");
    println!("  BASE_DIR=.                           (project root)");
    println!("  DB_PATH=./.cache/tagsdb.sqlite       (resolved under BASE_DIR if relative)");
    println!("  LOG_DIR=./.cache                     (resolved under BASE_DIR if relative)");
    println!("  GLOBAL_CMD=global");
    println!("  GTAGS_CMD=gtags");
    println!("  INGEST_BATCH_SIZE=50000");
    println!("  TOKEN_PREFIX_MATCH=false");
    println!("  RUST_LOG=info");
    println!();
    println!("Settings may also be placed in <BASE_DIR>/.gtags-code.toml; env wins.");
}

pub fn print_version() {
    println!("{}", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn argv(parts: &[&str]) -> Vec<String> {
        std::iter::once("bin")
            .chain(parts.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn wants_help_and_version_detect_common_flags() {
        assert!(wants_help(&["bin".to_string(), "--help".to_string()]));
        assert!(wants_help(&["bin".to_string(), "-h".to_string()]));
        assert!(wants_version(&["bin".to_string(), "--version".to_string()]));
        assert!(wants_version(&["bin".to_string(), "-V".to_string()]));
        assert!(!wants_help(&["bin".to_string()]));
        assert!(!wants_version(&["bin".to_string()]));
    }

    #[test_case(&["build"], Command::Build ; "build")]
    #[test_case(&["search"], Command::Search { query: vec![] } ; "interactive search")]
    #[test_case(&["search", "get", "value"], Command::Search { query: vec!["get".into(), "value".into()] } ; "search words")]
    #[test_case(&["def", "main"], Command::Def { name: "main".into() } ; "def")]
    #[test_case(&["refs", "main"], Command::Refs { symbol: "main".into() } ; "refs")]
    #[test_case(&["callers", "f"], Command::Callers { symbol: "f".into(), depth: 1 } ; "callers default depth")]
    #[test_case(&["callers", "--depth", "3", "f"], Command::Callers { symbol: "f".into(), depth: 3 } ; "callers depth first")]
    #[test_case(&["callers", "f", "--sites"], Command::CallSites { symbol: "f".into() } ; "call sites")]
    fn parses_commands(parts: &[&str], expected: Command) {
        assert_eq!(parse_command(&argv(parts)).unwrap(), expected);
    }

    #[test_case(&[] ; "missing")]
    #[test_case(&["frobnicate"] ; "unknown")]
    #[test_case(&["def"] ; "def without name")]
    #[test_case(&["def", "a", "b"] ; "def with two names")]
    #[test_case(&["build", "x"] ; "build with extra")]
    #[test_case(&["callers", "f", "--depth", "0"] ; "zero depth")]
    #[test_case(&["callers", "f", "--depth"] ; "depth without value")]
    #[test_case(&["callers", "f", "g"] ; "two symbols")]
    #[test_case(&["callers", "f", "--sites", "--depth", "2"] ; "sites with depth")]
    fn rejects_bad_arguments(parts: &[&str]) {
        assert!(parse_command(&argv(parts)).is_err());
    }
}
