//! chunkdb interactive console
//!
//! Parses SQL, prints the AST or a positioned syntax error, evaluates
//! FROM-less SELECT lists and exposes the storage engine through dot
//! commands.

use anyhow::{bail, Context};
use chunkdb::sql::ast::{SelectItem, Statement};
use chunkdb::{parse, BackendPreference, DbError, EvalContext, ExprEvaluator, Storage, StorageConfig, Value};
use clap::{Parser as ClapParser, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(ClapParser, Debug)]
#[command(name = "chunkdb-cli")]
#[command(about = "Interactive console for the chunkdb SQL front end and storage engine")]
#[command(version)]
struct Cli {
    /// Data directory of the chunked store
    #[arg(short, long, default_value = "./chunkdb_data")]
    data_dir: PathBuf,

    /// JSON configuration file; overrides --data-dir
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage backend
    #[arg(short, long, value_enum, default_value_t = BackendArg::Auto)]
    backend: BackendArg,

    /// Run one script and exit instead of starting the console
    #[arg(short, long)]
    execute: Option<String>,

    /// Print the parsed AST of every statement
    #[arg(long)]
    ast: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendArg {
    Auto,
    Chunked,
    Flat,
    Memory,
}

impl From<BackendArg> for BackendPreference {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendPreference::Auto,
            BackendArg::Chunked => BackendPreference::Chunked,
            BackendArg::Flat => BackendPreference::Flat,
            BackendArg::Memory => BackendPreference::Memory,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => StorageConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => StorageConfig::new(&cli.data_dir).with_backend(cli.backend.into()),
    };
    let storage = Storage::open(config).context("opening storage")?;
    let mut console = Console {
        storage,
        evaluator: ExprEvaluator::new(),
        show_ast: cli.ast,
    };

    match cli.execute {
        Some(script) => console.run_sql(&script),
        None => console.interactive(),
    }
}

struct Console {
    storage: Storage,
    evaluator: ExprEvaluator,
    show_ast: bool,
}

impl Console {
    fn interactive(&mut self) -> anyhow::Result<()> {
        println!("chunkdb v{}", VERSION);
        println!("backend: {}", self.storage.backend_name());
        println!("Type '.help' for help, '.exit' to quit\n");

        let stdin = io::stdin();
        let mut buffer = String::new();
        let mut pending = String::new();

        loop {
            print!("{}", if pending.is_empty() { "chunkdb> " } else { "      -> " });
            io::stdout().flush()?;

            buffer.clear();
            if stdin.lock().read_line(&mut buffer)? == 0 {
                break;
            }
            let input = buffer.trim();

            if pending.is_empty() && input.starts_with('.') {
                match self.dot_command(input) {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(e) => {
                        eprintln!("Error: {:#}", e);
                        continue;
                    }
                }
            }
            if input.is_empty() {
                continue;
            }

            pending.push_str(input);
            pending.push('\n');
            if input.ends_with(';') {
                if let Err(e) = self.run_sql(&pending) {
                    eprintln!("Error: {:#}", e);
                }
                pending.clear();
            }
        }

        self.storage.flush()?;
        Ok(())
    }

    /// Returns `false` when the console should exit
    fn dot_command(&mut self, input: &str) -> anyhow::Result<bool> {
        let mut parts = input.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let arg = parts.next();

        match (command, arg) {
            (".exit" | ".quit", _) => return Ok(false),
            (".help", _) => print_help(),
            (".ast", _) => {
                self.show_ast = !self.show_ast;
                println!("AST output {}", if self.show_ast { "on" } else { "off" });
            }
            (".databases", _) => {
                for db in self.storage.list_databases()? {
                    println!("  {}", db);
                }
            }
            (".tables", Some(db)) => {
                for table in self.storage.list_tables(db)? {
                    let meta = self.storage.get_table_meta(db, &table)?;
                    println!(
                        "  {:<24} {:>10} rows {:>6} chunks",
                        table, meta.row_count, meta.chunk_count
                    );
                }
            }
            (".info", _) => {
                let info = self.storage.storage_info()?;
                println!("{}", serde_json::to_string_pretty(&info)?);
            }
            (".export", Some(db)) => {
                let export = self.storage.export_database(db)?;
                println!("{}", serde_json::to_string_pretty(&export)?);
            }
            (".wal", Some(db)) => {
                for entry in self.storage.get_wal(db, parts.next())? {
                    println!(
                        "  #{:<6} {} {:<6} {} {}",
                        entry.id,
                        entry.timestamp,
                        entry.operation.as_str(),
                        entry.table_name.as_deref().unwrap_or("-"),
                        entry.sql
                    );
                }
            }
            (".tables" | ".export" | ".wal", None) => bail!("usage: {} <database>", command),
            _ => bail!("unknown command: {} (try .help)", command),
        }
        Ok(true)
    }

    fn run_sql(&mut self, source: &str) -> anyhow::Result<()> {
        let program = match parse(source) {
            Ok(program) => program,
            Err(DbError::Syntax(e)) => {
                print_syntax_error(source, e.line, e.column);
                bail!("syntax error at {}", e);
            }
            Err(e) => return Err(e.into()),
        };

        for statement in &program.statements {
            if self.show_ast {
                println!("{:#?}", statement);
            }
            match statement {
                Statement::Select(select) if select.from.is_empty() => self.print_select(&select.columns)?,
                other => {
                    if !self.show_ast {
                        println!("parsed {}", statement_kind(other));
                    }
                }
            }
        }
        Ok(())
    }

    fn print_select(&self, items: &[SelectItem]) -> anyhow::Result<()> {
        let ctx = EvalContext::empty();
        let mut header = Vec::with_capacity(items.len());
        let mut values = Vec::with_capacity(items.len());

        for item in items {
            header.push(item.alias.clone().unwrap_or_else(|| item.expr.to_string()));
            values.push(self.evaluator.eval(&item.expr, &ctx)?);
        }

        let cells: Vec<String> = values.iter().map(render).collect();
        let widths: Vec<usize> = header
            .iter()
            .zip(&cells)
            .map(|(h, c)| h.chars().count().max(c.chars().count()))
            .collect();

        let line = |left: &str, mid: &str, right: &str| {
            let bars: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("{}{}{}", left, bars.join(mid), right)
        };
        let row = |texts: &[String]| {
            let padded: Vec<String> = texts
                .iter()
                .zip(&widths)
                .map(|(t, w)| format!(" {:<width$} ", t, width = w))
                .collect();
            format!("│{}│", padded.join("│"))
        };

        println!("{}", line("┌", "┬", "┐"));
        println!("{}", row(&header));
        println!("{}", line("├", "┼", "┤"));
        println!("{}", row(&cells));
        println!("{}", line("└", "┴", "┘"));

        for warning in self.evaluator.take_warnings() {
            println!("warning: {}", warning);
        }
        Ok(())
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

fn statement_kind(statement: &Statement) -> String {
    let debug = format!("{:?}", statement);
    debug
        .split(|c: char| c == '(' || c == ' ' || c == '{')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn print_syntax_error(source: &str, line: usize, column: usize) {
    if let Some(text) = source.lines().nth(line.saturating_sub(1)) {
        eprintln!("  {}", text);
        eprintln!("  {}^", " ".repeat(column.saturating_sub(1)));
    }
}

fn print_help() {
    println!(
        r#"
Commands:
  .help                  show this help
  .exit, .quit           leave the console
  .ast                   toggle AST output
  .databases             list databases
  .tables <db>           list tables with row and chunk counts
  .info                  storage backend, counts and size
  .export <db>           print a database export as JSON
  .wal <db> [since]      print WAL entries, optionally after an RFC 3339 time

SQL statements end with ';'. SELECT without FROM is evaluated:
  SELECT 1 + 2 * 3 AS n, UPPER('abc'), DATE_ADD('2024-01-31', INTERVAL 1 MONTH);
"#
    );
}
