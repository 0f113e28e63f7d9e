//! `archer-query`: a thin CLI over [`archer_core`] — index whitespace-
//! tokenized text files, run one query from a JSON [`QueryModel`], or drop
//! into an interactive REPL. Grounded on `meilidb/examples/query-database.rs`
//! (the `rustyline`/`termcolor` REPL shape) and `cli/src/main.rs` (the
//! `structopt` subcommand layout), neither of which this crate's core logic
//! needs — they are exactly the ambient CLI scaffolding `spec.md` §6 leaves
//! to "an implementer".

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use archer_core::{Evaluator, Index, QueryModel, QueryTerm, ScoredDocument, WhitespaceLexer};
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use structopt::StructOpt;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

#[derive(Debug, StructOpt)]
#[structopt(name = "archer-query", about = "Query a positional inverted-index posting store.")]
enum Opt {
    /// Index one or more whitespace-tokenized text files, one document per
    /// file, into the index directory (created if it doesn't exist).
    Ingest {
        #[structopt(parse(from_os_str))]
        index_dir: PathBuf,
        #[structopt(parse(from_os_str), required = true)]
        files: Vec<PathBuf>,
    },
    /// Run a single query, read as a JSON `QueryModel`, and print `(di, score)`
    /// pairs ranked by the default criteria.
    Query {
        #[structopt(parse(from_os_str))]
        index_dir: PathBuf,
        #[structopt(parse(from_os_str))]
        query_json: PathBuf,
    },
    /// Interactively read plain-word ranking queries from stdin (via
    /// `rustyline`) and print results until EOF/Ctrl-D.
    Repl {
        #[structopt(parse(from_os_str))]
        index_dir: PathBuf,
    },
}

fn open_or_create(dir: &Path) -> archer_core::Result<Index> {
    if dir.join("vocab").exists() {
        Index::open(dir)
    } else {
        Index::create(dir)
    }
}

fn run_ingest(index_dir: PathBuf, files: Vec<PathBuf>) -> archer_core::Result<()> {
    let mut index = open_or_create(&index_dir)?;
    for path in &files {
        let text = fs::read_to_string(path)?;
        let external_id = path.display().to_string();
        let di = index.ingest_document(external_id, WhitespaceLexer::new(&text))?;
        println!("indexed {:?} as di={}", path, di);
    }
    index.persist()?;
    Ok(())
}

fn print_results(index: &Index, results: &[ScoredDocument]) {
    for doc in results {
        let name = index.doctable.external_id(doc.di).unwrap_or("?");
        println!("{}\t{:.6}\t{}", doc.di, doc.score.0, name);
    }
}

fn run_query(index_dir: PathBuf, query_json: PathBuf) -> archer_core::Result<()> {
    let mut index = Index::open(&index_dir)?;
    let raw = fs::read_to_string(&query_json)?;
    let model: QueryModel = serde_json::from_str(&raw)
        .map_err(|e| archer_core::Error::FormatError(format!("invalid query json: {}", e)))?;
    let results = Evaluator::search(&mut index, &model)?;
    print_results(&index, &results);
    Ok(())
}

fn highlight_count(stdout: &mut StandardStream, count: usize) -> std::io::Result<()> {
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    write!(stdout, "{}", count)?;
    stdout.reset()?;
    writeln!(stdout, " result(s)")
}

fn run_repl(index_dir: PathBuf) -> archer_core::Result<()> {
    let mut index = Index::open(&index_dir)?;
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    let config = Config::builder().auto_add_history(true).build();
    let mut readline = Editor::<()>::with_config(config);
    let _ = readline.load_history("archer-query-history.txt");

    loop {
        match readline.readline("query> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let mut model = QueryModel::new();
                for word in line.split_whitespace() {
                    model.ranking.push(QueryTerm::word(word));
                }
                match Evaluator::search(&mut index, &model) {
                    Ok(results) => {
                        let _ = highlight_count(&mut stdout, results.len());
                        print_results(&index, &results);
                    }
                    Err(e) => eprintln!("query failed: {}", e),
                }
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(e) => {
                eprintln!("readline error: {}", e);
                break;
            }
        }
    }

    let _ = readline.save_history("archer-query-history.txt");
    Ok(())
}

fn main() {
    env_logger::init();
    let opt = Opt::from_args();

    let result = match opt {
        Opt::Ingest { index_dir, files } => run_ingest(index_dir, files),
        Opt::Query { index_dir, query_json } => run_query(index_dir, query_json),
        Opt::Repl { index_dir } => run_repl(index_dir),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
