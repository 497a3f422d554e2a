use std::io::{self, BufRead, Write};

use log::info;
use pesadb::{
    config::Config,
    error::Result,
    sql::{
        engine::{Engine, Session, kv::KVEngine},
        executor::QueryResult,
    },
    storage::{disk::DiskEngine, engine::Engine as StorageEngine, memory::MemoryEngine},
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    // clap prints help, version and usage errors itself, then exits
    let config = Config::from_matches(&Config::command().get_matches());

    match &config.data_file {
        Some(path) => {
            info!("opening {}", path.display());
            let engine = KVEngine::with_namespace(DiskEngine::open(path)?, &config.namespace)?;
            repl(engine.session(), &config)
        }
        None => {
            let engine = KVEngine::with_namespace(MemoryEngine::new(), &config.namespace)?;
            repl(engine.session(), &config)
        }
    }
}

/// Reads one statement per line until EOF or `.exit`
fn repl<S: StorageEngine + 'static>(mut session: Session<KVEngine<S>>, config: &Config) -> Result<()> {
    if config.seed_demo && session.initialize_demo()? {
        println!("Seeded demo tables: {}", session.catalog().join(", "));
    }
    println!("PesaDB. Type .exit to quit, .reset to drop every table.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("pesadb> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let line = input.trim();
        match line {
            "" => continue,
            ".exit" | "exit" => break,
            ".reset" => {
                session.reset()?;
                println!("All tables dropped.");
            }
            sql => print_result(&session.query(sql)),
        }
    }
    Ok(())
}

fn print_result(result: &QueryResult) {
    if let (Some(columns), Some(rows)) = (&result.columns, &result.data) {
        println!("{}", columns.join(" | "));
        for row in rows {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            println!("{}", cells.join(" | "));
        }
    }
    let status = if result.success { "OK" } else { "ERROR" };
    match result.execution_time {
        Some(elapsed) => println!("{}: {} ({:.2?})", status, result.message, elapsed),
        None => println!("{}: {}", status, result.message),
    }
}
