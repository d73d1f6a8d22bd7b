use std::fs::File;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::path::{Path, PathBuf};

use rox::lox::Lox;

use clap::Parser as ClapParser;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Lox source file; starts an interactive session when omitted
    script: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    simple_logger::SimpleLogger::new().env().init()?;

    let args: Cli = Cli::parse();

    match args.script.as_slice() {
        [] => run_prompt()?,

        [script] => run_file(script)?,

        _ => {
            eprintln!("Usage: rox [script]");
            std::process::exit(64);
        }
    }

    Ok(())
}

fn run_file(path: &Path) -> anyhow::Result<()> {
    let mut buf: Vec<u8> = Vec::new();
    let mut reader: BufReader<File> = BufReader::new(File::open(path)?);
    reader.read_to_end(&mut buf)?;

    let mut lox = Lox::new(io::stdout());
    lox.run(&buf);

    if lox.had_error() {
        std::process::exit(65);
    }

    if lox.had_runtime_error() {
        std::process::exit(70);
    }

    Ok(())
}

fn run_prompt() -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut lox = Lox::new(io::stdout());

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();

        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        lox.run(line.as_bytes());
        lox.reset_error();
    }

    Ok(())
}
