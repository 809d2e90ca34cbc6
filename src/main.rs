use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use valgolc::TranslatorOptions;

/// Translate a VALGOL program into an assembly listing for the accumulator machine.
#[derive(Debug, Parser)]
#[command(name = "valgolc", version)]
struct Cli {
  /// Source file, or `-` to read standard input.
  source: PathBuf,

  /// Write the listing here instead of standard output.
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Counter value of the first generated label.
  #[arg(long, default_value_t = 1)]
  first_label: u32,
}

fn read_source(path: &Path) -> io::Result<String> {
  if path.as_os_str() == "-" {
    let mut source = String::new();
    io::stdin().read_to_string(&mut source)?;
    return Ok(source);
  }
  fs::read_to_string(path)
}

fn main() {
  pretty_env_logger::init();
  let cli = Cli::parse();

  let source = read_source(&cli.source).unwrap_or_else(|err| {
    eprintln!("{}: {err}", cli.source.display());
    process::exit(1);
  });

  let options = TranslatorOptions {
    first_label: cli.first_label,
  };
  let listing = match valgolc::translate_with(&source, &options) {
    Ok(program) => program.to_string(),
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  };

  let written = match &cli.output {
    Some(path) => fs::write(path, listing),
    None => {
      print!("{listing}");
      Ok(())
    }
  };
  if let Err(err) = written {
    eprintln!("error: {err}");
    process::exit(1);
  }
}
