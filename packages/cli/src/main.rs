use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use bpekit::{encoding_for_model, get_encoding, list_encoding_names, Encoding};

const DEFAULT_ENCODING: &str = "cl100k_base";

#[derive(Parser)]
#[command(name = "bpekit", about = "Byte-level BPE tokenizer for language models")]
struct Args {
    #[arg(name = "file", help = "Path to the input file")]
    file: PathBuf,

    #[arg(
        short,
        long,
        conflicts_with = "model",
        help = "Encoding to use, see `bpekit --help` for the available names"
    )]
    encoding: Option<String>,

    #[arg(short, long, help = "Model whose encoding to use")]
    model: Option<String>,

    #[arg(short, long, help = "Decode a file containing one token id per line")]
    decode: bool,
}

fn resolve_encoding(args: &Args) -> Result<std::sync::Arc<Encoding>, Box<dyn Error>> {
    if let Some(model) = &args.model {
        return Ok(encoding_for_model(model)?);
    }
    let name = args.encoding.as_deref().unwrap_or(DEFAULT_ENCODING);
    Ok(get_encoding(name).map_err(|error| {
        format!("{error}; available encodings: {}", list_encoding_names().join(", "))
    })?)
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let encoding = resolve_encoding(args)?;
    if args.decode {
        let input = std::fs::read_to_string(&args.file)?;
        let tokens = input
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<u32>, _>>()?;
        print!("{}", encoding.decode_with_policy(&tokens, bpekit::DecodePolicy::Replace)?);
    } else {
        let input = std::fs::read_to_string(&args.file)?;
        let tokens =
            encoding.encode(&input, &bpekit::AllowedSpecial::default(), &Default::default())?;
        let mut output = String::with_capacity(tokens.len() * 6);
        for token in tokens {
            output.push_str(&token.to_string());
            output.push('\n');
        }
        print!("{output}");
    }
    Ok(())
}

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::Level::Warn.to_level_filter())
        .env()
        .init()
        .unwrap();

    let args = Args::parse();
    if let Err(error) = run(&args) {
        eprintln!("{error}");
        std::process::exit(1);
    }
}
