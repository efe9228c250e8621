//! the main compiler binary. takes an IL source file and a pipeline stage to
//! print.
//!
//! run with `--help` for more info.

use clap::{Parser, ValueEnum};

use cubeil::front::lex::{Lexer, TokenKind};
use cubeil::front::Procedure;
use cubeil::middle::{cfg, ssa};
use cubeil::{back, compile, Config};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the input file
    file: String,
    /// which pipeline stage to print
    #[arg(value_enum, short, long, default_value_t = Emit::Ssa)]
    emit: Emit,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
enum Emit {
    /// the raw token stream
    Tokens,
    /// the parsed IR, before the CFG and SSA passes
    Ir,
    /// the IR after the CFG pass (reverse-postorder blocks, SCC tags)
    Cfg,
    /// the fully renamed SSA form
    Ssa,
}

fn print_tokens(filename: &str, source: &str) {
    let mut lexer = Lexer::new(filename, source);
    loop {
        let tok = lexer.scan();
        let done = tok.kind == TokenKind::Eof;
        println!("{tok}");
        if done {
            break;
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{}: {}", args.file, e);
            std::process::exit(1);
        }
    };

    if args.emit == Emit::Tokens {
        print_tokens(&args.file, &source);
        return;
    }

    let emit = args.emit;
    let result = compile(Config {
        source: &source,
        filename: &args.file,
        on_procedure: &mut |proc: &mut Procedure| {
            if emit != Emit::Ir {
                cfg::build(proc);
            }
            if emit == Emit::Ssa {
                ssa::build(proc)?;
            }
            log::debug!("compiled procedure {}", proc.name);
            println!("{}", back::print(proc));
            Ok(())
        },
    });

    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}
