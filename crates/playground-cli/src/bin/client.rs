//! One-shot synchronous client: sends a single `Compile` or `List` request
//! and prints the reply. No re-exec guard is needed here — that role is
//! reserved for the server binary the container backend re-execs.

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpStream;

use wire::{read_frame, write_frame, CompileArgs, RpcReply, RpcRequest};

#[derive(Debug, Parser)]
#[command(name = "playground-client")]
#[command(about = "One-shot client for the sandboxed compile/run service")]
struct Cli {
    /// Server address to connect to.
    #[arg(long, default_value = "127.0.0.1:1234")]
    addr: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile and run a source snippet.
    Compile {
        /// Language tag, e.g. `c11`, `bash`, `go`.
        lang: String,
        /// Read source from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List the compilers/interpreters the server currently has registered.
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut socket = match TcpStream::connect(&cli.addr).await {
        Ok(socket) => socket,
        Err(err) => {
            eprintln!("failed to dial {}: {err}", cli.addr);
            std::process::exit(1);
        }
    };

    let request = match cli.command {
        Command::Compile { lang, file } => {
            let code = match read_source(file.as_deref()) {
                Ok(code) => code,
                Err(err) => {
                    eprintln!("failed to read source: {err}");
                    std::process::exit(1);
                }
            };
            RpcRequest::Compile(CompileArgs { code, lang })
        }
        Command::List => RpcRequest::List,
    };

    if let Err(err) = write_frame(&mut socket, &request).await {
        eprintln!("failed to send request: {err}");
        std::process::exit(1);
    }

    match read_frame::<_, RpcReply>(&mut socket).await {
        Ok(Some(reply)) => print_reply(reply),
        Ok(None) => eprintln!("server closed the connection without replying"),
        Err(err) => eprintln!("failed to read reply: {err}"),
    }
}

fn read_source(file: Option<&std::path::Path>) -> std::io::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn print_reply(reply: RpcReply) {
    match reply {
        RpcReply::Compile(result) => {
            if !result.error.is_empty() {
                println!("error: {}", result.error);
            }
            if !result.c_output.is_empty() {
                println!("compile output:\n{}", result.c_output);
            }
            if !result.c_error.is_empty() {
                println!("compile error:\n{}", result.c_error);
            }
            if !result.p_output.is_empty() {
                println!("program output:\n{}", result.p_output);
            }
            if !result.p_error.is_empty() {
                println!("program error:\n{}", result.p_error);
            }
            println!("({:?})", result.time);
        }
        RpcReply::List(list) => {
            for compiler in list.compilers {
                println!("{} {}", compiler.name, compiler.version);
            }
        }
        RpcReply::Error { message } => {
            eprintln!("server error: {message}");
        }
    }
}
