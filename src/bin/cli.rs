//! Chunkpad CLI
//!
//! Offline inspection and export of persisted sessions.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use chunkpad::session::validate_room;
use chunkpad::{ChunkStore, ChunkpadError, StoreOptions};
use clap::{Parser, Subcommand};

/// Chunkpad CLI
#[derive(Parser, Debug)]
#[command(name = "chunkpad-cli")]
#[command(about = "Inspect and export Chunkpad sessions on disk")]
struct Args {
    /// Data directory of the server
    #[arg(short, long, default_value = "./chunkpad_data")]
    data_dir: PathBuf,

    /// Chunk size the server was configured with
    #[arg(short, long, default_value = "4096")]
    chunk_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the length and chunk layout of a session
    Inspect {
        /// Room code of the session
        room: String,
    },

    /// Write a session's content to a file or stdout
    Export {
        /// Room code of the session
        room: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> chunkpad::Result<()> {
    let options = StoreOptions {
        chunk_size: args.chunk_size,
        ..StoreOptions::default()
    };

    match args.command {
        Commands::Inspect { room } => {
            let store = open_existing(&args.data_dir, &room, options)?;
            let lengths = store.chunk_lengths();
            let full = lengths.iter().filter(|len| **len == store.chunk_size()).count();

            println!("session:     {}", room);
            println!("directory:   {}", store.dir().display());
            println!("length:      {} bytes", store.len());
            println!("chunk size:  {} bytes", store.chunk_size());
            println!("chunks:      {} ({} full)", lengths.len(), full);
            for (n, len) in lengths.iter().enumerate() {
                println!("  chunk {:>6}: {:>8} bytes", n, len);
            }
        }
        Commands::Export { room, out } => {
            let store = open_existing(&args.data_dir, &room, options)?;
            let written = match out {
                Some(path) => {
                    let mut sink = BufWriter::new(File::create(&path)?);
                    store.write_to_stream(&mut sink)?
                }
                None => {
                    let stdout = io::stdout();
                    let mut sink = BufWriter::new(stdout.lock());
                    store.write_to_stream(&mut sink)?
                }
            };
            eprintln!("exported {} bytes from {}", written, room);
        }
    }

    Ok(())
}

/// Open a session that must already exist on disk
fn open_existing(data_dir: &std::path::Path, room: &str, options: StoreOptions) -> chunkpad::Result<ChunkStore> {
    validate_room(room)?;
    let dir = data_dir.join(room);
    if !dir.is_dir() {
        return Err(ChunkpadError::Storage(format!("no session at {}", dir.display())));
    }
    ChunkStore::open(&dir, options)
}
