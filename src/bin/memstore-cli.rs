//! memstore CLI Client
//!
//! Interactive command-line client for memstore.

use clap::Parser;
use memstore::client::{Client, ClientError};
use memstore::protocol::{Command, Frame};
use std::io::{self, Write};

/// memstore CLI - Interactive Client
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = 8090)]
    port: u16,

    /// Database to select after connecting
    #[arg(short = 'n', long, default_value_t = 0)]
    db: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    println!("Connecting to memstore at {}...", addr);

    let mut client = Client::connect(&addr).await?;

    if args.db != 0 {
        if let Frame::Error(msg) = client.request(&Command::Select(args.db)).await? {
            anyhow::bail!("cannot select database {}: {}", args.db, msg);
        }
    }

    println!("Connected! Type 'help' for available commands, 'quit' to exit.\n");

    let mut db = args.db;
    loop {
        if db == 0 {
            print!("memstore> ");
        } else {
            print!("memstore[{}]> ", db);
        }
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            println!("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("help") {
            print_help();
            continue;
        }

        let request = Frame::bulks(input.split_whitespace());
        let cmd = match Command::from_frame(request) {
            Ok(cmd) => cmd,
            Err(e) => {
                eprintln!("{}", e.to_frame());
                continue;
            }
        };

        match client.request(&cmd).await {
            Ok(reply) => {
                if let (Command::Select(index), Frame::Simple(_)) = (&cmd, &reply) {
                    db = *index;
                }
                println!("{}", reply);
            }
            Err(ClientError::ConnectionClosed) => {
                eprintln!("Connection closed by server");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
            }
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"
Available commands:

  PING [message]                 - Check server connectivity
  ECHO <message>                 - Echo a message back
  SELECT <db>                    - Switch to database 0-9
  SET <key> <value> [ttl]        - Set a string, TTL in seconds (or EX <s> / PX <ms>)
  GET <key>                      - Get a string
  DEL <key> [key ...]            - Delete keys
  EXISTS <key> [key ...]         - Count existing keys
  TYPE <key>                     - Kind of value stored at key

  RPUSH <key> <item> [item ...]  - Append items to a list
  LPUSH <key> <item> [item ...]  - Prepend items to a list
  RLEN <key>                     - List length (alias LLEN)
  LRANGE <key> <from> <to>       - Items in an inclusive index range
  RRANGE <key> <from> <to>       - Same as LRANGE
  LPOP <key> [count]             - Pop from the head
  RPOP <key> [count]             - Pop from the tail
  BLPOP <key> <timeout> [count]  - Wait up to timeout seconds (0 = forever) and pop from the head
  BRPOP <key> <timeout> [count]  - Wait and pop from the tail

  XADD <key> <id|*> <field> <value> [field value ...] - Append a stream entry
  XRANGE <key> <start> <end>     - Stream entries between two IDs (- and + for the ends)

  DBSIZE                         - Number of keys in the current database
  FLUSHDB                        - Remove every key in the current database
  FLUSHALL                       - Remove every key in every database

  help                           - Show this help
  quit / exit                    - Exit the CLI

Examples:
  SET tempkey value 60   (expires in 60 seconds)
  RPUSH queue a b c
  LRANGE queue 0 -1
  XADD events * user alice action login
  XRANGE events - +
"#
    );
}
