use std::env;
use std::io::{self, Cursor, Read};
use std::path::Path;

use ingest::{usage_from_path, usage_from_reader};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("usage: ingest_cli <path|->");
        std::process::exit(2);
    }

    let path = &args[1];
    let usage = if path == "-" {
        let mut data = String::new();
        io::stdin().read_to_string(&mut data).unwrap_or_else(|err| {
            eprintln!("failed to read stdin: {}", err);
            std::process::exit(1);
        });
        usage_from_reader(Cursor::new(data))
    } else {
        usage_from_path(Path::new(path)).unwrap_or_else(|err| {
            eprintln!("failed to read {}: {}", path, err);
            std::process::exit(1);
        })
    };

    if usage.is_empty() {
        eprintln!("no usage records found");
        std::process::exit(3);
    }

    for (model, totals) in &usage {
        println!("model {}", model);
        println!("  input_tokens {}", totals.input_tokens);
        println!("  output_tokens {}", totals.output_tokens);
        println!("  cache_read_tokens {}", totals.cache_read);
        println!("  cache_write_tokens {}", totals.cache_write);
        println!("  records {}", totals.session_count);
        if totals.aliases.len() > 1 || !totals.aliases.contains(model) {
            let aliases = totals.aliases.iter().cloned().collect::<Vec<_>>();
            println!("  aliases {}", aliases.join(","));
        }
    }
}
